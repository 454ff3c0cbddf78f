//! Read-only view over an installable artifact. Parsing the artifact
//! container itself (tar, signature verification) is an external
//! collaborator; this module only describes the shape the rest of the crate
//! consumes.
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use serde_json::Value;
use tokio::io::{AsyncRead, ReadBuf};

/// Header fields and metadata blobs attached to an [`Artifact`].
pub trait ArtifactHeader {
    fn artifact_name(&self) -> &str;
    fn artifact_group(&self) -> &str;
    fn payload_type(&self) -> &str;
    fn header_info(&self) -> &Value;
    fn type_info(&self) -> &Value;
    fn meta_data(&self) -> &Value;
}

/// One streamable binary blob inside an artifact.
pub trait Payload {
    fn name(&self) -> &str;

    /// An async reader over this payload's bytes. This is deliberately
    /// `AsyncRead` rather than `std::io::Read`: the update-module driver
    /// pumps it on the same single-threaded event loop that drives the
    /// FIFO writes and the overall Download timeout, so a slow or blocking
    /// read here would stall the timer alongside everything else.
    /// Implementations are expected to stream rather than buffer the whole
    /// payload in memory.
    fn reader(&mut self) -> &mut (dyn AsyncRead + Unpin + Send);
}

/// An artifact: a header plus a lazy, in-order sequence of payloads.
///
/// `next_payload` mirrors an iterator but is defined as its own method
/// (rather than requiring `Iterator`) so implementations can hand back
/// `&mut dyn Payload` without boxing. `header` returns `&dyn ArtifactHeader`
/// rather than an associated type so the driver can hold artifacts as
/// `&mut dyn Artifact` regardless of which concrete parser produced them.
pub trait Artifact {
    fn header(&self) -> &dyn ArtifactHeader;

    /// Advances to and returns the next payload, or `None` once exhausted.
    fn next_payload(&mut self) -> std::io::Result<Option<&mut dyn Payload>>;
}

/// In-memory `Artifact`/`Payload` implementations used by this crate's own
/// tests and by downstream crates that need a fixture artifact without
/// pulling in a real tar/signature parser.
pub mod testing {
    use super::*;

    pub struct StaticHeader {
        pub artifact_name: String,
        pub artifact_group: String,
        pub payload_type: String,
        pub header_info: Value,
        pub type_info: Value,
        pub meta_data: Value,
    }

    impl ArtifactHeader for StaticHeader {
        fn artifact_name(&self) -> &str {
            &self.artifact_name
        }
        fn artifact_group(&self) -> &str {
            &self.artifact_group
        }
        fn payload_type(&self) -> &str {
            &self.payload_type
        }
        fn header_info(&self) -> &Value {
            &self.header_info
        }
        fn type_info(&self) -> &Value {
            &self.type_info
        }
        fn meta_data(&self) -> &Value {
            &self.meta_data
        }
    }

    pub struct StaticPayload {
        pub name: String,
        pub data: io::Cursor<Vec<u8>>,
    }

    impl Payload for StaticPayload {
        fn name(&self) -> &str {
            &self.name
        }
        fn reader(&mut self) -> &mut (dyn AsyncRead + Unpin + Send) {
            self
        }
    }

    // In-memory data never actually blocks, so this just drives the
    // `std::io::Read` impl on `Cursor` straight through to completion
    // instead of ever returning `Poll::Pending`.
    impl AsyncRead for StaticPayload {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let n = io::Read::read(&mut this.data, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    pub struct StaticArtifact {
        pub header: StaticHeader,
        pub payloads: Vec<StaticPayload>,
        pub next: usize,
    }

    impl Artifact for StaticArtifact {
        fn header(&self) -> &dyn ArtifactHeader {
            &self.header
        }

        fn next_payload(&mut self) -> std::io::Result<Option<&mut dyn Payload>> {
            if self.next >= self.payloads.len() {
                return Ok(None);
            }
            let payload = &mut self.payloads[self.next];
            self.next += 1;
            Ok(Some(payload))
        }
    }

    #[test]
    fn static_artifact_yields_payloads_in_order() {
        let mut artifact = StaticArtifact {
            header: StaticHeader {
                artifact_name: "rootfs-update".into(),
                artifact_group: "".into(),
                payload_type: "rootfs-image".into(),
                header_info: Value::Null,
                type_info: Value::Null,
                meta_data: Value::Null,
            },
            payloads: vec![
                StaticPayload {
                    name: "rootfs".into(),
                    data: std::io::Cursor::new(b"a".to_vec()),
                },
                StaticPayload {
                    name: "rootfs2".into(),
                    data: std::io::Cursor::new(b"b".to_vec()),
                },
            ],
            next: 0,
        };

        let first = artifact.next_payload().unwrap().unwrap();
        assert_eq!(first.name(), "rootfs");
        let second = artifact.next_payload().unwrap().unwrap();
        assert_eq!(second.name(), "rootfs2");
        assert!(artifact.next_payload().unwrap().is_none());
    }
}
