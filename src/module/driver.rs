//! Update-module driver — Download protocol. Drives the FIFO handshake
//! with the external module, with backpressure, timeout, and a
//! fallback-to-files path.
use std::{
    io,
    os::unix::io::FromRawFd,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use nix::{
    errno::Errno,
    fcntl::{self, FcntlArg, OFlag},
    sys::stat::Mode,
    unistd::mkfifo,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, Command},
    time,
};
use update_client_core::artifact::{Artifact, Payload};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("update module exited with status {0}")]
    NonZeroExitStatus(i32),
    #[error("update module closed a stream before the driver finished writing to it")]
    BrokenPipe,
    #[error("update module invocation timed out")]
    TimedOut,
    #[error("filesystem error while running the update module")]
    Io(#[source] io::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::BrokenPipe {
            Error::BrokenPipe
        } else {
            Error::Io(e)
        }
    }
}

impl From<Errno> for Error {
    fn from(e: Errno) -> Self {
        Error::Io(io::Error::from(e))
    }
}

/// Result of a successful [`download`] call.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Set when the module exited successfully without ever reading from
    /// `stream-next`; payloads were spooled to `files/<name>` instead.
    pub used_fallback_to_files: bool,
}

const BUF_SIZE: usize = 64 * 1024;
/// How long to wait between retries of a non-blocking FIFO open while
/// racing the child process's exit.
const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the Download phase: `<module_path> Download <work_dir>`.
pub async fn download(
    module_path: &Path,
    work_dir: &Path,
    artifact: &mut dyn Artifact,
    timeout: Duration,
) -> Result<DownloadOutcome, Error> {
    std::fs::create_dir_all(work_dir.join("streams"))?;
    std::fs::create_dir_all(work_dir.join("files"))?;
    let stream_next_path = work_dir.join("stream-next");
    let _ = std::fs::remove_file(&stream_next_path);
    mkfifo(&stream_next_path, Mode::from_bits_truncate(0o600))?;

    let mut child = Command::new(module_path)
        .arg("Download")
        .arg(work_dir)
        .stdin(Stdio::null())
        .spawn()?;

    match time::timeout(timeout, run(&mut child, work_dir, &stream_next_path, artifact)).await {
        Ok(result) => result,
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            Err(Error::TimedOut)
        }
    }
}

async fn run(
    child: &mut Child,
    work_dir: &Path,
    stream_next_path: &Path,
    artifact: &mut dyn Artifact,
) -> Result<DownloadOutcome, Error> {
    let stream_next = match open_write_racing_exit(stream_next_path, child).await? {
        OpenOrExit::Opened(file) => file,
        OpenOrExit::Exited(status) => {
            return if status.success() {
                spool_to_files(work_dir, artifact).await?;
                Ok(DownloadOutcome {
                    used_fallback_to_files: true,
                })
            } else {
                Err(exit_status_error(status))
            };
        }
    };
    let mut stream_next = stream_next;

    loop {
        let payload = match artifact.next_payload()? {
            Some(payload) => payload,
            None => break,
        };
        let name = payload.name().to_string();

        stream_next
            .write_all(format!("streams/{name}\n").as_bytes())
            .await?;

        let payload_path = work_dir.join("streams").join(&name);
        let _ = std::fs::remove_file(&payload_path);
        mkfifo(&payload_path, Mode::from_bits_truncate(0o600))?;

        let mut payload_fifo = match open_write_racing_exit(&payload_path, child).await? {
            OpenOrExit::Opened(file) => file,
            OpenOrExit::Exited(status) => return Err(exit_status_error(status)),
        };

        pump(payload.reader(), &mut payload_fifo).await?;
        drop(payload_fifo);
        let _ = std::fs::remove_file(&payload_path);
    }

    stream_next.write_all(b"\n").await?;
    drop(stream_next);

    let status = child.wait().await?;
    if status.success() {
        Ok(DownloadOutcome {
            used_fallback_to_files: false,
        })
    } else {
        Err(exit_status_error(status))
    }
}

async fn pump(
    reader: &mut (dyn AsyncRead + Unpin + Send),
    fifo: &mut tokio::fs::File,
) -> Result<(), Error> {
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        fifo.write_all(&buf[..n]).await?;
    }
    Ok(())
}

async fn spool_to_files(work_dir: &Path, artifact: &mut dyn Artifact) -> Result<(), Error> {
    while let Some(payload) = artifact.next_payload()? {
        let name = payload.name().to_string();
        let mut out = tokio::fs::File::create(work_dir.join("files").join(&name)).await?;
        tokio::io::copy(payload.reader(), &mut out).await?;
    }
    Ok(())
}

fn exit_status_error(status: std::process::ExitStatus) -> Error {
    Error::NonZeroExitStatus(status.code().unwrap_or(-1))
}

enum OpenOrExit {
    Opened(tokio::fs::File),
    Exited(std::process::ExitStatus),
}

/// Opens `path` for writing, retrying a non-blocking open until a reader
/// shows up on the other end (mirroring blocking-open semantics without
/// ever blocking the runtime's worker thread on an FD no one may ever
/// open). Races against the child exiting in the meantime, which the
/// caller must then treat as either a successful fallback-to-files run or
/// a failed module.
async fn open_write_racing_exit(
    path: &Path,
    child: &mut Child,
) -> Result<OpenOrExit, Error> {
    loop {
        match try_open_nonblocking_write(path) {
            Ok(file) => return Ok(OpenOrExit::Opened(file)),
            Err(Errno::ENXIO) => {
                tokio::select! {
                    biased;
                    status = child.wait() => return Ok(OpenOrExit::Exited(status?)),
                    _ = time::sleep(OPEN_RETRY_INTERVAL) => continue,
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn try_open_nonblocking_write(path: &Path) -> Result<tokio::fs::File, Errno> {
    let fd = fcntl::open(path, OFlag::O_WRONLY | OFlag::O_NONBLOCK, Mode::empty())?;
    // Restore blocking semantics now that a reader is present, so the
    // subsequent pump writes apply real backpressure instead of EAGAIN.
    let flags = fcntl::fcntl(fd, FcntlArg::F_GETFL)?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.remove(OFlag::O_NONBLOCK);
    fcntl::fcntl(fd, FcntlArg::F_SETFL(flags))?;

    let std_file = unsafe { std::fs::File::from_raw_fd(fd) };
    Ok(tokio::fs::File::from_std(std_file))
}
