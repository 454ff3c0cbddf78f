//! Async HTTP client factory for the deployment API. This is purely network
//! io: request construction, TLS setup and nothing else.
use std::{path::Path, time::Duration};

const APP_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed initializing HTTP client")]
    BuildClient(#[source] reqwest::Error),
    #[error("failed reading TLS credential at `{}`", .0.display())]
    ReadCredential(std::path::PathBuf, #[source] std::io::Error),
    #[error("TLS credential at `{}` was not a valid identity/certificate", .0.display())]
    InvalidCredential(std::path::PathBuf, #[source] reqwest::Error),
}

/// Credential paths forwarded opaquely to the HTTP client builder; their
/// contents are never interpreted by this crate.
#[derive(Debug, Default, Clone)]
pub struct TlsConfig {
    pub client_cert: Option<std::path::PathBuf>,
    pub client_key: Option<std::path::PathBuf>,
    pub ca_cert: Option<std::path::PathBuf>,
}

/// Builds a `reqwest::Client` with explicit, reasonable defaults: built-in
/// root CAs, TLS 1.3 minimum, no redirect following (the deployment API
/// never redirects; following one silently would be a protocol surprise),
/// HTTPS-only unless `insecure-tls` is enabled for local integration tests.
pub fn build(tls: &TlsConfig) -> Result<reqwest::Client, Error> {
    let mut builder = reqwest::Client::builder()
        .tls_built_in_root_certs(true)
        .min_tls_version(reqwest::tls::Version::TLS_1_3)
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(APP_USER_AGENT)
        .timeout(Duration::from_secs(120));

    #[cfg(not(feature = "insecure-tls"))]
    {
        builder = builder.https_only(true);
    }
    #[cfg(feature = "insecure-tls")]
    {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(ca_cert) = &tls.ca_cert {
        let pem = read(ca_cert)?;
        let cert = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| Error::InvalidCredential(ca_cert.clone(), e))?;
        builder = builder.add_root_certificate(cert);
    }

    if let (Some(cert_path), Some(key_path)) = (&tls.client_cert, &tls.client_key) {
        let mut pem = read(cert_path)?;
        pem.extend(read(key_path)?);
        let identity = reqwest::Identity::from_pem(&pem)
            .map_err(|e| Error::InvalidCredential(cert_path.clone(), e))?;
        builder = builder.identity(identity);
    }

    builder.build().map_err(Error::BuildClient)
}

fn read(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::ReadCredential(path.to_path_buf(), e))
}
