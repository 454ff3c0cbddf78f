use std::path::{Path, PathBuf};

use figment::providers::Format as _;
use serde::{Deserialize, Serialize};

mod args;
pub use args::Args;


/// The configurable options for running the update client.
///
/// The only entry point to construct `Settings` is `Settings::get`.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Root of the state store DB, `device_type` file, and `modules/v3/`.
    pub data_store_dir: PathBuf,
    /// Base URL of the deployment API.
    pub server_url: String,
    /// Wall-clock timeout applied to a single update-module invocation.
    #[serde(default = "default_module_timeout_seconds")]
    pub module_timeout_seconds: u64,
    /// Sent to the server as part of device identity; not a provides key.
    pub device_id: String,
    /// Caller-side retry cadence; the core does not consume this directly.
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// Opaque TLS client certificate path, forwarded to the HTTP client
    /// builder.
    pub tls_client_cert: Option<PathBuf>,
    /// Opaque TLS client key path, forwarded to the HTTP client builder.
    pub tls_client_key: Option<PathBuf>,
    /// Opaque additional CA bundle, forwarded to the HTTP client builder.
    pub tls_ca_cert: Option<PathBuf>,
}

fn default_module_timeout_seconds() -> u64 {
    1800
}

fn default_poll_interval_seconds() -> u64 {
    300
}

impl Settings {
    /// Constructs `Settings` from a config file, environment variables, and
    /// command line arguments. Command line arguments always take precedence
    /// over environment variables, which in turn take precedence over the
    /// config file.
    pub fn get<P: AsRef<Path>>(
        args: &Args,
        config: P,
        env_prefix: &str,
    ) -> figment::error::Result<Settings> {
        figment::Figment::new()
            .merge(figment::providers::Toml::file(config))
            .merge(figment::providers::Env::prefixed(env_prefix))
            .merge(figment::providers::Serialized::defaults(args))
            .extract()
    }
}
