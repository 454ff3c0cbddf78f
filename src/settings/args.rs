use clap::Parser;
use serde::Serialize;

/// Drives a device through an OTA deployment lifecycle against an external
/// update module.
#[derive(Debug, Parser, Serialize)]
#[command(author, version)]
pub struct Args {
    /// The path to the config file.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    /// Root of the state store DB, `device_type` file, and `modules/v3/`.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_store_dir: Option<String>,
    /// Base URL of the deployment API.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    /// Wall-clock timeout, in seconds, applied to a single update-module
    /// invocation.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_timeout_seconds: Option<u64>,
    /// The ID of the device.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Caller-side poll cadence, in seconds.
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_seconds: Option<u64>,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_client_cert: Option<String>,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_client_key: Option<String>,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<String>,
}
