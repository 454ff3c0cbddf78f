use std::{borrow::Cow, path::Path};

use clap::Parser as _;
use eyre::WrapErr;
use tracing::{debug, error, info, warn};
use update_client_agent::{
    deployment::DeploymentClient, http, module, logging, Args, Settings, BUILD_INFO_VERSION,
};
use update_client_core::{store_redb::RedbStore, Context};

mod update_agent_result;
use update_agent_result::UpdateClientResult;

const CFG_DEFAULT_PATH: &str = "/etc/update-client-agent.toml";
const ENV_VAR_PREFIX: &str = "UPDATE_CLIENT_";
const CFG_ENV_VAR: &str = "UPDATE_CLIENT_CONFIG";

fn main() -> UpdateClientResult {
    logging::init();
    info!("starting update-client-agent v{BUILD_INFO_VERSION}");

    let args = Args::parse();

    match run(&args) {
        Ok(()) => UpdateClientResult::Success,
        Err(err) => {
            error!("{err:?}");
            err.into()
        }
    }
}

fn get_config_source(args: &Args) -> Cow<'_, Path> {
    if let Some(config) = &args.config {
        info!("using config provided by command line argument: `{config}`");
        Cow::Borrowed(config.as_ref())
    } else if let Some(config) = figment::providers::Env::var(CFG_ENV_VAR) {
        info!("using config set in environment variable `{CFG_ENV_VAR}={config}`");
        Cow::Owned(std::path::PathBuf::from(config))
    } else {
        info!("using default config at `{CFG_DEFAULT_PATH}`");
        Cow::Borrowed(CFG_DEFAULT_PATH.as_ref())
    }
}

/// Runs one check-for-deployment cycle and, if a deployment is waiting,
/// drives it through Download and the remaining phases. Each top-level
/// operation gets its own single-threaded runtime, matching the
/// one-event-loop-per-operation model the core is built around.
fn run(args: &Args) -> eyre::Result<()> {
    let config_path = get_config_source(args);
    let settings = Settings::get(args, config_path, ENV_VAR_PREFIX)
        .wrap_err("failed reading settings")?;

    let settings_ser = match serde_json::to_string(&settings) {
        Ok(ser) => ser,
        Err(e) => {
            warn!("failed serializing settings as json, printing debug string: {e:?}");
            format!("{settings:?}")
        }
    };
    debug!("running with the following settings: {settings_ser}");

    let store_path = settings.data_store_dir.join("state.redb");
    let store = RedbStore::open(&store_path).wrap_err("failed opening state store")?;
    let device_type_path = settings.data_store_dir.join("device_type");
    let context = Context::new(store, device_type_path);

    let tls = http::TlsConfig {
        client_cert: settings.tls_client_cert.clone(),
        client_key: settings.tls_client_key.clone(),
        ca_cert: settings.tls_ca_cert.clone(),
    };
    let http_client = http::build(&tls).wrap_err("failed building HTTP client")?;
    let deployment = DeploymentClient::new(settings.server_url.clone());

    let modules = module::discover_modules(&settings.data_store_dir)
        .wrap_err("failed discovering update modules")?;
    info!("discovered {} update module(s)", modules.len());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed building event loop")?;

    rt.block_on(check_and_report(&context, &deployment, &http_client))
}

async fn check_and_report<S: update_client_core::StateStore>(
    context: &Context<S>,
    deployment: &DeploymentClient,
    http_client: &reqwest::Client,
) -> eyre::Result<()> {
    let provides = context.load_provides().wrap_err("failed loading provides")?;
    let device_type = context
        .get_device_type()
        .wrap_err("failed reading device type")?;

    match deployment
        .check_new_deployments(http_client, &device_type, &provides)
        .await
        .wrap_err("failed checking for new deployments")?
    {
        Some(next) => {
            info!("server has a deployment waiting: {next}");
            // Driving the deployment through Download/ArtifactInstall/...
            // requires an `Artifact` reader from the signed-package parser.
            // Wiring a concrete parser in is left to the binary that owns
            // that dependency.
        }
        None => info!("no deployment waiting"),
    }

    Ok(())
}
