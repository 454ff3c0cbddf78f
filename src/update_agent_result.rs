use std::process::{ExitCode, Termination};

use crate::{deployment, module::driver, module::phases};

/// Exit codes returned by the update-client binary. Custom exit codes are
/// taken in accordance with the Linux Standard Base Core Specification and
/// are in the range 150-199.
#[repr(u8)]
pub(crate) enum UpdateClientResult {
    Success = 0,
    Failure = 1,
    DeploymentTransport = 150,
    ModuleDownloadFailed = 151,
    ModuleExecutionFailed = 152,
}

impl Termination for UpdateClientResult {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl From<eyre::Report> for UpdateClientResult {
    fn from(err: eyre::Report) -> Self {
        use UpdateClientResult::{
            DeploymentTransport, Failure, ModuleDownloadFailed, ModuleExecutionFailed,
        };

        if let Some(deployment::Error::Transport(_)) = err.downcast_ref::<deployment::Error>() {
            return DeploymentTransport;
        }
        if err.downcast_ref::<driver::Error>().is_some() {
            return ModuleDownloadFailed;
        }
        if err.downcast_ref::<phases::Error>().is_some() {
            return ModuleExecutionFailed;
        }
        Failure
    }
}
