//! Update-module driver — the non-streaming phases: invocations that don't
//! stream payloads, just run to completion and (for two of them) emit one
//! line of stdout.
use std::{
    path::Path,
    process::{Output, Stdio},
    time::Duration,
};

use tokio::{process::Command, time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ArtifactInstall,
    NeedsReboot,
    ArtifactReboot,
    ArtifactCommit,
    SupportsRollback,
    ArtifactRollback,
    ArtifactVerifyReboot,
    ArtifactRollbackReboot,
    ArtifactVerifyRollbackReboot,
    ArtifactFailure,
    Cleanup,
}

impl Phase {
    fn as_arg(self) -> &'static str {
        match self {
            Self::ArtifactInstall => "ArtifactInstall",
            Self::NeedsReboot => "NeedsReboot",
            Self::ArtifactReboot => "ArtifactReboot",
            Self::ArtifactCommit => "ArtifactCommit",
            Self::SupportsRollback => "SupportsRollback",
            Self::ArtifactRollback => "ArtifactRollback",
            Self::ArtifactVerifyReboot => "ArtifactVerifyReboot",
            Self::ArtifactRollbackReboot => "ArtifactRollbackReboot",
            Self::ArtifactVerifyRollbackReboot => "ArtifactVerifyRollbackReboot",
            Self::ArtifactFailure => "ArtifactFailure",
            Self::Cleanup => "Cleanup",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("update module exited with status {0}")]
    NonZeroExitStatus(i32),
    #[error("update module invocation timed out")]
    TimedOut,
    #[error("filesystem error while running the update module")]
    Io(#[source] std::io::Error),
    #[error("update module printed an unrecognized result `{0}`")]
    ParseResult(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// A three-valued answer as printed by `NeedsReboot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootAnswer {
    Yes,
    No,
    Automatic,
}

/// A two-valued answer as printed by `SupportsRollback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackAnswer {
    Yes,
    No,
}

/// Runs a phase that reports success/failure only via its exit code.
pub async fn run(
    module_path: &Path,
    work_dir: &Path,
    phase: Phase,
    timeout: Duration,
) -> Result<(), Error> {
    run_capturing_stdout(module_path, work_dir, phase, timeout).await?;
    Ok(())
}

/// Runs `NeedsReboot` and parses its single-line stdout answer.
pub async fn needs_reboot(
    module_path: &Path,
    work_dir: &Path,
    timeout: Duration,
) -> Result<RebootAnswer, Error> {
    let output = run_capturing_stdout(module_path, work_dir, Phase::NeedsReboot, timeout).await?;
    match first_line(&output).as_str() {
        "Yes" => Ok(RebootAnswer::Yes),
        "No" => Ok(RebootAnswer::No),
        "Automatic" => Ok(RebootAnswer::Automatic),
        other => Err(Error::ParseResult(other.to_string())),
    }
}

/// Runs `SupportsRollback` and parses its single-line stdout answer.
pub async fn supports_rollback(
    module_path: &Path,
    work_dir: &Path,
    timeout: Duration,
) -> Result<RollbackAnswer, Error> {
    let output =
        run_capturing_stdout(module_path, work_dir, Phase::SupportsRollback, timeout).await?;
    match first_line(&output).as_str() {
        "Yes" => Ok(RollbackAnswer::Yes),
        "No" => Ok(RollbackAnswer::No),
        other => Err(Error::ParseResult(other.to_string())),
    }
}

fn first_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

async fn run_capturing_stdout(
    module_path: &Path,
    work_dir: &Path,
    phase: Phase,
    timeout: Duration,
) -> Result<Output, Error> {
    let child = Command::new(module_path)
        .arg(phase.as_arg())
        .arg(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    let output = match time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Err(Error::TimedOut),
    };

    if output.status.success() {
        Ok(output)
    } else {
        Err(Error::NonZeroExitStatus(output.status.code().unwrap_or(-1)))
    }
}
