//! The closed set of deployment status strings pushed back to the server.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    #[serde(rename = "installing")]
    Installing,
    #[serde(rename = "pause_before_installing")]
    PauseBeforeInstalling,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "pause_before_rebooting")]
    PauseBeforeRebooting,
    #[serde(rename = "rebooting")]
    Rebooting,
    #[serde(rename = "pause_before_committing")]
    PauseBeforeCommitting,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failure")]
    Failure,
    #[serde(rename = "already-installed")]
    AlreadyInstalled,
}

impl DeploymentStatus {
    /// The wire-exact string sent in status push bodies.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::Installing => "installing",
            Self::PauseBeforeInstalling => "pause_before_installing",
            Self::Downloading => "downloading",
            Self::PauseBeforeRebooting => "pause_before_rebooting",
            Self::Rebooting => "rebooting",
            Self::PauseBeforeCommitting => "pause_before_committing",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::AlreadyInstalled => "already-installed",
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_are_exact() {
        assert_eq!(DeploymentStatus::Installing.as_wire_str(), "installing");
        assert_eq!(
            DeploymentStatus::PauseBeforeInstalling.as_wire_str(),
            "pause_before_installing"
        );
        assert_eq!(DeploymentStatus::Downloading.as_wire_str(), "downloading");
        assert_eq!(
            DeploymentStatus::PauseBeforeRebooting.as_wire_str(),
            "pause_before_rebooting"
        );
        assert_eq!(DeploymentStatus::Rebooting.as_wire_str(), "rebooting");
        assert_eq!(
            DeploymentStatus::PauseBeforeCommitting.as_wire_str(),
            "pause_before_committing"
        );
        assert_eq!(DeploymentStatus::Success.as_wire_str(), "success");
        assert_eq!(DeploymentStatus::Failure.as_wire_str(), "failure");
        assert_eq!(
            DeploymentStatus::AlreadyInstalled.as_wire_str(),
            "already-installed"
        );
    }

    #[test]
    fn serializes_to_wire_string() {
        let json = serde_json::to_string(&DeploymentStatus::PauseBeforeRebooting).unwrap();
        assert_eq!(json, "\"pause_before_rebooting\"");
        let json = serde_json::to_string(&DeploymentStatus::AlreadyInstalled).unwrap();
        assert_eq!(json, "\"already-installed\"");
    }

    #[test]
    fn round_trips_through_serde() {
        for status in [
            DeploymentStatus::Installing,
            DeploymentStatus::PauseBeforeInstalling,
            DeploymentStatus::Downloading,
            DeploymentStatus::PauseBeforeRebooting,
            DeploymentStatus::Rebooting,
            DeploymentStatus::PauseBeforeCommitting,
            DeploymentStatus::Success,
            DeploymentStatus::Failure,
            DeploymentStatus::AlreadyInstalled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: DeploymentStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, status);
        }
    }
}
