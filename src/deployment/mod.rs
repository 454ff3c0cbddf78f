//! Deployment API client — v2→v1 protocol negotiation, status pushes,
//! error-body decoding.
use serde::Serialize;
use serde_json::Value;
use update_client_core::ProvidesMap;

pub use update_client_core::DeploymentStatus;

const ARTIFACT_NAME_KEY: &str = "artifact_name";
const DEVICE_TYPE_KEY: &str = "device_type";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("device provides map is missing `artifact_name`; cannot check for deployments")]
    InvalidDataError,
    #[error("transport error talking to the deployment server")]
    Transport(#[source] reqwest::Error),
    #[error("deployment server returned status {status}: {message}")]
    BadResponseError { status: u16, message: String },
}

#[derive(Serialize)]
struct NextDeploymentBodyV2<'a> {
    update_control_map: bool,
    device_provides: &'a ProvidesMap,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// A thin wrapper around the deployment API's two HTTP surfaces. Holds no
/// state of its own beyond the server base URL; the caller owns the
/// `reqwest::Client` and the device's provides map.
pub struct DeploymentClient {
    server_url: String,
}

impl DeploymentClient {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }

    /// Asks the deployment server whether a new deployment is waiting.
    ///
    /// `device_type` and `provides` together form the `device_provides` body
    /// of the v2 request; `device_type` alone is used for the v1 fallback's
    /// query string, along with `artifact_name`.
    pub async fn check_new_deployments(
        &self,
        client: &reqwest::Client,
        device_type: &str,
        provides: &ProvidesMap,
    ) -> Result<Option<Value>, Error> {
        if !provides.contains_key(ARTIFACT_NAME_KEY) {
            return Err(Error::InvalidDataError);
        }

        let mut device_provides = provides.clone();
        device_provides.insert(DEVICE_TYPE_KEY.to_string(), device_type.to_string());

        let url = format!(
            "{}/api/devices/v2/deployments/device/deployments/next",
            self.server_url
        );
        let response = client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&NextDeploymentBodyV2 {
                update_control_map: false,
                device_provides: &device_provides,
            })
            .send()
            .await
            .map_err(Error::Transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Yields back to the event loop before issuing the v1 fallback
            // request, so the fallback runs as a fresh task turn rather than
            // a direct stack continuation of the v2 response handler.
            tokio::task::yield_now().await;
            return self.check_new_deployments_v1(client, device_type, provides).await;
        }

        Self::handle_next_deployment_response(response).await
    }

    async fn check_new_deployments_v1(
        &self,
        client: &reqwest::Client,
        device_type: &str,
        provides: &ProvidesMap,
    ) -> Result<Option<Value>, Error> {
        // unwrap: presence already checked by the v2 caller.
        let artifact_name = provides.get(ARTIFACT_NAME_KEY).unwrap();
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("artifact_name", artifact_name)
            .append_pair("device_type", device_type)
            .finish();
        let url = format!(
            "{}/api/devices/v1/deployments/device/deployments/next?{}",
            self.server_url, query,
        );
        let response = client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::handle_next_deployment_response(response).await
    }

    async fn handle_next_deployment_response(
        response: reqwest::Response,
    ) -> Result<Option<Value>, Error> {
        let status = response.status();
        match status {
            reqwest::StatusCode::OK => {
                let body: Value = response.json().await.map_err(Error::Transport)?;
                Ok(Some(body))
            }
            reqwest::StatusCode::NO_CONTENT => Ok(None),
            _ => Err(Self::bad_response(status, response).await),
        }
    }

    /// Pushes a deployment status transition to the server.
    pub async fn push_status(
        &self,
        client: &reqwest::Client,
        deployment_id: &str,
        status: DeploymentStatus,
        substate: Option<&str>,
    ) -> Result<(), Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            status: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            substate: Option<&'a str>,
        }

        let url = format!(
            "{}/api/devices/v1/deployments/device/deployments/{}/status",
            self.server_url, deployment_id
        );
        let response = client
            .put(&url)
            .header("Content-Type", "application/json")
            .json(&Body {
                status: status.as_wire_str(),
                substate,
            })
            .send()
            .await
            .map_err(Error::Transport)?;

        let response_status = response.status();
        if response_status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(Self::bad_response(response_status, response).await)
        }
    }

    async fn bad_response(status: reqwest::StatusCode, response: reqwest::Response) -> Error {
        let status_phrase = status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string();
        let message = match response.json::<ErrorBody>().await {
            Ok(ErrorBody { error: Some(msg) }) => msg,
            _ => status_phrase,
        };
        Error::BadResponseError {
            status: status.as_u16(),
            message,
        }
    }
}
