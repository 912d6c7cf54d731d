//! HTTP client for the remote flow execution service.

use hunter_core::launcher::{FlowLauncher, TransportError};
use hunter_sdk::objects::{FlowId, FlowRequest, LaunchFlowResponse};
use std::time::Duration;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "X-Request-Id";

#[derive(Debug, Error)]
pub enum LauncherSetupError {
    #[error("invalid flow service url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Launches flows with `POST {base}/flows`.
#[derive(Debug, Clone)]
pub struct HttpFlowLauncher {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpFlowLauncher {
    pub fn new(base: &Url, timeout: Duration) -> Result<Self, LauncherSetupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: flows_endpoint(base)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// `Url::join` replaces the last segment unless the base ends with a slash.
fn flows_endpoint(base: &Url) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("flows")
}

impl FlowLauncher for HttpFlowLauncher {
    async fn launch_flow(&self, request: FlowRequest) -> Result<FlowId, TransportError> {
        let request_id = Uuid::now_v7();
        tracing::debug!(
            %request_id,
            client_id = %request.client_id,
            endpoint = %self.endpoint,
            "Launching flow"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let LaunchFlowResponse { flow_id } = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(flow_id)
    }
}
