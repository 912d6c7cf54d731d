use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a flow launched on a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to launch a flow on one client.
///
/// Hunts carry one of these as a template (`start_request`) with an empty
/// `client_id`; [`FlowRequest::for_client`] produces the concrete request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub creator: Option<String>,
}

impl FlowRequest {
    /// Merge this template with a participating client.
    ///
    /// The client id always comes from the participant, whatever the
    /// template carries.
    pub fn for_client(&self, client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            ..self.clone()
        }
    }
}

/// Response body of the flow service's launch endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchFlowResponse {
    pub flow_id: FlowId,
}
