//! Wire types for the Singularity scheduler API.
//!
//! Only the fields the actual-state builder reads are modelled; unknown
//! fields are ignored on decode. Absent fields decode to empty values so the
//! builder can report them as malformed for the one request they affect.

use std::collections::BTreeMap;
use std::fmt;

use convoy_model::VolumeMode;
use serde::{Deserialize, Serialize};

/// A request together with its deploy state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityRequestParent {
    #[serde(default)]
    pub request: Option<SingularityRequest>,
    #[serde(default)]
    pub request_deploy_state: Option<SingularityRequestDeployState>,
}

impl SingularityRequestParent {
    /// Id of the wrapped request, if there is one.
    pub fn request_id(&self) -> Option<&str> {
        self.request.as_ref().map(|r| r.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default = "RequestType::unspecified")]
    pub request_type: RequestType,
    #[serde(default)]
    pub instances: Option<u32>,
    #[serde(default)]
    pub owners: Vec<String>,
}

/// Scheduler request type.
///
/// Types this crate does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    #[default]
    Service,
    Worker,
    Scheduled,
    OnDemand,
    RunOnce,
    Other(String),
}

impl RequestType {
    /// Type of a request that named none.
    pub fn unspecified() -> Self {
        Self::Other(String::new())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Service => "SERVICE",
            Self::Worker => "WORKER",
            Self::Scheduled => "SCHEDULED",
            Self::OnDemand => "ON_DEMAND",
            Self::RunOnce => "RUN_ONCE",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RequestType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SERVICE" => Self::Service,
            "WORKER" => Self::Worker,
            "SCHEDULED" => Self::Scheduled,
            "ON_DEMAND" => Self::OnDemand,
            "RUN_ONCE" => Self::RunOnce,
            _ => Self::Other(s),
        }
    }
}

impl From<RequestType> for String {
    fn from(t: RequestType) -> Self {
        match t {
            RequestType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityRequestDeployState {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub active_deploy: Option<SingularityDeployMarker>,
    #[serde(default)]
    pub pending_deploy: Option<SingularityDeployMarker>,
}

/// Pointer to one deploy of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityDeployMarker {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub deploy_id: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub user: Option<String>,
}

/// An entry of a request's deploy history.
///
/// History listings return partial entries; the full deploy is fetched by
/// marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityDeployHistory {
    #[serde(default)]
    pub deploy: Option<SingularityDeploy>,
    #[serde(default)]
    pub deploy_marker: Option<SingularityDeployMarker>,
    #[serde(default)]
    pub deploy_result: Option<SingularityDeployResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityDeployResult {
    pub deploy_state: DeployResultState,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployResultState {
    Succeeded,
    FailedInternalState,
    Canceling,
    Waiting,
    Overdue,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityDeploy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub container_info: Option<ContainerInfo>,
    #[serde(default)]
    pub resources: Option<SingularityResources>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    #[serde(rename = "type", default)]
    pub container_type: ContainerType,
    #[serde(default)]
    pub docker: Option<DockerInfo>,
    #[serde(default)]
    pub volumes: Vec<SingularityVolume>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerType {
    Mesos,
    Docker,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerInfo {
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityVolume {
    #[serde(default)]
    pub container_path: String,
    #[serde(default)]
    pub host_path: String,
    #[serde(default)]
    pub mode: VolumeMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingularityResources {
    #[serde(default)]
    pub cpus: f64,
    #[serde(default)]
    pub memory_mb: f64,
    #[serde(default)]
    pub num_ports: u32,
}
