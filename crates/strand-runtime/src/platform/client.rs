//! Control-plane seam used by the platform runner.
//!
//! Only the five operations the runner needs are modelled. Any backend
//! satisfying [`ControlPlane`] can stand in for the hosted service.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use strand_core::{ApiError, StrandError};

use crate::contract::ResourceConfigs;

/// A resource registered with the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePipelineInput {
    pub name: String,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorType {
    Source,
    Destination,
}

impl std::fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorType::Source => write!(f, "source"),
            ConnectorType::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateConnectorInput {
    pub resource_id: i64,
    pub configuration: ResourceConfigs,
    #[serde(rename = "type")]
    pub connector_type: ConnectorType,
    /// Collection for sources, upstream stream for destinations.
    pub input: String,
    pub pipeline_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorStreams {
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default)]
    pub output: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub name: String,
    #[serde(rename = "type")]
    pub connector_type: ConnectorType,
    #[serde(default)]
    pub streams: ConnectorStreams,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineIdentifier {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFunctionInput {
    pub input_stream: String,
    pub image: String,
    /// Secrets registered before this function was created.
    pub env_vars: BTreeMap<String, String>,
    pub args: Vec<String>,
    pub pipeline: PipelineIdentifier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionStatus {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFunction {
    pub uuid: String,
    pub name: String,
    pub input_stream: String,
    pub output_stream: String,
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub status: FunctionStatus,
}

/// Errors returned by a control-plane backend.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// The backend answered with a structured error body.
    #[error("{0}")]
    Api(ApiError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ControlPlaneError {
    pub(crate) fn into_strand(self, operation: &str, target: &str) -> StrandError {
        match self {
            ControlPlaneError::NotFound { kind, name } => StrandError::not_found(kind, name),
            ControlPlaneError::Api(err) => StrandError::remote_api(operation, target, err),
            other => StrandError::remote_api(operation, target, ApiError::new(other.to_string())),
        }
    }
}

/// Operations the platform runner needs from the hosted control plane.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Looks up a resource by name or numeric id.
    async fn get_resource(&self, name_or_id: &str) -> Result<RemoteResource, ControlPlaneError>;

    /// Returns `None` when no pipeline has that name.
    async fn find_pipeline(&self, name: &str) -> Result<Option<Pipeline>, ControlPlaneError>;

    async fn create_pipeline(
        &self,
        input: &CreatePipelineInput,
    ) -> Result<Pipeline, ControlPlaneError>;

    async fn create_connector(
        &self,
        input: &CreateConnectorInput,
    ) -> Result<Connector, ControlPlaneError>;

    async fn create_function(
        &self,
        input: &CreateFunctionInput,
    ) -> Result<RemoteFunction, ControlPlaneError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Shared control-plane handle.
pub type DynControlPlane = Arc<dyn ControlPlane>;
