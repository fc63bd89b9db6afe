//! In-process control plane.
//!
//! Keeps every request it receives so runs can be inspected afterwards, and
//! can be told to fail selected operations.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use strand_core::ApiError;

use super::client::{
    Connector, ConnectorStreams, ConnectorType, ControlPlane, ControlPlaneError,
    CreateConnectorInput, CreateFunctionInput, CreatePipelineInput, FunctionStatus, Pipeline,
    RemoteFunction, RemoteResource,
};

#[derive(Debug, Default)]
struct State {
    resources: Vec<RemoteResource>,
    pipelines: BTreeMap<String, Pipeline>,
    pipeline_creations: usize,
    connectors: Vec<CreateConnectorInput>,
    functions: Vec<CreateFunctionInput>,
    sequence: u64,
    fail_functions: Option<ApiError>,
    omit_source_streams: bool,
}

impl State {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

#[derive(Debug, Default)]
pub struct InMemoryControlPlane {
    state: Mutex<State>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource the runner can look up by name or id.
    pub fn with_resource(
        mut self,
        id: i64,
        name: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        self.state_mut().resources.push(RemoteResource {
            id,
            name: name.into(),
            resource_type: resource_type.into(),
        });
        self
    }

    /// Makes every function creation fail with `error`.
    pub fn failing_functions(mut self, error: ApiError) -> Self {
        self.state_mut().fail_functions = Some(error);
        self
    }

    /// Source connectors come back without output streams.
    pub fn without_source_streams(mut self) -> Self {
        self.state_mut().omit_source_streams = true;
        self
    }

    pub fn pipeline_creations(&self) -> usize {
        self.state().pipeline_creations
    }

    pub fn pipelines(&self) -> Vec<Pipeline> {
        self.state().pipelines.values().cloned().collect()
    }

    /// Connector requests in the order they were received.
    pub fn connectors(&self) -> Vec<CreateConnectorInput> {
        self.state().connectors.clone()
    }

    /// Function requests in the order they were received, including failed ones.
    pub fn functions(&self) -> Vec<CreateFunctionInput> {
        self.state().functions.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state_mut(&mut self) -> &mut State {
        self.state
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn get_resource(&self, name_or_id: &str) -> Result<RemoteResource, ControlPlaneError> {
        self.state()
            .resources
            .iter()
            .find(|r| r.name == name_or_id || r.id.to_string() == name_or_id)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound {
                kind: "resource".to_string(),
                name: name_or_id.to_string(),
            })
    }

    async fn find_pipeline(&self, name: &str) -> Result<Option<Pipeline>, ControlPlaneError> {
        Ok(self.state().pipelines.get(name).cloned())
    }

    async fn create_pipeline(
        &self,
        input: &CreatePipelineInput,
    ) -> Result<Pipeline, ControlPlaneError> {
        let mut state = self.state();
        if state.pipelines.contains_key(&input.name) {
            return Err(ControlPlaneError::Api(
                ApiError::new(format!("pipeline {} already exists", input.name))
                    .with_code("conflict"),
            ));
        }
        let pipeline = Pipeline {
            uuid: Uuid::new_v4().to_string(),
            name: input.name.clone(),
            metadata: input.metadata.clone(),
        };
        state.pipeline_creations += 1;
        state.pipelines.insert(input.name.clone(), pipeline.clone());
        Ok(pipeline)
    }

    async fn create_connector(
        &self,
        input: &CreateConnectorInput,
    ) -> Result<Connector, ControlPlaneError> {
        let mut state = self.state();
        if !state.pipelines.contains_key(&input.pipeline_name) {
            return Err(ControlPlaneError::NotFound {
                kind: "pipeline".to_string(),
                name: input.pipeline_name.clone(),
            });
        }
        let resource = state
            .resources
            .iter()
            .find(|r| r.id == input.resource_id)
            .map(|r| r.name.clone())
            .ok_or_else(|| ControlPlaneError::NotFound {
                kind: "resource".to_string(),
                name: input.resource_id.to_string(),
            })?;

        let seq = state.next_sequence();
        let streams = match input.connector_type {
            ConnectorType::Source if state.omit_source_streams => ConnectorStreams::default(),
            ConnectorType::Source => ConnectorStreams {
                input: Vec::new(),
                output: vec![format!("{resource}.{}.{seq}", input.input)],
            },
            ConnectorType::Destination => ConnectorStreams {
                input: vec![input.input.clone()],
                output: Vec::new(),
            },
        };
        state.connectors.push(input.clone());

        Ok(Connector {
            name: format!("{resource}-{}-{seq}", input.connector_type),
            connector_type: input.connector_type,
            streams,
            state: Some("running".to_string()),
        })
    }

    async fn create_function(
        &self,
        input: &CreateFunctionInput,
    ) -> Result<RemoteFunction, ControlPlaneError> {
        let mut state = self.state();
        state.functions.push(input.clone());
        if let Some(err) = &state.fail_functions {
            return Err(ControlPlaneError::Api(err.clone()));
        }

        let seq = state.next_sequence();
        let name = input.args.first().cloned().unwrap_or_default();
        Ok(RemoteFunction {
            uuid: Uuid::new_v4().to_string(),
            output_stream: format!("function-{name}.{seq}"),
            name,
            input_stream: input.input_stream.clone(),
            image: input.image.clone(),
            args: input.args.clone(),
            status: FunctionStatus {
                state: "running".to_string(),
                details: String::new(),
            },
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
