//! Platform runner: turns an app's calls into control-plane requests.
//!
//! Records never flow through this process. Each stage only passes a stream
//! name to the next, and the control plane wires connectors and functions
//! into the named pipeline. Without deploy mode nothing is sent anywhere; the
//! run only fills the function registry and the deploy spec.

pub mod client;
pub mod http;
pub mod memory;
pub mod naming;
pub mod spec;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use strand_core::{ApiError, AppConfig, Function, StrandError, StrandResult};

use crate::contract::{Records, RecordsWithErrors, Resource, ResourceConfigs, Runtime};
use crate::registry::FunctionRegistry;
use crate::secrets::{self, ProcessEnv, SecretSource};

use client::{
    ConnectorType, CreateConnectorInput, CreateFunctionInput, CreatePipelineInput,
    DynControlPlane, Pipeline, PipelineIdentifier, RemoteResource,
};
use spec::{DeploySpec, DeploySpecBuilder, SpecStamp, ToolchainProbe};

pub use client::ControlPlane;
pub use http::HttpControlPlane;
pub use memory::InMemoryControlPlane;

/// A resource the run resolved, as listed by `resources`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// State shared between the runtime and the resources it hands out.
struct PlatformContext {
    client: DynControlPlane,
    config: AppConfig,
    deploy: bool,
    spec: Mutex<DeploySpecBuilder>,
    poisoned: Mutex<Option<String>>,
}

impl PlatformContext {
    fn spec(&self) -> MutexGuard<'_, DeploySpecBuilder> {
        self.spec.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fails with the recorded fatal error once the run is poisoned.
    fn check(&self) -> StrandResult<()> {
        let poisoned = self
            .poisoned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match poisoned.as_ref() {
            Some(message) => Err(StrandError::fatal(message.clone())),
            None => Ok(()),
        }
    }

    fn poison(&self, message: String) {
        let mut poisoned = self
            .poisoned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        poisoned.get_or_insert(message);
    }
}

pub struct PlatformRuntime {
    context: Arc<PlatformContext>,
    image: String,
    functions: FunctionRegistry,
    secrets: BTreeMap<String, String>,
    secret_source: Arc<dyn SecretSource>,
    resources_used: Vec<ResourceUsage>,
    pipeline: Option<Pipeline>,
}

impl PlatformRuntime {
    /// A runner that records what the app would provision without contacting
    /// `client`.
    pub fn new(config: AppConfig, client: DynControlPlane) -> Self {
        Self::build(config, client, false, String::new())
    }

    /// A runner that provisions through `client`, running functions from `image`.
    pub fn deploying(config: AppConfig, client: DynControlPlane, image: impl Into<String>) -> Self {
        Self::build(config, client, true, image.into())
    }

    fn build(config: AppConfig, client: DynControlPlane, deploy: bool, image: String) -> Self {
        Self {
            context: Arc::new(PlatformContext {
                client,
                config,
                deploy,
                spec: Mutex::new(DeploySpecBuilder::new()),
                poisoned: Mutex::new(None),
            }),
            image,
            functions: FunctionRegistry::new(),
            secrets: BTreeMap::new(),
            secret_source: Arc::new(ProcessEnv),
            resources_used: Vec::new(),
            pipeline: None,
        }
    }

    pub fn with_secret_source(mut self, source: Arc<dyn SecretSource>) -> Self {
        self.secret_source = source;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.context.config
    }

    pub fn is_deploying(&self) -> bool {
        self.context.deploy
    }

    /// Pipeline resolved by the most recent deploy-mode lookup.
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn function_names(&self) -> Vec<String> {
        self.functions.names()
    }

    pub fn resources_used(&self) -> &[ResourceUsage] {
        &self.resources_used
    }

    /// Finalizes the deploy spec accumulated so far.
    pub fn deploy_spec(&self, stamp: &SpecStamp, probe: &dyn ToolchainProbe) -> StrandResult<DeploySpec> {
        self.context.spec().finalize(stamp, probe)
    }

    /// Fails with the fatal error recorded during the run, if any.
    ///
    /// An app may swallow the `Fatal` returned by `process`; callers check
    /// this once `run` returns so a poisoned run never passes as a success.
    pub fn ensure_healthy(&self) -> StrandResult<()> {
        self.context.check()
    }

    /// Hands the registry over once the run is done.
    pub fn into_registry(self) -> FunctionRegistry {
        self.functions
    }

    /// Finds the configured pipeline, creating it when absent.
    async fn ensure_pipeline(&self) -> StrandResult<Pipeline> {
        let name = &self.context.config.pipeline;
        let client = &self.context.client;

        let found = client
            .find_pipeline(name)
            .await
            .map_err(|e| e.into_strand("find pipeline", name))?;
        if let Some(pipeline) = found {
            tracing::info!(pipeline = %pipeline.name, uuid = %pipeline.uuid, "using existing pipeline");
            return Ok(pipeline);
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("app".to_string(), Value::from(self.context.config.name.clone()));
        metadata.insert("strand".to_string(), Value::Bool(true));
        let input = CreatePipelineInput {
            name: name.clone(),
            metadata,
        };
        let pipeline = client
            .create_pipeline(&input)
            .await
            .map_err(|e| e.into_strand("create pipeline", name))?;
        tracing::info!(pipeline = %pipeline.name, uuid = %pipeline.uuid, "created pipeline");
        Ok(pipeline)
    }

    fn record_usage(&mut self, usage: ResourceUsage) {
        if !self.resources_used.iter().any(|u| u.name == usage.name) {
            self.resources_used.push(usage);
        }
    }
}

#[async_trait]
impl Runtime for PlatformRuntime {
    async fn resources(&mut self, name: &str) -> StrandResult<Box<dyn Resource>> {
        self.context.check()?;

        if !self.context.deploy {
            self.record_usage(ResourceUsage {
                name: name.to_string(),
                resource_type: None,
                id: None,
            });
            return Ok(Box::new(PlatformResource {
                context: self.context.clone(),
                name: name.to_string(),
                remote: None,
            }));
        }

        self.pipeline = Some(self.ensure_pipeline().await?);

        let remote = self
            .context
            .client
            .get_resource(name)
            .await
            .map_err(|e| e.into_strand("get resource", name))?;
        tracing::info!(
            resource = %remote.name,
            id = remote.id,
            resource_type = %remote.resource_type,
            backend = self.context.client.backend_name(),
            "resolved resource"
        );
        self.record_usage(ResourceUsage {
            name: remote.name.clone(),
            resource_type: Some(remote.resource_type.clone()),
            id: Some(remote.id),
        });

        Ok(Box::new(PlatformResource {
            context: self.context.clone(),
            name: name.to_string(),
            remote: Some(remote),
        }))
    }

    async fn process(
        &mut self,
        records: Records,
        function: Arc<dyn Function>,
    ) -> StrandResult<(Records, RecordsWithErrors)> {
        self.context.check()?;
        if self.context.deploy && self.image.is_empty() {
            return Err(StrandError::configuration(
                "deploying functions requires an image name",
            ));
        }

        let name = self.functions.register(function);
        self.context.spec().add_function(&name, &self.image);

        if !self.context.deploy {
            tracing::debug!(function = %name, "registered function");
            return Ok((records, RecordsWithErrors::default()));
        }

        let input = CreateFunctionInput {
            input_stream: records.stream().to_string(),
            image: self.image.clone(),
            env_vars: self.secrets.clone(),
            args: vec![name.clone()],
            pipeline: PipelineIdentifier {
                name: self.context.config.pipeline.clone(),
            },
        };
        tracing::info!(
            function = %name,
            input_stream = %input.input_stream,
            image = %input.image,
            secrets = input.env_vars.len(),
            "creating function"
        );

        match self.context.client.create_function(&input).await {
            Ok(created) => {
                tracing::info!(
                    function = %name,
                    uuid = %created.uuid,
                    output_stream = %created.output_stream,
                    "created function"
                );
                Ok((
                    Records::from_stream(created.output_stream),
                    RecordsWithErrors::default(),
                ))
            }
            Err(err) => {
                let message = format!("unable to create function {name}: {err}");
                tracing::error!(function = %name, error = %err, "function creation failed, run cannot continue");
                self.context.poison(message.clone());
                Err(StrandError::fatal(message))
            }
        }
    }

    fn register_secret(&mut self, name: &str) -> StrandResult<()> {
        self.context.check()?;

        let value = secrets::read_secret(self.secret_source.as_ref(), name)?;
        self.context.spec().add_secret(name, value.clone());
        self.secrets.insert(name.to_string(), value);
        tracing::info!(secret = %name, "registered secret");
        Ok(())
    }
}

/// A resource as seen by the platform runner.
///
/// Without a remote counterpart (plan mode) reads and writes only land in the
/// deploy spec.
pub struct PlatformResource {
    context: Arc<PlatformContext>,
    name: String,
    remote: Option<RemoteResource>,
}

impl PlatformResource {
    pub fn remote(&self) -> Option<&RemoteResource> {
        self.remote.as_ref()
    }
}

#[async_trait]
impl Resource for PlatformResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn records(&self, collection: &str, config: ResourceConfigs) -> StrandResult<Records> {
        self.context.check()?;

        let Some(remote) = &self.remote else {
            self.context
                .spec()
                .add_connector(ConnectorType::Source, &self.name, collection, config);
            return Ok(Records::default());
        };

        let input = CreateConnectorInput {
            resource_id: remote.id,
            configuration: config.clone(),
            connector_type: ConnectorType::Source,
            input: collection.to_string(),
            pipeline_name: self.context.config.pipeline.clone(),
        };
        let connector = self
            .context
            .client
            .create_connector(&input)
            .await
            .map_err(|e| e.into_strand("create source connector", &self.name))?;

        let Some(stream) = connector.streams.output.first().cloned() else {
            return Err(StrandError::remote_api(
                "create source connector",
                &self.name,
                ApiError::new(format!(
                    "connector {} reported no output streams",
                    connector.name
                )),
            ));
        };
        tracing::info!(
            resource = %self.name,
            collection = %collection,
            connector = %connector.name,
            stream = %stream,
            "created source connector"
        );

        self.context
            .spec()
            .add_connector(ConnectorType::Source, &self.name, collection, config);
        Ok(Records::from_stream(stream))
    }

    async fn write(
        &self,
        records: Records,
        collection: &str,
        config: ResourceConfigs,
    ) -> StrandResult<()> {
        self.context.check()?;

        let Some(remote) = &self.remote else {
            self.context
                .spec()
                .add_connector(ConnectorType::Destination, &self.name, collection, config);
            return Ok(());
        };

        let upstream = records.stream();
        if upstream.is_empty() {
            return Err(StrandError::validation(
                "upstream records",
                "destination input has no stream name",
            ));
        }
        let configuration =
            naming::destination_config(&remote.resource_type, upstream, collection, config)?;

        let input = CreateConnectorInput {
            resource_id: remote.id,
            configuration: configuration.clone(),
            connector_type: ConnectorType::Destination,
            input: upstream.to_string(),
            pipeline_name: self.context.config.pipeline.clone(),
        };
        let connector = self
            .context
            .client
            .create_connector(&input)
            .await
            .map_err(|e| e.into_strand("create destination connector", &self.name))?;
        tracing::info!(
            resource = %self.name,
            collection = %collection,
            connector = %connector.name,
            input_stream = %upstream,
            "created destination connector"
        );

        self.context.spec().add_connector(
            ConnectorType::Destination,
            &self.name,
            collection,
            configuration,
        );
        Ok(())
    }
}
