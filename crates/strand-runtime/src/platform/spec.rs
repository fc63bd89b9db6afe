//! Declarative description of everything a run provisioned, or would have.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};

use strand_core::{StrandError, StrandResult};

use crate::contract::ResourceConfigs;

use super::client::ConnectorType;

pub const SPEC_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploySpec {
    pub secrets: BTreeMap<String, String>,
    pub connectors: Vec<SpecConnector>,
    pub functions: Vec<SpecFunction>,
    pub definition: SpecDefinition,
}

impl DeploySpec {
    pub fn to_json_pretty(&self) -> StrandResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StrandError::fatal(format!("unable to serialize deploy spec: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecConnector {
    #[serde(rename = "type")]
    pub connector_type: ConnectorType,
    pub resource: String,
    pub collection: String,
    #[serde(default)]
    pub config: ResourceConfigs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecFunction {
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecDefinition {
    pub app_name: String,
    pub git_sha: String,
    pub metadata: SpecMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecMetadata {
    pub toolchain: SpecToolchain,
    pub spec_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecToolchain {
    pub language: String,
    pub version: String,
}

/// Identity stamped onto a finalized spec.
#[derive(Debug, Clone)]
pub struct SpecStamp {
    pub app_name: String,
    pub git_sha: String,
    pub spec_version: String,
}

impl SpecStamp {
    pub fn new(app_name: impl Into<String>, git_sha: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            git_sha: git_sha.into(),
            spec_version: SPEC_VERSION.to_string(),
        }
    }
}

/// Reports the language toolchain the app was built with.
pub trait ToolchainProbe: Send + Sync {
    fn language(&self) -> &str;
    fn version(&self) -> StrandResult<String>;
}

/// Asks the local `rustc` for its version.
#[derive(Debug, Clone)]
pub struct RustcProbe {
    rustc: PathBuf,
}

impl RustcProbe {
    pub fn new(rustc: impl Into<PathBuf>) -> Self {
        Self {
            rustc: rustc.into(),
        }
    }
}

impl Default for RustcProbe {
    /// Honors `RUSTC` the way cargo does.
    fn default() -> Self {
        Self::new(std::env::var_os("RUSTC").unwrap_or_else(|| "rustc".into()))
    }
}

impl ToolchainProbe for RustcProbe {
    fn language(&self) -> &str {
        "rust"
    }

    fn version(&self) -> StrandResult<String> {
        let output = Command::new(&self.rustc)
            .arg("--version")
            .output()
            .map_err(|e| {
                StrandError::configuration(format!(
                    "unable to run {}: {e}",
                    self.rustc.display()
                ))
            })?;
        if !output.status.success() {
            return Err(StrandError::configuration(format!(
                "{} --version exited with {}",
                self.rustc.display(),
                output.status
            )));
        }
        parse_rustc_version(&String::from_utf8_lossy(&output.stdout))
    }
}

/// A toolchain pinned ahead of time.
#[derive(Debug, Clone)]
pub struct FixedToolchain {
    pub language: String,
    pub version: String,
}

impl ToolchainProbe for FixedToolchain {
    fn language(&self) -> &str {
        &self.language
    }

    fn version(&self) -> StrandResult<String> {
        Ok(self.version.clone())
    }
}

/// Extracts `1.85.0` from `rustc 1.85.0 (4d91de4e4 2025-02-17)`.
fn parse_rustc_version(output: &str) -> StrandResult<String> {
    let mut words = output.split_whitespace();
    match (words.next(), words.next()) {
        (Some("rustc"), Some(version)) => Ok(version.to_string()),
        _ => Err(StrandError::configuration(format!(
            "unrecognised rustc version output: {}",
            output.trim()
        ))),
    }
}

/// Accumulates spec entries while an app runs.
#[derive(Debug, Default)]
pub struct DeploySpecBuilder {
    secrets: BTreeMap<String, String>,
    connectors: Vec<SpecConnector>,
    functions: Vec<SpecFunction>,
}

impl DeploySpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_secret(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(name.into(), value.into());
    }

    /// Connectors keep call order.
    pub fn add_connector(
        &mut self,
        connector_type: ConnectorType,
        resource: impl Into<String>,
        collection: impl Into<String>,
        config: ResourceConfigs,
    ) {
        self.connectors.push(SpecConnector {
            connector_type,
            resource: resource.into(),
            collection: collection.into(),
            config,
        });
    }

    /// A function keeps the position of its first registration; the image of
    /// the last one.
    pub fn add_function(&mut self, name: impl Into<String>, image: impl Into<String>) {
        let name = name.into();
        let image = image.into();
        match self.functions.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.image = image,
            None => self.functions.push(SpecFunction { name, image }),
        }
    }

    pub fn finalize(&self, stamp: &SpecStamp, probe: &dyn ToolchainProbe) -> StrandResult<DeploySpec> {
        let version = probe.version()?;
        Ok(DeploySpec {
            secrets: self.secrets.clone(),
            connectors: self.connectors.clone(),
            functions: self.functions.clone(),
            definition: SpecDefinition {
                app_name: stamp.app_name.clone(),
                git_sha: stamp.git_sha.clone(),
                metadata: SpecMetadata {
                    toolchain: SpecToolchain {
                        language: probe.language().to_string(),
                        version,
                    },
                    spec_version: stamp.spec_version.clone(),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pinned() -> FixedToolchain {
        FixedToolchain {
            language: "rust".to_string(),
            version: "1.85.0".to_string(),
        }
    }

    #[test]
    fn test_parse_rustc_version() {
        assert_eq!(
            parse_rustc_version("rustc 1.85.0 (4d91de4e4 2025-02-17)\n").unwrap(),
            "1.85.0"
        );
        assert!(parse_rustc_version("cargo 1.85.0").is_err());
        assert!(parse_rustc_version("").is_err());
    }

    #[test]
    fn test_missing_rustc_is_a_configuration_error() {
        let probe = RustcProbe::new("/definitely/not/rustc");
        let err = probe.version().unwrap_err();
        assert_eq!(err.category(), strand_core::ErrorCategory::Configuration);
    }

    #[test]
    fn test_functions_keep_first_position_and_last_image() {
        let mut builder = DeploySpecBuilder::new();
        builder.add_function("anonymize", "registry/app:1");
        builder.add_function("enrich", "registry/app:1");
        builder.add_function("anonymize", "registry/app:2");

        let spec = builder.finalize(&SpecStamp::new("demo", "abc123"), &pinned()).unwrap();
        let names: Vec<_> = spec.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["anonymize", "enrich"]);
        assert_eq!(spec.functions[0].image, "registry/app:2");
    }

    #[test]
    fn test_finalized_spec_json_shape() {
        let mut builder = DeploySpecBuilder::new();
        builder.add_secret("PG_PASSWORD", "hunter2");
        builder.add_connector(ConnectorType::Source, "pg", "users", ResourceConfigs::new());
        builder.add_connector(
            ConnectorType::Destination,
            "warehouse",
            "users_copy",
            ResourceConfigs::new().with("table.name.format", "users_copy"),
        );
        builder.add_function("anonymize", "registry/app:1");

        let spec = builder.finalize(&SpecStamp::new("demo", "abc123"), &pinned()).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&spec.to_json_pretty().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "secrets": {"PG_PASSWORD": "hunter2"},
                "connectors": [
                    {"type": "source", "resource": "pg", "collection": "users", "config": {}},
                    {
                        "type": "destination",
                        "resource": "warehouse",
                        "collection": "users_copy",
                        "config": {"table.name.format": "users_copy"}
                    }
                ],
                "functions": [{"name": "anonymize", "image": "registry/app:1"}],
                "definition": {
                    "app_name": "demo",
                    "git_sha": "abc123",
                    "metadata": {
                        "toolchain": {"language": "rust", "version": "1.85.0"},
                        "spec_version": SPEC_VERSION
                    }
                }
            })
        );
    }
}
