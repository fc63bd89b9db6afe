use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StrandError;

/// Data app description, read from `app.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default)]
    pub environment: String,
    pub pipeline: String,
    /// Resource name to identifier. Locally the identifier is a fixture path.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    /// Directory the config was loaded from; relative fixture paths resolve against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Reads and validates an app config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StrandError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            StrandError::configuration(format!(
                "unable to read app config {}: {e}",
                path.display()
            ))
        })?;
        let mut cfg: AppConfig = serde_json::from_str(&raw).map_err(|e| {
            StrandError::configuration(format!(
                "unable to parse app config {}: {e}",
                path.display()
            ))
        })?;
        cfg.base_dir = path.parent().map(Path::to_path_buf);
        cfg.validate()?;
        tracing::debug!(
            path = %path.display(),
            app = %cfg.name,
            pipeline = %cfg.pipeline,
            resources = cfg.resources.len(),
            "app config loaded"
        );
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), StrandError> {
        if self.name.trim().is_empty() {
            return Err(StrandError::configuration("app config 'name' must not be empty"));
        }
        if self.pipeline.trim().is_empty() {
            return Err(StrandError::configuration(
                "app config 'pipeline' must not be empty",
            ));
        }
        Ok(())
    }

    /// Identifier mapped to a resource name, if any.
    pub fn resource(&self, name: &str) -> Option<&str> {
        self.resources.get(name).map(String::as_str)
    }

    /// Resolves an identifier as a filesystem path relative to the config file.
    pub fn resolve_path(&self, identifier: &str) -> PathBuf {
        let candidate = PathBuf::from(identifier);
        match &self.base_dir {
            Some(dir) if candidate.is_relative() => dir.join(candidate),
            _ => candidate,
        }
    }
}

/// Settings the runtime reads from the process environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Listen address for the function server.
    #[serde(default)]
    pub function_addr: Option<String>,
    /// Base URL of the control plane API.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Bearer credential for the control plane.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_body_limit() -> usize {
    16 * 1024 * 1024
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            function_addr: None,
            api_url: None,
            access_token: None,
            log_level: default_log_level(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ProcessConfig {
    pub fn validate(&self) -> Result<(), String> {
        let lvl = self.log_level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("log_level must be one of {valid_levels:?}"));
        }
        if self.body_limit_bytes == 0 {
            return Err("body_limit_bytes must be > 0".into());
        }
        if let Some(addr) = &self.function_addr
            && addr.trim().is_empty()
        {
            return Err("function_addr must not be blank when set".into());
        }
        Ok(())
    }

    /// Listen address for the function server; its absence is unrecoverable.
    pub fn require_function_addr(&self) -> Result<&str, StrandError> {
        self.function_addr
            .as_deref()
            .ok_or_else(|| StrandError::fatal("missing STRAND_FUNCTION_ADDR listen address"))
    }

    pub fn require_api_url(&self) -> Result<&str, StrandError> {
        self.api_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StrandError::configuration("missing STRAND_API_URL control plane URL"))
    }
}

pub mod loader {
    use super::ProcessConfig;
    use crate::error::StrandError;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads process settings: optional TOML file, then `STRAND_*` environment overrides.
    pub fn load_process_config(path: Option<&str>) -> Result<ProcessConfig, StrandError> {
        let mut builder = Config::builder();
        if let Some(p) = path {
            let pathbuf = PathBuf::from(p);
            if pathbuf.exists() {
                builder = builder.add_source(File::from(pathbuf));
            }
        }
        // e.g. STRAND_FUNCTION_ADDR=0.0.0.0:8585
        builder = builder.add_source(
            Environment::with_prefix("STRAND")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let cfg = builder
            .build()
            .map_err(|e| StrandError::configuration(format!("config build error: {e}")))?;
        let merged: ProcessConfig = cfg
            .try_deserialize()
            .map_err(|e| StrandError::configuration(format!("config deserialize error: {e}")))?;
        merged.validate().map_err(StrandError::configuration)?;
        tracing::debug!(
            file = path.unwrap_or("<none>"),
            log_level = %merged.log_level,
            "process config loaded"
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_load_sets_base_dir() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("app.json");
        fs::write(
            &path,
            r#"{"name":"demo","environment":"common","pipeline":"demo-pipeline","resources":{"pg":"fixtures/pg.json"}}"#,
        )
        .unwrap();

        let cfg = AppConfig::load(&path).expect("valid app config");
        assert_eq!(cfg.name, "demo");
        assert_eq!(cfg.resource("pg"), Some("fixtures/pg.json"));
        assert_eq!(
            cfg.resolve_path("fixtures/pg.json"),
            dir.path().join("fixtures/pg.json")
        );
    }

    #[test]
    fn test_app_config_missing_file_is_configuration_error() {
        let err = AppConfig::load("/definitely/not/here/app.json").unwrap_err();
        assert!(matches!(err, StrandError::Configuration { .. }));
    }

    #[test]
    fn test_app_config_malformed_json_is_configuration_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("app.json");
        fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("unable to parse app config"));
    }

    #[test]
    fn test_app_config_requires_pipeline() {
        let cfg = AppConfig {
            name: "demo".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_absolute_paths_are_not_rebased() {
        let cfg = AppConfig {
            base_dir: Some(PathBuf::from("/srv/app")),
            ..Default::default()
        };
        assert_eq!(
            cfg.resolve_path("/tmp/fixture.json"),
            PathBuf::from("/tmp/fixture.json")
        );
    }

    #[test]
    fn test_missing_function_addr_is_fatal() {
        let cfg = ProcessConfig::default();
        assert!(cfg.require_function_addr().unwrap_err().is_fatal());
        assert!(cfg.require_api_url().is_err());
    }

    #[test]
    fn test_process_config_validation() {
        let mut cfg = ProcessConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.log_level = "loud".into();
        assert!(cfg.validate().is_err());
    }
}
