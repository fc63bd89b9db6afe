//! Where registered secret values come from.

use std::collections::{BTreeMap, HashMap};

use strand_core::StrandError;

/// Looks up secret values by name.
pub trait SecretSource: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SecretSource for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl SecretSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl SecretSource for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Reads a secret, rejecting unset and empty values.
pub(crate) fn read_secret(source: &dyn SecretSource, name: &str) -> Result<String, StrandError> {
    match source.lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(StrandError::configuration(format!(
            "secret {name} is invalid or not set"
        ))),
    }
}
