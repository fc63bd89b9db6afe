//! The runtime contract every data app and every execution mode satisfies.
//!
//! An app's [`App::run`] receives a [`Runtime`] and drives
//! `resources → records → process → write` in program order. Which runtime it
//! receives decides where work happens, never what a function does to records.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use strand_core::{Function, Record, RecordWithError, StrandResult};

/// A data app: resources, one or more functions and declared secrets.
#[async_trait]
pub trait App: Send + Sync {
    async fn run(&self, runtime: &mut dyn Runtime) -> StrandResult<()>;
}

/// An execution mode for a data app.
#[async_trait]
pub trait Runtime: Send {
    /// Resolves a named external system.
    async fn resources(&mut self, name: &str) -> StrandResult<Box<dyn Resource>>;

    /// Applies `function` to the upstream records.
    ///
    /// Returns the transformed records and the records the function rejected.
    async fn process(
        &mut self,
        records: Records,
        function: Arc<dyn Function>,
    ) -> StrandResult<(Records, RecordsWithErrors)>;

    /// Makes the named environment value available to functions created later
    /// in this run.
    fn register_secret(&mut self, name: &str) -> StrandResult<()>;
}

/// A named external system the runtime reads from or writes to.
#[async_trait]
pub trait Resource: Send + Sync {
    fn name(&self) -> &str;

    /// Opens a stream of records from `collection`.
    async fn records(&self, collection: &str, config: ResourceConfigs) -> StrandResult<Records>;

    /// Sends `records` into `collection`.
    async fn write(
        &self,
        records: Records,
        collection: &str,
        config: ResourceConfigs,
    ) -> StrandResult<()>;
}

/// Connector configuration passed to a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceConfigs(BTreeMap<String, Value>);

impl ResourceConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Opaque handle on the records flowing between two stages.
///
/// On the platform it is only a symbolic stream name; no payload passes
/// through the orchestrator. Locally it also owns the records themselves,
/// reachable only from inside this crate. A handle is consumed by the stage
/// that reads it, so each stream name is used exactly once.
#[derive(Debug, Default)]
pub struct Records {
    stream: String,
    records: Vec<Record>,
}

impl Records {
    /// Symbolic stream name; empty for local and dry-run handles.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub(crate) fn from_stream(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            records: Vec::new(),
        }
    }

    pub(crate) fn from_records(records: Vec<Record>) -> Self {
        Self {
            stream: String::new(),
            records,
        }
    }

    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Opaque handle on the records a function rejected.
#[derive(Debug, Default)]
pub struct RecordsWithErrors {
    stream: String,
    failed: Vec<RecordWithError>,
}

impl RecordsWithErrors {
    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub(crate) fn from_failed(failed: Vec<RecordWithError>) -> Self {
        Self {
            stream: String::new(),
            failed,
        }
    }

    pub(crate) fn failed(&self) -> &[RecordWithError] {
        &self.failed
    }
}
