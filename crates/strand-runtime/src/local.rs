//! Local runner: reads fixture files, runs functions in-process and prints
//! what would have been written.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use strand_core::{AppConfig, Function, Record, StrandError, StrandResult};

use crate::contract::{Records, RecordsWithErrors, Resource, ResourceConfigs, Runtime};
use crate::secrets::{self, ProcessEnv, SecretSource};

/// Collection name to record key to payload object.
type Fixture = IndexMap<String, IndexMap<String, Value>>;

/// Human-readable destination for records written by the local runner.
#[derive(Clone)]
pub struct DiagnosticSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DiagnosticSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    fn render(&self, resource: &str, records: &[Record]) -> StrandResult<()> {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for record in records {
            writeln!(writer, "{}", render_line(resource, record))
                .map_err(|e| StrandError::fatal(format!("unable to write output: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| StrandError::fatal(format!("unable to flush output: {e}")))
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::stdout()
    }
}

fn render_line(resource: &str, record: &Record) -> String {
    let timestamp = record
        .timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| record.timestamp.unix_timestamp().to_string());
    format!(
        "{resource} => Key: {}; Payload: {}; Timestamp: {timestamp}",
        record.key, record.payload
    )
}

pub struct LocalRuntime {
    config: AppConfig,
    sink: DiagnosticSink,
    secrets: Arc<dyn SecretSource>,
}

impl LocalRuntime {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            sink: DiagnosticSink::stdout(),
            secrets: Arc::new(ProcessEnv),
        }
    }

    /// Loads the app config at `path` and builds a runner for it.
    pub fn from_path(path: impl AsRef<Path>) -> StrandResult<Self> {
        Ok(Self::new(AppConfig::load(path)?))
    }

    pub fn with_sink(mut self, sink: DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_secret_source(mut self, source: Arc<dyn SecretSource>) -> Self {
        self.secrets = source;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[async_trait]
impl Runtime for LocalRuntime {
    async fn resources(&mut self, name: &str) -> StrandResult<Box<dyn Resource>> {
        let identifier = self
            .config
            .resource(name)
            .ok_or_else(|| StrandError::not_found("resource", name))?;
        let fixture = self.config.resolve_path(identifier);
        tracing::debug!(resource = %name, fixture = %fixture.display(), "resolved local resource");

        Ok(Box::new(LocalResource {
            name: name.to_string(),
            fixture,
            sink: self.sink.clone(),
        }))
    }

    async fn process(
        &mut self,
        records: Records,
        function: Arc<dyn Function>,
    ) -> StrandResult<(Records, RecordsWithErrors)> {
        let name = function.name();
        let input = records.into_records();
        let received = input.len();

        let (output, failed) = function.process(input);
        let failed = RecordsWithErrors::from_failed(failed);
        tracing::info!(
            function = %name,
            received,
            emitted = output.len(),
            "function processed records"
        );
        if !failed.failed().is_empty() {
            tracing::warn!(
                function = %name,
                count = failed.failed().len(),
                "failed records are not written anywhere by the local runner"
            );
        }

        Ok((Records::from_records(output), failed))
    }

    fn register_secret(&mut self, name: &str) -> StrandResult<()> {
        secrets::read_secret(self.secrets.as_ref(), name)?;
        tracing::debug!(secret = %name, "secret is set");
        Ok(())
    }
}

/// A resource backed by a fixture file.
pub struct LocalResource {
    name: String,
    fixture: PathBuf,
    sink: DiagnosticSink,
}

impl LocalResource {
    pub fn fixture(&self) -> &Path {
        &self.fixture
    }
}

#[async_trait]
impl Resource for LocalResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn records(&self, collection: &str, _config: ResourceConfigs) -> StrandResult<Records> {
        let records = read_fixture(&self.fixture, collection).await?;
        tracing::info!(
            resource = %self.name,
            collection = %collection,
            count = records.len(),
            "loaded fixture records"
        );
        Ok(Records::from_records(records))
    }

    async fn write(
        &self,
        records: Records,
        collection: &str,
        _config: ResourceConfigs,
    ) -> StrandResult<()> {
        tracing::debug!(
            resource = %self.name,
            collection = %collection,
            count = records.records().len(),
            "writing records"
        );
        self.sink.render(&self.name, records.records())
    }
}

/// Reads one collection from a fixture file, in file order.
async fn read_fixture(path: &Path, collection: &str) -> StrandResult<Vec<Record>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        StrandError::configuration(format!("unable to read fixture {}: {e}", path.display()))
    })?;
    let mut fixture: Fixture = serde_json::from_str(&raw).map_err(|e| {
        StrandError::configuration(format!("unable to parse fixture {}: {e}", path.display()))
    })?;

    let Some(entries) = fixture.shift_remove(collection) else {
        tracing::warn!(
            fixture = %path.display(),
            collection = %collection,
            "collection not present in fixture, no records loaded"
        );
        return Ok(Vec::new());
    };

    let now = OffsetDateTime::now_utc();
    entries
        .into_iter()
        .map(|(key, value)| {
            let payload = serde_json::to_vec(&value).map_err(|e| {
                StrandError::configuration(format!(
                    "unable to encode fixture record {key} in {}: {e}",
                    path.display()
                ))
            })?;
            Ok(Record::new(key, payload).with_timestamp(now))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    use strand_core::RecordWithError;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    struct Identity;

    impl Function for Identity {
        fn process(&self, records: Vec<Record>) -> (Vec<Record>, Vec<RecordWithError>) {
            (records, Vec::new())
        }
    }

    struct RejectOdd;

    impl Function for RejectOdd {
        fn process(&self, records: Vec<Record>) -> (Vec<Record>, Vec<RecordWithError>) {
            let (even, odd): (Vec<_>, Vec<_>) = records
                .into_iter()
                .partition(|r| r.key.parse::<u32>().map(|k| k % 2 == 0).unwrap_or(false));
            let failed = odd
                .into_iter()
                .map(|r| RecordWithError::new(r, "odd key"))
                .collect();
            (even, failed)
        }
    }

    const FIXTURE: &str = r#"{
  "events": {
    "3": {"id": 3, "email": "c@example.com"},
    "1": {"id": 1, "email": "a@example.com"},
    "2": {"id": 2, "email": "b@example.com"}
  },
  "other": {}
}"#;

    fn runtime_with_fixture() -> (tempfile::TempDir, LocalRuntime, Capture) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("fixtures")).unwrap();
        fs::write(dir.path().join("fixtures/demo.json"), FIXTURE).unwrap();
        fs::write(
            dir.path().join("app.json"),
            r#"{"name": "demo", "pipeline": "demo-pipeline",
                "resources": {"source_name": "fixtures/demo.json"}}"#,
        )
        .unwrap();

        let capture = Capture::default();
        let runtime = LocalRuntime::from_path(dir.path().join("app.json"))
            .unwrap()
            .with_sink(DiagnosticSink::new(capture.clone()));
        (dir, runtime, capture)
    }

    #[tokio::test]
    async fn test_records_preserve_fixture_order_and_keys() {
        let (_dir, mut runtime, _) = runtime_with_fixture();
        let source = runtime.resources("source_name").await.unwrap();
        let records = source
            .records("events", ResourceConfigs::new())
            .await
            .unwrap();

        let keys: Vec<_> = records.records().iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["3", "1", "2"]);
        assert_eq!(
            records.records()[0].payload.get("email"),
            Some(Value::from("c@example.com"))
        );
    }

    #[tokio::test]
    async fn test_missing_collection_yields_empty_records() {
        let (_dir, mut runtime, _) = runtime_with_fixture();
        let source = runtime.resources("source_name").await.unwrap();
        let records = source.records("absent", ResourceConfigs::new()).await.unwrap();
        assert!(records.records().is_empty());
    }

    #[tokio::test]
    async fn test_unmapped_resource_is_not_found() {
        let (_dir, mut runtime, _) = runtime_with_fixture();
        let err = runtime.resources("nope").await.err().expect("should fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_identity_output_matches_fixture_payloads() {
        let (_dir, mut runtime, capture) = runtime_with_fixture();
        let source = runtime.resources("source_name").await.unwrap();
        let records = source
            .records("events", ResourceConfigs::new())
            .await
            .unwrap();
        let expected: Vec<String> = records
            .records()
            .iter()
            .map(|r| r.payload.to_string())
            .collect();

        let (out, failed) = runtime.process(records, Arc::new(Identity)).await.unwrap();
        assert!(failed.failed().is_empty());
        source
            .write(out, "events_copy", ResourceConfigs::new())
            .await
            .unwrap();

        let lines = capture.lines();
        assert_eq!(lines.len(), 3);
        for (line, payload) in lines.iter().zip(&expected) {
            assert!(line.starts_with("source_name => Key: "));
            assert!(line.contains(&format!("Payload: {payload}; Timestamp: ")));
        }
        assert!(lines[0].contains(r#"{"id":3,"email":"c@example.com"}"#));
    }

    #[tokio::test]
    async fn test_failed_records_are_kept_off_the_output() {
        let (_dir, mut runtime, capture) = runtime_with_fixture();
        let source = runtime.resources("source_name").await.unwrap();
        let records = source
            .records("events", ResourceConfigs::new())
            .await
            .unwrap();

        let (out, failed) = runtime.process(records, Arc::new(RejectOdd)).await.unwrap();
        assert_eq!(failed.failed().len(), 2);
        assert_eq!(failed.failed()[0].cause, "odd key");

        source.write(out, "evens", ResourceConfigs::new()).await.unwrap();
        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Key: 2;"));
    }

    #[tokio::test]
    async fn test_register_secret_requires_a_value() {
        let mut source = HashMap::new();
        source.insert("PG_PASSWORD".to_string(), "hunter2".to_string());
        let (_dir, runtime, _) = runtime_with_fixture();
        let mut runtime = runtime.with_secret_source(Arc::new(source));

        runtime.register_secret("PG_PASSWORD").unwrap();
        let err = runtime.register_secret("MISSING").unwrap_err();
        assert!(err.to_string().contains("MISSING"));
    }

    fn runtime_with_mapping(fixture: Option<&str>) -> (tempfile::TempDir, LocalRuntime) {
        let dir = tempfile::tempdir().unwrap();
        if let Some(contents) = fixture {
            fs::write(dir.path().join("broken.json"), contents).unwrap();
        }
        fs::write(
            dir.path().join("app.json"),
            r#"{"name": "demo", "pipeline": "demo-pipeline",
                "resources": {"pg": "broken.json"}}"#,
        )
        .unwrap();
        let runtime = LocalRuntime::from_path(dir.path().join("app.json"))
            .unwrap()
            .with_sink(DiagnosticSink::new(Capture::default()));
        (dir, runtime)
    }

    #[tokio::test]
    async fn test_missing_fixture_file_is_configuration_error() {
        let (_dir, mut runtime) = runtime_with_mapping(None);
        let source = runtime.resources("pg").await.unwrap();

        let err = source
            .records("events", ResourceConfigs::new())
            .await
            .unwrap_err();
        assert_eq!(err.category(), strand_core::ErrorCategory::Configuration);
        assert!(err.to_string().contains("unable to read fixture"));
    }

    #[tokio::test]
    async fn test_malformed_fixture_is_configuration_error() {
        let (_dir, mut runtime) = runtime_with_mapping(Some("{ not json"));
        let source = runtime.resources("pg").await.unwrap();

        let err = source
            .records("events", ResourceConfigs::new())
            .await
            .unwrap_err();
        assert_eq!(err.category(), strand_core::ErrorCategory::Configuration);
        assert!(err.to_string().contains("unable to parse fixture"));
    }

    #[test]
    fn test_render_line_format() {
        let ts = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let record = Record::new("7", r#"{"a":1}"#).with_timestamp(ts);
        assert_eq!(
            render_line("pg", &record),
            r#"pg => Key: 7; Payload: {"a":1}; Timestamp: 1970-01-01T00:00:00Z"#
        );
    }
}
