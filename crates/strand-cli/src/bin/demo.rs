//! Demo data app: copies user activity from Postgres, masking customer emails.
//!
//! ```text
//! strand-demo local --app-config demos/app.json
//! strand-demo plan --app-config demos/app.json
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use strand_core::prelude::*;
use strand_runtime::{App, ResourceConfigs, Runtime};

struct Anonymize;

impl Function for Anonymize {
    fn process(&self, records: Vec<Record>) -> (Vec<Record>, Vec<RecordWithError>) {
        let mut out = Vec::with_capacity(records.len());
        let mut failed = Vec::new();

        for mut record in records {
            let Some(email) = record
                .payload
                .get("customer_email")
                .and_then(|v| v.as_str().map(str::to_string))
            else {
                failed.push(RecordWithError::new(record, "customer_email missing"));
                continue;
            };

            match record.payload.set("customer_email", mask(&email)) {
                Ok(()) => out.push(record),
                Err(e) => failed.push(RecordWithError::new(record, e.to_string())),
            }
        }
        (out, failed)
    }
}

/// `jane@example.com` becomes `j***@example.com`.
fn mask(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{first}***@{domain}")
        }
        None => "***".to_string(),
    }
}

struct UserActivityApp;

#[async_trait]
impl App for UserActivityApp {
    async fn run(&self, runtime: &mut dyn Runtime) -> StrandResult<()> {
        let source = runtime.resources("demopg").await?;
        let records = source
            .records("user_activity", ResourceConfigs::new())
            .await?;

        let (anonymized, _failed) = runtime.process(records, Arc::new(Anonymize)).await?;

        let dest = runtime.resources("demopg").await?;
        dest.write(
            anonymized,
            "user_activity_enriched",
            ResourceConfigs::new(),
        )
        .await
    }
}

fn main() {
    strand_cli::start(UserActivityApp);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("jane@example.com"), "j***@example.com");
        assert_eq!(mask("nobody"), "***");
    }

    #[test]
    fn test_records_without_email_are_rejected() {
        let (out, failed) = Anonymize.process(vec![
            Record::new("1", r#"{"customer_email":"ann@example.com"}"#),
            Record::new("2", r#"{"action":"login"}"#),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].payload.get("customer_email"),
            Some(serde_json::Value::from("a***@example.com"))
        );
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].record.key, "2");
    }
}
