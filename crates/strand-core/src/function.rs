//! The transform contract shared by every runner and the function server.

use crate::record::{Record, RecordWithError};

/// A record transform.
///
/// The same `process` implementation runs in-process under the local runner
/// and out-of-process behind the function server, so it must not depend on
/// where it executes.
pub trait Function: Send + Sync {
    /// Transforms a batch, returning the transformed records and the records
    /// that failed.
    fn process(&self, records: Vec<Record>) -> (Vec<Record>, Vec<RecordWithError>);

    /// Registry name: the implementing type's name, lowercased.
    fn name(&self) -> String {
        function_name(std::any::type_name::<Self>())
    }
}

/// Derives a registry name from a fully qualified type name.
///
/// `my_app::transforms::Anonymize<Sha256>` becomes `anonymize`.
pub fn function_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_lowercase()
}
