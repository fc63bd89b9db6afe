//! Version 0 of the transform contract, where functions could not reject
//! records.
//!
//! Wrap an old function in [`Legacy`] to run it under any current runtime.

#![allow(deprecated)]

use std::any::type_name;

use strand_core::{Record, RecordWithError, function_name};

#[deprecated(
    since = "0.0.1",
    note = "implement strand_core::Function, which also returns rejected records"
)]
pub trait Function: Send + Sync {
    fn process(&self, records: Vec<Record>) -> Vec<Record>;
}

/// Adapts a version 0 function to the current contract. It never rejects
/// records, and keeps the wrapped type's name for registration.
pub struct Legacy<F>(pub F);

impl<F: Function + 'static> strand_core::Function for Legacy<F> {
    fn process(&self, records: Vec<Record>) -> (Vec<Record>, Vec<RecordWithError>) {
        (self.0.process(records), Vec::new())
    }

    fn name(&self) -> String {
        function_name(type_name::<F>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flatten;

    impl Function for Flatten {
        fn process(&self, records: Vec<Record>) -> Vec<Record> {
            records
                .into_iter()
                .map(|mut r| {
                    r.key = r.key.to_uppercase();
                    r
                })
                .collect()
        }
    }

    #[test]
    fn test_legacy_adapter_keeps_name_and_never_rejects() {
        let adapted = Legacy(Flatten);
        assert_eq!(strand_core::Function::name(&adapted), "flatten");

        let (out, failed) =
            strand_core::Function::process(&adapted, vec![Record::new("ab", "{}")]);
        assert_eq!(out[0].key, "AB");
        assert!(failed.is_empty());
    }
}
