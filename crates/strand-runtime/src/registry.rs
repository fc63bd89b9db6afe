use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use strand_core::Function;

/// Functions registered during a run, keyed by lowercased type name.
///
/// Registering a name again replaces the earlier function.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `function` and returns the name it was stored under.
    pub fn register(&mut self, function: Arc<dyn Function>) -> String {
        let name = function.name();
        if self.functions.insert(name.clone(), function).is_some() {
            tracing::debug!(function = %name, "function re-registered, replacing previous");
        }
        name
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FunctionRegistry")
            .field(&self.names())
            .finish()
    }
}
