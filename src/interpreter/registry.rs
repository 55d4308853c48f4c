//! Executor and placeholder registries
//!
//! Executors are looked up by upper-cased name (`#MESSAGE`), placeholders by
//! lower-cased name (`%health%`), so scripts may use either case.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::interpreter::ExecutionScope;
use crate::script::Value;

/// Imperative action invoked with `#NAME(args)`
pub trait Executor: Send + Sync {
    fn execute(&self, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<()>;
}

impl<F> Executor for F
where
    F: Fn(&ExecutionScope<'_>, &[Value]) -> Result<()> + Send + Sync,
{
    fn execute(&self, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<()> {
        self(scope, args)
    }
}

/// Value lookup invoked inline with `%name:args%`
pub trait Placeholder: Send + Sync {
    fn evaluate(&self, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<Value>;
}

impl<F> Placeholder for F
where
    F: Fn(&ExecutionScope<'_>, &[Value]) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<Value> {
        self(scope, args)
    }
}

/// Registry of executors, keyed by upper-case name
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor, replacing any previous one with the same name
    pub fn register(&self, name: &str, executor: Arc<dyn Executor>) {
        let key = name.to_uppercase();
        log::debug!("Registered executor #{}", key);
        self.executors.write().insert(key, executor);
    }

    /// Register a closure as an executor
    pub fn register_fn<F>(&self, name: &str, f: F)
    where
        F: Fn(&ExecutionScope<'_>, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Executor>> {
        self.executors.read().get(&name.to_uppercase()).cloned()
    }

    pub fn has_executor(&self, name: &str) -> bool {
        self.executors.read().contains_key(&name.to_uppercase())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.executors.write().remove(&name.to_uppercase()).is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registry of placeholders, keyed by lower-case name
#[derive(Default)]
pub struct PlaceholderRegistry {
    placeholders: RwLock<HashMap<String, Arc<dyn Placeholder>>>,
}

impl PlaceholderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, placeholder: Arc<dyn Placeholder>) {
        let key = name.to_lowercase();
        log::debug!("Registered placeholder %{}%", key);
        self.placeholders.write().insert(key, placeholder);
    }

    /// Register a closure as a placeholder
    pub fn register_fn<F>(&self, name: &str, f: F)
    where
        F: Fn(&ExecutionScope<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Placeholder>> {
        self.placeholders.read().get(&name.to_lowercase()).cloned()
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders.read().contains_key(&name.to_lowercase())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.placeholders.write().remove(&name.to_lowercase()).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.placeholders.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_names_are_case_insensitive() {
        let registry = ExecutorRegistry::new();
        registry.register_fn("message", |_, _| Ok(()));
        assert!(registry.has_executor("MESSAGE"));
        assert!(registry.get("Message").is_some());
        assert_eq!(registry.names(), vec!["MESSAGE".to_string()]);
        assert!(registry.unregister("MESSAGE"));
        assert!(!registry.has_executor("message"));
    }

    #[test]
    fn test_placeholder_names_are_case_insensitive() {
        let registry = PlaceholderRegistry::new();
        registry.register_fn("Health", |_, _| Ok(Value::Int(20)));
        assert!(registry.has_placeholder("health"));
        assert!(registry.get("HEALTH").is_some());
        assert!(registry.get("mana").is_none());
    }
}
