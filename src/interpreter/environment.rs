//! Variable environment: activation locals over a shared global store

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::script::{Value, Variables};

/// Repository for global variables shared by all triggers.
///
/// Implementations own their thread-safety and durability. Setting a key to
/// `Value::Null` removes it.
pub trait GlobalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn has(&self, key: &str) -> bool;
    fn remove(&self, key: &str) -> Option<Value>;

    /// Push pending writes to the backing store
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Replace the cached values with the backing store's current contents
    fn reload(&self) -> Result<()> {
        Ok(())
    }
}

/// Non-persistent global store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl GlobalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.write();
        if value.is_null() {
            values.remove(key);
        } else {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }
}

/// Two-tier scope of one activation
pub struct Environment {
    locals: Variables,
    globals: Arc<dyn GlobalStore>,
}

impl Environment {
    pub fn new(locals: Variables, globals: Arc<dyn GlobalStore>) -> Self {
        Self { locals, globals }
    }

    /// Local first, then global
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.locals.get(name) {
            Some(value) => Some(value.clone()),
            None => self.globals.get(name),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.locals.contains_key(name) || self.globals.has(name)
    }

    /// Plain assignments always target the local tier
    pub fn set(&mut self, name: &str, value: Value) {
        self.locals.insert(name.to_string(), value);
    }

    pub fn get_global(&self, key: &str) -> Option<Value> {
        self.globals.get(key)
    }

    pub fn set_global(&self, key: &str, value: Value) -> Result<()> {
        self.globals.set(key, value)
    }

    pub fn globals(&self) -> &Arc<dyn GlobalStore> {
        &self.globals
    }

    pub fn locals(&self) -> &Variables {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut Variables {
        &mut self.locals
    }

    /// Hand the local tier back to the caller
    pub fn into_locals(self) -> Variables {
        self.locals
    }
}
