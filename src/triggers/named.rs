//! Named trigger registry, the target table of `#CALL`
//!
//! Scripts are loaded from a directory tree, one file per trigger. A file in
//! a sub-directory gets the directory names joined with `:` as a prefix, so
//! `triggers/shop/buy.trg` is callable as `#CALL("shop:buy")`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::trigger::Trigger;
use crate::core::ExecutionMode;
use crate::error::{Result, TriggerError};

#[derive(Default)]
pub struct NamedTriggerRegistry {
    triggers: RwLock<HashMap<String, Arc<Trigger>>>,
}

impl NamedTriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger under its own name, replacing any previous one
    pub fn register(&self, trigger: Trigger) -> Arc<Trigger> {
        let trigger = Arc::new(trigger);
        self.insert(trigger.clone());
        trigger
    }

    pub fn insert(&self, trigger: Arc<Trigger>) {
        log::debug!("Registered named trigger '{}'", trigger.name());
        self.triggers
            .write()
            .insert(trigger.name().to_string(), trigger);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Trigger>> {
        self.triggers.read().get(name).cloned()
    }

    pub fn has_trigger(&self, name: &str) -> bool {
        self.triggers.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Trigger>> {
        self.triggers.write().remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.triggers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.triggers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.read().is_empty()
    }

    /// Load every `*.{extension}` file under `dir` and add it to the
    /// registry. Nothing is added if any file fails to load.
    pub fn load_dir(&self, dir: &Path, extension: &str, mode: ExecutionMode) -> Result<usize> {
        let loaded = load_tree(dir, extension, mode)?;
        let count = loaded.len();
        self.triggers.write().extend(loaded);
        log::info!("Loaded {} named triggers from {}", count, dir.display());
        Ok(count)
    }

    /// Replace the whole registry with the contents of `dir`. On failure the
    /// current triggers stay in place.
    pub fn reload(&self, dir: &Path, extension: &str, mode: ExecutionMode) -> Result<usize> {
        let loaded = load_tree(dir, extension, mode)?;
        let count = loaded.len();
        *self.triggers.write() = loaded;
        log::info!("Reloaded {} named triggers from {}", count, dir.display());
        Ok(count)
    }
}

fn load_tree(
    dir: &Path,
    extension: &str,
    mode: ExecutionMode,
) -> Result<HashMap<String, Arc<Trigger>>> {
    let mut files = Vec::new();
    collect_files(dir, extension, &mut files)?;
    files.sort();

    let mut triggers = HashMap::new();
    for path in files {
        let name = trigger_name(dir, &path)?;
        let source = std::fs::read_to_string(&path)?;
        let trigger = Trigger::parse(name.clone(), source)
            .map_err(|e| TriggerError::ScriptLoad {
                path: path.clone(),
                source: Box::new(e),
            })?
            .with_default_mode(mode);
        triggers.insert(name, Arc::new(trigger));
    }
    Ok(triggers)
}

fn collect_files(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, extension, files)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    Ok(())
}

/// `root/a/b/name.trg` -> `a:b:name`
fn trigger_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return Err(TriggerError::Config(format!(
            "cannot derive a trigger name from {}",
            path.display()
        )));
    }
    Ok(parts.join(":"))
}
