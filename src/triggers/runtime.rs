//! Shared runtime: registries, globals, main thread and workers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::named::NamedTriggerRegistry;
use super::trigger::{ActivationHandle, Trigger};
use crate::config::EngineConfig;
use crate::core::{ExecutionMode, MainThread, TriggerContext, WorkerPool};
use crate::error::{Result, TriggerError};
use crate::interpreter::{ExecutorRegistry, GlobalStore, MemoryStore, PlaceholderRegistry};
use crate::script::Variables;
use crate::storage::JsonFileStore;

/// Everything activations share
pub struct TriggerRuntime {
    config: EngineConfig,
    executors: ExecutorRegistry,
    placeholders: PlaceholderRegistry,
    globals: Arc<dyn GlobalStore>,
    named: NamedTriggerRegistry,
    main_thread: MainThread,
    workers: WorkerPool,
    accepting: AtomicBool,
}

/// Builder for [`TriggerRuntime`]
pub struct RuntimeBuilder {
    config: EngineConfig,
    globals: Option<Arc<dyn GlobalStore>>,
    attach_current: bool,
}

impl RuntimeBuilder {
    /// Use a custom global store instead of the configured one
    pub fn globals(mut self, globals: Arc<dyn GlobalStore>) -> Self {
        self.globals = Some(globals);
        self
    }

    /// Make the calling thread the main thread. The host must then call
    /// [`MainThread::run_pending`] regularly.
    pub fn attach_current_thread(mut self) -> Self {
        self.attach_current = true;
        self
    }

    pub fn build(self) -> Result<Arc<TriggerRuntime>> {
        let execution = &self.config.execution;

        let globals: Arc<dyn GlobalStore> = match (self.globals, &self.config.globals.path) {
            (Some(globals), _) => globals,
            (None, Some(path)) => Arc::new(JsonFileStore::open(
                path.clone(),
                self.config.globals.autosave_interval(),
            )?),
            (None, None) => Arc::new(MemoryStore::new()),
        };

        let main_thread = if self.attach_current {
            MainThread::attach_current(execution.bridge_timeout())
        } else {
            MainThread::spawn(execution.bridge_timeout())?
        };

        let workers = WorkerPool::new(execution.worker_threads)?;

        log::info!(
            "Trigger runtime started ({} workers, {} main thread)",
            workers.size(),
            if self.attach_current { "attached" } else { "dedicated" }
        );

        Ok(Arc::new(TriggerRuntime {
            config: self.config,
            executors: ExecutorRegistry::new(),
            placeholders: PlaceholderRegistry::new(),
            globals,
            named: NamedTriggerRegistry::new(),
            main_thread,
            workers,
            accepting: AtomicBool::new(true),
        }))
    }
}

impl TriggerRuntime {
    /// Runtime with a dedicated main thread
    pub fn new(config: EngineConfig) -> Result<Arc<Self>> {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> RuntimeBuilder {
        RuntimeBuilder {
            config,
            globals: None,
            attach_current: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    pub fn placeholders(&self) -> &PlaceholderRegistry {
        &self.placeholders
    }

    pub fn globals(&self) -> &Arc<dyn GlobalStore> {
        &self.globals
    }

    /// Re-read global variables from their backing store
    pub fn reload_globals(&self) -> Result<()> {
        self.globals.reload()
    }

    pub fn named(&self) -> &NamedTriggerRegistry {
        &self.named
    }

    pub fn main_thread(&self) -> &MainThread {
        &self.main_thread
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Parse a trigger with the configured default mode
    pub fn parse_trigger(&self, name: &str, source: &str) -> Result<Trigger> {
        Ok(Trigger::parse(name, source)?.with_default_mode(self.config.execution.default_mode()))
    }

    /// Load named triggers from the configured scripts directory
    pub fn load_named_triggers(&self) -> Result<usize> {
        let scripts = &self.config.scripts;
        self.named.load_dir(
            &scripts.directory,
            &scripts.extension,
            self.config.execution.default_mode(),
        )
    }

    /// Reload named triggers from the configured scripts directory
    pub fn reload_named_triggers(&self) -> Result<usize> {
        let scripts = &self.config.scripts;
        self.named.reload(
            &scripts.directory,
            &scripts.extension,
            self.config.execution.default_mode(),
        )
    }

    /// Register the Rhai executors and placeholders found in the configured
    /// directories
    #[cfg(feature = "rhai-scripting")]
    pub fn load_scripted_extensions(&self) -> Result<usize> {
        use crate::engines::rhai_engine;

        let scripts = &self.config.scripts;
        let mut count = 0;
        if let Some(dir) = &scripts.executors {
            count += rhai_engine::load_executors(dir, &self.executors, &self.globals)?;
        }
        if let Some(dir) = &scripts.placeholders {
            count += rhai_engine::load_placeholders(dir, &self.placeholders, &self.globals)?;
        }
        Ok(count)
    }

    /// Activate a named trigger from host code
    pub fn call(
        self: &Arc<Self>,
        name: &str,
        context: &TriggerContext,
        variables: &mut Variables,
        mode: ExecutionMode,
    ) -> Result<ActivationHandle> {
        let trigger = self
            .named
            .get(name)
            .ok_or_else(|| TriggerError::TriggerNotFound(name.to_string()))?;
        trigger.activate(self, context, variables, mode)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(TriggerError::ShuttingDown)
        }
    }

    /// Stop accepting activations. Queued work still runs; global variables
    /// are flushed last.
    pub fn shutdown(&self) {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("Trigger runtime shutting down");

        self.main_thread.shutdown();
        self.workers.shutdown();

        if let Err(e) = self.globals.flush() {
            log::error!("Failed to flush global variables: {}", e);
        }
    }
}

impl Drop for TriggerRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SimpleEvent;
    use crate::script::Value;

    #[test]
    fn test_shutdown_rejects_new_activations() {
        let runtime = TriggerRuntime::builder(EngineConfig::default())
            .attach_current_thread()
            .build()
            .unwrap();
        let trigger = Arc::new(runtime.parse_trigger("t", "x = 1").unwrap());
        let ctx = TriggerContext::new(Arc::new(SimpleEvent::new("e")));

        runtime.shutdown();
        assert!(!runtime.is_accepting());
        let err = trigger
            .activate(&runtime, &ctx, &mut Variables::new(), ExecutionMode::Sync)
            .unwrap_err();
        assert!(matches!(err, TriggerError::ShuttingDown));
    }

    #[test]
    fn test_call_by_name() {
        let runtime = TriggerRuntime::builder(EngineConfig::default())
            .attach_current_thread()
            .build()
            .unwrap();
        runtime.named().register(Trigger::parse("inc", "n = n + 1").unwrap());

        let ctx = TriggerContext::new(Arc::new(SimpleEvent::new("e")));
        let mut vars = Variables::new();
        vars.insert("n".into(), Value::Int(41));
        runtime
            .call("inc", &ctx, &mut vars, ExecutionMode::Sync)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(vars.get("n"), Some(&Value::Int(42)));

        let err = runtime
            .call("missing", &ctx, &mut vars, ExecutionMode::Sync)
            .unwrap_err();
        assert!(matches!(err, TriggerError::TriggerNotFound(_)));
    }

    #[test]
    fn test_json_globals_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("var.json");
        let config = EngineConfig::default().with_globals_path(&path);

        let runtime = TriggerRuntime::builder(config)
            .attach_current_thread()
            .build()
            .unwrap();
        let trigger = Arc::new(runtime.parse_trigger("t", "global.visits = 3").unwrap());
        let ctx = TriggerContext::new(Arc::new(SimpleEvent::new("e")));
        trigger.fire(&runtime, &ctx).unwrap().wait().unwrap();
        runtime.shutdown();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("\"visits\": 3"));
    }

    #[test]
    fn test_reload_globals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("var.json");
        std::fs::write(&path, r#"{"visits": 1}"#).unwrap();

        let runtime = TriggerRuntime::builder(EngineConfig::default().with_globals_path(&path))
            .attach_current_thread()
            .build()
            .unwrap();
        assert_eq!(runtime.globals().get("visits"), Some(Value::Int(1)));

        std::fs::write(&path, r#"{"visits": 7}"#).unwrap();
        runtime.reload_globals().unwrap();
        let trigger = Arc::new(runtime.parse_trigger("t", "seen = global.visits").unwrap());
        let mut vars = Variables::new();
        trigger
            .activate(&runtime, &TriggerContext::new(Arc::new(SimpleEvent::new("e"))), &mut vars, ExecutionMode::Sync)
            .unwrap()
            .wait()
            .unwrap();
        assert_eq!(vars.get("seen"), Some(&Value::Int(7)));

        std::fs::write(&path, "[1, 2").unwrap();
        assert!(runtime.reload_globals().is_err());
        assert_eq!(runtime.globals().get("visits"), Some(Value::Int(7)));
    }

    #[test]
    fn test_load_named_triggers_from_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.trg"), "x = 1").unwrap();
        let mut config = EngineConfig::default();
        config.scripts.directory = dir.path().to_path_buf();

        let runtime = TriggerRuntime::builder(config)
            .attach_current_thread()
            .build()
            .unwrap();
        assert_eq!(runtime.load_named_triggers().unwrap(), 1);
        assert!(runtime.named().has_trigger("hello"));
        assert_eq!(runtime.reload_named_triggers().unwrap(), 1);
    }

    #[cfg(feature = "rhai-scripting")]
    #[test]
    fn test_scripted_extensions_reach_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let executors = dir.path().join("executors");
        let placeholders = dir.path().join("placeholders");
        std::fs::create_dir(&executors).unwrap();
        std::fs::create_dir(&placeholders).unwrap();
        std::fs::write(
            executors.join("remember.rhai"),
            "fn execute(ctx, args) { set_global(\"last\", args[0]); }",
        )
        .unwrap();
        std::fs::write(
            placeholders.join("double.rhai"),
            "fn evaluate(ctx, args) { args[0] * 2 }",
        )
        .unwrap();

        let mut config = EngineConfig::default();
        config.scripts.executors = Some(executors);
        config.scripts.placeholders = Some(placeholders);
        let runtime = TriggerRuntime::builder(config)
            .attach_current_thread()
            .build()
            .unwrap();
        assert_eq!(runtime.load_scripted_extensions().unwrap(), 2);

        let trigger = Arc::new(
            runtime
                .parse_trigger("t", "#REMEMBER(%double:21%)")
                .unwrap(),
        );
        let ctx = TriggerContext::new(Arc::new(SimpleEvent::new("e")));
        trigger.fire(&runtime, &ctx).unwrap().wait().unwrap();
        assert_eq!(runtime.globals().get("last"), Some(Value::Int(42)));
    }
}
