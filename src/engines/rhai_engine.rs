//! Rhai scripted executors and placeholders
//!
//! Lets operators add `#NAME` executors and `%name%` placeholders without
//! recompiling the host. One file defines one extension; the file stem is
//! its name (`executors/heal.rhai` becomes `#HEAL`).
//!
//! # Script API
//!
//! ## Entry points
//! - `execute(ctx, args)` - Executor body, return value ignored
//! - `evaluate(ctx, args)` - Placeholder body, returns the value
//!
//! `ctx` is a map with `event` (event name), `actor` (actor id or `()`),
//! `player` (host object or `()`) and `sync` (bool). `args` is the array of
//! evaluated arguments.
//!
//! ## Functions
//! - `get_global(name)` - Read a global variable (`()` when unset)
//! - `set_global(name, value)` - Write a global variable
//! - `log(message)` / `log_debug(message)`

use rhai::{Array, Dynamic, Engine as RhaiVM, EvalAltResult, Map, Scope, AST};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, TriggerError};
use crate::interpreter::{
    ExecutionScope, Executor, ExecutorRegistry, GlobalStore, Placeholder, PlaceholderRegistry,
};
use crate::script::{HostHandle, Value};

/// File extension of scripted extensions
pub const SCRIPT_EXTENSION: &str = "rhai";

/// Compiled Rhai script with the engine API registered
struct RhaiScript {
    /// The Rhai VM
    vm: RhaiVM,
    /// Compiled script AST
    ast: AST,
    name: String,
}

impl RhaiScript {
    fn compile(name: &str, source: &str, entry: &str, globals: Arc<dyn GlobalStore>) -> Result<Self> {
        let mut vm = RhaiVM::new();

        // Limit script capabilities for safety
        vm.set_max_expr_depths(64, 64);
        vm.set_max_call_levels(32);
        vm.set_max_operations(1_000_000);
        vm.set_max_string_size(10_000);
        vm.set_max_array_size(10_000);
        vm.set_max_map_size(1_000);

        Self::register_functions(&mut vm, globals);

        let ast = vm
            .compile(source)
            .map_err(|e| TriggerError::Config(format!("{}: compilation error: {}", name, e)))?;

        if !ast
            .iter_functions()
            .any(|f| f.name == entry && f.params.len() == 2)
        {
            return Err(TriggerError::Config(format!(
                "{}: script must define {}(ctx, args)",
                name, entry
            )));
        }

        Ok(Self {
            vm,
            ast,
            name: name.to_string(),
        })
    }

    fn register_functions(vm: &mut RhaiVM, globals: Arc<dyn GlobalStore>) {
        // get_global(name) -> Dynamic
        let g = globals.clone();
        vm.register_fn("get_global", move |name: &str| -> Dynamic {
            g.get(name).map(to_dynamic).unwrap_or(Dynamic::UNIT)
        });

        // set_global(name, value)
        let g = globals;
        vm.register_fn(
            "set_global",
            move |name: &str, value: Dynamic| -> std::result::Result<(), Box<EvalAltResult>> {
                g.set(name, from_dynamic(value))
                    .map_err(|e| e.to_string().into())
            },
        );

        // log(message)
        vm.register_fn("log", |message: &str| {
            log::info!("[Rhai] {}", message);
        });

        vm.register_fn("log_debug", |message: &str| {
            log::debug!("[Rhai] {}", message);
        });
    }

    /// Call the entry point with the activation's context and arguments
    fn call(&self, entry: &str, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<Value> {
        let args: Array = args.iter().cloned().map(to_dynamic).collect();
        let result = self
            .vm
            .call_fn::<Dynamic>(&mut Scope::new(), &self.ast, entry, (context_map(scope), args))
            .map_err(|e| TriggerError::runtime(format!("{}: {}", self.name, e)))?;
        Ok(from_dynamic(result))
    }
}

fn context_map(scope: &ExecutionScope<'_>) -> Map {
    let context = scope.context();
    let actor = context.actor();

    let mut map = Map::new();
    map.insert("event".into(), Dynamic::from(context.event().name().to_string()));
    map.insert(
        "actor".into(),
        actor.map_or(Dynamic::UNIT, |a| Dynamic::from(a.id.as_str().to_string())),
    );
    map.insert(
        "player".into(),
        actor
            .and_then(|a| a.handle.clone())
            .map_or(Dynamic::UNIT, Dynamic::from),
    );
    map.insert("sync".into(), Dynamic::from(scope.is_sync()));
    map
}

/// Convert a script value into a Rhai value
pub fn to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(b),
        Value::Int(i) => Dynamic::from(i),
        Value::Float(f) => Dynamic::from(f),
        Value::String(s) => Dynamic::from(s),
        Value::Handle(h) => Dynamic::from(h),
    }
}

/// Convert a Rhai value back; arrays and maps become their display string
pub fn from_dynamic(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return Value::Int(i);
    }
    if let Ok(f) = value.as_float() {
        return Value::Float(f);
    }
    if value.is_string() {
        return value.into_string().map(Value::String).unwrap_or_default();
    }
    if value.is::<HostHandle>() {
        return value.try_cast::<HostHandle>().map(Value::Handle).unwrap_or_default();
    }
    Value::String(value.to_string())
}

/// Executor defined by a Rhai script
pub struct ScriptedExecutor {
    script: RhaiScript,
}

impl std::fmt::Debug for ScriptedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedExecutor")
            .field("name", &self.script.name)
            .finish()
    }
}

impl ScriptedExecutor {
    pub fn compile(name: &str, source: &str, globals: Arc<dyn GlobalStore>) -> Result<Self> {
        Ok(Self {
            script: RhaiScript::compile(name, source, "execute", globals)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.script.name
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<()> {
        self.script.call("execute", scope, args).map(|_| ())
    }
}

/// Placeholder defined by a Rhai script
pub struct ScriptedPlaceholder {
    script: RhaiScript,
}

impl ScriptedPlaceholder {
    pub fn compile(name: &str, source: &str, globals: Arc<dyn GlobalStore>) -> Result<Self> {
        Ok(Self {
            script: RhaiScript::compile(name, source, "evaluate", globals)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.script.name
    }
}

impl Placeholder for ScriptedPlaceholder {
    fn evaluate(&self, scope: &ExecutionScope<'_>, args: &[Value]) -> Result<Value> {
        self.script.call("evaluate", scope, args)
    }
}

/// Compile every `*.rhai` file in `dir` and register it as an executor
pub fn load_executors(
    dir: &Path,
    registry: &ExecutorRegistry,
    globals: &Arc<dyn GlobalStore>,
) -> Result<usize> {
    let scripts = read_scripts(dir)?;
    let count = scripts.len();
    for (name, source, path) in scripts {
        let executor = ScriptedExecutor::compile(&name, &source, globals.clone()).map_err(|e| {
            TriggerError::ScriptLoad {
                path,
                source: Box::new(e),
            }
        })?;
        registry.register(&name, Arc::new(executor));
    }
    log::info!("Loaded {} scripted executors from {}", count, dir.display());
    Ok(count)
}

/// Compile every `*.rhai` file in `dir` and register it as a placeholder
pub fn load_placeholders(
    dir: &Path,
    registry: &PlaceholderRegistry,
    globals: &Arc<dyn GlobalStore>,
) -> Result<usize> {
    let scripts = read_scripts(dir)?;
    let count = scripts.len();
    for (name, source, path) in scripts {
        let placeholder =
            ScriptedPlaceholder::compile(&name, &source, globals.clone()).map_err(|e| {
                TriggerError::ScriptLoad {
                    path,
                    source: Box::new(e),
                }
            })?;
        registry.register(&name, Arc::new(placeholder));
    }
    log::info!("Loaded {} scripted placeholders from {}", count, dir.display());
    Ok(count)
}

fn read_scripts(dir: &Path) -> Result<Vec<(String, String, std::path::PathBuf)>> {
    let mut scripts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION) {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                log::warn!("Skipping script with non UTF-8 name: {}", path.display());
                continue;
            };
            let source = std::fs::read_to_string(&path)?;
            scripts.push((stem.to_string(), source, path.clone()));
        }
    }
    scripts.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Actor, ExecutionMode, MainThread, SimpleEvent, TriggerContext};
    use crate::interpreter::MemoryStore;

    fn globals() -> Arc<dyn GlobalStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_scripted_executor_writes_globals() {
        let store = globals();
        let executor = ScriptedExecutor::compile(
            "add",
            r#"
            fn execute(ctx, args) {
                set_global("sum", args[0] + args[1]);
                set_global("who", ctx.actor);
            }
            "#,
            store.clone(),
        )
        .unwrap();

        let context = TriggerContext::new(Arc::new(SimpleEvent::new("click")))
            .with_actor(Actor::new("uuid-7"));
        let bridge = MainThread::attach_current(None);
        let scope = ExecutionScope::new(&context, ExecutionMode::Sync, &bridge);

        executor.execute(&scope, &[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(store.get("sum"), Some(Value::Int(5)));
        assert_eq!(store.get("who"), Some(Value::from("uuid-7")));
    }

    #[test]
    fn test_scripted_placeholder_returns_value() {
        let placeholder = ScriptedPlaceholder::compile(
            "greeting",
            r#"fn evaluate(ctx, args) { "hello " + ctx.event }"#,
            globals(),
        )
        .unwrap();

        let context = TriggerContext::new(Arc::new(SimpleEvent::new("join")));
        let bridge = MainThread::attach_current(None);
        let scope = ExecutionScope::new(&context, ExecutionMode::Async, &bridge);
        assert_eq!(placeholder.evaluate(&scope, &[]).unwrap(), Value::from("hello join"));
    }

    #[test]
    fn test_missing_entry_point() {
        let err = ScriptedExecutor::compile("bad", "fn other() {}", globals()).unwrap_err();
        assert!(err.to_string().contains("execute(ctx, args)"));
        assert!(ScriptedExecutor::compile("bad", "fn execute(ctx, args) {", globals()).is_err());
    }

    #[test]
    fn test_value_conversion() {
        let handle = HostHandle::new(42u64);
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Int(-3),
            Value::Float(1.5),
            Value::from("text"),
            Value::Handle(handle.clone()),
        ] {
            assert_eq!(from_dynamic(to_dynamic(value.clone())), value);
        }
    }

    #[test]
    fn test_load_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("heal.rhai"), "fn execute(ctx, args) { }").unwrap();
        std::fs::write(dir.path().join("readme.md"), "ignored").unwrap();

        let executors = ExecutorRegistry::new();
        assert_eq!(load_executors(dir.path(), &executors, &globals()).unwrap(), 1);
        assert!(executors.has_executor("HEAL"));

        let placeholders = PlaceholderRegistry::new();
        let err = load_placeholders(dir.path(), &placeholders, &globals()).unwrap_err();
        assert!(err.to_string().contains("heal.rhai"));
    }
}
