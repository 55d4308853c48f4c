//! Trigger Engine
//!
//! An embeddable scripting engine for event-driven game server triggers.
//! A host hands the engine short scripts, fires them when events happen and
//! extends the language with its own `#COMMAND`s and `%placeholder%`s.
//!
//! The crate is split into:
//! - `script` - Lexer, parser, AST and runtime values
//! - `interpreter` - Tree-walking interpreter, registries and the interrupter hook
//! - `core` - Event context, main-thread bridge and worker pool
//! - `triggers` - Triggers, reserved commands, cooldowns and the named registry
//! - `storage` - JSON-backed global variables
//! - `engines` - Executors and placeholders written in Rhai
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trigger_engine::{EngineConfig, SimpleEvent, TriggerContext, TriggerRuntime};
//!
//! let runtime = TriggerRuntime::new(EngineConfig::default())?;
//! runtime.executors().register_fn("MESSAGE", |_, args| {
//!     println!("{}", args[0]);
//!     Ok(())
//! });
//!
//! let trigger = Arc::new(runtime.parse_trigger("welcome", "#MESSAGE(\"hi \" + player)")?);
//! let ctx = TriggerContext::new(Arc::new(SimpleEvent::new("join")));
//! trigger.fire(&runtime, &ctx)?.wait()?;
//! ```

pub mod config;
pub mod core;
pub mod engines;
pub mod error;
pub mod interpreter;
pub mod script;
pub mod storage;
pub mod triggers;

// Re-export commonly used types
pub use config::EngineConfig;
pub use self::core::{Actor, ActorId, EventHandle, ExecutionMode, SimpleEvent, TriggerContext};
pub use error::{Result, TriggerError};
pub use interpreter::{
    CancellationToken, ExecutionScope, GlobalStore, Interpreter, Interrupter, MemoryStore,
};
pub use script::{parse_script, HostHandle, Script, SyntaxError, Value, Variables};
pub use storage::JsonFileStore;
pub use triggers::{ActivationHandle, ActivationState, Trigger, TriggerRuntime};
