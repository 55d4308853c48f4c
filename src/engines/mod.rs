//! Scripted extension engines
//!
//! Executors and placeholders are normally registered from Rust. With the
//! `rhai-scripting` feature they can also be written as Rhai scripts and
//! loaded from a directory at startup.
//!
//! # Example
//!
//! ```ignore
//! use trigger_engine::engines::rhai_engine;
//!
//! rhai_engine::load_executors(dir, runtime.executors(), runtime.globals())?;
//! ```

#[cfg(feature = "rhai-scripting")]
pub mod rhai_engine;

#[cfg(feature = "rhai-scripting")]
pub use rhai_engine::{ScriptedExecutor, ScriptedPlaceholder};
