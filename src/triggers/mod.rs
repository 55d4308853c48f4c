//! Trigger activation and scheduling
//!
//! This module wraps parsed scripts as triggers and runs them:
//! - `Trigger` - A named script with its own cooldown table
//! - `TriggerRuntime` - Registries, globals, main thread and workers
//! - `NamedTriggerRegistry` - Triggers reachable through `#CALL`
//! - `ReservedCommands` - `#CALL`, `#CANCELEVENT`, `#COOLDOWN`, `%cooldown%`

mod cooldown;
mod named;
mod reserved;
mod runtime;
mod trigger;

pub use cooldown::{CooldownTable, MAX_COOLDOWN};
pub use named::NamedTriggerRegistry;
pub use reserved::ReservedCommands;
pub use runtime::{RuntimeBuilder, TriggerRuntime};
pub use trigger::{ActivationHandle, ActivationState, Trigger};
