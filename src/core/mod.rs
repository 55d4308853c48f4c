//! Host-facing runtime plumbing
//!
//! This module contains the pieces that connect the interpreter to the host:
//! - `TriggerContext` - Event, actor and host hook for one event
//! - `MainThread` - Blocking bridge onto the single mutation thread
//! - `WorkerPool` - Threads running asynchronous activations

mod bridge;
mod context;
mod workers;

pub use bridge::MainThread;
pub use context::{
    Actor, ActorId, Cancellable, EventHandle, ExecutionMode, SimpleEvent, TriggerContext,
};
pub use workers::WorkerPool;
