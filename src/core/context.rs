//! Host context handed to every activation

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::interpreter::{CancellationToken, Interrupter};
use crate::script::{HostHandle, Value, Variables};

/// Which thread class runs an activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// On the host's mutation thread, against the caller's live variables
    #[default]
    Sync,
    /// On a worker, against a snapshot of the caller's variables
    Async,
}

impl ExecutionMode {
    pub fn from_sync_flag(sync: bool) -> Self {
        if sync {
            ExecutionMode::Sync
        } else {
            ExecutionMode::Async
        }
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, ExecutionMode::Sync)
    }
}

/// Stable identity of an actor (usually a player UUID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The entity that caused an event
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    /// Host object bound as `player` inside scripts
    pub handle: Option<HostHandle>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(id),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: HostHandle) -> Self {
        self.handle = Some(handle);
        self
    }
}

/// Event capability: can be cancelled by `#CANCELEVENT`
pub trait Cancellable: Send + Sync {
    fn set_cancelled(&self, cancelled: bool);
    fn is_cancelled(&self) -> bool;
}

/// Originating event, owned by the host
pub trait EventHandle: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when the event cannot be cancelled
    fn cancellable(&self) -> Option<&dyn Cancellable> {
        None
    }
}

/// Basic event implementation for hosts and tests
#[derive(Debug)]
pub struct SimpleEvent {
    name: String,
    can_cancel: bool,
    cancelled: AtomicBool,
}

impl SimpleEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            can_cancel: false,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn new_cancellable(name: impl Into<String>) -> Self {
        Self {
            can_cancel: true,
            ..Self::new(name)
        }
    }
}

impl Cancellable for SimpleEvent {
    fn set_cancelled(&self, cancelled: bool) {
        self.cancelled.store(cancelled, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl EventHandle for SimpleEvent {
    fn name(&self) -> &str {
        &self.name
    }

    fn cancellable(&self) -> Option<&dyn Cancellable> {
        if self.can_cancel {
            Some(self)
        } else {
            None
        }
    }
}

/// Everything the host knows about one event, shared by every activation it
/// starts (including nested `#CALL`s)
#[derive(Clone)]
pub struct TriggerContext {
    event: Arc<dyn EventHandle>,
    actor: Option<Actor>,
    interrupter: Option<Arc<dyn Interrupter>>,
    token: CancellationToken,
}

impl TriggerContext {
    pub fn new(event: Arc<dyn EventHandle>) -> Self {
        Self {
            event,
            actor: None,
            interrupter: None,
            token: CancellationToken::new(),
        }
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Host hook consulted before the engine's own reserved commands
    pub fn with_interrupter(mut self, interrupter: Arc<dyn Interrupter>) -> Self {
        self.interrupter = Some(interrupter);
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn event(&self) -> &dyn EventHandle {
        self.event.as_ref()
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn interrupter(&self) -> Option<&Arc<dyn Interrupter>> {
        self.interrupter.as_ref()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Variables injected into a fresh activation: `event` and, when the
    /// actor carries a host object, `player`
    pub fn bindings(&self) -> Variables {
        let mut vars = Variables::new();
        vars.insert("event".to_string(), Value::from(self.event.name()));
        if let Some(handle) = self.actor.as_ref().and_then(|a| a.handle.clone()) {
            vars.insert("player".to_string(), Value::Handle(handle));
        }
        vars
    }
}

impl fmt::Debug for TriggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerContext")
            .field("event", &self.event.name())
            .field("actor", &self.actor)
            .field("interrupter", &self.interrupter.is_some())
            .finish()
    }
}
