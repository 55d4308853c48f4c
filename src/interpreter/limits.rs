//! Cooperative cancellation and deadlines for activations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Halt;
use crate::error::TriggerError;

/// Shared flag that asks running activations to stop at the next node
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Bounds checked before every node of an activation
#[derive(Debug, Clone, Default)]
pub struct ExecutionLimits {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl ExecutionLimits {
    /// Start the clock now; `None` means no deadline
    pub fn new(timeout: Option<Duration>, token: CancellationToken) -> Self {
        Self {
            timeout,
            deadline: timeout.map(|t| Instant::now() + t),
            token,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancellation wins over the deadline
    pub fn check(&self) -> Result<(), Halt> {
        if self.token.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        match (self.deadline, self.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Err(Halt::Failed(TriggerError::DeadlineExceeded(timeout)))
            }
            _ => Ok(()),
        }
    }
}
