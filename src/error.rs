//! Error types for the trigger engine

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::script::SyntaxError;

/// Result type for trigger engine operations
pub type Result<T> = std::result::Result<T, TriggerError>;

/// Errors raised while loading, interpreting or scheduling triggers
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Script text could not be parsed
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Type mismatch, illegal reserved command use, failing executor, ...
    #[error("runtime error: {0}")]
    Runtime(String),

    /// `#NAME` was neither handled by the interrupter nor registered
    #[error("unknown command: #{0}")]
    UnknownCommand(String),

    /// The unit of work submitted to the mutation thread failed, or the
    /// mutation thread is gone
    #[error("host bridge failure: {0}")]
    HostBridge(String),

    /// Activation ran past its deadline
    #[error("activation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The runtime no longer accepts activations
    #[error("trigger runtime is shutting down")]
    ShuttingDown,

    /// `CALL` target missing from the named trigger registry
    #[error("no trigger found for named trigger '{0}'")]
    TriggerNotFound(String),

    /// A trigger file could not be loaded
    #[error("failed to load {}: {source}", path.display())]
    ScriptLoad {
        path: PathBuf,
        source: Box<TriggerError>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    /// Global variable store rejected or failed a write
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TriggerError {
    /// Shorthand for [`TriggerError::Runtime`]
    pub fn runtime(message: impl Into<String>) -> Self {
        TriggerError::Runtime(message.into())
    }

    /// Whether this error was raised while parsing rather than running
    pub fn is_syntax(&self) -> bool {
        match self {
            TriggerError::Syntax(_) => true,
            TriggerError::ScriptLoad { source, .. } => source.is_syntax(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display_keeps_position() {
        let err: TriggerError = SyntaxError::new("Unexpected token", 3, 7).into();
        assert!(err.is_syntax());
        let s = err.to_string();
        assert!(s.contains("3:7"));
        assert!(s.contains("Unexpected token"));
    }

    #[test]
    fn test_unknown_command_display() {
        let err = TriggerError::UnknownCommand("DOESNOTEXIST".to_string());
        assert_eq!(err.to_string(), "unknown command: #DOESNOTEXIST");
        assert!(!err.is_syntax());
    }
}
