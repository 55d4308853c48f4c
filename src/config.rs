//! Configuration types for the trigger engine
//!
//! These types define the structure of the engine configuration loaded from
//! a TOML file. Every field has a default, so an empty file is valid.
//!
//! ```toml
//! [execution]
//! worker_threads = 4
//! activation_timeout_ms = 5000
//! default_sync = true
//!
//! [scripts]
//! directory = "triggers"
//! extension = "trg"
//! executors = "executors"
//! placeholders = "placeholders"
//!
//! [globals]
//! path = "var.json"
//! autosave_interval_ms = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::ExecutionMode;
use crate::error::{Result, TriggerError};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub execution: ExecutionConfig,
    pub scripts: ScriptsConfig,
    pub globals: GlobalsConfig,
}

/// Scheduling and limits of activations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Threads running asynchronous activations
    pub worker_threads: usize,
    /// Deadline for one activation, unbounded when absent
    pub activation_timeout_ms: Option<u64>,
    /// How long a worker waits on the main thread, forever when absent
    pub bridge_timeout_ms: Option<u64>,
    /// Mode of triggers that don't choose one
    pub default_sync: bool,
    /// Nested synchronous `#CALL`s allowed on one thread
    pub max_call_depth: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            activation_timeout_ms: None,
            bridge_timeout_ms: None,
            default_sync: true,
            max_call_depth: 64,
        }
    }
}

impl ExecutionConfig {
    pub fn activation_timeout(&self) -> Option<Duration> {
        self.activation_timeout_ms.map(Duration::from_millis)
    }

    pub fn bridge_timeout(&self) -> Option<Duration> {
        self.bridge_timeout_ms.map(Duration::from_millis)
    }

    pub fn default_mode(&self) -> ExecutionMode {
        ExecutionMode::from_sync_flag(self.default_sync)
    }
}

/// Where named trigger scripts live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub directory: PathBuf,
    /// File extension of trigger scripts, without the dot
    pub extension: String,
    /// Rhai scripts registered as executors
    pub executors: Option<PathBuf>,
    /// Rhai scripts registered as placeholders
    pub placeholders: Option<PathBuf>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("triggers"),
            extension: "trg".to_string(),
            executors: None,
            placeholders: None,
        }
    }
}

/// Global variable persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalsConfig {
    /// JSON file backing global variables, in-memory only when absent
    pub path: Option<PathBuf>,
    pub autosave_interval_ms: u64,
}

impl Default for GlobalsConfig {
    fn default() -> Self {
        Self {
            path: None,
            autosave_interval_ms: 1000,
        }
    }
}

impl GlobalsConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms.max(1))
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| TriggerError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&source)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| TriggerError::Config(e.to_string()))
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.execution.worker_threads = threads;
        self
    }

    pub fn with_activation_timeout(mut self, timeout: Duration) -> Self {
        self.execution.activation_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_globals_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.globals.path = Some(path.into());
        self
    }
}
