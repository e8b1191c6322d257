//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Executor and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Re-attempt failed steps automatically.
    #[serde(default)]
    pub auto_retry: bool,

    /// Retries allowed per step after its first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait before the first retry.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Growth factor applied to the wait on each further retry. 1.0 keeps it fixed.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for any single wait.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Pause and resume workflows left RUNNING by a previous process.
    #[serde(default = "default_true")]
    pub auto_recover: bool,

    /// Fields of the workflow input copied into the final result.
    #[serde(default = "default_result_echo_fields")]
    pub result_echo_fields: Vec<String>,
}

impl EngineConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_retry: false,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            auto_recover: default_true(),
            result_echo_fields: default_result_echo_fields(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

fn default_result_echo_fields() -> Vec<String> {
    ["migrationId", "projectKey", "source", "target"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Which state store backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// No external store; the in-process cache is the only copy.
    Memory,
    /// One JSON file per workflow.
    #[default]
    File,
    /// A single SQLite database.
    Sqlite,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreBackend::Memory => "memory",
            StoreBackend::File => "file",
            StoreBackend::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

/// State store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file store, database file for SQLite. `~` is expanded.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl StoreConfig {
    /// `path` with a leading `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".caravan")
        .join("state")
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines in the log file.
    #[serde(default)]
    pub json: bool,

    /// Directory for daily rotated log files. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
