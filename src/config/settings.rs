//! Configuration settings loaded from TOML files and `AUDITOR_*` variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::{JobLimits, RetryPolicy};
use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig, Rotation};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "auditor-rs".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_file_name() -> String {
    "auditor.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

fn default_concurrency() -> u32 {
    5
}

fn default_max_concurrency() -> u32 {
    32
}

fn default_retain_finished_jobs() -> usize {
    1000
}

fn default_callback_max_retries() -> u32 {
    3
}

fn default_callback_initial_delay_ms() -> u64 {
    500
}

fn default_callback_backoff_multiplier() -> f64 {
    2.0
}

fn default_callback_max_delay_ms() -> u64 {
    30_000
}

fn default_callback_timeout_seconds() -> u64 {
    10
}

// ============================================================================
// Application / Server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

/// Axum HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Synchronous job creation is bounded by it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl ServerConfig {
    /// "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_directory")]
    pub directory: String,

    #[serde(default = "default_log_file_name")]
    pub file_name: String,

    /// "full", "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// "never", "hourly" or "daily"
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_log_directory(),
            file_name: default_log_file_name(),
            format: default_log_format(),
            rotation: default_log_rotation(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Converts the file representation into the runtime `LoggerConfig`.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", e.to_string()))
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;
        let rotation = self
            .rotation
            .parse::<Rotation>()
            .map_err(|e| ConfigError::validation("logger.file.rotation", e.to_string()))?;

        Ok(FileConfig {
            enabled: self.enabled,
            directory: PathBuf::from(self.directory),
            file_name: self.file_name,
            format,
            rotation,
        })
    }
}

// ============================================================================
// Audit engine
// ============================================================================

/// Retry policy for job-completion callbacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackConfig {
    #[serde(default = "default_callback_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_callback_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_callback_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_callback_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-attempt HTTP timeout
    #[serde(default = "default_callback_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            max_retries: default_callback_max_retries(),
            initial_delay_ms: default_callback_initial_delay_ms(),
            backoff_multiplier: default_callback_backoff_multiplier(),
            max_delay_ms: default_callback_max_delay_ms(),
            timeout_seconds: default_callback_timeout_seconds(),
        }
    }
}

impl CallbackConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Used when a request does not name a concurrency
    #[serde(default = "default_concurrency")]
    pub default_concurrency: u32,

    /// Requested concurrency above this is capped
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Per-evaluation timeout; 0 disables it
    #[serde(default)]
    pub task_timeout_seconds: u64,

    /// Finished jobs kept in memory; 0 keeps all of them
    #[serde(default = "default_retain_finished_jobs")]
    pub retain_finished_jobs: usize,

    #[serde(default)]
    pub callback: CallbackConfig,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_concurrency: default_concurrency(),
            max_concurrency: default_max_concurrency(),
            task_timeout_seconds: 0,
            retain_finished_jobs: default_retain_finished_jobs(),
            callback: CallbackConfig::default(),
        }
    }
}

impl AuditConfig {
    pub fn job_limits(&self) -> JobLimits {
        JobLimits {
            default_concurrency: self.default_concurrency,
            max_concurrency: self.max_concurrency,
            retain_finished: self.retain_finished_jobs,
        }
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        (self.task_timeout_seconds > 0).then(|| Duration::from_secs(self.task_timeout_seconds))
    }
}

/// Source of rule sets and documents for the built-in catalog
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog file; an empty catalog is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ============================================================================
// Main Settings Structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}
