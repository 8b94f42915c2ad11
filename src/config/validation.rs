//! Range and consistency checks for loaded settings.

use crate::config::error::ConfigError;
use crate::config::settings::{
    AuditConfig, CallbackConfig, CatalogConfig, LoggerSettings, ServerConfig, Settings,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

const VALID_ROTATIONS: &[&str] = &["never", "none", "hourly", "daily"];

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation("server.host", "Host cannot be empty."));
        }

        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_level = self.level.split(',').next().unwrap_or_default().trim().to_lowercase();
        if !VALID_LOG_LEVELS.contains(&base_level.as_str()) {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        if self.file.enabled {
            if !VALID_LOG_FORMATS.contains(&self.file.format.to_lowercase().as_str()) {
                return Err(ConfigError::validation(
                    "logger.file.format",
                    format!(
                        "Invalid log format '{}'. Valid formats are: {}",
                        self.file.format,
                        VALID_LOG_FORMATS.join(", ")
                    ),
                ));
            }

            if !VALID_ROTATIONS.contains(&self.file.rotation.to_lowercase().as_str()) {
                return Err(ConfigError::validation(
                    "logger.file.rotation",
                    format!(
                        "Invalid rotation '{}'. Valid values are: never, hourly, daily",
                        self.file.rotation
                    ),
                ));
            }

            if self.file.directory.trim().is_empty() {
                return Err(ConfigError::validation(
                    "logger.file.directory",
                    "Log directory cannot be empty when file output is enabled.",
                ));
            }
        }

        Ok(())
    }
}

impl CallbackConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::validation(
                "audit.callback.backoff_multiplier",
                "Backoff multiplier must be a finite number of at least 1.0.",
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::validation(
                "audit.callback.max_delay_ms",
                format!(
                    "Max delay ({}ms) cannot be lower than the initial delay ({}ms).",
                    self.max_delay_ms, self.initial_delay_ms
                ),
            ));
        }

        if self.timeout_seconds == 0 {
            return Err(ConfigError::validation(
                "audit.callback.timeout_seconds",
                "Callback timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::validation(
                "audit.max_concurrency",
                "Max concurrency must be greater than 0.",
            ));
        }

        if self.default_concurrency == 0 {
            return Err(ConfigError::validation(
                "audit.default_concurrency",
                "Default concurrency must be greater than 0.",
            ));
        }

        if self.default_concurrency > self.max_concurrency {
            return Err(ConfigError::validation(
                "audit.default_concurrency",
                format!(
                    "Default concurrency ({}) cannot exceed max concurrency ({}).",
                    self.default_concurrency, self.max_concurrency
                ),
            ));
        }

        self.callback.validate()
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            if path.trim().is_empty() {
                return Err(ConfigError::validation(
                    "catalog.path",
                    "Catalog path cannot be blank; omit it to start with an empty catalog.",
                ));
            }
        }
        Ok(())
    }
}

impl Settings {
    /// Returns the first validation error encountered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logger.validate()?;
        self.audit.validate()?;
        self.catalog.validate()?;
        Ok(())
    }
}
