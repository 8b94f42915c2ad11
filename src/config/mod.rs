//! Configuration management.
//!
//! See [`loader`] for the layering rules.

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    ApplicationConfig, AuditConfig, CallbackConfig, CatalogConfig, LoggerSettings, ServerConfig,
    Settings,
};
