//! Audit job engine for insurance product documents.
//!
//! Jobs pair a rule set with documents; each (document, rule) pair is a task
//! run on a bounded worker pool. Progress, results, cancellation, export and
//! completion callbacks are exposed through an HTTP API and a CLI.

use shadow_rs::shadow;
shadow!(build);

pub mod api;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod external;
pub mod logger;
pub mod server;
pub mod services;
pub mod state;
pub mod utils;

pub use state::AppState;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}
