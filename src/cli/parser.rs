//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::build;

/// Audit job engine for insurance product documents
#[derive(Parser, Debug)]
#[command(name = "auditor-rs")]
#[command(about = "Audit job engine for insurance product documents")]
#[command(long_about = "
auditor-rs checks product documents against rule sets. It serves an HTTP API
for creating, tracking, cancelling and exporting audit jobs, and can run a
single job from the command line.

EXAMPLES:
    # Start the server with default configuration
    auditor-rs serve

    # Start server on custom host and port
    auditor-rs serve --host 0.0.0.0 --port 8080

    # Use custom configuration file
    auditor-rs --config /path/to/config.toml serve

    # Check configuration without starting server
    auditor-rs serve --dry-run

    # Audit two documents and save the results
    auditor-rs run --rule-set health-basic -d policy-001 -d policy-002 -o results.json
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Loads this single TOML file instead of the layered config directory.
    /// `AUDITOR_*` environment variables still apply on top of it.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_readable_file)]
    pub config: Option<PathBuf>,

    /// Override environment detection (selects config/<env>.toml)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    ///
    /// Examples:
    ///   auditor-rs serve                           # Start with defaults
    ///   auditor-rs serve --host 0.0.0.0 --port 80  # Bind to all interfaces on port 80
    ///   auditor-rs serve --dry-run                 # Validate config without starting
    Serve {
        /// Host address to bind to
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port number to listen on
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override; wins over --verbose and --quiet
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one synchronous audit job and print the finished job as JSON
    ///
    /// Examples:
    ///   auditor-rs run --rule-set health-basic -d policy-001
    ///   auditor-rs run --rule-set health-basic -d a -d b --concurrency 2 -o out.json
    Run {
        /// Rule set id from the catalog
        #[arg(long = "rule-set", value_name = "ID", value_parser = super::validation::validate_identifier)]
        rule_set: String,

        /// Document id from the catalog; repeat for several documents
        #[arg(
            short,
            long = "document",
            value_name = "ID",
            required = true,
            value_parser = super::validation::validate_identifier
        )]
        documents: Vec<String>,

        /// Worker count for this job
        #[arg(long, value_name = "N", value_parser = super::validation::validate_concurrency)]
        concurrency: Option<u32>,

        /// Job name shown in the output
        #[arg(long, value_name = "NAME", default_value = "cli-run")]
        name: String,

        /// Catalog file; overrides `catalog.path` from the configuration
        #[arg(long, value_name = "FILE", value_parser = super::validation::validate_readable_file)]
        catalog: Option<PathBuf>,

        /// Write the JSON export of the results to this file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "production", alias = "prod")]
    Production,
    #[value(name = "test")]
    Test,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    #[value(name = "error")]
    Error,
    #[value(name = "warn", alias = "warning")]
    Warn,
    #[value(name = "info")]
    Info,
    #[value(name = "debug")]
    Debug,
    #[value(name = "trace")]
    Trace,
}

impl Cli {
    /// Checks argument combinations clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Run { documents, .. }) = &self.command {
            let mut seen = std::collections::HashSet::new();
            for document in documents {
                if !seen.insert(document.as_str()) {
                    return Err(format!("Document '{}' is listed more than once", document));
                }
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Production => crate::config::Environment::Production,
            Environment::Test => crate::config::Environment::Test,
        }
    }
}
