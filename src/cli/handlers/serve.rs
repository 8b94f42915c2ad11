//! `serve`: start the HTTP server, or only check the configuration.

use crate::config::Settings;
use crate::server::Server;

pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            return self.validate_only();
        }
        Server::new(self.config).run().await
    }

    /// Validates the settings and prints what the server would do.
    pub fn validate_only(&self) -> anyhow::Result<()> {
        self.config.validate()?;

        println!("✓ Configuration is valid");
        println!("✓ Server would bind to: {}", self.config.server.address());
        match &self.config.catalog.path {
            Some(path) => println!("✓ Catalog file: {}", path),
            None => println!("! No catalog configured; rule set lookups will fail"),
        }
        println!(
            "✓ Concurrency: default {}, max {}",
            self.config.audit.default_concurrency, self.config.audit.max_concurrency
        );

        println!("Dry run completed successfully");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
