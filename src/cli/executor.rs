//! Dispatches a parsed command to its handler.

use super::handlers::{RunCommandHandler, RunRequest, ServeCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::Settings;
use crate::error::AppError;

/// Runs the selected subcommand; no subcommand means `serve`.
pub async fn execute_command(cli: &Cli, settings: Settings) -> anyhow::Result<()> {
    validate_command_args(cli)?;

    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await
        }
        None => ServeCommandHandler::new(settings).execute(false).await,
        Some(Commands::Run {
            rule_set,
            documents,
            concurrency,
            name,
            output,
            ..
        }) => {
            let request = RunRequest {
                name: name.clone(),
                rule_set_id: rule_set.clone(),
                document_ids: documents.clone(),
                concurrency: *concurrency,
                output: output.clone(),
            };
            RunCommandHandler::new(settings, request).execute().await?;
            Ok(())
        }
    }
}

fn validate_command_args(cli: &Cli) -> Result<(), AppError> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })?;

    if let Some(Commands::Serve {
        host: Some(host),
        port: Some(port),
        ..
    }) = &cli.command
    {
        if *port < 1024 && host == "0.0.0.0" {
            tracing::warn!(port, "Binding to 0.0.0.0 on a privileged port usually requires root");
        }
    }

    Ok(())
}
