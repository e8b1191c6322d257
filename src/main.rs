//! Caravan - resilient migration workflow engine.
//!
//! Main entry point for the Caravan CLI.

mod app;
mod cli;
mod commands;

use clap::Parser;
use tracing::warn;

use caravan_config::{ConfigLoader, ConfigValidator};

use crate::app::{App, init_tracing};
use crate::cli::{Cli, Commands};
use crate::commands::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(cli.config.as_deref())?;
    let warnings = ConfigValidator::validate(&config)?.into_result()?;

    init_tracing(&config.logging)?;
    for warning in &warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }

    let app = App::build(&config).await?;

    match cli.command {
        Commands::Run { create, retry } => cmd_run(&app, &create, &retry).await,
        Commands::Create { create } => cmd_create(&app, &create).await,
        Commands::Execute { id, retry } => cmd_execute(&app, &id, &retry).await,
        Commands::Status { id, format } => cmd_status(&app, &id, format).await,
        Commands::List {
            state,
            limit,
            offset,
            format,
        } => cmd_list(&app, state, limit, offset, format).await,
        Commands::Pause { id } => cmd_pause(&app, &id).await,
        Commands::Resume { id, retry } => cmd_resume(&app, &id, &retry).await,
        Commands::RetryStep { id, step } => cmd_retry_step(&app, &id, &step).await,
        Commands::SkipStep { id, step } => cmd_skip_step(&app, &id, &step).await,
        Commands::Recover { resume } => cmd_recover(&app, resume).await,
    }
}
