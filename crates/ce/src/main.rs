//! ce - Context Engine CLI
//!
//! Activates, deactivates and inspects the background services and the
//! working session of a project memory directory.

use anyhow::{Context, Result};
use ce_core::Config;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<ExitCode> {
    // Initialize tracing; step lines own stdout
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("ce=info".parse()?)
                .add_directive("ce_core=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration once; everything below borrows it
    let config = Config::load(cli.root).context("Failed to load configuration")?;

    match cli.command {
        Commands::Activate { no_browser } => commands::activate::execute(!no_browser, &config),
        Commands::Deactivate => commands::deactivate::execute(&config),
        Commands::Status { json } => commands::status::execute(json, &config),
        Commands::Doctor => commands::doctor::execute(&config),
    }
}
