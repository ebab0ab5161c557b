//! `ce deactivate`

use anyhow::{Context, Result};
use ce_core::Config;
use ce_core::orchestrator::Orchestrator;
use ce_core::session::ArchiveOutcome;
use colored::Colorize;
use std::process::ExitCode;

use super::{Mark, header, print_services, section, step};

pub fn execute(config: &Config) -> Result<ExitCode> {
    header("Context Engine Deactivating");

    let orchestrator = Orchestrator::system(config);
    let report = orchestrator.deactivate().context("Deactivation aborted")?;

    section("Session");
    match &report.archive {
        Ok(ArchiveOutcome::NoSession) => step(Mark::Idle, "No active session to archive"),
        Ok(ArchiveOutcome::Archived {
            name,
            location,
            summary,
        }) => {
            match location {
                Some(dir) => step(
                    Mark::Ok,
                    format!("Archived {} to {}", name.bold(), dir.display()),
                ),
                None => step(Mark::Ok, format!("Archived {}", name.bold())),
            }
            match summary {
                Some(path) => step(Mark::Ok, format!("Summary: {}", path.display())),
                None => step(Mark::Idle, "No summary generated"),
            }
        }
        Err(e) => step(Mark::Warn, format!("Archive failed: {}", e)),
    }

    print_services(&report.services);

    println!();
    println!("{}", "─".repeat(50));
    println!("{}", "✓ Context Engine Deactivated".green().bold());
    println!("  Knowledge preserved in {}", config.knowledge_dir().display());
    println!();
    println!("  {}", "Run `ce activate` to start a new session".cyan());

    Ok(ExitCode::SUCCESS)
}
