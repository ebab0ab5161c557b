//! `ce activate`

use anyhow::{Context, Result};
use ce_core::Config;
use ce_core::orchestrator::{ActivateReport, Orchestrator};
use ce_core::session::CreateOutcome;
use colored::Colorize;
use std::process::{Command, ExitCode, Stdio};
use tracing::{debug, warn};

use super::{Mark, header, print_services, section, step};

pub fn execute(open_browser: bool, config: &Config) -> Result<ExitCode> {
    header("Context Engine Activating");

    let orchestrator = Orchestrator::system(config);
    let report = orchestrator.activate().context("Activation aborted")?;

    print_session(&report);
    print_services(&report.services);

    section("Hooks");
    match &report.hooks {
        Ok(path) => step(Mark::Ok, format!("Error auto-capture: {}", path.display())),
        Err(e) => step(Mark::Warn, format!("Hook setup failed: {}", e)),
    }

    println!();
    println!("{}", "─".repeat(50));
    if !report.success() {
        println!("{}", "✗ Some services failed".red().bold());
        println!("  Check logs in {}", config.logs_dir().display());
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", "✓ Context Engine Active".green().bold());
    if let Some(dashboard) = &report.dashboard {
        println!("  {} {}", "Dashboard:".bold(), dashboard.url.blue());
        if !dashboard.ready {
            println!("  {}", "(not answering yet)".yellow());
        }
    }
    if let Some(name) = report.session.as_ref().ok().map(CreateOutcome::name) {
        println!("  {} {}", "Session:".bold(), name);
    }
    println!("  {} {}", "Logs:".bold(), config.logs_dir().display());
    println!();
    println!("  {}", "Run `ce deactivate` when done".yellow());

    if open_browser {
        if let Some(dashboard) = report.dashboard.as_ref().filter(|d| d.ready) {
            launch_browser(&dashboard.url);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_session(report: &ActivateReport) {
    section("Session");
    match &report.session {
        Ok(CreateOutcome::Existing(name)) => {
            step(Mark::Ok, format!("Active session: {}", name.bold()))
        }
        Ok(CreateOutcome::Created(session)) => step(
            Mark::Ok,
            format!("Created session: {} ({})", session.name.bold(), session.session_id),
        ),
        Err(e) => step(Mark::Warn, format!("No session: {}", e)),
    }
}

/// Open `url` with the platform opener. Failure only warns.
fn launch_browser(url: &str) {
    let Some(opener) = ["xdg-open", "open"]
        .iter()
        .find_map(|cmd| which::which(cmd).ok())
    else {
        warn!("No browser opener found; visit {}", url);
        return;
    };

    match Command::new(&opener)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => debug!("Opened {} with {:?}", url, opener),
        Err(e) => warn!("Could not open browser: {}", e),
    }
}
