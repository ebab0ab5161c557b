//! `ce status`
//!
//! Read-only: takes no lock and changes nothing on disk. Supports JSON
//! output for programmatic use.

use anyhow::Result;
use ce_core::Config;
use ce_core::orchestrator::{Orchestrator, StatusReport};
use ce_core::session::SessionState;
use colored::Colorize;
use std::process::ExitCode;

use super::{Mark, header, section, step};

pub fn execute(json: bool, config: &Config) -> Result<ExitCode> {
    let report = Orchestrator::system(config).status();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_dashboard(&report);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_dashboard(report: &StatusReport) {
    header("Context Engine Status");
    println!("  {} {}", "Root:".bold(), report.root.display());

    section("Session");
    match &report.session {
        SessionState::Active { name } | SessionState::Archiving { name } => {
            step(Mark::Ok, format!("Active: {}", name.bold()));
            if let Some(session) = &report.descriptor {
                if !session.session_id.is_empty() {
                    println!("      id: {}", session.session_id);
                }
                if let Some(started) = session.started_at {
                    println!("      started: {}", started);
                }
            }
        }
        SessionState::NoSession => step(Mark::Idle, "No active session"),
    }

    section("Services");
    for service in &report.services {
        if service.running {
            let port = service
                .port
                .map(|p| format!(", port {}", p))
                .unwrap_or_default();
            let pid = service.pid.map(|p| format!("pid {}", p)).unwrap_or_default();
            step(
                Mark::Ok,
                format!("{}: running ({}{})", service.display_name, pid, port),
            );
            if service.port_bound == Some(false) {
                println!("      {}", "port has no listener".yellow());
            }
        } else {
            let mut line = format!("{}: stopped", service.display_name.dimmed());
            if let Some(pid) = service.pid {
                line.push_str(&format!(" (stale pid {})", pid));
            }
            if service.port_bound == Some(true) {
                line.push_str(", port held by another process");
            }
            step(Mark::Fail, line);
        }
    }

    if let Some(url) = &report.dashboard_url {
        println!();
        println!("  {} {}", "Dashboard:".bold(), url.blue());
    }

    section("Knowledge");
    if report.knowledge.is_empty() {
        step(Mark::Idle, "No knowledge files yet");
    }
    for stat in &report.knowledge {
        println!("    • {}: {} lines", stat.file, stat.lines);
    }
    println!();
}
