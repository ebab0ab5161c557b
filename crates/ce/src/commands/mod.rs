//! Command implementations for the ce CLI.
//!
//! Each submodule runs one verb and prints a line per step.

pub mod activate;
pub mod deactivate;
pub mod doctor;
pub mod status;

use ce_core::service::{ServiceOutcome, ServiceReport, StartOutcome, StopOutcome};
use colored::Colorize;

/// Marker printed in front of a step line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Ok,
    Idle,
    Warn,
    Fail,
}

impl Mark {
    fn symbol(self) -> colored::ColoredString {
        match self {
            Mark::Ok => "✓".green(),
            Mark::Idle => "○".yellow(),
            Mark::Warn => "⚠".yellow(),
            Mark::Fail => "✗".red(),
        }
    }
}

pub fn header(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
    println!("{}", "─".repeat(50));
}

pub fn section(name: &str) {
    println!();
    println!("  {}", format!("{}:", name).cyan());
}

pub fn step(mark: Mark, text: impl AsRef<str>) {
    println!("    {} {}", mark.symbol(), text.as_ref());
}

/// One-line description of a service outcome.
pub fn describe(report: &ServiceReport) -> (Mark, String) {
    let name = &report.display_name;
    match &report.outcome {
        ServiceOutcome::Start(StartOutcome::AlreadyRunning { pid }) => {
            (Mark::Ok, format!("{}: already running (pid {})", name, pid))
        }
        ServiceOutcome::Start(StartOutcome::Started {
            pid,
            freed_port_holders,
        }) => {
            let mut line = format!("{}: started (pid {})", name, pid);
            if !freed_port_holders.is_empty() {
                let pids: Vec<String> = freed_port_holders.iter().map(u32::to_string).collect();
                line.push_str(&format!(", freed port from pid {}", pids.join(", ")));
            }
            (Mark::Ok, line)
        }
        ServiceOutcome::Start(StartOutcome::Exited { pid }) => (
            Mark::Fail,
            format!(
                "{}: exited during startup (pid {}), see {}",
                name,
                pid,
                report.log_file.display()
            ),
        ),
        ServiceOutcome::Start(StartOutcome::Failed { error }) => {
            (Mark::Fail, format!("{}: failed to start: {}", name, error))
        }
        ServiceOutcome::Stop(StopOutcome::NotRunning { stale_pid: None }) => {
            (Mark::Idle, format!("{}: not running", name))
        }
        ServiceOutcome::Stop(StopOutcome::NotRunning {
            stale_pid: Some(pid),
        }) => (
            Mark::Idle,
            format!("{}: not running (removed stale pid {})", name, pid),
        ),
        ServiceOutcome::Stop(StopOutcome::Stopped { pid, forced }) => {
            let how = if *forced { "killed" } else { "stopped" };
            (Mark::Ok, format!("{}: {} (pid {})", name, how, pid))
        }
        ServiceOutcome::Stop(StopOutcome::SignalFailed { pid, error }) => (
            Mark::Fail,
            format!("{}: could not signal pid {}: {}", name, pid, error),
        ),
    }
}

pub fn print_services(reports: &[ServiceReport]) {
    section("Services");
    for report in reports {
        let (mark, line) = describe(report);
        step(mark, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn report(outcome: ServiceOutcome) -> ServiceReport {
        ServiceReport {
            service: "web_ui".to_string(),
            display_name: "Web UI".to_string(),
            log_file: PathBuf::from("/m/.logs/web_ui.log"),
            outcome,
        }
    }

    #[test]
    fn test_describe_start_outcomes() {
        let (mark, line) = describe(&report(ServiceOutcome::Start(StartOutcome::Started {
            pid: 42,
            freed_port_holders: vec![7, 8],
        })));
        assert_eq!(mark, Mark::Ok);
        assert_eq!(line, "Web UI: started (pid 42), freed port from pid 7, 8");

        let (mark, line) = describe(&report(ServiceOutcome::Start(StartOutcome::Exited {
            pid: 42,
        })));
        assert_eq!(mark, Mark::Fail);
        assert!(line.ends_with("see /m/.logs/web_ui.log"));
    }

    #[test]
    fn test_describe_stop_outcomes() {
        let (mark, line) = describe(&report(ServiceOutcome::Stop(StopOutcome::NotRunning {
            stale_pid: Some(99999),
        })));
        assert_eq!(mark, Mark::Idle);
        assert_eq!(line, "Web UI: not running (removed stale pid 99999)");

        let (mark, line) = describe(&report(ServiceOutcome::Stop(StopOutcome::Stopped {
            pid: 42,
            forced: true,
        })));
        assert_eq!(mark, Mark::Ok);
        assert_eq!(line, "Web UI: killed (pid 42)");
    }
}
