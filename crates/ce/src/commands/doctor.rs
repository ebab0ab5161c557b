//! Diagnostics command.

use anyhow::Result;
use ce_core::Config;
use ce_core::lock::InstanceLock;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub fn execute(config: &Config) -> Result<ExitCode> {
    println!("{}", "ce Doctor".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    let mut issues = Vec::new();

    // Required tools
    for (tool, purpose) in [
        ("git", "session naming falls back to the project name"),
        ("lsof", "busy ports cannot be freed"),
        ("bash", "collaborator scripts cannot run"),
    ] {
        print!("  {}: ", tool);
        match which::which(tool) {
            Ok(_) => println!("{}", "✓ installed".green()),
            Err(_) => {
                println!("{}", "✗ not found".red());
                issues.push(format!("{} is not installed ({})", tool, purpose));
            }
        }
    }

    // Config file
    print!("  Config file: ");
    let config_path = Config::config_path(&config.root);
    if config_path.exists() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    // Root directory
    print!("  Root ({}): ", config.root.display());
    if config.root.is_dir() {
        println!("{}", "✓ exists".green());
    } else {
        println!("{}", "✗ missing".red());
        issues.push(format!("root directory {} does not exist", config.root.display()));
    }

    // Instance lock
    print!("  Instance lock: ");
    match InstanceLock::is_held(&config.lock_path()) {
        Ok(false) => println!("{}", "✓ free".green()),
        Ok(true) => println!("{}", "○ held by another ce invocation".yellow()),
        Err(e) => println!("{}", format!("○ cannot check: {}", e).yellow()),
    }

    // Collaborators
    println!();
    println!("  {}", "Collaborators:".cyan());
    let summarizer = config.summarizer_command();
    let summarizer_script = summarizer.get(1).map(PathBuf::from);
    for (name, path) in [
        ("init script", Some(config.init_script())),
        ("archive script", Some(config.archive_script())),
        ("summarizer", summarizer_script),
    ] {
        let Some(path) = path else { continue };
        print!("    {}: ", name);
        if path.is_file() {
            println!("{}", "✓ found".green());
        } else {
            let note = format!("○ {} not found (built-in fallback)", path.display());
            println!("{}", note.yellow());
        }
    }

    // Services
    println!();
    println!("  {}", "Services:".cyan());
    for service in &config.services {
        print!("    {}: ", service.label());
        let program = service.command.first().map(String::as_str).unwrap_or_default();
        if program_available(program, &config.root) {
            println!("{}", format!("✓ {}", program).green());
        } else {
            println!("{}", format!("✗ {} not found", program).red());
            issues.push(format!("{} cannot be started: {} not found", service.label(), program));
        }
    }
    if config.service(&config.dashboard.service).is_none() {
        issues.push(format!(
            "dashboard service {} is not declared",
            config.dashboard.service
        ));
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("{}", "✓ All checks passed".green().bold());
    } else {
        println!("{}", format!("✗ {} issue(s) found:", issues.len()).red().bold());
        for issue in &issues {
            println!("  • {}", issue);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Whether `program` resolves on PATH or relative to the root.
fn program_available(program: &str, root: &Path) -> bool {
    if program.is_empty() {
        return false;
    }
    if program.contains('/') {
        return root.join(program).is_file();
    }
    which::which(program).is_ok()
}
