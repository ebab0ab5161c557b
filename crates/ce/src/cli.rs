//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Context Engine lifecycle manager
///
/// Starts and stops background services and tracks the working session.
#[derive(Parser, Debug)]
#[command(name = "ce")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Memory directory (defaults to $PROJECT_MEMORY_DIR, then the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Create or confirm the session and start all services
    Activate {
        /// Do not open the dashboard in a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Archive the session and stop all services
    Deactivate,

    /// Show session, service and knowledge status
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Run diagnostics
    Doctor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_activate() {
        let cli = Cli::try_parse_from(["ce", "activate"]).unwrap();
        assert_eq!(cli.command, Commands::Activate { no_browser: false });
        assert!(cli.root.is_none());

        let cli = Cli::try_parse_from(["ce", "activate", "--no-browser"]).unwrap();
        assert_eq!(cli.command, Commands::Activate { no_browser: true });
    }

    #[test]
    fn test_parse_global_root() {
        let cli = Cli::try_parse_from(["ce", "status", "--root", "/tmp/mem", "--json"]).unwrap();
        assert_eq!(cli.command, Commands::Status { json: true });
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/mem")));

        let cli = Cli::try_parse_from(["ce", "--root", "/tmp/mem", "deactivate"]).unwrap();
        assert_eq!(cli.command, Commands::Deactivate);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/mem")));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(Cli::try_parse_from(["ce"]).is_err());
        assert!(Cli::try_parse_from(["ce", "restart"]).is_err());
        assert!(Cli::try_parse_from(["ce", "deactivate", "--no-browser"]).is_err());
    }

    #[test]
    fn test_parse_doctor() {
        let cli = Cli::try_parse_from(["ce", "doctor"]).unwrap();
        assert_eq!(cli.command, Commands::Doctor);
    }
}
