//! Configuration management for Context Engine.
//!
//! Configuration is resolved once per invocation and passed by reference
//! into every lifecycle component. Sources, in order of precedence:
//! 1. Explicit root (`--root`) or `PROJECT_MEMORY_DIR`
//! 2. Config file (`CE_CONFIG` or `<root>/ce.toml`)
//! 3. Default values
//!
//! Layout under the root:
//! ```text
//! <root>/
//! ├── ce.toml               # Optional configuration
//! ├── .ce.lock              # Instance lock (activate/deactivate)
//! ├── .pids/<service>.pid   # Process registry
//! ├── .logs/<service>.log   # Combined stdout/stderr per service
//! ├── active/task_plan.md   # Session marker
//! ├── archive/<date>_<name> # Archived sessions
//! ├── knowledge/            # Knowledge base (read for status only)
//! └── scripts/              # External collaborators
//! ```

use crate::error::{Error, Result};
use crate::service::ServiceDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable carrying the root path (also exported to collaborators).
pub const ROOT_ENV: &str = "PROJECT_MEMORY_DIR";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "CE_CONFIG";

const CONFIG_FILE_NAME: &str = "ce.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory all persisted state is relative to
    #[serde(skip)]
    pub root: PathBuf,

    /// Path overrides
    #[serde(default)]
    pub paths: PathsConfig,

    /// Settle, polling and timeout intervals
    #[serde(default)]
    pub timing: TimingConfig,

    /// External collaborator scripts
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,

    /// Dashboard settings
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Declared services, started in order. An empty list selects the
    /// default services under the scripts directory.
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// VCS working copy used for session naming (default: parent of root)
    pub project_dir: Option<PathBuf>,

    /// Directory holding collaborator scripts (default: `<root>/scripts`)
    pub scripts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay after spawning before liveness is confirmed
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Interval between liveness polls after SIGTERM
    #[serde(default = "default_stop_poll_ms")]
    pub stop_poll_ms: u64,

    /// Polls before escalating to SIGKILL
    #[serde(default = "default_stop_poll_attempts")]
    pub stop_poll_attempts: u32,

    /// Delay after signalling port holders
    #[serde(default = "default_port_release_ms")]
    pub port_release_ms: u64,

    /// Connect timeout for the port probe
    #[serde(default = "default_port_probe_timeout_ms")]
    pub port_probe_timeout_ms: u64,

    /// Interval between dashboard readiness probes
    #[serde(default = "default_readiness_poll_ms")]
    pub readiness_poll_ms: u64,

    /// Dashboard readiness probes before giving up
    #[serde(default = "default_readiness_attempts")]
    pub readiness_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    /// Session-init script, relative to the scripts directory
    #[serde(default = "default_init_script")]
    pub init_script: PathBuf,

    /// Archive script, relative to the scripts directory
    #[serde(default = "default_archive_script")]
    pub archive_script: PathBuf,

    /// Summary generator command; the second element is resolved against
    /// the scripts directory when relative
    #[serde(default = "default_summarizer")]
    pub summarizer: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Service whose port serves the dashboard
    #[serde(default = "default_dashboard_service")]
    pub service: String,
}

// Default value functions
fn default_settle_ms() -> u64 {
    500
}

fn default_stop_poll_ms() -> u64 {
    100
}

fn default_stop_poll_attempts() -> u32 {
    10
}

fn default_port_release_ms() -> u64 {
    500
}

fn default_port_probe_timeout_ms() -> u64 {
    200
}

fn default_readiness_poll_ms() -> u64 {
    500
}

fn default_readiness_attempts() -> u32 {
    20
}

fn default_init_script() -> PathBuf {
    PathBuf::from("init-session.sh")
}

fn default_archive_script() -> PathBuf {
    PathBuf::from("archive-task.sh")
}

fn default_summarizer() -> Vec<String> {
    ["python3", "session_summarizer.py", "--format", "yaml"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_dashboard_service() -> String {
    "web_ui".to_string()
}

fn default_services(scripts_dir: &Path) -> Vec<ServiceDescriptor> {
    let script = |name: &str| scripts_dir.join(name).to_string_lossy().to_string();
    vec![
        ServiceDescriptor {
            name: "web_ui".to_string(),
            display_name: "Web UI".to_string(),
            command: vec!["python3".to_string(), script("web_ui/server.py")],
            port: Some(8765),
        },
        ServiceDescriptor {
            name: "file_watcher".to_string(),
            display_name: "File Watcher".to_string(),
            command: vec![
                "bash".to_string(),
                script("daemon-extract-learnings.sh"),
                "--watch".to_string(),
            ],
            port: None,
        },
    ]
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            stop_poll_ms: default_stop_poll_ms(),
            stop_poll_attempts: default_stop_poll_attempts(),
            port_release_ms: default_port_release_ms(),
            port_probe_timeout_ms: default_port_probe_timeout_ms(),
            readiness_poll_ms: default_readiness_poll_ms(),
            readiness_attempts: default_readiness_attempts(),
        }
    }
}

impl TimingConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn stop_poll(&self) -> Duration {
        Duration::from_millis(self.stop_poll_ms)
    }

    pub fn port_release(&self) -> Duration {
        Duration::from_millis(self.port_release_ms)
    }

    pub fn port_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.port_probe_timeout_ms)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    /// Zero-delay timing for tests.
    #[cfg(test)]
    pub(crate) fn immediate() -> Self {
        Self {
            settle_ms: 0,
            stop_poll_ms: 0,
            stop_poll_attempts: 3,
            port_release_ms: 0,
            port_probe_timeout_ms: 50,
            readiness_poll_ms: 0,
            readiness_attempts: 1,
        }
    }
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            init_script: default_init_script(),
            archive_script: default_archive_script(),
            summarizer: default_summarizer(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            service: default_dashboard_service(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            root: root.into(),
            paths: PathsConfig::default(),
            timing: TimingConfig::default(),
            collaborators: CollaboratorsConfig::default(),
            dashboard: DashboardConfig::default(),
            services: Vec::new(),
        };
        config.services = default_services(&config.scripts_dir());
        config
    }

    /// Resolve the root directory: explicit value, then `PROJECT_MEMORY_DIR`,
    /// then the current directory.
    pub fn resolve_root(explicit: Option<PathBuf>) -> PathBuf {
        let root = explicit
            .or_else(|| std::env::var_os(ROOT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        root.canonicalize().unwrap_or(root)
    }

    /// Get the config file path for a root.
    pub fn config_path(root: &Path) -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => root.join(CONFIG_FILE_NAME),
        }
    }

    /// Load configuration for the resolved root.
    pub fn load(explicit_root: Option<PathBuf>) -> Result<Self> {
        let root = Self::resolve_root(explicit_root);
        Self::load_from(&root, &Self::config_path(&root))
    }

    /// Load configuration from a specific file; a missing file yields defaults.
    pub fn load_from(root: &Path, config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str::<Config>(&content).map_err(|source| Error::ConfigParse {
                path: config_path.to_path_buf(),
                source,
            })?
        } else {
            Config::for_root(root)
        };
        config.root = root.to_path_buf();
        if config.services.is_empty() {
            config.services = default_services(&config.scripts_dir());
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject declarations the lifecycle components cannot act on.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                return Err(Error::Config("service with empty name".to_string()));
            }
            if !seen.insert(service.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate service name: {}",
                    service.name
                )));
            }
            if service.command.is_empty() {
                return Err(Error::EmptyCommand {
                    service: service.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn pids_dir(&self) -> PathBuf {
        self.root.join(".pids")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(".logs")
    }

    pub fn active_dir(&self) -> PathBuf {
        self.root.join("active")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join("archive")
    }

    pub fn knowledge_dir(&self) -> PathBuf {
        self.root.join("knowledge")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".ce.lock")
    }

    pub fn log_file(&self, service: &str) -> PathBuf {
        self.logs_dir().join(format!("{}.log", service))
    }

    pub fn scripts_dir(&self) -> PathBuf {
        match &self.paths.scripts_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.join("scripts"),
        }
    }

    /// Working copy inspected for branch and remote names.
    pub fn project_dir(&self) -> PathBuf {
        match &self.paths.project_dir {
            Some(dir) => self.root.join(dir),
            None => self
                .root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone()),
        }
    }

    pub fn init_script(&self) -> PathBuf {
        self.scripts_dir().join(&self.collaborators.init_script)
    }

    pub fn archive_script(&self) -> PathBuf {
        self.scripts_dir().join(&self.collaborators.archive_script)
    }

    /// Summary generator command with its script resolved.
    pub fn summarizer_command(&self) -> Vec<String> {
        let mut command = self.collaborators.summarizer.clone();
        if let Some(script) = command.get_mut(1) {
            let path = Path::new(script.as_str());
            if path.is_relative() && !script.starts_with('-') {
                *script = self.scripts_dir().join(path).to_string_lossy().to_string();
            }
        }
        command
    }

    /// Look up a declared service.
    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Port of the dashboard service, if declared with one.
    pub fn dashboard_port(&self) -> Option<u16> {
        self.service(&self.dashboard.service).and_then(|s| s.port)
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.pids_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.active_dir())?;
        Ok(())
    }
}
