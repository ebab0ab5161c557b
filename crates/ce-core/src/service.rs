//! Service controller: idempotent start/stop of named background services.
//!
//! ```text
//! start                                stop
//!   │                                    │
//!   ├─► recorded pid alive? ─► done      ├─► no live pid? ─► drop record, done
//!   │                                    │
//!   ├─► port bound? ─► free it           ├─► SIGTERM
//!   │                                    │
//!   ├─► spawn detached, log truncated    ├─► poll liveness (bounded)
//!   │                                    │
//!   ├─► record pid                       ├─► still alive? ─► SIGKILL
//!   │                                    │
//!   └─► settle, confirm liveness         └─► drop record
//! ```
//!
//! Neither operation returns an error for expected conditions; callers get
//! a [`ServiceReport`] and continue with sibling services.

use crate::config::{Config, TimingConfig};
use crate::error::Result;
use crate::port::{self, PortProbe, SystemPorts};
use crate::process::{ProcessControl, Signal, SystemProcesses};
use crate::registry::PidRegistry;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Static description of a managed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Unique key, used for pid and log file names
    pub name: String,

    /// Human-readable name
    #[serde(default)]
    pub display_name: String,

    /// Argument vector to execute
    pub command: Vec<String>,

    /// TCP port the service is expected to bind
    #[serde(default)]
    pub port: Option<u16>,
}

impl ServiceDescriptor {
    /// Display name, falling back to the key.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The recorded process is alive; nothing was spawned.
    AlreadyRunning { pid: u32 },
    /// Spawned and still alive after the settle window.
    Started {
        pid: u32,
        /// Processes terminated to free the configured port
        freed_port_holders: Vec<u32>,
    },
    /// Spawned but gone before the settle window elapsed.
    Exited { pid: u32 },
    /// Could not prepare the log file, spawn or record the process.
    Failed { error: String },
}

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No live process; any stale record was dropped.
    NotRunning { stale_pid: Option<u32> },
    /// The process exited; `forced` if SIGKILL was needed.
    Stopped { pid: u32, forced: bool },
    /// Signal delivery failed. The record was dropped regardless.
    SignalFailed { pid: u32, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    Start(StartOutcome),
    Stop(StopOutcome),
}

/// Per-service outcome line.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub service: String,
    pub display_name: String,
    pub log_file: PathBuf,
    pub outcome: ServiceOutcome,
}

impl ServiceReport {
    pub fn success(&self) -> bool {
        match &self.outcome {
            ServiceOutcome::Start(outcome) => matches!(
                outcome,
                StartOutcome::AlreadyRunning { .. } | StartOutcome::Started { .. }
            ),
            ServiceOutcome::Stop(outcome) => !matches!(outcome, StopOutcome::SignalFailed { .. }),
        }
    }

    /// Pid the outcome refers to, if any.
    pub fn pid(&self) -> Option<u32> {
        match &self.outcome {
            ServiceOutcome::Start(StartOutcome::AlreadyRunning { pid })
            | ServiceOutcome::Start(StartOutcome::Started { pid, .. })
            | ServiceOutcome::Start(StartOutcome::Exited { pid })
            | ServiceOutcome::Stop(StopOutcome::Stopped { pid, .. })
            | ServiceOutcome::Stop(StopOutcome::SignalFailed { pid, .. }) => Some(*pid),
            _ => None,
        }
    }
}

/// Read-only view of a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub display_name: String,
    pub pid: Option<u32>,
    pub running: bool,
    pub port: Option<u16>,
    /// Whether the configured port has a listener (`None` without a port)
    pub port_bound: Option<bool>,
    pub log_file: PathBuf,
}

/// Starts and stops services using the pid registry and port resolver.
pub struct ServiceController<C = SystemProcesses, P = SystemPorts> {
    registry: PidRegistry,
    logs_dir: PathBuf,
    workdir: PathBuf,
    timing: TimingConfig,
    procs: C,
    ports: P,
}

impl ServiceController<SystemProcesses, SystemPorts> {
    /// Controller backed by real processes and sockets.
    pub fn system(config: &Config) -> Self {
        Self::new(
            config,
            SystemProcesses::new(&config.root),
            SystemPorts::new(config.timing.port_probe_timeout()),
        )
    }
}

impl<C: ProcessControl, P: PortProbe> ServiceController<C, P> {
    pub fn new(config: &Config, procs: C, ports: P) -> Self {
        Self {
            registry: PidRegistry::new(config.pids_dir()),
            logs_dir: config.logs_dir(),
            workdir: config.root.clone(),
            timing: config.timing.clone(),
            procs,
            ports,
        }
    }

    pub fn registry(&self) -> &PidRegistry {
        &self.registry
    }

    pub fn procs(&self) -> &C {
        &self.procs
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn log_file(&self, service: &str) -> PathBuf {
        self.logs_dir.join(format!("{}.log", service))
    }

    /// Start `service` unless its recorded process is alive.
    pub fn start(&self, service: &ServiceDescriptor) -> ServiceReport {
        let outcome = match self.try_start(service) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to start {}: {}", service.name, e);
                StartOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        self.report(service, ServiceOutcome::Start(outcome))
    }

    fn try_start(&self, service: &ServiceDescriptor) -> Result<StartOutcome> {
        if let Some(pid) = self.registry.read_pid(&service.name) {
            if self.procs.is_alive(pid) {
                info!("{} already running (pid {})", service.name, pid);
                return Ok(StartOutcome::AlreadyRunning { pid });
            }
            debug!("Stale pid {} recorded for {}", pid, service.name);
        }

        let mut freed_port_holders = Vec::new();
        if let Some(port) = service.port {
            if self.ports.is_bound(port) {
                warn!("Port {} busy before starting {}; freeing it", port, service.name);
                freed_port_holders =
                    port::free_port(&self.ports, &self.procs, port, self.timing.port_release());
            }
        }

        fs::create_dir_all(&self.logs_dir)?;
        let log_path = self.log_file(&service.name);
        let log = File::create(&log_path)?;

        let pid = self.procs.spawn_detached(&service.command, &self.workdir, log)?;
        if let Err(e) = self.registry.write_pid(&service.name, pid) {
            // Without a record the process could never be stopped by us.
            let _ = self.procs.send_signal(pid, Signal::Terminate);
            return Err(e);
        }

        std::thread::sleep(self.timing.settle());

        if self.procs.is_alive(pid) {
            info!("{} started (pid {})", service.name, pid);
            Ok(StartOutcome::Started {
                pid,
                freed_port_holders,
            })
        } else {
            warn!("{} exited during settle window; see {:?}", service.name, log_path);
            Ok(StartOutcome::Exited { pid })
        }
    }

    /// Stop `service`, escalating to SIGKILL after the bounded poll.
    pub fn stop(&self, service: &ServiceDescriptor) -> ServiceReport {
        let outcome = self.stop_outcome(service);
        self.report(service, ServiceOutcome::Stop(outcome))
    }

    fn stop_outcome(&self, service: &ServiceDescriptor) -> StopOutcome {
        let pid = match self.registry.read_pid(&service.name) {
            Some(pid) if self.procs.is_alive(pid) => pid,
            stale_pid => {
                self.drop_record(&service.name);
                return StopOutcome::NotRunning { stale_pid };
            }
        };

        if let Err(e) = self.procs.send_signal(pid, Signal::Terminate) {
            warn!("Could not send SIGTERM to {} (pid {}): {}", service.name, pid, e);
            self.drop_record(&service.name);
            return StopOutcome::SignalFailed {
                pid,
                error: e.to_string(),
            };
        }

        let mut forced = false;
        if !self.wait_for_exit(pid) {
            warn!(
                "{} (pid {}) ignored SIGTERM after {} polls; sending SIGKILL",
                service.name, pid, self.timing.stop_poll_attempts
            );
            if let Err(e) = self.procs.send_signal(pid, Signal::Kill) {
                self.drop_record(&service.name);
                return StopOutcome::SignalFailed {
                    pid,
                    error: e.to_string(),
                };
            }
            forced = true;
        }

        self.drop_record(&service.name);
        info!("{} stopped (pid {})", service.name, pid);
        StopOutcome::Stopped { pid, forced }
    }

    /// Poll liveness `stop_poll_attempts` times; true once the process is gone.
    fn wait_for_exit(&self, pid: u32) -> bool {
        for _ in 0..self.timing.stop_poll_attempts {
            if !self.procs.is_alive(pid) {
                return true;
            }
            std::thread::sleep(self.timing.stop_poll());
        }
        false
    }

    fn drop_record(&self, service: &str) {
        if let Err(e) = self.registry.remove_pid(service) {
            warn!("Could not remove pid record for {}: {}", service, e);
        }
    }

    /// Liveness and port state of `service`. Mutates nothing.
    pub fn status(&self, service: &ServiceDescriptor) -> ServiceStatus {
        let pid = self.registry.read_pid(&service.name);
        let running = pid.is_some_and(|pid| self.procs.is_alive(pid));
        ServiceStatus {
            name: service.name.clone(),
            display_name: service.label().to_string(),
            pid,
            running,
            port: service.port,
            port_bound: service.port.map(|port| self.ports.is_bound(port)),
            log_file: self.log_file(&service.name),
        }
    }

    fn report(&self, service: &ServiceDescriptor, outcome: ServiceOutcome) -> ServiceReport {
        ServiceReport {
            service: service.name.clone(),
            display_name: service.label().to_string(),
            log_file: self.log_file(&service.name),
            outcome,
        }
    }
}
