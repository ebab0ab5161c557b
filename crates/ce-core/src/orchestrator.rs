//! Lifecycle orchestrator: composes session and service operations into
//! the activate, deactivate and status commands.
//!
//! Each step reports its own outcome. A failing step never prevents the
//! remaining steps from running; only losing the instance lock aborts a
//! command.

use crate::config::Config;
use crate::error::Result;
use crate::hooks;
use crate::lock::InstanceLock;
use crate::port::{self, PortProbe, SystemPorts};
use crate::process::{ProcessControl, SystemProcesses};
use crate::service::{ServiceController, ServiceReport, ServiceStatus};
use crate::session::{
    ArchiveOutcome, CreateOutcome, SessionDescriptor, SessionManager, SessionState,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Knowledge documents summarized by `status`.
pub const KNOWLEDGE_FILES: [&str; 4] = ["patterns.md", "failures.md", "decisions.md", "gotchas.md"];

/// Outcome of `activate`.
#[derive(Debug)]
pub struct ActivateReport {
    pub session: Result<CreateOutcome>,
    pub services: Vec<ServiceReport>,
    /// Dashboard URL and whether it answered before the readiness deadline
    pub dashboard: Option<Dashboard>,
    pub hooks: Result<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub url: String,
    pub ready: bool,
}

impl ActivateReport {
    /// True when every declared service is running.
    pub fn success(&self) -> bool {
        self.services.iter().all(ServiceReport::success)
    }
}

/// Outcome of `deactivate`.
#[derive(Debug)]
pub struct DeactivateReport {
    pub archive: Result<ArchiveOutcome>,
    pub services: Vec<ServiceReport>,
}

impl DeactivateReport {
    pub fn success(&self) -> bool {
        self.services.iter().all(ServiceReport::success)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStat {
    pub file: String,
    pub lines: usize,
}

/// Read-only snapshot of the lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub root: PathBuf,
    pub session: SessionState,
    pub descriptor: Option<SessionDescriptor>,
    pub services: Vec<ServiceStatus>,
    /// Dashboard URL when its port has a listener
    pub dashboard_url: Option<String>,
    /// Line counts of the knowledge documents that exist
    pub knowledge: Vec<KnowledgeStat>,
}

impl StatusReport {
    pub fn any_running(&self) -> bool {
        self.services.iter().any(|s| s.running)
    }
}

fn dashboard_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

pub struct Orchestrator<'a, C = SystemProcesses, P = SystemPorts> {
    config: &'a Config,
    services: ServiceController<C, P>,
    session: SessionManager,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator acting on real processes, sockets and scripts.
    pub fn system(config: &'a Config) -> Self {
        Self::new(config, ServiceController::system(config), SessionManager::new(config))
    }
}

impl<'a, C: ProcessControl, P: PortProbe> Orchestrator<'a, C, P> {
    pub fn new(
        config: &'a Config,
        services: ServiceController<C, P>,
        session: SessionManager,
    ) -> Self {
        Self {
            config,
            services,
            session,
        }
    }

    pub fn services(&self) -> &ServiceController<C, P> {
        &self.services
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Create or confirm the session, start every service, wait for the
    /// dashboard and install hooks.
    pub fn activate(&self) -> Result<ActivateReport> {
        let _lock = InstanceLock::acquire(&self.config.lock_path())?;
        info!("Activating in {:?}", self.config.root);

        if let Err(e) = self.config.ensure_dirs() {
            warn!("Could not create state directories: {}", e);
        }

        let session = self.session.create();
        if let Err(e) = &session {
            warn!("Session creation failed: {}", e);
        }

        let services: Vec<ServiceReport> = self
            .config
            .services
            .iter()
            .map(|svc| self.services.start(svc))
            .collect();

        let dashboard = self.wait_for_dashboard(&services);

        let hooks = hooks::install(self.config);
        if let Err(e) = &hooks {
            warn!("Hook setup failed: {}", e);
        }

        Ok(ActivateReport {
            session,
            services,
            dashboard,
            hooks,
        })
    }

    fn wait_for_dashboard(&self, started: &[ServiceReport]) -> Option<Dashboard> {
        let port = self.config.dashboard_port()?;
        let name = &self.config.dashboard.service;
        let running = started.iter().any(|r| &r.service == name && r.success());

        let ready = running
            && port::wait_for_port(
                self.services.ports(),
                port,
                self.config.timing.readiness_attempts,
                self.config.timing.readiness_poll(),
            );
        if running && !ready {
            warn!("Dashboard did not bind port {} in time", port);
        }

        Some(Dashboard {
            url: dashboard_url(port),
            ready,
        })
    }

    /// Archive the session if one is active, then stop every service.
    pub fn deactivate(&self) -> Result<DeactivateReport> {
        let _lock = InstanceLock::acquire(&self.config.lock_path())?;
        info!("Deactivating in {:?}", self.config.root);

        let archive = self.session.archive();
        if let Err(e) = &archive {
            warn!("Session archive failed: {}", e);
        }

        let services = self
            .config
            .services
            .iter()
            .map(|svc| self.services.stop(svc))
            .collect();

        Ok(DeactivateReport { archive, services })
    }

    /// Aggregate session, service and knowledge state. Mutates nothing.
    pub fn status(&self) -> StatusReport {
        let services: Vec<ServiceStatus> = self
            .config
            .services
            .iter()
            .map(|svc| self.services.status(svc))
            .collect();

        let dashboard_url = services
            .iter()
            .find(|s| s.name == self.config.dashboard.service)
            .filter(|s| s.running && s.port_bound == Some(true))
            .and_then(|s| s.port)
            .map(dashboard_url);

        StatusReport {
            root: self.config.root.clone(),
            session: self.session.state(),
            descriptor: self.session.current(),
            services,
            dashboard_url,
            knowledge: self.knowledge_stats(),
        }
    }

    fn knowledge_stats(&self) -> Vec<KnowledgeStat> {
        let dir = self.config.knowledge_dir();
        KNOWLEDGE_FILES
            .iter()
            .filter_map(|file| {
                let content = fs::read_to_string(dir.join(file)).ok()?;
                Some(KnowledgeStat {
                    file: file.to_string(),
                    lines: content.lines().count(),
                })
            })
            .collect()
    }
}
