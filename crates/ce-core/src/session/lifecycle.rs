//! Session lifecycle: NoSession → Active → Archiving → NoSession.

use super::collaborators::{
    self, ScriptSummaryGenerator, SessionArchiver, SessionInitializer, SummaryGenerator,
};
use super::marker::{self, MARKER_FILE, SessionDescriptor};
use crate::config::Config;
use crate::error::Result;
use crate::git;
use chrono::Local;
use serde::Serialize;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    Active { name: String },
    /// Transient, only while `archive()` runs.
    Archiving { name: String },
}

impl SessionState {
    pub fn name(&self) -> Option<&str> {
        match self {
            SessionState::NoSession => None,
            SessionState::Active { name } | SessionState::Archiving { name } => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A well-formed marker already existed; nothing was written.
    Existing(String),
    Created(SessionDescriptor),
}

impl CreateOutcome {
    pub fn name(&self) -> &str {
        match self {
            CreateOutcome::Existing(name) => name,
            CreateOutcome::Created(session) => &session.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// No active session; nothing to do.
    NoSession,
    Archived {
        name: String,
        /// Archive directory, when the archiver reports one
        location: Option<PathBuf>,
        /// Summary document, if the generator produced one
        summary: Option<PathBuf>,
    },
}

/// Drives session transitions over the active-session directory.
pub struct SessionManager {
    active_dir: PathBuf,
    project_dir: PathBuf,
    initializer: Box<dyn SessionInitializer>,
    archiver: Box<dyn SessionArchiver>,
    summarizer: Box<dyn SummaryGenerator>,
    archiving: RefCell<Option<String>>,
}

impl SessionManager {
    /// Manager with collaborators selected by probing for their scripts.
    pub fn new(config: &Config) -> Self {
        Self::with_collaborators(
            config,
            collaborators::initializer(config),
            collaborators::archiver(config),
            Box::new(ScriptSummaryGenerator::from_config(config)),
        )
    }

    pub fn with_collaborators(
        config: &Config,
        initializer: Box<dyn SessionInitializer>,
        archiver: Box<dyn SessionArchiver>,
        summarizer: Box<dyn SummaryGenerator>,
    ) -> Self {
        Self {
            active_dir: config.active_dir(),
            project_dir: config.project_dir(),
            initializer,
            archiver,
            summarizer,
            archiving: RefCell::new(None),
        }
    }

    fn marker_content(&self) -> Option<String> {
        fs::read_to_string(self.active_dir.join(MARKER_FILE)).ok()
    }

    pub fn state(&self) -> SessionState {
        if let Some(name) = self.archiving.borrow().clone() {
            return SessionState::Archiving { name };
        }
        match self.marker_content().as_deref().and_then(marker::session_name) {
            Some(name) => SessionState::Active { name },
            None => SessionState::NoSession,
        }
    }

    /// Descriptor of the active session, as recorded in the marker.
    pub fn current(&self) -> Option<SessionDescriptor> {
        self.marker_content().as_deref().and_then(marker::parse)
    }

    /// Create a session unless one is active. Writes nothing when it is.
    pub fn create(&self) -> Result<CreateOutcome> {
        if let SessionState::Active { name } = self.state() {
            info!("Session already active: {}", name);
            return Ok(CreateOutcome::Existing(name));
        }

        let branch = git::current_branch(&self.project_dir);
        let project = git::project_name(&self.project_dir);
        let name = marker::derive_name(branch.as_deref(), &project, Local::now().date_naive());
        debug!("Derived session name {} (branch {:?})", name, branch);

        let session = self.initializer.initialize(&name, branch.as_deref())?;
        info!("Session created: {} ({})", session.name, session.session_id);
        Ok(CreateOutcome::Created(session))
    }

    /// Summarize, snapshot and clear the active session. The summary step is
    /// best effort.
    pub fn archive(&self) -> Result<ArchiveOutcome> {
        let name = match self.state() {
            SessionState::Active { name } => name,
            _ => {
                debug!("No active session to archive");
                return Ok(ArchiveOutcome::NoSession);
            }
        };

        self.archiving.replace(Some(name.clone()));
        let summary = match self.summarizer.generate(&self.active_dir) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary generation failed: {}", e);
                None
            }
        };
        let archived = self.archiver.archive(&name);
        self.archiving.replace(None);
        let location = archived?;

        // The summary was written into the active directory and moved along.
        let summary = match (&location, summary) {
            (Some(dir), Some(path)) => path.file_name().map(|f| dir.join(f)),
            (_, summary) => summary,
        };

        info!("Session archived: {}", name);
        Ok(ArchiveOutcome::Archived {
            name,
            location,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::collaborators::{InProcessArchiver, InProcessInitializer, SUMMARY_FILE};
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    struct UnusedInitializer;

    impl SessionInitializer for UnusedInitializer {
        fn initialize(&self, name: &str, _branch: Option<&str>) -> Result<SessionDescriptor> {
            panic!("initializer called for {}", name);
        }
    }

    struct FailingArchiver;

    impl SessionArchiver for FailingArchiver {
        fn archive(&self, _name: &str) -> Result<Option<PathBuf>> {
            Err(Error::Other("disk full".to_string()))
        }
    }

    /// Writes a summary after checking the marker is still in place.
    struct MarkerCheckingSummary;

    impl SummaryGenerator for MarkerCheckingSummary {
        fn generate(&self, active_dir: &Path) -> Result<Option<PathBuf>> {
            assert!(active_dir.join(MARKER_FILE).exists());
            let path = active_dir.join(SUMMARY_FILE);
            fs::write(&path, "summary: ok\n")?;
            Ok(Some(path))
        }
    }

    struct BrokenSummary;

    impl SummaryGenerator for BrokenSummary {
        fn generate(&self, _active_dir: &Path) -> Result<Option<PathBuf>> {
            Err(Error::collaborator("summary generator", "exit status 1"))
        }
    }

    fn test_config() -> (TempDir, Config) {
        let temp = tempdir().unwrap();
        let mut config = Config::for_root(temp.path().join("memory"));
        let project = temp.path().join("widgets");
        fs::create_dir_all(&project).unwrap();
        config.paths.project_dir = Some(project);
        config.ensure_dirs().unwrap();
        (temp, config)
    }

    fn manager(config: &Config, summarizer: Box<dyn SummaryGenerator>) -> SessionManager {
        SessionManager::with_collaborators(
            config,
            Box::new(InProcessInitializer::new(config.active_dir())),
            Box::new(InProcessArchiver::new(config.active_dir(), config.archive_dir())),
            summarizer,
        )
    }

    #[test]
    fn test_create_from_no_session() {
        let (_temp, config) = test_config();
        let mgr = manager(&config, Box::new(BrokenSummary));
        assert_eq!(mgr.state(), SessionState::NoSession);

        let outcome = mgr.create().unwrap();

        let expected = format!("widgets-{}", Local::now().format("%Y%m%d"));
        assert_eq!(outcome.name(), expected);
        assert!(matches!(outcome, CreateOutcome::Created(_)));
        assert_eq!(mgr.state(), SessionState::Active { name: expected });
        assert!(mgr.current().unwrap().session_id.starts_with("sess_"));
    }

    #[test]
    fn test_create_is_idempotent() {
        let (_temp, config) = test_config();
        let marker_path = config.active_dir().join(MARKER_FILE);
        let doc = "# Task: feature-x\n**Session ID:** sess_20260101_000000\n";
        fs::write(&marker_path, doc).unwrap();
        let modified = fs::metadata(&marker_path).unwrap().modified().unwrap();

        let mgr = SessionManager::with_collaborators(
            &config,
            Box::new(UnusedInitializer),
            Box::new(FailingArchiver),
            Box::new(BrokenSummary),
        );

        for _ in 0..2 {
            assert_eq!(
                mgr.create().unwrap(),
                CreateOutcome::Existing("feature-x".to_string())
            );
        }
        assert_eq!(fs::read_to_string(&marker_path).unwrap(), doc);
        assert_eq!(fs::metadata(&marker_path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn test_template_marker_is_no_session() {
        let (_temp, config) = test_config();
        fs::write(
            config.active_dir().join(MARKER_FILE),
            "# Task: [Your task name]\n",
        )
        .unwrap();
        let mgr = manager(&config, Box::new(BrokenSummary));

        assert_eq!(mgr.state(), SessionState::NoSession);
        assert_eq!(mgr.archive().unwrap(), ArchiveOutcome::NoSession);
        assert!(matches!(mgr.create().unwrap(), CreateOutcome::Created(_)));
    }

    #[test]
    fn test_partially_filled_marker_is_replaced() {
        let (_temp, config) = test_config();
        let marker_path = config.active_dir().join(MARKER_FILE);
        fs::write(&marker_path, "# Task: feature-x\n\n## Goal\n[Your task name]\n").unwrap();
        let mgr = manager(&config, Box::new(BrokenSummary));

        assert_eq!(mgr.state(), SessionState::NoSession);
        let outcome = mgr.create().unwrap();

        assert!(matches!(outcome, CreateOutcome::Created(_)));
        let content = fs::read_to_string(&marker_path).unwrap();
        assert!(!content.contains("[Your task name]"));
        assert_eq!(
            mgr.state(),
            SessionState::Active {
                name: outcome.name().to_string()
            }
        );
    }

    #[test]
    fn test_archive_without_session_is_benign() {
        let (_temp, config) = test_config();
        let mgr = manager(&config, Box::new(BrokenSummary));

        assert_eq!(mgr.archive().unwrap(), ArchiveOutcome::NoSession);
        assert!(!config.archive_dir().exists());
    }

    #[test]
    fn test_archive_round_trip_keeps_templates() {
        let (_temp, config) = test_config();
        let active = config.active_dir();
        fs::write(active.join("TEMPLATE_task_plan.md"), "# Task: [Your task name]\n").unwrap();
        fs::write(active.join("progress.md"), "step 1 done\n").unwrap();
        let mgr = manager(&config, Box::new(MarkerCheckingSummary));
        let name = mgr.create().unwrap().name().to_string();

        let outcome = mgr.archive().unwrap();

        let ArchiveOutcome::Archived {
            name: archived,
            location,
            summary,
        } = outcome
        else {
            panic!("session was not archived");
        };
        assert_eq!(archived, name);
        let dir = location.unwrap();
        assert!(dir.starts_with(config.archive_dir()));
        assert!(dir.join(MARKER_FILE).exists());
        assert!(dir.join("progress.md").exists());
        assert_eq!(summary, Some(dir.join(SUMMARY_FILE)));
        assert!(dir.join(SUMMARY_FILE).exists());

        assert_eq!(mgr.state(), SessionState::NoSession);
        let remaining: Vec<_> = fs::read_dir(&active)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining, vec!["TEMPLATE_task_plan.md".to_string()]);
    }

    #[test]
    fn test_archive_survives_summary_failure() {
        let (_temp, config) = test_config();
        let mgr = manager(&config, Box::new(BrokenSummary));
        mgr.create().unwrap();

        let outcome = mgr.archive().unwrap();

        assert!(matches!(
            outcome,
            ArchiveOutcome::Archived { summary: None, location: Some(_), .. }
        ));
        assert_eq!(mgr.state(), SessionState::NoSession);
    }

    #[test]
    fn test_archive_failure_leaves_session_active() {
        let (_temp, config) = test_config();
        let mgr = SessionManager::with_collaborators(
            &config,
            Box::new(InProcessInitializer::new(config.active_dir())),
            Box::new(FailingArchiver),
            Box::new(BrokenSummary),
        );
        let name = mgr.create().unwrap().name().to_string();

        assert!(mgr.archive().is_err());
        assert_eq!(mgr.state(), SessionState::Active { name });
    }
}
