//! External collaborators of the session lifecycle and their in-process
//! fallbacks.
//!
//! Each capability has a script-backed implementation and an in-process
//! one. The script variant is chosen when the script exists and degrades
//! to the in-process variant when the script fails.

use super::marker::{self, MARKER_FILE, SessionDescriptor};
use crate::config::{Config, ROOT_ENV};
use crate::error::{Error, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info, warn};

/// File the summary generator's output is captured to, inside the
/// active-session directory.
pub const SUMMARY_FILE: &str = "session_summary.yaml";

/// Produces a human-readable session summary. Best effort.
pub trait SummaryGenerator {
    /// Generate a summary of the documents in `active_dir`; returns the
    /// written document, if any.
    fn generate(&self, active_dir: &Path) -> Result<Option<PathBuf>>;
}

/// Creates the session marker document.
pub trait SessionInitializer {
    fn initialize(&self, name: &str, branch: Option<&str>) -> Result<SessionDescriptor>;
}

/// Moves the active-session documents into the archive.
pub trait SessionArchiver {
    /// Archive the session named `name`; returns the archive directory when
    /// it is known.
    fn archive(&self, name: &str) -> Result<Option<PathBuf>>;
}

fn run_collaborator(name: &str, command: &mut Command) -> Result<Output> {
    let output = command
        .output()
        .map_err(|e| Error::collaborator(name, e.to_string()))?;
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::collaborator(
            name,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ))
    }
}

fn script_command(script: &Path, root: &Path) -> Command {
    let mut cmd = Command::new("bash");
    cmd.arg(script).current_dir(root).env(ROOT_ENV, root);
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Summary generation
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the configured summarizer and captures its stdout.
#[derive(Debug, Clone)]
pub struct ScriptSummaryGenerator {
    command: Vec<String>,
    root: PathBuf,
}

impl ScriptSummaryGenerator {
    pub fn new(command: Vec<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            command,
            root: root.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.summarizer_command(), &config.root)
    }
}

impl SummaryGenerator for ScriptSummaryGenerator {
    fn generate(&self, active_dir: &Path) -> Result<Option<PathBuf>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::collaborator("summary generator", "no command configured"))?;

        if let Some(script) = args.first().map(Path::new) {
            if script.is_absolute() && !script.exists() {
                return Err(Error::collaborator(
                    "summary generator",
                    format!("{} not found", script.display()),
                ));
            }
        }

        let output = run_collaborator(
            "summary generator",
            Command::new(program)
                .args(args)
                .current_dir(&self.root)
                .env(ROOT_ENV, &self.root),
        )?;

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let path = active_dir.join(SUMMARY_FILE);
        fs::write(&path, &output.stdout)?;
        debug!("Session summary written to {:?}", path);
        Ok(Some(path))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session initialization
// ─────────────────────────────────────────────────────────────────────────────

/// Writes the marker document directly.
#[derive(Debug, Clone)]
pub struct InProcessInitializer {
    active_dir: PathBuf,
}

impl InProcessInitializer {
    pub fn new(active_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_dir: active_dir.into(),
        }
    }
}

impl SessionInitializer for InProcessInitializer {
    fn initialize(&self, name: &str, branch: Option<&str>) -> Result<SessionDescriptor> {
        fs::create_dir_all(&self.active_dir)?;
        let session = SessionDescriptor::new(name);
        fs::write(
            self.active_dir.join(MARKER_FILE),
            marker::render(&session, branch),
        )?;
        info!("Created session marker for {}", name);
        Ok(session)
    }
}

/// Delegates to the init script; a marker must exist afterwards.
#[derive(Debug, Clone)]
pub struct ScriptInitializer {
    script: PathBuf,
    root: PathBuf,
    active_dir: PathBuf,
    fallback: InProcessInitializer,
}

impl ScriptInitializer {
    pub fn new(
        script: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        active_dir: impl Into<PathBuf>,
    ) -> Self {
        let active_dir = active_dir.into();
        Self {
            script: script.into(),
            root: root.into(),
            fallback: InProcessInitializer::new(&active_dir),
            active_dir,
        }
    }

    fn run_script(&self, name: &str) -> Result<SessionDescriptor> {
        run_collaborator(
            "session-init script",
            script_command(&self.script, &self.root).arg(name),
        )?;

        // Exit 0 without a usable marker is a collaborator failure.
        let content = fs::read_to_string(self.active_dir.join(MARKER_FILE)).unwrap_or_default();
        let mut session = marker::parse(&content).ok_or_else(|| {
            Error::collaborator("session-init script", "exited 0 without writing a session marker")
        })?;
        if session.session_id.is_empty() {
            session.session_id = SessionDescriptor::new(&session.name).session_id;
        }
        Ok(session)
    }
}

impl SessionInitializer for ScriptInitializer {
    fn initialize(&self, name: &str, branch: Option<&str>) -> Result<SessionDescriptor> {
        match self.run_script(name) {
            Ok(session) => {
                info!("Session {} created by {:?}", session.name, self.script);
                Ok(session)
            }
            Err(e) => {
                warn!("{}; writing the session marker directly", e);
                self.fallback.initialize(name, branch)
            }
        }
    }
}

/// Select the initializer by probing for the init script.
pub fn initializer(config: &Config) -> Box<dyn SessionInitializer> {
    let script = config.init_script();
    if script.is_file() {
        Box::new(ScriptInitializer::new(script, &config.root, config.active_dir()))
    } else {
        debug!("No init script at {:?}; using in-process initializer", script);
        Box::new(InProcessInitializer::new(config.active_dir()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Archiving
// ─────────────────────────────────────────────────────────────────────────────

/// Snapshots the active documents into `archive/<date>_<name>/`, then
/// clears them. Every copy completes before any source is deleted.
#[derive(Debug, Clone)]
pub struct InProcessArchiver {
    active_dir: PathBuf,
    archive_root: PathBuf,
}

impl InProcessArchiver {
    pub fn new(active_dir: impl Into<PathBuf>, archive_root: impl Into<PathBuf>) -> Self {
        Self {
            active_dir: active_dir.into(),
            archive_root: archive_root.into(),
        }
    }

    /// Non-template regular files in the active-session directory.
    pub fn documents(&self) -> Result<Vec<PathBuf>> {
        let mut docs = Vec::new();
        for entry in fs::read_dir(&self.active_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if marker::is_template(&entry.file_name().to_string_lossy()) {
                continue;
            }
            docs.push(entry.path());
        }
        docs.sort();
        Ok(docs)
    }

    /// Fresh archive directory for `name`; a numeric suffix avoids
    /// overwriting an earlier archive from the same day.
    fn destination(&self, name: &str) -> PathBuf {
        let base = format!("{}_{}", Local::now().format("%Y-%m-%d"), name);
        let mut dest = self.archive_root.join(&base);
        let mut n = 2;
        while dest.exists() {
            dest = self.archive_root.join(format!("{}-{}", base, n));
            n += 1;
        }
        dest
    }

    /// Copy `docs` into `dest`. Sources are untouched.
    pub(crate) fn snapshot(&self, docs: &[PathBuf], dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        for doc in docs {
            if let Some(file_name) = doc.file_name() {
                fs::copy(doc, dest.join(file_name))?;
            }
        }
        Ok(())
    }

    /// Delete `docs` from the active-session directory.
    pub(crate) fn clear(&self, docs: &[PathBuf]) -> Result<()> {
        for doc in docs {
            match fs::remove_file(doc) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl SessionArchiver for InProcessArchiver {
    fn archive(&self, name: &str) -> Result<Option<PathBuf>> {
        let docs = self.documents()?;
        let dest = self.destination(name);
        self.snapshot(&docs, &dest)?;
        self.clear(&docs)?;
        info!("Archived {} document(s) to {:?}", docs.len(), dest);
        Ok(Some(dest))
    }
}

/// Delegates to the archive script; the active directory must be cleared
/// of the marker afterwards.
#[derive(Debug, Clone)]
pub struct ScriptArchiver {
    script: PathBuf,
    root: PathBuf,
    fallback: InProcessArchiver,
}

impl ScriptArchiver {
    pub fn new(
        script: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
        fallback: InProcessArchiver,
    ) -> Self {
        Self {
            script: script.into(),
            root: root.into(),
            fallback,
        }
    }

    fn run_script(&self, name: &str) -> Result<Option<PathBuf>> {
        run_collaborator("archive script", &mut script_command(&self.script, &self.root))?;

        let marker_path = self.fallback.active_dir.join(MARKER_FILE);
        let content = fs::read_to_string(&marker_path).unwrap_or_default();
        if marker::is_well_formed(&content) {
            return Err(Error::collaborator(
                "archive script",
                "exited 0 but the session marker is still active",
            ));
        }

        let expected = self
            .fallback
            .archive_root
            .join(format!("{}_{}", Local::now().format("%Y-%m-%d"), name));
        Ok(expected.is_dir().then_some(expected))
    }
}

impl SessionArchiver for ScriptArchiver {
    fn archive(&self, name: &str) -> Result<Option<PathBuf>> {
        match self.run_script(name) {
            Ok(location) => Ok(location),
            Err(e) => {
                warn!("{}; archiving in-process", e);
                self.fallback.archive(name)
            }
        }
    }
}

/// Select the archiver by probing for the archive script.
pub fn archiver(config: &Config) -> Box<dyn SessionArchiver> {
    let fallback = InProcessArchiver::new(config.active_dir(), config.archive_dir());
    let script = config.archive_script();
    if script.is_file() {
        Box::new(ScriptArchiver::new(script, &config.root, fallback))
    } else {
        debug!("No archive script at {:?}; using in-process archiver", script);
        Box::new(fallback)
    }
}
