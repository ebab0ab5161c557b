//! Process registry: last-known pid of each managed service.
//!
//! One plain-text file per service (`.pids/<service>.pid`). The files are the
//! single source of truth; nothing is cached between invocations.

use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed pid registry.
#[derive(Debug, Clone)]
pub struct PidRegistry {
    dir: PathBuf,
}

impl PidRegistry {
    /// Create a registry rooted at `dir` (usually `<root>/.pids`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `service`.
    pub fn pid_file(&self, service: &str) -> PathBuf {
        self.dir.join(format!("{}.pid", service))
    }

    /// Read the recorded pid. Missing or malformed records read as `None`.
    pub fn read_pid(&self, service: &str) -> Option<u32> {
        let path = self.pid_file(service);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Could not read pid file {:?}: {}", path, e);
                }
                return None;
            }
        };

        match content.trim().parse::<u32>() {
            Ok(pid) => Some(pid),
            Err(_) => {
                debug!("Ignoring malformed pid file {:?}", path);
                None
            }
        }
    }

    /// Persist `pid` for `service`, replacing any previous record.
    pub fn write_pid(&self, service: &str, pid: u32) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.pid_file(service);
        fs::write(&path, pid.to_string())?;
        debug!("Recorded pid {} for {} in {:?}", pid, service, path);
        Ok(())
    }

    /// Delete the record for `service`; an absent record is not an error.
    pub fn remove_pid(&self, service: &str) -> Result<()> {
        match fs::remove_file(self.pid_file(service)) {
            Ok(()) => {
                debug!("Removed pid record for {}", service);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Zero-effect liveness probe (`kill(pid, 0)`).
///
/// `EPERM` and `ESRCH` read as dead; any other outcome reads as alive.
/// pid 0 would address the caller's process group, so it is never probed.
pub fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw == 0 {
        return false;
    }

    // SAFETY: signal 0 performs permission and existence checks only.
    if unsafe { libc::kill(raw, 0) } == 0 {
        return true;
    }

    match std::io::Error::last_os_error().raw_os_error() {
        Some(libc::EPERM) | Some(libc::ESRCH) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_registry() -> (TempDir, PidRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = PidRegistry::new(dir.path().join(".pids"));
        (dir, registry)
    }

    #[test]
    fn test_read_missing_record() {
        let (_dir, registry) = temp_registry();
        assert_eq!(registry.read_pid("web_ui"), None);
    }

    #[test]
    fn test_write_and_read_pid() {
        let (_dir, registry) = temp_registry();
        registry.write_pid("web_ui", 4242).unwrap();

        assert!(registry.pid_file("web_ui").ends_with(".pids/web_ui.pid"));
        assert_eq!(registry.read_pid("web_ui"), Some(4242));
    }

    #[test]
    fn test_write_overwrites() {
        let (_dir, registry) = temp_registry();
        registry.write_pid("worker", 1).unwrap();
        registry.write_pid("worker", 2).unwrap();
        assert_eq!(registry.read_pid("worker"), Some(2));
    }

    #[test]
    fn test_malformed_record_reads_as_absent() {
        let (_dir, registry) = temp_registry();
        fs::create_dir_all(registry.dir()).unwrap();
        fs::write(registry.pid_file("worker"), "not-a-pid\n").unwrap();
        assert_eq!(registry.read_pid("worker"), None);

        fs::write(registry.pid_file("worker"), " 123 \n").unwrap();
        assert_eq!(registry.read_pid("worker"), Some(123));
    }

    #[test]
    fn test_remove_missing_record() {
        let (_dir, registry) = temp_registry();
        assert!(registry.remove_pid("nothing").is_ok());

        registry.write_pid("worker", 7).unwrap();
        registry.remove_pid("worker").unwrap();
        assert!(!registry.pid_file("worker").exists());
    }

    #[test]
    fn test_is_alive() {
        assert!(is_alive(std::process::id()));
        assert!(!is_alive(0));
        assert!(!is_alive(u32::MAX));
    }

    #[test]
    fn test_reaped_child_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_alive(pid));
    }
}
