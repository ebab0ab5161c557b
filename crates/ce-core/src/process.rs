//! OS process control for managed services.
//!
//! [`ProcessControl`] is the seam between the service controller and the
//! operating system: liveness probes, signal delivery and detached spawns.

use crate::config::ROOT_ENV;
use crate::error::{Error, Result};
use crate::registry;
use std::fmt;
use std::fs::File;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Signals the lifecycle manager sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Graceful shutdown request (SIGTERM).
    Terminate,
    /// Forceful kill (SIGKILL).
    Kill,
}

impl Signal {
    fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Terminate => write!(f, "SIGTERM"),
            Signal::Kill => write!(f, "SIGKILL"),
        }
    }
}

/// Operations the service controller needs from the OS.
pub trait ProcessControl {
    /// Whether `pid` refers to a live process.
    fn is_alive(&self, pid: u32) -> bool;

    /// Deliver `signal` to `pid`.
    fn send_signal(&self, pid: u32, signal: Signal) -> Result<()>;

    /// Spawn `command` in its own process group with stdout and stderr
    /// both written to `log`. Returns the child's pid; the child is not
    /// waited on and outlives the caller.
    fn spawn_detached(&self, command: &[String], cwd: &Path, log: File) -> Result<u32>;
}

/// [`ProcessControl`] backed by real system calls.
#[derive(Debug, Clone)]
pub struct SystemProcesses {
    root: PathBuf,
}

impl SystemProcesses {
    /// `root` is exported to children as `PROJECT_MEMORY_DIR`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProcessControl for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        reap(pid);
        registry::is_alive(pid)
    }

    fn send_signal(&self, pid: u32, signal: Signal) -> Result<()> {
        send_signal(pid, signal)
    }

    fn spawn_detached(&self, command: &[String], cwd: &Path, log: File) -> Result<u32> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Other("cannot spawn an empty command".to_string()))?;

        let stderr = log.try_clone()?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .env(ROOT_ENV, &self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .process_group(0);

        let child = cmd.spawn()?;
        let pid = child.id();
        debug!("Spawned {:?} as pid {}", command, pid);
        Ok(pid)
    }
}

/// Collect the exit status of `pid` if it is an exited child of ours, so a
/// crashed service is not mistaken for a live zombie. No-op for other pids.
fn reap(pid: u32) {
    if let Ok(raw) = i32::try_from(pid) {
        if raw > 0 {
            // SAFETY: a null status pointer is permitted; WNOHANG never blocks.
            unsafe {
                libc::waitpid(raw, std::ptr::null_mut(), libc::WNOHANG);
            }
        }
    }
}

/// Deliver `signal` to `pid` with `kill(2)`.
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    let raw = i32::try_from(pid)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| Error::Other(format!("refusing to signal pid {}", pid)))?;

    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(raw, signal.as_raw()) } == 0 {
        debug!("Sent {} to pid {}", signal, pid);
        Ok(())
    } else {
        Err(std::io::Error::last_os_error().into())
    }
}
