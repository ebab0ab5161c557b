//! Port conflict detection and resolution.
//!
//! Port conflicts are recoverable: failures to enumerate or signal the
//! holders of a port are logged and swallowed.

use crate::error::{Error, Result};
use crate::process::{ProcessControl, Signal};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

/// Local port inspection.
pub trait PortProbe {
    /// Whether something accepts connections on `127.0.0.1:port`.
    fn is_bound(&self, port: u16) -> bool;

    /// Pids of processes holding `port`.
    fn listeners(&self, port: u16) -> Result<Vec<u32>>;
}

/// [`PortProbe`] using a TCP connect probe and `lsof`.
#[derive(Debug, Clone)]
pub struct SystemPorts {
    timeout: Duration,
}

impl SystemPorts {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PortProbe for SystemPorts {
    fn is_bound(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        TcpStream::connect_timeout(&addr, self.timeout).is_ok()
    }

    fn listeners(&self, port: u16) -> Result<Vec<u32>> {
        let lsof = which::which("lsof")
            .map_err(|_| Error::Other("lsof not found; cannot list port holders".to_string()))?;

        let output = Command::new(lsof)
            .args(["-ti", &format!(":{}", port)])
            .output()?;

        // lsof exits 1 with empty output when nothing matches
        if !output.status.success() && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::command_failed(format!("lsof -ti :{}", port), stderr));
        }

        Ok(parse_pid_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse newline-separated pids, skipping anything that is not one.
pub fn parse_pid_list(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .filter(|pid| *pid > 0)
        .collect();
    pids.dedup();
    pids
}

/// Terminate every process holding `port`, then wait `release` for the
/// port to be let go. Best-effort: returns the pids that were signalled.
pub fn free_port<P, C>(probe: &P, procs: &C, port: u16, release: Duration) -> Vec<u32>
where
    P: PortProbe + ?Sized,
    C: ProcessControl + ?Sized,
{
    let holders = match probe.listeners(port) {
        Ok(holders) => holders,
        Err(e) => {
            warn!("Could not list holders of port {}: {}", port, e);
            return Vec::new();
        }
    };

    let own_pid = std::process::id();
    let mut signalled = Vec::new();
    for pid in holders.into_iter().filter(|pid| *pid != own_pid) {
        match procs.send_signal(pid, Signal::Terminate) {
            Ok(()) => {
                debug!("Terminated pid {} holding port {}", pid, port);
                signalled.push(pid);
            }
            Err(e) => warn!("Could not terminate pid {} holding port {}: {}", pid, port, e),
        }
    }

    if !signalled.is_empty() {
        std::thread::sleep(release);
    }
    signalled
}

/// Poll until `port` accepts connections, at most `attempts` times.
pub fn wait_for_port<P: PortProbe + ?Sized>(
    probe: &P,
    port: u16,
    attempts: u32,
    interval: Duration,
) -> bool {
    for attempt in 0..attempts {
        if probe.is_bound(port) {
            return true;
        }
        if attempt + 1 < attempts {
            std::thread::sleep(interval);
        }
    }
    probe.is_bound(port)
}
