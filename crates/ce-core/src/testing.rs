//! Recording fakes for the OS seams, shared by unit tests.

use crate::error::{Error, Result};
use crate::port::PortProbe;
use crate::process::{ProcessControl, Signal};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Observable calls made against [`FakeProcesses`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Probe(u32),
    Signal(u32, Signal),
    Spawn(u32),
}

#[derive(Debug)]
struct ProcessTable {
    next_pid: u32,
    alive: HashSet<u32>,
    ignore_terminate: HashSet<u32>,
    refuse: HashSet<(u32, Signal)>,
    crash_on_spawn: bool,
    fail_spawn: bool,
    spawned: Vec<(u32, Vec<String>)>,
    events: Vec<Event>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self {
            next_pid: 10_000,
            alive: HashSet::new(),
            ignore_terminate: HashSet::new(),
            refuse: HashSet::new(),
            crash_on_spawn: false,
            fail_spawn: false,
            spawned: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// In-memory process table.
#[derive(Debug, Default)]
pub struct FakeProcesses {
    table: RefCell<ProcessTable>,
}

impl FakeProcesses {
    pub fn with_alive(self, pid: u32) -> Self {
        self.table.borrow_mut().alive.insert(pid);
        self
    }

    pub fn ignoring_terminate(self, pid: u32) -> Self {
        self.table.borrow_mut().ignore_terminate.insert(pid);
        self
    }

    pub fn refusing(self, pid: u32, signal: Signal) -> Self {
        self.table.borrow_mut().refuse.insert((pid, signal));
        self
    }

    /// Spawned processes die before the settle check.
    pub fn crash_on_spawn(self) -> Self {
        self.table.borrow_mut().crash_on_spawn = true;
        self
    }

    pub fn fail_spawn(self) -> Self {
        self.table.borrow_mut().fail_spawn = true;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.table.borrow().events.clone()
    }

    pub fn spawned(&self) -> Vec<(u32, Vec<String>)> {
        self.table.borrow().spawned.clone()
    }

    /// Signals attempted, in order.
    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.table
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Signal(pid, signal) => Some((*pid, *signal)),
                _ => None,
            })
            .collect()
    }
}

impl ProcessControl for FakeProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        let mut table = self.table.borrow_mut();
        table.events.push(Event::Probe(pid));
        table.alive.contains(&pid)
    }

    fn send_signal(&self, pid: u32, signal: Signal) -> Result<()> {
        let mut table = self.table.borrow_mut();
        table.events.push(Event::Signal(pid, signal));
        if table.refuse.contains(&(pid, signal)) {
            return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into());
        }
        if !table.alive.contains(&pid) {
            return Err(Error::Other(format!("no such process: {}", pid)));
        }
        if signal == Signal::Kill || !table.ignore_terminate.contains(&pid) {
            table.alive.remove(&pid);
        }
        Ok(())
    }

    fn spawn_detached(&self, command: &[String], _cwd: &Path, mut log: File) -> Result<u32> {
        let mut table = self.table.borrow_mut();
        if table.fail_spawn {
            return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into());
        }
        let pid = table.next_pid;
        table.next_pid += 1;
        writeln!(log, "started {:?}", command)?;
        if !table.crash_on_spawn {
            table.alive.insert(pid);
        }
        table.spawned.push((pid, command.to_vec()));
        table.events.push(Event::Spawn(pid));
        Ok(pid)
    }
}

/// Static port table.
#[derive(Debug, Default)]
pub struct FakePorts {
    listeners: HashMap<u16, Vec<u32>>,
}

impl FakePorts {
    pub fn with_listener(mut self, port: u16, pid: u32) -> Self {
        self.listeners.entry(port).or_default().push(pid);
        self
    }
}

impl PortProbe for FakePorts {
    fn is_bound(&self, port: u16) -> bool {
        self.listeners.get(&port).is_some_and(|pids| !pids.is_empty())
    }

    fn listeners(&self, port: u16) -> Result<Vec<u32>> {
        Ok(self.listeners.get(&port).cloned().unwrap_or_default())
    }
}
