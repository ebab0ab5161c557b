//! Exclusive instance lock held for the duration of activate/deactivate.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Advisory `flock` on the sentinel file; released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    // Held to keep the lock; closing the descriptor releases it.
    _file: File,
}

impl InstanceLock {
    /// Take the lock without blocking. Fails with [`Error::AlreadyRunning`]
    /// when another process holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Open without truncating so the holder's pid survives a failed attempt.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive().map_err(|e| {
            debug!("Lock on {:?} not acquired: {}", path, e);
            Error::AlreadyRunning {
                lock: path.to_path_buf(),
            }
        })?;

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired instance lock {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether another process holds the lock. Creates and writes nothing.
    pub fn is_held(path: &Path) -> Result<bool> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.unlock()?;
                Ok(false)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}
