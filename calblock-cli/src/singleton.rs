//! One daemon at a time.
//!
//! Two calblock instances would race on the hosts file and undo each
//! other's unblocks, so the daemon takes an exclusive file lock before
//! entering the loop. The lock file carries the holder's pid so the
//! "already running" error can name the process to check.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use fs2::FileExt;

/// Holds the daemon lock; dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
}

fn default_lock_path() -> Result<PathBuf> {
    let base = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine a runtime directory for the lock file")?;
    Ok(base.join("calblock").join("daemon.lock"))
}

/// Take the lock at the platform default location.
pub fn acquire_default() -> Result<LockGuard> {
    acquire(&default_lock_path()?)
}

/// Take the exclusive daemon lock at `path`, recording our pid in it.
pub fn acquire(path: &Path) -> Result<LockGuard> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Cannot open lock file {}", path.display()))?;

    if file.try_lock_exclusive().is_err() {
        let holder = fs::read_to_string(path).unwrap_or_default();
        let holder = holder.trim();
        let holder_hint = if holder.is_empty() {
            String::new()
        } else {
            format!(" (pid {})", holder)
        };
        anyhow::bail!(
            "Another calblock instance is already running{}.\n\
            If that process is gone, remove: {}",
            holder_hint,
            path.display()
        );
    }

    // We hold the lock now; overwrite whatever a dead holder left behind.
    file.set_len(0)?;
    write!(file, "{}", process::id())?;

    Ok(LockGuard { _file: file })
}
