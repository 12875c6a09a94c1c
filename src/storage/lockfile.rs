//! Data directory lock
//!
//! Two monitor processes appending to the same day log would interleave rows
//! mid-batch. The lock file holds the owner's PID and is removed on drop.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct DataDirLock {
    lock_path: PathBuf,
    owned: bool,
}

impl DataDirLock {
    const LOCK_FILE_NAME: &'static str = ".vitals-monitor.lock";

    /// Acquire the lock for `data_dir`, creating the directory if needed.
    ///
    /// Fails when a live monitor process already holds it. A lock left by a
    /// dead process is replaced.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::holder_pid(&lock_path) {
                Some(pid) if pid != std::process::id() && Self::is_monitor_running(pid) => {
                    bail!(
                        "Another vitals-monitor instance is writing to {} (PID: {})\n\
                         If no other instance is running, remove the stale lock file:\n  rm {}",
                        data_dir.display(),
                        pid,
                        lock_path.display()
                    );
                }
                _ => {
                    tracing::info!(path = %lock_path.display(), "Replacing stale data directory lock");
                    fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
                }
            }
        }

        let pid = std::process::id();
        let mut file = File::create(&lock_path)
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;
        writeln!(file, "{}", pid).context("Failed to write PID to lock file")?;

        tracing::debug!(pid, path = %lock_path.display(), "Acquired data directory lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// PID recorded in an existing lock file; `None` if unreadable
    fn holder_pid(lock_path: &Path) -> Option<u32> {
        fs::read_to_string(lock_path).ok()?.trim().parse().ok()
    }

    #[cfg(unix)]
    fn is_monitor_running(pid: u32) -> bool {
        fs::read_to_string(format!("/proc/{}/cmdline", pid))
            .map(|cmdline| cmdline.contains("vitals"))
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_monitor_running(_pid: u32) -> bool {
        true
    }

    /// Release the lock (also done on drop)
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove lock file");
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_writes_pid() {
        let dir = tempdir().expect("tempdir");
        let lock = DataDirLock::acquire(dir.path()).expect("acquire");
        let pid: u32 = fs::read_to_string(lock.path())
            .expect("read")
            .trim()
            .parse()
            .expect("pid");
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn test_creates_missing_data_dir() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        let lock = DataDirLock::acquire(&nested).expect("acquire");
        assert!(lock.path().starts_with(&nested));
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempdir().expect("tempdir");
        let path = {
            let lock = DataDirLock::acquire(dir.path()).expect("acquire");
            lock.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_and_garbage_locks_replaced() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(DataDirLock::LOCK_FILE_NAME);

        fs::write(&path, "999999999\n").expect("seed");
        drop(DataDirLock::acquire(dir.path()).expect("stale pid"));

        fs::write(&path, "not a pid").expect("seed");
        let lock = DataDirLock::acquire(dir.path()).expect("garbage");
        assert!(lock.path().exists());
    }
}
