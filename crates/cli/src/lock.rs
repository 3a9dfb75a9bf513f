//! Single-instance lock file

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// RAII guard for the instance lock
///
/// Holds an exclusive advisory lock on the lock file, which records the
/// owner's PID. Dropping the guard unlocks and removes the file.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock without waiting, creating the parent directory if needed
    ///
    /// Fails with the holder's PID when another process owns the lock.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create lock directory {}", dir.display()))?;
            }
        }

        // Not truncated on open: a busy lock must keep the holder's PID readable
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if let Err(e) = file.try_lock_exclusive() {
            let holder = read_holder(&mut file);
            return Err(match holder {
                Some(pid) => anyhow!(
                    "Another instance is already running (pid {pid}); lock file {}",
                    path.display()
                ),
                None => anyhow!(
                    "Failed to lock {}: {e}. If no other instance is running, remove the file",
                    path.display()
                ),
            });
        }

        file.set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)))
            .and_then(|_| writeln!(file, "{}", std::process::id()))
            .and_then(|()| file.flush())
            .with_context(|| format!("Failed to write PID to {}", path.display()))?;

        debug!("Acquired instance lock {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Best effort unlock - log but don't panic if it fails
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!("Failed to unlock {} during drop: {e}", self.path.display());
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {e}", self.path.display());
        }
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}
