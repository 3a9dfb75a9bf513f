//! Recursive watch tree
//!
//! Tracks which directories are watched under which handle, and which
//! physical targets have already been covered so that a directory reached
//! through several path strings (symlinks, cycles) is watched once.

use crate::backend::{NotifyBackend, WatchHandle};
use crate::events::WATCH_MASK;
use crate::resolve::{absolute_no_follow, canonicalize};
use pathtrail_core::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Result of a successful [`WatchTree::watch`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A new watch was installed on `path`
    Installed { handle: WatchHandle, path: PathBuf },
    /// The canonical target was already covered
    AlreadyWatched,
}

/// Owner of every installed watch and the handle → directory table
#[derive(Debug)]
pub struct WatchTree<B> {
    backend: B,
    /// Watched paths by handle, in the form they were installed with
    entries: HashMap<WatchHandle, PathBuf>,
    /// Canonical targets already watched
    targets: HashSet<PathBuf>,
}

impl<B: NotifyBackend> WatchTree<B> {
    /// Create an empty tree over a notification backend
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: HashMap::new(),
            targets: HashSet::new(),
        }
    }

    /// Watch `path` and every directory below it
    ///
    /// Fails with [`Error::NotFound`] when `path` cannot be stat'ed, and with
    /// [`Error::Watcher`] when the watch on `path` itself cannot be installed.
    /// Descendants that cannot be watched are logged and skipped.
    pub fn watch(&mut self, path: &Path) -> Result<WatchOutcome> {
        let Some((handle, watch_path, is_dir)) = self.install(path)? else {
            return Ok(WatchOutcome::AlreadyWatched);
        };

        if is_dir {
            self.watch_descendants(&watch_path);
        }

        Ok(WatchOutcome::Installed {
            handle,
            path: watch_path,
        })
    }

    /// Installs a single watch, returning `None` if the target is already covered
    fn install(&mut self, path: &Path) -> Result<Option<(WatchHandle, PathBuf, bool)>> {
        let metadata = fs::metadata(path).map_err(|e| Error::not_found(path, e))?;

        let watch_path = absolute_no_follow(path);
        let target = canonicalize(path);
        if self.targets.contains(&target) {
            trace!("Already watching {}", target.display());
            return Ok(None);
        }

        let handle = self
            .backend
            .add_watch(&watch_path, WATCH_MASK)
            .map_err(|e| {
                Error::watcher(format!("Failed to watch {}: {e}", watch_path.display()))
            })?;

        self.entries.insert(handle, watch_path.clone());
        self.targets.insert(target);
        info!("Watching {}", watch_path.display());

        Ok(Some((handle, watch_path, metadata.is_dir())))
    }

    /// Depth-first walk installing watches on every subdirectory
    fn watch_descendants(&mut self, root: &Path) {
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let children = match fs::read_dir(&dir) {
                Ok(children) => children,
                Err(e) => {
                    warn!("Failed to list {}: {e}", dir.display());
                    continue;
                }
            };

            for entry in children {
                let child = match entry {
                    Ok(entry) => dir.join(entry.file_name()),
                    Err(e) => {
                        debug!("Skipping unreadable entry in {}: {e}", dir.display());
                        continue;
                    }
                };

                // Follows symlinks: a link to a directory is watched at its link path
                if !fs::metadata(&child).is_ok_and(|m| m.is_dir()) {
                    continue;
                }

                match self.install(&child) {
                    Ok(Some((_, watch_path, true))) => pending.push(watch_path),
                    Ok(_) => {}
                    Err(e) => warn!("Skipping {}: {e}", child.display()),
                }
            }
        }
    }

    /// Directory a handle was installed on, if the handle is known
    pub fn path_for(&self, handle: WatchHandle) -> Option<&Path> {
        self.entries.get(&handle).map(PathBuf::as_path)
    }

    /// Whether the physical target behind `path` is already watched
    pub fn is_watched(&self, path: &Path) -> bool {
        self.targets.contains(&canonicalize(path))
    }

    /// Number of installed watches
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Installed watches, sorted by path
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.entries.values().cloned().collect();
        paths.sort();
        paths
    }

    /// Waits for the next raw batch from the backend
    pub fn read_events(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.backend.read_events(buf, timeout)
    }

    /// Releases every installed watch, returning how many were released
    ///
    /// Handles the kernel already dropped (deleted directories) fail to
    /// release; that is expected and only logged at debug level.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for (handle, path) in self.entries.drain() {
            match self.backend.remove_watch(handle) {
                Ok(()) => released += 1,
                Err(e) => debug!("Failed to release {handle} for {}: {e}", path.display()),
            }
        }
        self.targets.clear();
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use tempfile::TempDir;

    fn setup_tree() -> (TempDir, ScriptedBackend, WatchTree<ScriptedBackend>) {
        let temp_dir = TempDir::new().expect("test setup failed");
        let backend = ScriptedBackend::new();
        let tree = WatchTree::new(backend.clone());
        (temp_dir, backend, tree)
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let (temp_dir, backend, mut tree) = setup_tree();
        let err = tree.watch(&temp_dir.path().join("missing")).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(backend.active_watch_count(), 0);
    }

    #[test]
    fn test_watch_covers_existing_subtree() {
        let (temp_dir, backend, mut tree) = setup_tree();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("d")).unwrap();
        fs::write(root.join("a/file.txt"), b"x").unwrap();

        let outcome = tree.watch(root).unwrap();
        assert!(matches!(outcome, WatchOutcome::Installed { ref path, .. } if path == root));

        assert_eq!(tree.len(), 5);
        assert_eq!(backend.active_watch_count(), 5);
        assert_eq!(
            tree.watched_paths(),
            vec![
                root.to_path_buf(),
                root.join("a"),
                root.join("a/b"),
                root.join("a/b/c"),
                root.join("d"),
            ]
        );
    }

    #[test]
    fn test_second_watch_is_noop() {
        let (temp_dir, backend, mut tree) = setup_tree();
        fs::create_dir_all(temp_dir.path().join("x/y")).unwrap();

        tree.watch(temp_dir.path()).unwrap();
        let outcome = tree.watch(temp_dir.path()).unwrap();

        assert_eq!(outcome, WatchOutcome::AlreadyWatched);
        assert_eq!(tree.len(), 3);
        assert_eq!(backend.active_watch_count(), 3);
    }

    #[test]
    fn test_symlink_cycle_terminates() {
        let (temp_dir, _backend, mut tree) = setup_tree();
        let root = temp_dir.path();
        fs::create_dir(root.join("a")).unwrap();
        std::os::unix::fs::symlink(root, root.join("a/back-to-root")).unwrap();
        std::os::unix::fs::symlink(root.join("a"), root.join("alias")).unwrap();

        tree.watch(root).unwrap();

        assert_eq!(tree.len(), 2);
        assert!(tree.is_watched(&root.join("alias")));
    }

    #[test]
    fn test_failed_child_does_not_stop_siblings() {
        let (temp_dir, backend, mut tree) = setup_tree();
        let root = temp_dir.path();
        for name in ["bad", "good1", "good2"] {
            fs::create_dir(root.join(name)).unwrap();
        }
        backend.fail_watch_on(root.join("bad"));

        tree.watch(root).unwrap();

        assert_eq!(tree.len(), 3);
        assert!(!tree.is_watched(&root.join("bad")));
        assert!(tree.is_watched(&root.join("good2")));
    }

    #[test]
    fn test_failed_root_is_reported() {
        let (temp_dir, backend, mut tree) = setup_tree();
        backend.fail_watch_on(temp_dir.path());

        let err = tree.watch(temp_dir.path()).unwrap_err();
        assert!(matches!(err, Error::Watcher(_)));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_release_all_clears_table() {
        let (temp_dir, backend, mut tree) = setup_tree();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        tree.watch(temp_dir.path()).unwrap();
        let handle = backend.handle_for(temp_dir.path()).unwrap();

        assert_eq!(tree.release_all(), 2);
        assert!(tree.is_empty());
        assert!(tree.path_for(handle).is_none());
        assert!(!tree.is_watched(temp_dir.path()));
        assert_eq!(backend.active_watch_count(), 0);
    }
}
