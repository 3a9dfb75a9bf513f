//! Path normalization used when installing watches
//!
//! Two forms are needed: the canonical target, which identifies the physical
//! directory regardless of how it was reached, and the symlink-preserving
//! absolute form, which is the path the watch is installed on and therefore
//! the prefix of every path reported for events under it.

use std::path::{Path, PathBuf};
use tracing::trace;

/// Resolves `path` to an absolute path with all symlinks and relative
/// components eliminated.
///
/// Falls back to the input unchanged when resolution fails, for example when
/// the path does not exist yet.
pub fn canonicalize(path: &Path) -> PathBuf {
    match std::fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(e) => {
            trace!("Could not canonicalize {}: {e}", path.display());
            path.to_path_buf()
        }
    }
}

/// Makes `path` absolute against the working directory without following
/// symlinks in it.
pub fn absolute_no_follow(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match std::path::absolute(path) {
        Ok(absolute) => absolute,
        Err(e) => {
            trace!("Could not make {} absolute: {e}", path.display());
            path.to_path_buf()
        }
    }
}
