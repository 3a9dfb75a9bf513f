//! Seam between the watch tree and the kernel notification facility

use crate::events::EventMask;
use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;

/// Opaque identifier the notification facility hands out for one watch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(i32);

impl WatchHandle {
    /// Wraps a raw watch descriptor
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw watch descriptor
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wd:{}", self.0)
    }
}

/// A source of raw notification batches that can also install watches
///
/// Implementations must deliver records in the kernel's `inotify_event`
/// layout (see [`crate::EventDecoder`]).
pub trait NotifyBackend {
    /// Installs a watch on `path` for the given event classes
    fn add_watch(&mut self, path: &Path, mask: EventMask) -> io::Result<WatchHandle>;

    /// Releases a previously installed watch
    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()>;

    /// Waits at most `timeout` for events and copies raw records into `buf`
    ///
    /// Returns `Ok(0)` when the wait elapsed without events. An interrupted
    /// wait is reported as [`io::ErrorKind::Interrupted`].
    fn read_events(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}
