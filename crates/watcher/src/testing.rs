//! Scripted notification backend for exercising the dispatcher without a kernel
//!
//! Batches are queued up front and handed out one per read. An empty queue
//! reads as an elapsed wait, so a dispatcher loop never blocks on it.

use crate::backend::{NotifyBackend, WatchHandle};
use crate::events::{EventMask, RawEvent};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
enum ScriptedRead {
    Batch(Vec<u8>),
    Fail(io::ErrorKind),
}

#[derive(Debug, Default)]
struct ScriptState {
    next_handle: i32,
    watches: BTreeMap<WatchHandle, PathBuf>,
    reads: VecDeque<ScriptedRead>,
    failing_paths: HashSet<PathBuf>,
    masks: Vec<EventMask>,
    cancel_on_drain: Option<CancellationToken>,
}

/// In-memory [`NotifyBackend`] with a queue of scripted reads
///
/// Clones share state, so a test can keep a handle after moving the backend
/// into a [`crate::WatchTree`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues one batch holding `events` in kernel layout
    pub fn push_events(&self, events: &[RawEvent]) {
        let mut batch = Vec::new();
        for event in events {
            event.encode_into(&mut batch);
        }
        self.push_raw(batch);
    }

    /// Queues one batch of arbitrary bytes
    pub fn push_raw(&self, batch: Vec<u8>) {
        self.state().reads.push_back(ScriptedRead::Batch(batch));
    }

    /// Queues a read that fails with `kind`
    pub fn push_error(&self, kind: io::ErrorKind) {
        self.state().reads.push_back(ScriptedRead::Fail(kind));
    }

    /// Makes future watch installation on `path` fail with permission denied
    pub fn fail_watch_on(&self, path: impl Into<PathBuf>) {
        self.state().failing_paths.insert(path.into());
    }

    /// Cancels `token` on the first read after the queue has run dry
    pub fn cancel_when_drained(&self, token: CancellationToken) {
        self.state().cancel_on_drain = Some(token);
    }

    /// Handle of the active watch on `path`
    pub fn handle_for(&self, path: &Path) -> Option<WatchHandle> {
        self.state()
            .watches
            .iter()
            .find(|(_, watched)| watched.as_path() == path)
            .map(|(handle, _)| *handle)
    }

    /// Number of watches installed and not yet removed
    pub fn active_watch_count(&self) -> usize {
        self.state().watches.len()
    }

    /// Masks passed to every successful installation, in order
    pub fn requested_masks(&self) -> Vec<EventMask> {
        self.state().masks.clone()
    }

    /// Scripted reads not yet consumed
    pub fn queued_reads(&self) -> usize {
        self.state().reads.len()
    }
}

impl NotifyBackend for ScriptedBackend {
    fn add_watch(&mut self, path: &Path, mask: EventMask) -> io::Result<WatchHandle> {
        let mut state = self.state();
        if state.failing_paths.contains(path) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }

        state.next_handle += 1;
        let handle = WatchHandle::from_raw(state.next_handle);
        state.watches.insert(handle, path.to_path_buf());
        state.masks.push(mask);
        Ok(handle)
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        match self.state().watches.remove(&handle) {
            Some(_) => Ok(()),
            None => Err(io::Error::from(io::ErrorKind::InvalidInput)),
        }
    }

    fn read_events(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        let mut state = self.state();
        match state.reads.pop_front() {
            Some(ScriptedRead::Batch(batch)) => {
                let len = batch.len().min(buf.len());
                buf[..len].copy_from_slice(&batch[..len]);
                Ok(len)
            }
            Some(ScriptedRead::Fail(kind)) => Err(io::Error::from(kind)),
            None => {
                if let Some(token) = &state.cancel_on_drain {
                    token.cancel();
                }
                Ok(0)
            }
        }
    }
}
