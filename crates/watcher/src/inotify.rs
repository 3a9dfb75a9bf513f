//! Linux inotify backend
//!
//! Talks to the kernel through `libc` directly so that the dispatcher sees the
//! raw record batches and owns their decoding.

use crate::backend::{NotifyBackend, WatchHandle};
use crate::events::EventMask;
use pathtrail_core::error::{Error, Result};
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Notification backend over a non-blocking inotify descriptor
///
/// Closing the descriptor on drop releases any watches still installed.
#[derive(Debug)]
pub struct InotifyBackend {
    fd: OwnedFd,
}

impl InotifyBackend {
    /// Creates a new inotify instance
    pub fn new() -> Result<Self> {
        // SAFETY: inotify_init1 takes no pointers; a negative return is an error.
        let raw = unsafe { libc::inotify_init1(libc::IN_CLOEXEC | libc::IN_NONBLOCK) };
        if raw < 0 {
            return Err(Error::with_context(
                "Failed to initialize inotify",
                io::Error::last_os_error(),
            ));
        }

        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        info!("inotify instance created (fd {raw})");
        Ok(Self { fd })
    }
}

impl NotifyBackend for InotifyBackend {
    fn add_watch(&mut self, path: &Path, mask: EventMask) -> io::Result<WatchHandle> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call.
        let wd = unsafe { libc::inotify_add_watch(self.fd.as_raw_fd(), c_path.as_ptr(), mask.bits()) };
        if wd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(WatchHandle::from_raw(wd))
    }

    fn remove_watch(&mut self, handle: WatchHandle) -> io::Result<()> {
        // SAFETY: plain integer arguments.
        let rc = unsafe { libc::inotify_rm_watch(self.fd.as_raw_fd(), handle.as_raw()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn read_events(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let mut pollfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: `pollfd` is a single valid, exclusively borrowed entry.
        let ready = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        if ready == 0 {
            return Ok(0);
        }

        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let read = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
            )
        };
        if read < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                debug!("inotify descriptor polled readable but had no data");
                return Ok(0);
            }
            return Err(err);
        }
        Ok(read as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventDecoder, WATCH_MASK};
    use tempfile::TempDir;

    #[test]
    fn test_read_times_out_without_activity() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = InotifyBackend::new().unwrap();
        backend.add_watch(temp_dir.path(), WATCH_MASK).unwrap();

        let mut buf = vec![0u8; 4096];
        let read = backend
            .read_events(&mut buf, Duration::from_millis(20))
            .unwrap();
        assert_eq!(read, 0);
    }

    #[test]
    fn test_file_creation_produces_named_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = InotifyBackend::new().unwrap();
        let handle = backend.add_watch(temp_dir.path(), WATCH_MASK).unwrap();

        std::fs::write(temp_dir.path().join("hello.txt"), b"hi").unwrap();

        let mut buf = vec![0u8; 4096];
        let read = backend
            .read_events(&mut buf, Duration::from_secs(2))
            .unwrap();
        let events: Vec<_> = EventDecoder::new(&buf[..read]).collect();

        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.handle == handle));
        assert!(events
            .iter()
            .any(|e| e.mask.contains(EventMask::CREATE)
                && e.name.as_deref() == Some(std::ffi::OsStr::new("hello.txt"))));
    }

    #[test]
    fn test_watch_on_missing_path_fails() {
        let mut backend = InotifyBackend::new().unwrap();
        let err = backend
            .add_watch(Path::new("/nonexistent/pathtrail/dir"), WATCH_MASK)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_watch_releases_handle() {
        let temp_dir = TempDir::new().unwrap();
        let mut backend = InotifyBackend::new().unwrap();
        let handle = backend.add_watch(temp_dir.path(), WATCH_MASK).unwrap();

        backend.remove_watch(handle).unwrap();
        assert!(backend.remove_watch(handle).is_err());
    }
}
