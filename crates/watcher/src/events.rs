//! Raw notification records and their decoding
//!
//! A batch read from the notification descriptor is a sequence of records,
//! each a fixed 16-byte header followed by a NUL-padded name field whose
//! length the header declares:
//!
//! ```text
//! i32 wd | u32 mask | u32 cookie | u32 len | name[len]
//! ```
//!
//! All integers are in native byte order.

use crate::backend::WatchHandle;
use bitflags::bitflags;
use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use tracing::warn;

/// Size of the fixed record header
pub const EVENT_HEADER_LEN: usize = 16;

bitflags! {
    /// Event classes reported by, and requested from, the notification facility
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const ACCESS = 0x0000_0001;
        const MODIFY = 0x0000_0002;
        const ATTRIB = 0x0000_0004;
        const CLOSE_WRITE = 0x0000_0008;
        const CLOSE_NOWRITE = 0x0000_0010;
        const OPEN = 0x0000_0020;
        const MOVED_FROM = 0x0000_0040;
        const MOVED_TO = 0x0000_0080;
        const CREATE = 0x0000_0100;
        const DELETE = 0x0000_0200;
        const DELETE_SELF = 0x0000_0400;
        const MOVE_SELF = 0x0000_0800;
        const UNMOUNT = 0x0000_2000;
        const Q_OVERFLOW = 0x0000_4000;
        const IGNORED = 0x0000_8000;
        const DONT_FOLLOW = 0x0200_0000;
        const ISDIR = 0x4000_0000;

        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();
    }
}

/// Event classes every directory watch is installed with
pub const WATCH_MASK: EventMask = EventMask::ACCESS
    .union(EventMask::MODIFY)
    .union(EventMask::OPEN)
    .union(EventMask::CLOSE)
    .union(EventMask::CREATE)
    .union(EventMask::DELETE)
    .union(EventMask::MOVED_FROM)
    .union(EventMask::MOVED_TO)
    .union(EventMask::DONT_FOLLOW);

impl EventMask {
    /// The subject of the event is a directory
    pub fn is_dir(self) -> bool {
        self.contains(Self::ISDIR)
    }

    /// A subdirectory was created inside a watched directory
    pub fn is_dir_creation(self) -> bool {
        self.contains(Self::CREATE | Self::ISDIR)
    }
}

/// One decoded notification record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub handle: WatchHandle,
    pub mask: EventMask,
    pub cookie: u32,
    /// Child name relative to the watched directory, if the record has one
    pub name: Option<OsString>,
}

impl RawEvent {
    /// Creates a record naming a child of the watched directory
    pub fn named(handle: WatchHandle, mask: EventMask, name: impl Into<OsString>) -> Self {
        Self {
            handle,
            mask,
            cookie: 0,
            name: Some(name.into()),
        }
    }

    /// Creates a record about the watched directory itself
    pub fn unnamed(handle: WatchHandle, mask: EventMask) -> Self {
        Self {
            handle,
            mask,
            cookie: 0,
            name: None,
        }
    }

    /// Appends this record to `buf` in kernel layout, padding the name field
    /// to a multiple of the header size the way the kernel does
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let name = self
            .name
            .as_ref()
            .map(|n| n.as_bytes())
            .unwrap_or_default();
        let name_len = if name.is_empty() {
            0
        } else {
            (name.len() + 1).div_ceil(EVENT_HEADER_LEN) * EVENT_HEADER_LEN
        };

        buf.extend_from_slice(&self.handle.as_raw().to_ne_bytes());
        buf.extend_from_slice(&self.mask.bits().to_ne_bytes());
        buf.extend_from_slice(&self.cookie.to_ne_bytes());
        buf.extend_from_slice(&(name_len as u32).to_ne_bytes());
        buf.extend_from_slice(name);
        buf.resize(buf.len() + name_len - name.len(), 0);
    }
}

/// Iterator over the records of one raw batch
///
/// Advances by each record's declared size. A record whose declared size runs
/// past the end of the batch ends iteration.
#[derive(Debug)]
pub struct EventDecoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> EventDecoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn read_u32(&self, at: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[at..at + 4]);
        u32::from_ne_bytes(bytes)
    }

    fn truncated(&mut self, remaining: usize) -> Option<RawEvent> {
        warn!(
            "Discarding {remaining} trailing bytes of a truncated notification record at offset {}",
            self.offset
        );
        self.offset = self.buf.len();
        None
    }
}

impl Iterator for EventDecoder<'_> {
    type Item = RawEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.buf.len() - self.offset;
        if remaining == 0 {
            return None;
        }
        if remaining < EVENT_HEADER_LEN {
            return self.truncated(remaining);
        }

        let start = self.offset;
        let wd = self.read_u32(start) as i32;
        let mask = EventMask::from_bits_retain(self.read_u32(start + 4));
        let cookie = self.read_u32(start + 8);
        let name_len = self.read_u32(start + 12) as usize;

        let name_start = start + EVENT_HEADER_LEN;
        let Some(end) = name_start
            .checked_add(name_len)
            .filter(|end| *end <= self.buf.len())
        else {
            return self.truncated(remaining);
        };
        self.offset = end;

        let field = &self.buf[name_start..end];
        let trimmed = field.split(|b| *b == 0).next().unwrap_or_default();
        let name = (!trimmed.is_empty()).then(|| OsString::from_vec(trimmed.to_vec()));

        Some(RawEvent {
            handle: WatchHandle::from_raw(wd),
            mask,
            cookie,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode(events: &[RawEvent]) -> Vec<u8> {
        let mut buf = Vec::new();
        for event in events {
            event.encode_into(&mut buf);
        }
        buf
    }

    #[test]
    fn test_watch_mask_matches_requested_classes() {
        assert_eq!(WATCH_MASK.bits(), 0x0200_03fb);
        assert!(!WATCH_MASK.contains(EventMask::ATTRIB));
        assert!(WATCH_MASK.contains(EventMask::DONT_FOLLOW));
    }

    #[test]
    fn test_decode_advances_by_declared_size() {
        let handle = WatchHandle::from_raw(3);
        let events = vec![
            RawEvent::named(handle, EventMask::OPEN, "a"),
            RawEvent::named(handle, EventMask::CREATE | EventMask::ISDIR, "sixteen-chars-xx"),
            RawEvent::named(handle, EventMask::CLOSE_NOWRITE, "c.txt"),
        ];
        let buf = encode(&events);
        // "sixteen-chars-xx" needs a terminator, so it spills into a second block
        assert_eq!(buf.len(), 3 * EVENT_HEADER_LEN + 16 + 32 + 16);

        let decoded: Vec<_> = EventDecoder::new(&buf).collect();
        assert_eq!(decoded, events);
    }

    #[test]
    fn test_zero_length_name_is_skipped_but_cursor_advances() {
        let dir = WatchHandle::from_raw(1);
        let events = vec![
            RawEvent::unnamed(dir, EventMask::OPEN | EventMask::ISDIR),
            RawEvent::unnamed(WatchHandle::from_raw(-1), EventMask::Q_OVERFLOW),
            RawEvent::named(dir, EventMask::MODIFY, "after.log"),
        ];
        let decoded: Vec<_> = EventDecoder::new(&encode(&events)).collect();

        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].name, None);
        assert_eq!(decoded[1].mask, EventMask::Q_OVERFLOW);
        assert_eq!(decoded[2].name, Some(OsString::from("after.log")));
    }

    #[test]
    fn test_name_field_of_only_padding_decodes_as_unnamed() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&7i32.to_ne_bytes());
        buf.extend_from_slice(&EventMask::ACCESS.bits().to_ne_bytes());
        buf.extend_from_slice(&0u32.to_ne_bytes());
        buf.extend_from_slice(&16u32.to_ne_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        RawEvent::named(WatchHandle::from_raw(7), EventMask::ACCESS, "next").encode_into(&mut buf);

        let decoded: Vec<_> = EventDecoder::new(&buf).collect();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].name, None);
        assert_eq!(decoded[1].name, Some(OsString::from("next")));
    }

    #[test]
    fn test_truncated_batch_stops_without_panicking() {
        let handle = WatchHandle::from_raw(2);
        let mut buf = encode(&[
            RawEvent::named(handle, EventMask::ACCESS, "kept"),
            RawEvent::named(handle, EventMask::ACCESS, "cut-off"),
        ]);
        buf.truncate(buf.len() - 4);

        let decoded: Vec<_> = EventDecoder::new(&buf).collect();
        assert_eq!(decoded, vec![RawEvent::named(handle, EventMask::ACCESS, "kept")]);

        let short_header = &buf[..EVENT_HEADER_LEN - 1];
        assert_eq!(EventDecoder::new(short_header).count(), 0);
    }

    #[test]
    fn test_dir_creation_requires_both_bits() {
        assert!((EventMask::CREATE | EventMask::ISDIR).is_dir_creation());
        assert!(!EventMask::CREATE.is_dir_creation());
        assert!(!(EventMask::OPEN | EventMask::ISDIR).is_dir_creation());
        assert!((EventMask::OPEN | EventMask::ISDIR).is_dir());
    }
}
