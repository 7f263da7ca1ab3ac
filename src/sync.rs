//! Growable byte reservoir that scans for the Ogg capture pattern and extracts pages.

use crate::error::OggError;
use crate::page::Page;
use crate::PAGER_MARKER;

/// Outcome of a single [`SyncBuffer::pageout`] call.
#[derive(Debug)]
pub enum PageOutResult<'a> {
    /// A complete, checksum-valid page was found and consumed from the buffer.
    Page(Page<'a>),
    /// Not enough bytes are buffered yet to know whether a page starts here.
    NeedMore,
    /// `k` bytes of non-page junk were skipped before resynchronizing; call again to attempt
    /// the actual parse from the new position.
    Resync(usize),
}

/// A growable buffer that accumulates bytes from a source and yields pages as they become
/// complete, recovering from corruption by resynchronizing on the next capture pattern.
#[derive(Debug, Default)]
pub struct SyncBuffer {
    storage: Vec<u8>,
    read_pos: usize,
}

impl SyncBuffer {
    /// Creates an empty sync buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly-read bytes to the buffer.
    pub fn fill(&mut self, bytes: &[u8]) {
        self.compact();
        self.storage.extend_from_slice(bytes);
    }

    fn compact(&mut self) {
        if self.read_pos > 0 {
            self.storage.drain(0..self.read_pos);
            self.read_pos = 0;
        }
    }

    /// Drops all buffered bytes and resets to an unsynced state.
    pub fn reset(&mut self) {
        self.storage.clear();
        self.read_pos = 0;
    }

    /// Number of bytes currently buffered and unconsumed.
    pub fn len(&self) -> usize {
        self.storage.len() - self.read_pos
    }

    /// `true` if no bytes are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attempts to extract the next page. See [`PageOutResult`] for the three possible
    /// outcomes. The returned page borrows from this buffer's storage and is only valid until
    /// the next call to [`SyncBuffer::fill`] or [`SyncBuffer::reset`].
    pub fn pageout(&mut self) -> PageOutResult<'_> {
        let remaining = &self.storage[self.read_pos..];

        let found = remaining
            .windows(PAGER_MARKER.len())
            .position(|w| w == PAGER_MARKER);

        let Some(offset) = found else {
            // No capture pattern anywhere in the buffer: everything but the last 3 bytes
            // (which might be the start of a pattern once more data arrives) is junk.
            let skip = remaining.len().saturating_sub(PAGER_MARKER.len() - 1);
            if skip == 0 {
                return PageOutResult::NeedMore;
            }
            self.read_pos += skip;
            return PageOutResult::Resync(skip);
        };

        if offset > 0 {
            self.read_pos += offset;
            return PageOutResult::Resync(offset);
        }

        match Page::parse(remaining) {
            Ok((page, consumed)) => {
                self.read_pos += consumed;
                PageOutResult::Page(page)
            }
            Err(OggError::ShortRead) => PageOutResult::NeedMore,
            Err(_) => {
                // Capture pattern matched but the rest didn't parse: skip past this false
                // positive and let the caller retry.
                self.read_pos += 1;
                PageOutResult::Resync(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;
    use crate::page::PageFlags;
    use std::borrow::Cow;

    fn sample_page_bytes() -> Vec<u8> {
        Page::new(
            PageFlags::BOS,
            -1,
            7,
            0,
            Cow::Owned(vec![3]),
            Cow::Owned(vec![9, 9, 9]),
        )
        .to_bytes()
    }

    #[test]
    fn needs_more_on_partial_page() {
        let bytes = sample_page_bytes();
        let mut buf = SyncBuffer::new();
        buf.fill(&bytes[0..10]);
        assert!(matches!(buf.pageout(), PageOutResult::NeedMore));
    }

    #[test]
    fn yields_page_once_complete() {
        let bytes = sample_page_bytes();
        let mut buf = SyncBuffer::new();
        buf.fill(&bytes);
        match buf.pageout() {
            PageOutResult::Page(page) => assert_eq!(page.serial(), 7),
            other => panic!("expected Page, got {other:?}"),
        }
    }

    #[test]
    fn resyncs_past_leading_noise() {
        let mut noisy = vec![0xAB_u8; 17];
        noisy.extend_from_slice(&sample_page_bytes());

        let mut buf = SyncBuffer::new();
        buf.fill(&noisy);

        match buf.pageout() {
            PageOutResult::Resync(17) => {}
            other => panic!("expected Resync(17), got {other:?}"),
        }
        match buf.pageout() {
            PageOutResult::Page(page) => assert_eq!(page.serial(), 7),
            other => panic!("expected Page, got {other:?}"),
        }
    }
}
