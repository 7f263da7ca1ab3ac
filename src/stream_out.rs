//! Accepts packets with granule positions and emits pages (encode direction).

use std::borrow::Cow;

use crate::page::{Page, PageFlags};

const EMIT_BODY_THRESHOLD: usize = 4096;
const MAX_LACING_ENTRIES: usize = 255;

/// A pending packet's granule position, recorded against the lacing entry that terminates it.
struct PendingGranule {
    /// Index into the pending lacing table of the terminating entry.
    lacing_index: usize,
    granule_position: i64,
}

/// Multiplexes packets for one logical stream into a sequence of pages.
pub struct StreamOut {
    serial: u32,
    lacing: Vec<u8>,
    body: Vec<u8>,
    granules: Vec<PendingGranule>,
    next_sequence: u32,
    bos_written: bool,
    eos_pending: bool,
    continued: bool,
}

impl StreamOut {
    /// Creates a multiplexer for the given serial.
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            lacing: Vec::new(),
            body: Vec::new(),
            granules: Vec::new(),
            next_sequence: 0,
            bos_written: false,
            eos_pending: false,
            continued: false,
        }
    }

    /// Feeds one packet. `last` marks this as the final packet of the logical stream: the
    /// next page emitted (by [`StreamOut::pageout`] or [`StreamOut::flush`]) that drains it
    /// will carry the EOS flag.
    pub fn packetin(&mut self, data: &[u8], granule_position: i64, last: bool) {
        let mut remaining = data.len();
        let mut offset = 0;
        loop {
            let chunk = remaining.min(255);
            self.lacing.push(
                u8::try_from(chunk).expect("chunk is bounded to 255 by construction"),
            );
            self.body.extend_from_slice(&data[offset..offset + chunk]);
            offset += chunk;
            remaining -= chunk;
            if chunk < 255 {
                break;
            }
            if remaining == 0 {
                // Exact multiple of 255: still need a terminating entry, possibly zero-length.
                self.lacing.push(0);
                break;
            }
        }
        self.granules.push(PendingGranule {
            lacing_index: self.lacing.len() - 1,
            granule_position,
        });
        if last {
            self.eos_pending = true;
        }
    }

    fn take_chunk(&mut self, lacing_count: usize) -> Page<'static> {
        let lacing: Vec<u8> = self.lacing.drain(0..lacing_count).collect();
        let body_len: usize = lacing.iter().map(|&b| usize::from(b)).sum();
        let body: Vec<u8> = self.body.drain(0..body_len).collect();

        let drained = self
            .granules
            .iter()
            .take_while(|g| g.lacing_index < lacing_count)
            .count();
        let granule_position = self
            .granules
            .drain(0..drained)
            .last()
            .map_or(-1, |g| g.granule_position);
        for g in &mut self.granules {
            g.lacing_index -= lacing_count;
        }

        let ends_mid_packet = lacing.last().copied() == Some(255);
        let mut flags = PageFlags::empty();
        if self.continued {
            flags |= PageFlags::CONTINUED;
        }
        if !self.bos_written {
            flags |= PageFlags::BOS;
            self.bos_written = true;
        }
        let fully_drains_eos = self.eos_pending && self.lacing.is_empty() && !ends_mid_packet;
        if fully_drains_eos {
            flags |= PageFlags::EOS;
        }
        self.continued = ends_mid_packet;

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        Page::new(
            flags,
            granule_position,
            self.serial,
            sequence,
            Cow::Owned(lacing),
            Cow::Owned(body),
        )
    }

    /// Emits the next page if the pending data has reached the emit threshold, or `None` if
    /// not enough is buffered yet. Use [`StreamOut::flush`] to force emission regardless.
    pub fn pageout(&mut self) -> Option<Page<'static>> {
        if self.lacing.is_empty() {
            return None;
        }
        if self.body.len() < EMIT_BODY_THRESHOLD && self.lacing.len() < MAX_LACING_ENTRIES {
            return None;
        }
        let take = self.lacing.len().min(MAX_LACING_ENTRIES);
        Some(self.take_chunk(take))
    }

    /// Emits everything pending as pages (possibly more than one, if the lacing table exceeds
    /// 255 entries), regardless of the emit threshold. Returns `None` once fully drained.
    pub fn flush(&mut self) -> Option<Page<'static>> {
        if self.lacing.is_empty() {
            return None;
        }
        let take = self.lacing.len().min(MAX_LACING_ENTRIES);
        Some(self.take_chunk(take))
    }

    /// `true` if there is no buffered data awaiting emission.
    pub fn is_empty(&self) -> bool {
        self.lacing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn header_packet_flushes_alone() {
        let mut out = StreamOut::new(1);
        out.packetin(b"header one", 0, false);
        let page = out.flush().unwrap();
        assert!(page.is_bos());
        assert_eq!(page.body(), b"header one");
        assert!(out.is_empty());
    }

    #[test]
    fn small_packets_wait_for_threshold() {
        let mut out = StreamOut::new(1);
        out.packetin(b"hi", 10, false);
        assert!(out.pageout().is_none());
        let page = out.flush().unwrap();
        assert_eq!(page.body(), b"hi");
        assert_eq!(page.granule_position(), 10);
    }

    #[test]
    fn oversized_packet_spans_pages() {
        // 256 full 255-byte segments plus a zero-length terminator: 257 lacing entries,
        // more than the 255 that fit in a single page.
        let mut out = StreamOut::new(1);
        let data = vec![7_u8; 255 * 256];
        out.packetin(&data, 5, true);
        let mut pages = Vec::new();
        while let Some(p) = out.flush() {
            pages.push(p);
        }
        assert_eq!(pages.len(), 2);
        assert!(!pages[0].is_continued() && pages[0].lacing().len() == 255);
        let total: usize = pages.iter().map(|p| p.body().len()).sum();
        assert_eq!(total, data.len());
        assert!(pages.last().unwrap().is_eos());
        assert_eq!(pages.last().unwrap().granule_position(), 5);
    }

    #[test]
    fn sequence_numbers_increment() {
        let mut out = StreamOut::new(1);
        out.packetin(b"a", 0, false);
        let p0 = out.flush().unwrap();
        out.packetin(b"b", 1, false);
        let p1 = out.flush().unwrap();
        assert_eq!(p0.sequence(), 0);
        assert_eq!(p1.sequence(), 1);
    }
}
