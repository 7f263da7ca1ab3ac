//! Binary-search-by-granule seeking over a seekable physical stream.

use std::io::{Read, Seek, SeekFrom};

use crate::decoder::PhysicalDecoder;
use crate::error::OggError;
use crate::page::Page;
use crate::sync::{PageOutResult, SyncBuffer};
use crate::MAX_PAGE_SIZE;

const BISECTION_WINDOW: u64 = 4096;

impl<R: Read + Seek> PhysicalDecoder<R> {
    /// Seeks the byte source to an absolute offset and resets all decode state.
    pub fn seek(&mut self, offset: u64) -> Result<(), OggError> {
        self.source_mut().seek(SeekFrom::Start(offset))?;
        self.reset_after_seek();
        Ok(())
    }

    /// Seeks forward by `delta` bytes relative to the current position and resets decode state.
    pub fn skip(&mut self, delta: i64) -> Result<(), OggError> {
        self.source_mut().seek(SeekFrom::Current(delta))?;
        self.reset_after_seek();
        Ok(())
    }

    /// Seeks to the start of the byte source.
    pub fn seekstart(&mut self) -> Result<(), OggError> {
        self.seek(0)
    }

    /// Seeks to the end of the byte source.
    pub fn seekend(&mut self) -> Result<(), OggError> {
        self.source_mut().seek(SeekFrom::End(0))?;
        self.reset_after_seek();
        Ok(())
    }

    /// Scans the last `MAX_PAGE_SIZE` bytes of the source and returns the final page present,
    /// if any.
    pub fn last_page(&mut self) -> Result<Option<Page<'static>>, OggError> {
        let end = self.source_mut().seek(SeekFrom::End(0))?;
        #[allow(clippy::as_conversions)]
        let window_start = end.saturating_sub(MAX_PAGE_SIZE as u64);
        self.source_mut().seek(SeekFrom::Start(window_start))?;
        self.reset_after_seek();

        let mut last = None;
        while let Some(page) = self.readpage()? {
            last = Some(page);
        }
        Ok(last)
    }

    /// Locates a page boundary by bisecting on granule position, such that the page the byte
    /// source ends up positioned at has granule strictly less than `target` (or the stream's
    /// very first page, if no page qualifies). Resets decode state on return, including at
    /// each probe along the way.
    pub fn seek_to_granule(&mut self, serial: u32, target: i64) -> Result<(), OggError> {
        let mut minpos: u64 = 0;
        let mut maxpos: u64 = self.source_mut().seek(SeekFrom::End(0))?;

        while maxpos.saturating_sub(minpos) > BISECTION_WINDOW {
            let mid = minpos + (maxpos - minpos) / 2;
            match Self::probe_page_at(self.source_mut(), mid, maxpos, serial)? {
                Some((page_granule, _page_start)) => {
                    if page_granule >= target {
                        maxpos = mid.saturating_sub(1).max(minpos);
                    } else {
                        minpos = mid;
                    }
                }
                None => {
                    maxpos = mid;
                }
            }
            if maxpos <= minpos {
                break;
            }
        }

        self.seek(minpos)
    }

    /// Probes forward from `start`, looking for the first page belonging to `serial` whose
    /// granule position is not `-1`, without disturbing the decoder's own sync buffer. Returns
    /// its granule and byte offset, bypassing pages at or beyond `limit`.
    fn probe_page_at(
        source: &mut R,
        start: u64,
        limit: u64,
        serial: u32,
    ) -> Result<Option<(i64, u64)>, OggError> {
        source.seek(SeekFrom::Start(start))?;
        let mut probe_sync = SyncBuffer::new();
        let mut position = start;

        loop {
            if position >= limit {
                return Ok(None);
            }
            match probe_sync.pageout() {
                PageOutResult::Page(page) => {
                    let page_len = page.to_bytes().len();
                    if page.serial() == serial && page.granule_position() >= 0 {
                        return Ok(Some((page.granule_position(), position)));
                    }
                    position += u64::try_from(page_len).unwrap_or(u64::MAX);
                }
                PageOutResult::Resync(skipped) => {
                    position += u64::try_from(skipped).unwrap_or(u64::MAX);
                }
                PageOutResult::NeedMore => {
                    let mut chunk = [0_u8; 4096];
                    let n = source.read(&mut chunk)?;
                    if n == 0 {
                        return Ok(None);
                    }
                    probe_sync.fill(&chunk[0..n]);
                }
            }
        }
    }

    /// Drains buffered packets until one with a known granule position is found, then reads
    /// forward one page at a time, folding each into the demultiplexer, stopping as soon as a
    /// page with a known granule has been folded in. Returns that granule, or `None` at EOF.
    pub fn sync_to_granule(&mut self, serial: u32) -> Result<Option<i64>, OggError> {
        loop {
            match self.readpacket(serial)? {
                Some(packet) if packet.granule_position >= 0 => {
                    return Ok(Some(packet.granule_position))
                }
                Some(_) => continue,
                None => break,
            }
        }

        loop {
            let Some(page) = self.readpage_for(serial)? else {
                return Ok(None);
            };
            let granule = page.granule_position();
            self.pagein(&page);
            if granule >= 0 {
                while self.readpacket(serial)?.is_some() {}
                return Ok(Some(granule));
            }
        }
    }
}
