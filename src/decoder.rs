//! Owns the byte source, the sync buffer, and the per-serial demultiplexer state.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Read;

use log::debug;

use crate::error::OggError;
use crate::page::Page;
use crate::stream_in::{Packet, StreamIn};
use crate::sync::{PageOutResult, SyncBuffer};

const READ_CHUNK: usize = 4096;

struct OpenedStream {
    demux: StreamIn,
    queue: VecDeque<Page<'static>>,
}

/// Decodes a physical Ogg stream: discovers logical streams, demultiplexes opened ones into
/// packets, and supports seeking when the byte source allows it.
pub struct PhysicalDecoder<R> {
    source: R,
    sync: SyncBuffer,
    known_streams: BTreeSet<u32>,
    opened: BTreeMap<u32, OpenedStream>,
    bos_prequeue: VecDeque<Page<'static>>,
}

impl<R: Read> PhysicalDecoder<R> {
    /// Constructs a decoder over `source`, reading ahead through the initial BOS preamble so
    /// that [`PhysicalDecoder::known_serials`] reflects every logical stream present in the
    /// first link before any data has been consumed.
    pub fn new(mut source: R) -> Result<Self, OggError> {
        let mut sync = SyncBuffer::new();
        let mut known_streams = BTreeSet::new();
        let mut bos_prequeue = VecDeque::new();

        loop {
            let page = match Self::pump(&mut source, &mut sync)? {
                Some(page) => page,
                None => break,
            };
            let is_bos = page.is_bos();
            if is_bos {
                known_streams.insert(page.serial());
                debug!("discovered logical stream, serial={}", page.serial());
            }
            bos_prequeue.push_back(page.into_owned());
            if !is_bos {
                break;
            }
        }

        Ok(Self {
            source,
            sync,
            known_streams,
            opened: BTreeMap::new(),
            bos_prequeue,
        })
    }

    fn pump(source: &mut R, sync: &mut SyncBuffer) -> Result<Option<Page<'static>>, OggError> {
        loop {
            match sync.pageout() {
                PageOutResult::Page(page) => return Ok(Some(page.into_owned())),
                PageOutResult::Resync(_) => continue,
                PageOutResult::NeedMore => {
                    let mut chunk = [0_u8; READ_CHUNK];
                    let n = source.read(&mut chunk)?;
                    if n == 0 {
                        return Ok(None);
                    }
                    sync.fill(&chunk[0..n]);
                }
            }
        }
    }

    /// Serial numbers of every logical stream observed so far (registered the moment a BOS
    /// page for it is seen, not only during the initial construction scan).
    pub fn known_serials(&self) -> impl Iterator<Item = u32> + '_ {
        self.known_streams.iter().copied()
    }

    /// Opens a logical stream for reading. Fails if the serial has never been observed, or is
    /// already open.
    pub fn open(&mut self, serial: u32) -> Result<(), OggError> {
        if !self.known_streams.contains(&serial) {
            return Err(OggError::UnknownSerialOnOpen(serial));
        }
        if self.opened.contains_key(&serial) {
            return Err(OggError::DoubleOpen(serial));
        }
        self.opened.insert(
            serial,
            OpenedStream {
                demux: StreamIn::new(serial),
                queue: VecDeque::new(),
            },
        );
        Ok(())
    }

    /// Closes a previously opened logical stream. Idempotent.
    pub fn close(&mut self, serial: u32) {
        self.opened.remove(&serial);
    }

    /// `true` if `serial` is currently open.
    pub fn is_open(&self, serial: u32) -> bool {
        self.opened.contains_key(&serial)
    }

    /// Reads the next page from the physical stream, regardless of serial. Pages for known,
    /// opened serials other than the one requested are queued internally; pages for unknown or
    /// unopened serials are discarded.
    pub fn readpage(&mut self) -> Result<Option<Page<'static>>, OggError> {
        if let Some(page) = self.bos_prequeue.pop_front() {
            return Ok(Some(page));
        }
        Self::pump(&mut self.source, &mut self.sync)
    }

    /// Reads the next page belonging to `serial`, buffering any other opened serial's pages it
    /// encounters along the way into their own queues.
    pub fn readpage_for(&mut self, serial: u32) -> Result<Option<Page<'static>>, OggError> {
        if let Some(opened) = self.opened.get_mut(&serial) {
            if let Some(page) = opened.queue.pop_front() {
                return Ok(Some(page));
            }
        }

        loop {
            let Some(page) = self.readpage()? else {
                return Ok(None);
            };
            if page.is_bos() {
                self.known_streams.insert(page.serial());
            }
            if page.serial() == serial {
                return Ok(Some(page));
            }
            if let Some(opened) = self.opened.get_mut(&page.serial()) {
                opened.queue.push_back(page);
            }
            // Pages for unknown/unopened serials are silently discarded.
        }
    }

    /// Feeds a page into its serial's demultiplexer, queuing any packets it completes. No-op
    /// if the serial is not open.
    pub fn pagein(&mut self, page: &Page<'_>) {
        if let Some(opened) = self.opened.get_mut(&page.serial()) {
            opened.demux.pagein(page);
        }
    }

    /// Reads the next packet for an open serial, pulling and feeding pages as needed.
    pub fn readpacket(&mut self, serial: u32) -> Result<Option<Packet>, OggError> {
        loop {
            if let Some(opened) = self.opened.get_mut(&serial) {
                if let Some(packet) = opened.demux.packetout() {
                    return Ok(Some(packet));
                }
            } else {
                return Err(OggError::ClosedResource(serial));
            }
            let Some(page) = self.readpage_for(serial)? else {
                return Ok(None);
            };
            self.pagein(&page);
        }
    }

    /// Resets the sync buffer, all open demultiplexers, and their page queues. Called around
    /// seeks.
    pub(crate) fn reset_after_seek(&mut self) {
        self.sync.reset();
        self.bos_prequeue.clear();
        for opened in self.opened.values_mut() {
            opened.demux.reset();
            opened.queue.clear();
        }
    }

    pub(crate) fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub(crate) fn sync_mut(&mut self) -> &mut SyncBuffer {
        &mut self.sync
    }

    /// Reclaims the underlying byte source, discarding all decoder state.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Borrows a transient handle onto an already-open logical stream. The returned handle's
    /// mutable borrow of `self` is what prevents two handles from coexisting; dropping it does
    /// not close the stream, so it can be reacquired freely to interleave reads across serials.
    pub fn handle(&mut self, serial: u32) -> Result<crate::logical::LogicalStreamHandle<'_, R>, OggError> {
        crate::logical::LogicalStreamHandle::new(self, serial)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::encoder::PhysicalEncoder;
    use std::io::Cursor;

    fn build_stream(serial: u32, packets: &[(&[u8], i64, bool)]) -> Vec<u8> {
        let mut sink = Vec::new();
        let mut encoder = PhysicalEncoder::new(&mut sink);
        encoder.begin_stream(serial);
        for &(data, granule, last) in packets {
            encoder.push_packet(serial, data, granule, last).unwrap();
        }
        sink
    }

    #[test]
    fn discovers_and_opens_a_stream() {
        let bytes = build_stream(
            99,
            &[(b"header", 0, false), (b"data one", 10, false), (b"data two", 20, true)],
        );
        let mut decoder = PhysicalDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.known_serials().collect::<Vec<_>>(), vec![99]);
        decoder.open(99).unwrap();

        let p0 = decoder.readpacket(99).unwrap().unwrap();
        assert_eq!(p0.data, b"header");
        assert!(p0.is_bos);
        let p1 = decoder.readpacket(99).unwrap().unwrap();
        assert_eq!(p1.data, b"data one");
        let p2 = decoder.readpacket(99).unwrap().unwrap();
        assert_eq!(p2.data, b"data two");
        assert!(p2.is_eos);
        assert!(decoder.readpacket(99).unwrap().is_none());
    }

    #[test]
    fn double_open_is_rejected() {
        let bytes = build_stream(1, &[(b"x", 0, true)]);
        let mut decoder = PhysicalDecoder::new(Cursor::new(bytes)).unwrap();
        decoder.open(1).unwrap();
        assert!(matches!(decoder.open(1), Err(OggError::DoubleOpen(1))));
    }

    #[test]
    fn unknown_serial_is_rejected() {
        let bytes = build_stream(1, &[(b"x", 0, true)]);
        let mut decoder = PhysicalDecoder::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            decoder.open(404),
            Err(OggError::UnknownSerialOnOpen(404))
        ));
    }
}
