//! Owns per-serial multiplexer state and writes emitted pages to a byte sink.

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::OggError;
use crate::stream_out::StreamOut;

/// Encodes one or more interleaved logical streams into a physical Ogg byte stream.
pub struct PhysicalEncoder<W> {
    sink: W,
    streams: BTreeMap<u32, StreamOut>,
}

impl<W: Write> PhysicalEncoder<W> {
    /// Creates an encoder writing to `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            streams: BTreeMap::new(),
        }
    }

    /// Registers a new logical stream with the given serial. The BOS page is written by the
    /// first call to [`PhysicalEncoder::push_packet`] for this serial.
    pub fn begin_stream(&mut self, serial: u32) {
        self.streams.insert(serial, StreamOut::new(serial));
    }

    /// Feeds one packet to `serial`'s multiplexer and writes out whatever pages become ready.
    /// Header packets (`granule_position == 0`) are flushed into their own page immediately,
    /// per convention.
    pub fn push_packet(
        &mut self,
        serial: u32,
        data: &[u8],
        granule_position: i64,
        last: bool,
    ) -> Result<(), OggError> {
        let stream = self
            .streams
            .get_mut(&serial)
            .ok_or(OggError::ClosedResource(serial))?;
        stream.packetin(data, granule_position, last);

        if granule_position == 0 {
            while let Some(page) = stream.flush() {
                self.sink.write_all(&page.to_bytes())?;
            }
        } else {
            while let Some(page) = stream.pageout() {
                self.sink.write_all(&page.to_bytes())?;
            }
            if last {
                while let Some(page) = stream.flush() {
                    self.sink.write_all(&page.to_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Forces emission of any pages still pending for `serial`.
    pub fn flush(&mut self, serial: u32) -> Result<(), OggError> {
        let stream = self
            .streams
            .get_mut(&serial)
            .ok_or(OggError::ClosedResource(serial))?;
        while let Some(page) = stream.flush() {
            self.sink.write_all(&page.to_bytes())?;
        }
        Ok(())
    }

    /// Drops the multiplexer state for `serial` once it has been fully drained.
    pub fn end_stream(&mut self, serial: u32) {
        self.streams.remove(&serial);
    }

    /// Flushes all remaining streams and returns the underlying sink.
    pub fn into_inner(mut self) -> Result<W, OggError> {
        let serials: Vec<u32> = self.streams.keys().copied().collect();
        for serial in serials {
            self.flush(serial)?;
        }
        Ok(self.sink)
    }

    /// Writes a sequence of independent logical streams as sequential, non-interleaved chained
    /// links: each `(serial, packets)` entry is fully drained into its own link before the next
    /// begins. For genuine interleaving across serials, call [`PhysicalEncoder::begin_stream`]
    /// and [`PhysicalEncoder::push_packet`] directly, alternating serials yourself.
    pub fn write_chained<'a, I>(sink: W, links: I) -> Result<W, OggError>
    where
        I: IntoIterator<Item = (u32, Vec<(&'a [u8], i64, bool)>)>,
    {
        let mut encoder = Self::new(sink);
        for (serial, packets) in links {
            encoder.begin_stream(serial);
            for (data, granule, last) in packets {
                encoder.push_packet(serial, data, granule, last)?;
            }
            encoder.end_stream(serial);
        }
        encoder.into_inner()
    }
}
