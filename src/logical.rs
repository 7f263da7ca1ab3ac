//! Scoped, per-serial façade over an already-open logical stream.

use std::io::Read;

use crate::decoder::PhysicalDecoder;
use crate::error::OggError;
use crate::page::Page;
use crate::stream_in::Packet;

/// A transient handle onto one already-open logical stream of a [`PhysicalDecoder`].
///
/// Acquired via [`PhysicalDecoder::handle`] (or directly via [`LogicalStreamHandle::new`]). The
/// handle borrows the decoder mutably for its lifetime, which is what makes it impossible to
/// hold two handles over the same decoder at once — but dropping a handle does not close the
/// underlying stream, so a caller can reacquire one handle at a time to interleave reads across
/// several open serials.
pub struct LogicalStreamHandle<'d, R> {
    decoder: &'d mut PhysicalDecoder<R>,
    serial: u32,
}

impl<'d, R: Read> LogicalStreamHandle<'d, R> {
    /// Borrows `decoder` to operate on `serial`, which must already be open.
    pub fn new(decoder: &'d mut PhysicalDecoder<R>, serial: u32) -> Result<Self, OggError> {
        if !decoder.is_open(serial) {
            return Err(OggError::ClosedResource(serial));
        }
        Ok(Self { decoder, serial })
    }

    /// This handle's serial number.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Reads the next page belonging to this serial.
    pub fn readpage(&mut self) -> Result<Option<Page<'static>>, OggError> {
        self.decoder.readpage_for(self.serial)
    }

    /// Reads the next reassembled packet for this serial.
    pub fn readpacket(&mut self) -> Result<Option<Packet>, OggError> {
        self.decoder.readpacket(self.serial)
    }

    /// A lazy, single-pass iterator over this stream's remaining pages.
    pub fn each_page(&mut self) -> PageIter<'_, 'd, R> {
        PageIter { handle: self }
    }

    /// A lazy, single-pass iterator over this stream's remaining packets.
    pub fn each_packet(&mut self) -> PacketIter<'_, 'd, R> {
        PacketIter { handle: self }
    }
}

/// Iterator over a logical stream's remaining pages, yielded by [`LogicalStreamHandle::each_page`].
pub struct PageIter<'h, 'd, R> {
    handle: &'h mut LogicalStreamHandle<'d, R>,
}

impl<'h, 'd, R: Read> Iterator for PageIter<'h, 'd, R> {
    type Item = Result<Page<'static>, OggError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.handle.readpage().transpose()
    }
}

/// Iterator over a logical stream's remaining packets, yielded by
/// [`LogicalStreamHandle::each_packet`].
pub struct PacketIter<'h, 'd, R> {
    handle: &'h mut LogicalStreamHandle<'d, R>,
}

impl<'h, 'd, R: Read> Iterator for PacketIter<'h, 'd, R> {
    type Item = Result<Packet, OggError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.handle.readpacket().transpose()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::encoder::PhysicalEncoder;
    use std::io::Cursor;

    /// Two genuinely interleaved logical streams: both BOS pages precede either stream's data
    /// page, matching the physical-stream preamble model (rather than two sequential links).
    fn build_two_stream_fixture() -> Vec<u8> {
        let mut sink = Vec::new();
        let mut encoder = PhysicalEncoder::new(&mut sink);
        encoder.begin_stream(1);
        encoder.begin_stream(2);
        encoder.push_packet(1, b"a-header", 0, false).unwrap();
        encoder.push_packet(2, b"b-header", 0, false).unwrap();
        encoder.push_packet(1, b"a-data", 10, true).unwrap();
        encoder.push_packet(2, b"b-data", 10, true).unwrap();
        sink
    }

    #[test]
    fn interleaved_handles_do_not_lose_data() {
        let bytes = build_two_stream_fixture();
        let mut decoder = PhysicalDecoder::new(Cursor::new(bytes)).unwrap();
        decoder.open(1).unwrap();
        decoder.open(2).unwrap();

        let packet_a0 = LogicalStreamHandle::new(&mut decoder, 1)
            .unwrap()
            .readpacket()
            .unwrap()
            .unwrap();
        let packet_b0 = LogicalStreamHandle::new(&mut decoder, 2)
            .unwrap()
            .readpacket()
            .unwrap()
            .unwrap();
        let packet_a1 = LogicalStreamHandle::new(&mut decoder, 1)
            .unwrap()
            .readpacket()
            .unwrap()
            .unwrap();
        let packet_b1 = LogicalStreamHandle::new(&mut decoder, 2)
            .unwrap()
            .readpacket()
            .unwrap()
            .unwrap();

        assert_eq!(packet_a0.data, b"a-header");
        assert_eq!(packet_b0.data, b"b-header");
        assert_eq!(packet_a1.data, b"a-data");
        assert_eq!(packet_b1.data, b"b-data");
    }

    #[test]
    fn each_packet_iterates_to_completion() {
        let bytes = build_two_stream_fixture();
        let mut decoder = PhysicalDecoder::new(Cursor::new(bytes)).unwrap();
        decoder.open(1).unwrap();
        let mut handle = LogicalStreamHandle::new(&mut decoder, 1).unwrap();
        let packets: Vec<_> = handle
            .each_packet()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data, b"a-header");
        assert_eq!(packets[1].data, b"a-data");
    }
}
