#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::as_conversions)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
//! Reads and writes the OGG container framing format.
//!
//! This crate is concerned with the framing layer only: pages, packets, logical and physical
//! bitstreams, and seeking by granule position. It has nothing to say about what a codec's
//! packets mean.

use std::ops::Range;

pub use error::OggError;
pub use page::{Page, PageFlags};

#[cfg(feature = "decoder")]
pub use decoder::PhysicalDecoder;
#[cfg(feature = "decoder")]
pub use logical::{LogicalStreamHandle, PacketIter, PageIter};
#[cfg(feature = "encoder")]
pub use encoder::PhysicalEncoder;
pub use stream_in::Packet;

pub(crate) mod crc32;
mod error;
mod page;
pub(crate) mod stream_in;
pub(crate) mod sync;

#[cfg(feature = "decoder")]
mod decoder;
#[cfg(feature = "decoder")]
mod logical;
#[cfg(feature = "decoder")]
mod seek;

#[cfg(feature = "encoder")]
mod encoder;
#[cfg(feature = "encoder")]
pub(crate) mod stream_out;

pub(crate) const MAX_PAGE_HEADER_SIZE: usize = 27 + 255;
pub(crate) const MAX_PAGE_DATA_SIZE: usize = 65_025;
pub(crate) const MAX_PAGE_SIZE: usize = MAX_PAGE_HEADER_SIZE + MAX_PAGE_DATA_SIZE;
pub(crate) const PAGER_MARKER: [u8; 4] = [0x4F, 0x67, 0x67, 0x53];
pub(crate) const VERSION_INDEX: usize = 4;
pub(crate) const HEADER_TYPE_INDEX: usize = 5;
pub(crate) const SEGMENT_COUNT_INDEX: usize = 26;
pub(crate) const GRANULE_POSITION_RANGE: Range<usize> = Range { start: 6, end: 14 };
pub(crate) const BITSTREAM_SERIAL_NUMBER_RANGE: Range<usize> = Range { start: 14, end: 18 };
pub(crate) const PAGE_SEQUENCE_NUMBER_RANGE: Range<usize> = Range { start: 18, end: 22 };
pub(crate) const CRC32_RANGE: Range<usize> = Range { start: 22, end: 26 };

#[inline]
pub(crate) fn parse_u32_le(source: &[u8]) -> u32 {
    let mut buffer = [0_u8; 4];
    buffer.copy_from_slice(&source[0..4]);
    u32::from_le_bytes(buffer)
}

/// Generates a pseudo-random bitstream serial number, suitable for [`PhysicalEncoder::begin_stream`].
///
/// Uses the system clock and the default hasher; adequate for picking a serial unlikely to
/// collide with another stream, not for any purpose requiring cryptographic randomness.
#[cfg(feature = "encoder")]
#[allow(clippy::as_conversions)]
pub fn generate_bitstream_serial_number() -> u32 {
    use std::hash::{Hash, Hasher};
    let now = std::time::SystemTime::now();
    let mut hasher = std::collections::hash_map::DefaultHasher::default();
    now.hash(&mut hasher);
    let hash = hasher.finish();
    (hash % u64::from(u32::MAX)) as u32
}
