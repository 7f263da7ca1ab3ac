//! The Ogg page: a 27-byte fixed header, a lacing table, and a body.

use std::borrow::Cow;

use bitflags::bitflags;

use crate::crc32::page_crc32;
use crate::{parse_u32_le, GRANULE_POSITION_RANGE, PAGER_MARKER};

bitflags! {
    /// Header type flags carried in byte 5 of a page header.
    #[derive(Default)]
    pub struct PageFlags: u8 {
        /// The first packet on this page continues a packet begun on the previous page.
        const CONTINUED = 0x1;
        /// This is the first page of a logical stream.
        const BOS = 0x2;
        /// This is the last page of a logical stream.
        const EOS = 0x4;
    }
}

/// A single Ogg page: header fields plus lacing table and body.
///
/// The lacing table and body are [`Cow`]: a page parsed out of a [`crate::sync::SyncBuffer`]
/// borrows its bytes from that buffer's storage, while [`Page::into_owned`] and
/// [`Page::to_owned_page`] produce a page that privately owns its bytes and outlives the
/// buffer that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    flags: PageFlags,
    granule_position: i64,
    serial: u32,
    sequence: u32,
    lacing: Cow<'a, [u8]>,
    body: Cow<'a, [u8]>,
}

impl<'a> Page<'a> {
    /// Builds a page from its logical fields, computing the lacing table's segment lengths
    /// directly from `body`'s length (callers hand in an already-split lacing table; use
    /// [`crate::stream_out::StreamOut`] to go from raw packets to pages).
    pub fn new(
        flags: PageFlags,
        granule_position: i64,
        serial: u32,
        sequence: u32,
        lacing: Cow<'a, [u8]>,
        body: Cow<'a, [u8]>,
    ) -> Self {
        Self {
            flags,
            granule_position,
            serial,
            sequence,
            lacing,
            body,
        }
    }

    /// Parses a page out of `data`, which must begin with the capture pattern. On success,
    /// also returns the total byte length consumed. Bytes are borrowed from `data`.
    pub(crate) fn parse(data: &'a [u8]) -> Result<(Self, usize), crate::error::OggError> {
        use crate::error::OggError;

        if data.len() < 27 {
            return Err(OggError::ShortRead);
        }
        if data[0..4] != PAGER_MARKER {
            return Err(OggError::BadCapturePattern);
        }
        if data[crate::VERSION_INDEX] != 0 {
            return Err(OggError::BadVersion(data[crate::VERSION_INDEX]));
        }

        let flags = PageFlags::from_bits_truncate(data[crate::HEADER_TYPE_INDEX]);
        let mut granule_buf = [0_u8; 8];
        granule_buf.copy_from_slice(&data[GRANULE_POSITION_RANGE]);
        let granule_position = i64::from_le_bytes(granule_buf);
        let serial = parse_u32_le(&data[crate::BITSTREAM_SERIAL_NUMBER_RANGE]);
        let sequence = parse_u32_le(&data[crate::PAGE_SEQUENCE_NUMBER_RANGE]);
        let stored_crc = parse_u32_le(&data[crate::CRC32_RANGE]);
        let segment_count = usize::from(data[crate::SEGMENT_COUNT_INDEX]);

        if data.len() < 27 + segment_count {
            return Err(OggError::ShortRead);
        }
        let lacing = &data[27..27 + segment_count];
        let body_len: usize = lacing.iter().map(|&b| usize::from(b)).sum();
        let body_start = 27 + segment_count;
        if data.len() < body_start + body_len {
            return Err(OggError::ShortRead);
        }
        let body = &data[body_start..body_start + body_len];

        let computed_crc = page_crc32(&data[0..27], lacing, body);
        if computed_crc != stored_crc {
            return Err(OggError::ChecksumError);
        }

        let page = Self {
            flags,
            granule_position,
            serial,
            sequence,
            lacing: Cow::Borrowed(lacing),
            body: Cow::Borrowed(body),
        };
        Ok((page, body_start + body_len))
    }

    /// Serializes this page to bytes, computing a fresh CRC32.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(27 + self.lacing.len() + self.body.len());
        out.extend_from_slice(&PAGER_MARKER);
        out.push(0); // version
        out.push(self.flags.bits());
        out.extend_from_slice(&self.granule_position.to_le_bytes());
        out.extend_from_slice(&self.serial.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 0]); // checksum placeholder
        out.push(
            u8::try_from(self.lacing.len())
                .expect("stream_out.rs never builds a lacing table longer than 255 entries"),
        );
        out.extend_from_slice(&self.lacing);
        out.extend_from_slice(&self.body);

        let crc = page_crc32(&out[0..27], &self.lacing, &self.body);
        out[22..26].copy_from_slice(&crc.to_le_bytes());
        out
    }

    /// Header type flags.
    pub fn flags(&self) -> PageFlags {
        self.flags
    }

    /// `true` if the first packet on this page continues one begun on the previous page.
    pub fn is_continued(&self) -> bool {
        self.flags.contains(PageFlags::CONTINUED)
    }

    /// `true` if this is the first page of its logical stream.
    pub fn is_bos(&self) -> bool {
        self.flags.contains(PageFlags::BOS)
    }

    /// `true` if this is the last page of its logical stream.
    pub fn is_eos(&self) -> bool {
        self.flags.contains(PageFlags::EOS)
    }

    /// Granule position, or `-1` if no packet completes on this page.
    pub fn granule_position(&self) -> i64 {
        self.granule_position
    }

    /// Logical bitstream serial number.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Page sequence number, monotonic per serial.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Lacing (segment-length) table.
    pub fn lacing(&self) -> &[u8] {
        &self.lacing
    }

    /// Page body: the concatenation of all segments.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Promotes a borrowed page into one that owns private copies of its lacing table and body,
    /// detaching it from the buffer it was parsed out of.
    pub fn into_owned(self) -> Page<'static> {
        Page {
            flags: self.flags,
            granule_position: self.granule_position,
            serial: self.serial,
            sequence: self.sequence,
            lacing: Cow::Owned(self.lacing.into_owned()),
            body: Cow::Owned(self.body.into_owned()),
        }
    }

    /// Like [`Page::into_owned`] but takes a reference, leaving `self` usable afterwards.
    pub fn to_owned_page(&self) -> Page<'static> {
        self.clone().into_owned()
    }
}
