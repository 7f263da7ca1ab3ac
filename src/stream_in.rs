//! Per-serial packet reassembly from a sequence of pages (decode direction).

use log::warn;

use crate::page::Page;

/// A reassembled packet, ready for the caller's codec to interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet payload.
    pub data: Vec<u8>,
    /// Logical stream serial number.
    pub serial: u32,
    /// Packet sequence number, monotonic from zero since the last reset.
    pub packetno: u64,
    /// Granule position, or `-1` if this packet does not complete a page.
    pub granule_position: i64,
    /// `true` if this is the first packet of its logical stream.
    pub is_bos: bool,
    /// `true` if this is the last packet of its logical stream.
    pub is_eos: bool,
}

/// Demultiplexes the pages of one logical stream into packets.
#[derive(Debug)]
pub struct StreamIn {
    serial: u32,
    accumulator: Vec<u8>,
    expecting_continuation: bool,
    next_packetno: u64,
    next_page_sequence: Option<u32>,
    ready: std::collections::VecDeque<Packet>,
}

impl StreamIn {
    /// Creates a demultiplexer for the given serial.
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            accumulator: Vec::new(),
            expecting_continuation: false,
            next_packetno: 0,
            next_page_sequence: None,
            ready: std::collections::VecDeque::new(),
        }
    }

    /// Resets all packet-reassembly state, as happens after a seek. The next page observed
    /// becomes the new sequence-continuity baseline and packet numbering restarts at zero.
    pub fn reset(&mut self) {
        self.accumulator.clear();
        self.expecting_continuation = false;
        self.next_packetno = 0;
        self.next_page_sequence = None;
        self.ready.clear();
    }

    /// Feeds one page belonging to this stream into the reassembly state, queuing any packets
    /// it completes.
    pub fn pagein(&mut self, page: &Page<'_>) {
        debug_assert_eq!(page.serial(), self.serial);

        if let Some(expected) = self.next_page_sequence {
            if page.sequence() != expected {
                warn!(
                    "serial {}: page sequence gap, expected {}, got {}",
                    self.serial,
                    expected,
                    page.sequence()
                );
                self.accumulator.clear();
                self.expecting_continuation = false;
            }
        }
        self.next_page_sequence = Some(page.sequence().wrapping_add(1));

        if page.is_bos() && self.expecting_continuation {
            warn!("serial {}: BOS page arrived mid-packet, dropping fragment", self.serial);
            self.accumulator.clear();
            self.expecting_continuation = false;
        }

        if !page.is_continued() && self.expecting_continuation {
            // A lacing byte of 255 ended the previous page without the continued flag being
            // set on this one: the fragment can never be completed.
            warn!("serial {}: expected continuation page, dropping fragment", self.serial);
            self.accumulator.clear();
            self.expecting_continuation = false;
        }

        let mut body_offset = 0_usize;
        let lacing = page.lacing();
        let mut last_segment_len = 0_u8;

        for (i, &seg_len) in lacing.iter().enumerate() {
            let seg = &page.body()[body_offset..body_offset + usize::from(seg_len)];
            body_offset += usize::from(seg_len);
            self.accumulator.extend_from_slice(seg);
            last_segment_len = seg_len;

            let is_last_segment = i + 1 == lacing.len();
            if seg_len < 255 {
                let is_bos_packet = page.is_bos() && self.next_packetno == 0;
                let is_eos_packet = page.is_eos() && is_last_segment;
                let granule_position = if is_last_segment {
                    page.granule_position()
                } else {
                    -1
                };

                self.ready.push_back(Packet {
                    data: std::mem::take(&mut self.accumulator),
                    serial: self.serial,
                    packetno: self.next_packetno,
                    granule_position,
                    is_bos: is_bos_packet,
                    is_eos: is_eos_packet,
                });
                self.next_packetno += 1;
                self.expecting_continuation = false;
            } else {
                self.expecting_continuation = true;
            }
        }

        if page.is_eos() && self.expecting_continuation {
            warn!(
                "serial {}: EOS page ended mid-packet (trailing lacing byte {}), dropping fragment",
                self.serial, last_segment_len
            );
            self.accumulator.clear();
            self.expecting_continuation = false;
        }
    }

    /// Pops the next completed packet, if any.
    pub fn packetout(&mut self) -> Option<Packet> {
        self.ready.pop_front()
    }
}
