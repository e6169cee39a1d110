//! Space packet representation

use crate::bits::BitString;
use crate::convert::gps;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

/// Fixed header field widths in bits, in wire order.
pub const VERSION_BITS: usize = 3;
pub const TYPE_BITS: usize = 1;
pub const SECONDARY_HEADER_FLAG_BITS: usize = 1;
pub const APID_BITS: usize = 11;
pub const SEQUENCE_FLAGS_BITS: usize = 2;
pub const SEQUENCE_COUNT_BITS: usize = 14;
pub const DATA_LENGTH_BITS: usize = 16;
pub const CHECKSUM_BITS: usize = 16;

/// Width of the secondary header (GPS time) when its flag is set.
pub const SECONDARY_HEADER_BITS: usize = 64;

/// Bits in the primary header, before the secondary header.
pub const PRIMARY_HEADER_BITS: usize = VERSION_BITS
    + TYPE_BITS
    + SECONDARY_HEADER_FLAG_BITS
    + APID_BITS
    + SEQUENCE_FLAGS_BITS
    + SEQUENCE_COUNT_BITS
    + DATA_LENGTH_BITS;

/// Segmentation state carried in the 2-bit sequence flags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SequenceFlags {
    Continuation = 0,
    Start = 1,
    End = 2,
    Unsegmented = 3,
}

impl SequenceFlags {
    /// Map the low two bits of `raw` to a flag value.
    pub const fn from_bits(raw: u8) -> Self {
        match raw & 0b11 {
            0 => SequenceFlags::Continuation,
            1 => SequenceFlags::Start,
            2 => SequenceFlags::End,
            _ => SequenceFlags::Unsegmented,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// One framed packet with its header fields decoded and its body kept as bits.
///
/// Produced by the framer and replaced (never mutated) by reassembly.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    pub version: u8,
    pub packet_type: u8,
    pub secondary_header_flag: bool,
    /// Stream identifier (11 bits)
    pub apid: u16,
    pub sequence_flags: SequenceFlags,
    pub sequence_count: u16,
    /// Packet data length as encoded. Reassembled packets hold the sum of
    /// their segments' encoded values, which may exceed 16 bits.
    pub data_length_field: u32,
    pub secondary_header: BitString,
    pub payload: BitString,
    pub checksum: BitString,
    /// Byte offset of the packet's first header bit within the dump
    pub byte_offset: usize,
}

impl RawPacket {
    /// Stream identifier rendered as lowercase hex, e.g. `0x1a3`.
    pub fn apid_hex(&self) -> String {
        format!("{:#x}", self.apid)
    }

    /// Total bits this packet occupied on the wire.
    pub fn bit_len(&self) -> usize {
        PRIMARY_HEADER_BITS + self.secondary_header.len() + self.payload.len() + self.checksum.len()
    }

    /// Payload as bytes when it is byte aligned.
    pub fn payload_bytes(&self) -> Option<Vec<u8>> {
        self.payload.to_bytes()
    }

    /// Secondary header decoded as a GPS timestamp.
    ///
    /// `None` when there is no secondary header or it does not hold a valid time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match gps::decode_gps_time(&self.secondary_header) {
            Ok(timestamp) => timestamp,
            Err(err) => {
                warn!("apid {}: secondary header is not a GPS time: {}", self.apid_hex(), err);
                None
            }
        }
    }
}
