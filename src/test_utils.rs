//! Test utilities for building space packet fixtures
//!
//! [`PacketBuilder`] encodes a single packet to bits, hex or bytes so tests and
//! benchmarks can assemble dumps without checked-in binary files.

#![cfg(any(test, feature = "benchmark"))]

use crate::bits::BitString;
use crate::types::{
    APID_BITS, CHECKSUM_BITS, DATA_LENGTH_BITS, SEQUENCE_COUNT_BITS, SEQUENCE_FLAGS_BITS,
    SequenceFlags,
};

/// Encoder for one space packet.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    apid: u16,
    sequence_flags: SequenceFlags,
    sequence_count: u16,
    secondary_header: Option<u64>,
    payload: BitString,
    checksum: u16,
    data_length: Option<u16>,
}

impl PacketBuilder {
    /// Unsegmented packet with no secondary header and an empty payload.
    pub fn new(apid: u16) -> Self {
        Self {
            apid,
            sequence_flags: SequenceFlags::Unsegmented,
            sequence_count: 0,
            secondary_header: None,
            payload: BitString::new(),
            checksum: 0,
            data_length: None,
        }
    }

    pub fn flags(mut self, flags: SequenceFlags) -> Self {
        self.sequence_flags = flags;
        self
    }

    pub fn count(mut self, count: u16) -> Self {
        self.sequence_count = count;
        self
    }

    /// Add a GPS secondary header.
    pub fn gps_time(mut self, week: u32, ms: u32) -> Self {
        self.secondary_header = Some(((week as u64) << 32) | ms as u64);
        self
    }

    pub fn payload(mut self, bytes: &[u8]) -> Self {
        self.payload = BitString::from_bytes(bytes);
        self
    }

    pub fn checksum(mut self, checksum: u16) -> Self {
        self.checksum = checksum;
        self
    }

    /// Override the encoded data length instead of deriving it.
    pub fn data_length(mut self, data_length: u16) -> Self {
        self.data_length = Some(data_length);
        self
    }

    /// Data length as it will be encoded.
    pub fn encoded_data_length(&self) -> u16 {
        self.data_length.unwrap_or_else(|| {
            let secondary_bytes = if self.secondary_header.is_some() { 8 } else { 0 };
            let body_bytes = secondary_bytes + self.payload.len().div_ceil(8) + CHECKSUM_BITS / 8;
            (body_bytes - 1) as u16
        })
    }

    /// Version 0, telemetry packet type.
    pub fn to_bits(&self) -> BitString {
        let mut bits = BitString::from_u64(0, 4);
        bits.append(&BitString::from_u64(self.secondary_header.is_some() as u64, 1));
        bits.append(&BitString::from_u64(self.apid as u64, APID_BITS));
        bits.append(&BitString::from_u64(self.sequence_flags.bits() as u64, SEQUENCE_FLAGS_BITS));
        bits.append(&BitString::from_u64(self.sequence_count as u64, SEQUENCE_COUNT_BITS));
        bits.append(&BitString::from_u64(self.encoded_data_length() as u64, DATA_LENGTH_BITS));
        if let Some(secondary_header) = self.secondary_header {
            bits.append(&BitString::from_u64(secondary_header, 64));
        }
        bits.append(&self.payload);
        bits.append(&BitString::from_u64(self.checksum as u64, CHECKSUM_BITS));
        bits
    }

    /// Uppercase hex; panics if the packet is not a whole number of nibbles.
    pub fn to_hex(&self) -> String {
        self.to_bits().to_hex().expect("packet is not nibble aligned")
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bits().to_bytes().expect("packet is not byte aligned")
    }
}

/// Concatenate packets into one hex dump.
pub fn dump_hex(packets: &[PacketBuilder]) -> String {
    packets.iter().map(PacketBuilder::to_hex).collect()
}

/// Concatenate packets into one binary dump.
pub fn dump_bytes(packets: &[PacketBuilder]) -> Vec<u8> {
    packets.iter().flat_map(PacketBuilder::to_bytes).collect()
}
