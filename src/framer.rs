//! Space packet framing
//!
//! Splits a dump's bit stream into consecutive packets. Header fields are read
//! strictly in wire order because two widths depend on earlier values of the
//! same packet:
//!
//! - the secondary header is 64 bits iff the secondary header flag is set
//! - the payload is `(data_length + 1) * 8 - secondary_header - checksum` bits
//!
//! ## Usage Example
//!
//! ```rust
//! use spacepacket::{BitStream, PacketFramer};
//!
//! fn frame(hex: &str) -> spacepacket::Result<()> {
//!     let mut framer = PacketFramer::new(BitStream::from_hex(hex)?);
//!     while let Some(packet) = framer.next_packet()? {
//!         println!("apid {} carries {} payload bits", packet.apid_hex(), packet.payload.len());
//!     }
//!     Ok(())
//! }
//! # frame("01A3C0050002AABEEF").unwrap();
//! ```

use crate::bits::BitStream;
use crate::types::{
    APID_BITS, CHECKSUM_BITS, DATA_LENGTH_BITS, RawPacket, SECONDARY_HEADER_BITS,
    SECONDARY_HEADER_FLAG_BITS, SEQUENCE_COUNT_BITS, SEQUENCE_FLAGS_BITS, SequenceFlags,
    TYPE_BITS, VERSION_BITS,
};
use crate::{DecodeError, Result};
use tracing::{debug, trace};

/// Resolver for the two header widths that depend on earlier fields.
///
/// Each width can only be resolved once its dependency has been recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderWidths {
    secondary_header_flag: Option<bool>,
    data_length: Option<u16>,
}

impl HeaderWidths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_secondary_header_flag(&mut self, flag: bool) {
        self.secondary_header_flag = Some(flag);
    }

    pub fn record_data_length(&mut self, data_length: u16) {
        self.data_length = Some(data_length);
    }

    /// Width of the secondary header: 64 bits if flagged, else 0.
    pub fn secondary_header_width(&self) -> Result<usize> {
        match self.secondary_header_flag {
            Some(true) => Ok(SECONDARY_HEADER_BITS),
            Some(false) => Ok(0),
            None => Err(DecodeError::FieldOrdering {
                field: "secondary_header",
                dependency: "secondary_header_flag",
            }),
        }
    }

    /// Derived payload width in bits. Negative means the header is malformed.
    pub fn payload_width(&self) -> Result<i64> {
        let data_length = self.data_length.ok_or(DecodeError::FieldOrdering {
            field: "payload",
            dependency: "data_length_field",
        })?;
        let secondary_header = self.secondary_header_width().map_err(|_| {
            DecodeError::FieldOrdering { field: "payload", dependency: "secondary_header_flag" }
        })?;
        Ok((data_length as i64 + 1) * 8 - secondary_header as i64 - CHECKSUM_BITS as i64)
    }
}

/// Packets produced by framing a whole dump.
#[derive(Debug, Default)]
pub struct FramedDump {
    /// Packets in stream order, up to the first framing failure
    pub packets: Vec<RawPacket>,
    /// Failure that halted framing, if any
    pub error: Option<DecodeError>,
}

/// Sequential packet reader over a [`BitStream`].
pub struct PacketFramer {
    stream: BitStream,
    index: usize,
    halted: bool,
}

impl PacketFramer {
    pub fn new(stream: BitStream) -> Self {
        Self { stream, index: 0, halted: false }
    }

    /// Number of packets framed so far.
    pub fn packets_framed(&self) -> usize {
        self.index
    }

    /// Frame the next packet.
    ///
    /// Returns `Ok(None)` once the stream is exactly exhausted. After an error
    /// the framer is halted and keeps returning `Ok(None)`.
    pub fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        if self.halted || self.stream.is_exhausted() {
            return Ok(None);
        }

        let start_bit = self.stream.position();
        let byte_offset = start_bit / 8;
        let mut apid = None;

        match self.read_packet(byte_offset, &mut apid) {
            Ok(packet) => {
                trace!(
                    "Framed packet #{} apid {} at byte {:#x}: {:?}, count {}, {} payload bits",
                    self.index,
                    packet.apid_hex(),
                    byte_offset,
                    packet.sequence_flags,
                    packet.sequence_count,
                    packet.payload.len()
                );
                self.index += 1;
                Ok(Some(packet))
            }
            Err(err @ DecodeError::OutOfBits { .. }) => {
                self.halted = true;
                Err(DecodeError::TruncatedPacket {
                    index: self.index,
                    byte_offset,
                    apid,
                    source: Box::new(err),
                })
            }
            Err(err) => {
                self.halted = true;
                Err(err)
            }
        }
    }

    fn read_packet(&mut self, byte_offset: usize, apid_seen: &mut Option<u16>) -> Result<RawPacket> {
        let mut widths = HeaderWidths::new();

        let version = self.stream.take_u64(VERSION_BITS)? as u8;
        let packet_type = self.stream.take_u64(TYPE_BITS)? as u8;
        let secondary_header_flag = self.stream.take_u64(SECONDARY_HEADER_FLAG_BITS)? == 1;
        widths.record_secondary_header_flag(secondary_header_flag);

        let apid = self.stream.take_u64(APID_BITS)? as u16;
        *apid_seen = Some(apid);

        let sequence_flags = SequenceFlags::from_bits(self.stream.take_u64(SEQUENCE_FLAGS_BITS)? as u8);
        let sequence_count = self.stream.take_u64(SEQUENCE_COUNT_BITS)? as u16;
        let data_length = self.stream.take_u64(DATA_LENGTH_BITS)? as u16;
        widths.record_data_length(data_length);

        let secondary_header = self.stream.take(widths.secondary_header_width()?)?;

        let payload_width = widths.payload_width()?;
        if payload_width < 0 {
            return Err(DecodeError::MalformedPacket {
                index: self.index,
                byte_offset,
                apid,
                details: format!(
                    "data length {} leaves {} payload bits",
                    data_length, payload_width
                ),
            });
        }
        let payload = self.stream.take(payload_width as usize)?;
        let checksum = self.stream.take(CHECKSUM_BITS)?;

        Ok(RawPacket {
            version,
            packet_type,
            secondary_header_flag,
            apid,
            sequence_flags,
            sequence_count,
            data_length_field: data_length as u32,
            secondary_header,
            payload,
            checksum,
            byte_offset,
        })
    }

    /// Frame every packet, stopping at the first failure.
    ///
    /// Packets framed before the failure are kept.
    pub fn frame_all(mut self) -> FramedDump {
        let mut framed = FramedDump::default();
        loop {
            match self.next_packet() {
                Ok(Some(packet)) => framed.packets.push(packet),
                Ok(None) => break,
                Err(err) => {
                    framed.error = Some(err);
                    break;
                }
            }
        }
        debug!(
            "Framed {} packets from {} bits{}",
            framed.packets.len(),
            self.stream.len(),
            if framed.error.is_some() { " (halted on error)" } else { "" }
        );
        framed
    }
}

impl Iterator for PacketFramer {
    type Item = Result<RawPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{PacketBuilder, dump_hex};
    use proptest::prelude::*;

    fn framer(hex: &str) -> PacketFramer {
        PacketFramer::new(BitStream::from_hex(hex).unwrap())
    }

    #[test]
    fn payload_width_for_data_length_two() {
        let mut widths = HeaderWidths::new();
        widths.record_secondary_header_flag(false);
        widths.record_data_length(2);
        assert_eq!(widths.secondary_header_width().unwrap(), 0);
        assert_eq!(widths.payload_width().unwrap(), 8);
    }

    #[test]
    fn secondary_header_adds_64_bits() {
        let mut widths = HeaderWidths::new();
        widths.record_secondary_header_flag(true);
        widths.record_data_length(10);
        assert_eq!(widths.secondary_header_width().unwrap(), 64);
        assert_eq!(widths.payload_width().unwrap(), 88 - 64 - 16);
    }

    #[test]
    fn widths_before_dependencies_are_ordering_errors() {
        let widths = HeaderWidths::new();
        assert!(matches!(
            widths.secondary_header_width(),
            Err(DecodeError::FieldOrdering { dependency: "secondary_header_flag", .. })
        ));
        assert!(matches!(
            widths.payload_width(),
            Err(DecodeError::FieldOrdering { field: "payload", dependency: "data_length_field" })
        ));

        let mut widths = HeaderWidths::new();
        widths.record_data_length(4);
        assert!(matches!(
            widths.payload_width(),
            Err(DecodeError::FieldOrdering { dependency: "secondary_header_flag", .. })
        ));
    }

    #[test]
    fn frames_single_packet() {
        let mut framer = framer("01A3C0050002AABEEF");
        let packet = framer.next_packet().unwrap().unwrap();

        assert_eq!(packet.version, 0);
        assert!(!packet.secondary_header_flag);
        assert_eq!(packet.apid, 0x1A3);
        assert_eq!(packet.sequence_flags, SequenceFlags::Unsegmented);
        assert_eq!(packet.sequence_count, 5);
        assert_eq!(packet.data_length_field, 2);
        assert!(packet.secondary_header.is_empty());
        assert_eq!(packet.payload_bytes(), Some(vec![0xAA]));
        assert_eq!(packet.checksum.to_hex().as_deref(), Some("BEEF"));
        assert_eq!(packet.bit_len(), 72);

        assert!(framer.next_packet().unwrap().is_none());
        assert_eq!(framer.packets_framed(), 1);
    }

    #[test]
    fn frames_secondary_header() {
        let hex = PacketBuilder::new(0x20).gps_time(0, 0).payload(&[1, 2, 3]).to_hex();
        let packet = framer(&hex).next_packet().unwrap().unwrap();
        assert!(packet.secondary_header_flag);
        assert_eq!(packet.secondary_header.len(), 64);
        assert_eq!(packet.payload_bytes(), Some(vec![1, 2, 3]));
        assert_eq!(packet.timestamp().unwrap().to_rfc3339(), "1980-01-06T00:00:00+00:00");
    }

    #[test]
    fn byte_offsets_follow_packet_lengths() {
        let hex = dump_hex(&[
            PacketBuilder::new(1).payload(&[0x11]),
            PacketBuilder::new(2).payload(&[0x22, 0x33]),
            PacketBuilder::new(3),
        ]);
        let packets: Vec<RawPacket> = framer(&hex).collect::<Result<_>>().unwrap();
        let offsets: Vec<usize> = packets.iter().map(|p| p.byte_offset).collect();
        assert_eq!(offsets, vec![0, 9, 19]);
    }

    #[test]
    fn truncated_header_halts_framing() {
        let mut hex = PacketBuilder::new(7).payload(&[0xAB]).to_hex();
        hex.push_str("01A3C0");
        let framed = framer(&hex).frame_all();

        assert_eq!(framed.packets.len(), 1);
        match framed.error {
            Some(DecodeError::TruncatedPacket { index, byte_offset, apid, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(byte_offset, 9);
                // 24 bits cover the apid but not the data length
                assert_eq!(apid, Some(0x1A3));
            }
            other => panic!("Expected TruncatedPacket, got {:?}", other),
        }
    }

    #[test]
    fn truncated_before_apid_has_no_apid() {
        let framed = framer("0").frame_all();
        assert!(framed.packets.is_empty());
        assert!(matches!(framed.error, Some(DecodeError::TruncatedPacket { apid: None, .. })));
    }

    #[test]
    fn truncated_payload_reports_apid() {
        let hex = PacketBuilder::new(0x42).payload(&[1, 2, 3, 4]).to_hex();
        let framed = framer(&hex[..hex.len() - 6]).frame_all();
        assert!(framed.packets.is_empty());
        assert!(matches!(
            framed.error,
            Some(DecodeError::TruncatedPacket { apid: Some(0x42), index: 0, .. })
        ));
    }

    #[test]
    fn negative_payload_width_is_malformed() {
        // Secondary header flagged but the data length only covers the checksum
        let hex = PacketBuilder::new(9).gps_time(1, 1).data_length(1).to_hex();
        let mut framer = framer(&hex);
        match framer.next_packet() {
            Err(DecodeError::MalformedPacket { apid, index, .. }) => {
                assert_eq!((apid, index), (9, 0));
            }
            other => panic!("Expected MalformedPacket, got {:?}", other),
        }
        assert!(framer.next_packet().unwrap().is_none());
    }

    #[test]
    fn empty_stream_frames_nothing() {
        let framed = framer("").frame_all();
        assert!(framed.packets.is_empty());
        assert!(framed.error.is_none());
    }

    proptest! {
        #[test]
        fn prop_generated_sequences_frame_back(
            specs in prop::collection::vec(
                (0u16..0x800, 0u8..4, 0u16..0x4000, prop::collection::vec(any::<u8>(), 0..24), any::<bool>()),
                0..12
            )
        ) {
            let builders: Vec<PacketBuilder> = specs
                .iter()
                .map(|(apid, flags, count, payload, timed)| {
                    let builder = PacketBuilder::new(*apid)
                        .flags(SequenceFlags::from_bits(*flags))
                        .count(*count)
                        .payload(payload);
                    if *timed { builder.gps_time(2000, 1000) } else { builder }
                })
                .collect();

            let framed = framer(&dump_hex(&builders)).frame_all();
            prop_assert!(framed.error.is_none());
            prop_assert_eq!(framed.packets.len(), specs.len());

            for (packet, (apid, flags, count, payload, timed)) in framed.packets.iter().zip(&specs) {
                prop_assert_eq!(packet.apid, *apid);
                prop_assert_eq!(packet.sequence_flags.bits(), *flags);
                prop_assert_eq!(packet.sequence_count, *count);
                prop_assert_eq!(packet.secondary_header_flag, *timed);
                prop_assert_eq!(packet.payload_bytes().unwrap(), payload.clone());
            }
        }
    }
}
