//! Core types for space packet data representation.
//!
//! ## Architecture
//!
//! The types map directly onto the stages of dump decoding:
//! - [`RawPacket`] is one framed packet: decoded primary header fields plus the
//!   secondary header, payload and checksum bit strings
//! - [`SequenceFlags`] is the 2-bit segmentation marker used for reassembly
//! - [`Value`] is a typed value produced from a payload field
//! - [`DecodedPacket`] is a packet's payload turned into named fields
//!
//! ## Usage Example
//!
//! ```rust
//! use spacepacket::types::{DecodedField, DecodedPacket, DecodeEnd, Value};
//!
//! let packet = DecodedPacket {
//!     apid: 0x1A3,
//!     sequence_count: 7,
//!     timestamp: None,
//!     fields: vec![DecodedField { name: "Mode".into(), unit: None, bits: 8, value: Some(Value::UInt(2)) }],
//!     end: DecodeEnd::Terminal,
//! };
//!
//! assert_eq!(packet.value("Mode").and_then(Value::as_u64), Some(2));
//! ```

mod decoded;
mod packet;
mod value;

pub use decoded::{DecodeEnd, DecodedField, DecodedPacket};
pub use packet::{
    APID_BITS, CHECKSUM_BITS, DATA_LENGTH_BITS, PRIMARY_HEADER_BITS, RawPacket,
    SECONDARY_HEADER_BITS, SECONDARY_HEADER_FLAG_BITS, SEQUENCE_COUNT_BITS, SEQUENCE_FLAGS_BITS,
    SequenceFlags, TYPE_BITS, VERSION_BITS,
};
pub use value::Value;
