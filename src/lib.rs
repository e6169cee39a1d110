//! Batch decoder for CCSDS-style spacecraft telemetry dumps.
//!
//! Spacepacket turns a raw telemetry dump (hex text or binary capture) into
//! typed, unit-tagged engineering values using per-stream field catalogs.
//!
//! # Pipeline
//!
//! - **Framing**: [`PacketFramer`] splits the dump's bits into [`RawPacket`]s,
//!   resolving the secondary header and payload widths from earlier fields
//! - **Reassembly**: [`SegmentReassembler`] folds START/CONTINUATION/END groups
//!   into single logical packets per stream
//! - **Field decoding**: [`FieldDecodeEngine`] walks each payload against its
//!   [`PacketCatalog`] entry, converting fields through [`convert::FieldType`]
//! - **Handoff**: [`StreamTable`] lays one stream's packets out as columns
//!
//! ## Example
//!
//! ```rust,no_run
//! use spacepacket::{DecodeOptions, PacketCatalog, StreamTable, TelemetryDump, decode_telemetry};
//!
//! fn main() -> spacepacket::Result<()> {
//!     let catalog = PacketCatalog::open("catalog.yaml")?;
//!     let dump = TelemetryDump::open("dump.hex")?;
//!
//!     let report = decode_telemetry(&dump, &catalog, &DecodeOptions::default())?;
//!     for (apid, count) in report.counts() {
//!         println!("{}: {} packets", catalog.display_name(apid), count);
//!     }
//!
//!     let table = StreamTable::from_packets(0x1A3, &report.packets);
//!     print!("{}", table);
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod bits;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Configuration and conversion
pub mod catalog;
pub mod convert;

// Decode stages
pub mod dump;
pub mod engine;
pub mod framer;
pub mod pipeline;
pub mod reassembly;
pub mod table;

// Core exports
pub use bits::{BitStream, BitString};
pub use error::*;
pub use types::*;

// Stage exports
pub use catalog::{BitWidth, FieldSpec, PacketCatalog, StreamCatalog};
pub use dump::TelemetryDump;
pub use engine::{FieldDecodeEngine, FormatDiagnostic, PacketDecode};
pub use framer::{FramedDump, HeaderWidths, PacketFramer};
pub use pipeline::{DecodeOptions, DecodeReport, decode_dump, decode_telemetry};
pub use reassembly::{ReassemblyStats, SegmentReassembler};
pub use table::StreamTable;
