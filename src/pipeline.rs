//! Dump decoding pipeline
//!
//! Composes the stages in order: framing, reassembly, field decoding. Only
//! malformed input and framer contract violations abort; every other failure is
//! collected in the [`DecodeReport`] next to the packets that did decode.
//!
//! ## Usage Example
//!
//! ```rust
//! use spacepacket::{DecodeOptions, PacketCatalog, TelemetryDump, decode_telemetry};
//!
//! # fn main() -> spacepacket::Result<()> {
//! let catalog = PacketCatalog::from_yaml_str(r#"
//! streams:
//!   - apid: 0x1A3
//!     name: EPS
//!     fields:
//!       - { name: Mode, bits: 8, format: uint8 }
//!       - { name: Total }
//! "#)?;
//! let dump = TelemetryDump::from_hex_str("01A3C0050002AABEEF");
//!
//! let report = decode_telemetry(&dump, &catalog, &DecodeOptions::default())?;
//! assert_eq!(report.packets.len(), 1);
//! assert_eq!(report.packets[0].value("Mode").and_then(|v| v.as_u64()), Some(0xAA));
//! # Ok(())
//! # }
//! ```

use crate::bits::BitStream;
use crate::catalog::PacketCatalog;
use crate::dump::TelemetryDump;
use crate::engine::{FieldDecodeEngine, FormatDiagnostic};
use crate::framer::PacketFramer;
use crate::reassembly::{ReassemblyStats, SegmentReassembler};
use crate::types::DecodedPacket;
use crate::{DecodeError, Result};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Pipeline switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fold START..END groups into single packets
    pub reassemble: bool,
    /// Only decode this stream identifier
    pub apid: Option<u16>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { reassemble: true, apid: None }
    }
}

impl DecodeOptions {
    pub fn with_apid(mut self, apid: u16) -> Self {
        self.apid = Some(apid);
        self
    }

    pub fn without_reassembly(mut self) -> Self {
        self.reassemble = false;
        self
    }
}

/// A logical packet whose payload could not be decoded.
#[derive(Debug)]
pub struct PacketFailure {
    pub apid: u16,
    pub sequence_count: u16,
    pub byte_offset: usize,
    pub error: DecodeError,
}

/// An unsupported type tag, reported once however often it occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSummary {
    pub format: String,
    /// Bits of the first occurrence
    pub example_bits: String,
    pub reason: String,
    pub occurrences: usize,
}

/// Everything produced by decoding one dump.
#[derive(Debug, Default)]
pub struct DecodeReport {
    /// Decoded packets, grouped per stream in order of first appearance
    pub packets: Vec<DecodedPacket>,
    /// Packets framed from the dump before filtering
    pub framed_packets: usize,
    pub reassembly: Option<ReassemblyStats>,
    /// Failure that halted framing
    pub framing_error: Option<DecodeError>,
    pub failures: Vec<PacketFailure>,
    /// Logical packets with no catalog entry, counted per stream
    pub undecoded: BTreeMap<u16, usize>,
    pub diagnostics: Vec<FormatDiagnostic>,
}

impl DecodeReport {
    /// Decoded packets of one stream.
    pub fn packets_for(&self, apid: u16) -> impl Iterator<Item = &DecodedPacket> {
        self.packets.iter().filter(move |packet| packet.apid == apid)
    }

    /// Decoded packet count per stream.
    pub fn counts(&self) -> BTreeMap<u16, usize> {
        let mut counts = BTreeMap::new();
        for packet in &self.packets {
            *counts.entry(packet.apid).or_insert(0) += 1;
        }
        counts
    }

    /// Unsupported formats, de-duplicated by type tag in order of first occurrence.
    pub fn unsupported_formats(&self) -> Vec<FormatSummary> {
        let mut summaries: Vec<FormatSummary> = Vec::new();
        for diagnostic in &self.diagnostics {
            match summaries.iter_mut().find(|summary| summary.format == diagnostic.format) {
                Some(summary) => summary.occurrences += 1,
                None => summaries.push(FormatSummary {
                    format: diagnostic.format.clone(),
                    example_bits: diagnostic.bits.clone(),
                    reason: diagnostic.reason.clone(),
                    occurrences: 1,
                }),
            }
        }
        summaries
    }

    /// True when nothing was truncated, failed, skipped or nulled.
    pub fn is_clean(&self) -> bool {
        self.framing_error.is_none()
            && self.failures.is_empty()
            && self.undecoded.is_empty()
            && self.diagnostics.is_empty()
    }
}

/// Decode a loaded dump. Invalid hex aborts with `MalformedInput`.
pub fn decode_telemetry(
    dump: &TelemetryDump,
    catalog: &PacketCatalog,
    options: &DecodeOptions,
) -> Result<DecodeReport> {
    decode_dump(dump.bit_stream()?, catalog, options)
}

/// Frame, reassemble and decode every packet in `stream`.
///
/// Framer contract violations are returned as errors; all other failures are
/// recorded in the report.
pub fn decode_dump(stream: BitStream, catalog: &PacketCatalog, options: &DecodeOptions) -> Result<DecodeReport> {
    let framed = PacketFramer::new(stream).frame_all();
    let mut report = DecodeReport { framed_packets: framed.packets.len(), ..Default::default() };

    match framed.error {
        Some(err @ DecodeError::FieldOrdering { .. }) => return Err(err),
        Some(err) => {
            warn!("Framing halted after {} packets: {}", framed.packets.len(), err);
            report.framing_error = Some(err);
        }
        None => {}
    }

    let selected: Vec<_> = match options.apid {
        Some(apid) => framed.packets.into_iter().filter(|packet| packet.apid == apid).collect(),
        None => framed.packets,
    };

    let logical = if options.reassemble {
        let (logical, stats) = SegmentReassembler::reassemble(selected);
        report.reassembly = Some(stats);
        logical
    } else {
        selected
    };

    for packet in &logical {
        let Some(fields) = catalog.fields(packet.apid) else {
            *report.undecoded.entry(packet.apid).or_insert(0) += 1;
            continue;
        };

        match FieldDecodeEngine::decode(packet, fields) {
            Ok(decoded) => {
                report.diagnostics.extend(decoded.diagnostics);
                report.packets.push(decoded.packet);
            }
            Err(error) => {
                warn!("Failed to decode packet at byte {:#x}: {}", packet.byte_offset, error);
                report.failures.push(PacketFailure {
                    apid: packet.apid,
                    sequence_count: packet.sequence_count,
                    byte_offset: packet.byte_offset,
                    error,
                });
            }
        }
    }

    for (apid, count) in &report.undecoded {
        warn!("No catalog entry for apid {:#x}; {} packets left undecoded", apid, count);
    }
    for summary in report.unsupported_formats() {
        warn!(
            "Format '{}' needs a conversion ({} occurrences, e.g. {})",
            summary.format, summary.occurrences, summary.example_bits
        );
    }
    debug!(
        "Decoded {} of {} logical packets ({} failed, {} framed)",
        report.packets.len(),
        logical.len(),
        report.failures.len(),
        report.framed_packets
    );

    Ok(report)
}
