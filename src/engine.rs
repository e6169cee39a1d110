//! Payload field decoding
//!
//! Walks a packet's payload against its stream's catalog entry with a single
//! bit cursor. Zero-width (`N/A`) fields consume nothing; decoding stops at
//! the `Total` sentinel or at the first field wider than the bits left.

use crate::bits::BitStream;
use crate::catalog::FieldSpec;
use crate::convert::{self, is_not_applicable};
use crate::types::{DecodeEnd, DecodedField, DecodedPacket, RawPacket};
use crate::{DecodeError, Result};
use serde::Serialize;
use tracing::{trace, warn};

/// A field whose value was nulled because its format could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatDiagnostic {
    pub apid: u16,
    pub field: String,
    /// Type tag as written in the catalog
    pub format: String,
    /// Offending bits, rendered as 0/1
    pub bits: String,
    pub reason: String,
}

/// Result of decoding one packet.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketDecode {
    pub packet: DecodedPacket,
    pub diagnostics: Vec<FormatDiagnostic>,
}

/// Stateless payload decoder.
pub struct FieldDecodeEngine;

impl FieldDecodeEngine {
    /// Decode `packet`'s payload using `fields`.
    ///
    /// Per-field conversion failures null the value and are returned as
    /// diagnostics. Shape errors and short reads fail the whole packet with
    /// [`DecodeError::FieldDecode`].
    pub fn decode(packet: &RawPacket, fields: &[FieldSpec]) -> Result<PacketDecode> {
        let mut payload = BitStream::new(packet.payload.clone());
        let mut decoded = Vec::with_capacity(fields.len());
        let mut diagnostics = Vec::new();
        let mut end = DecodeEnd::CatalogExhausted;

        for spec in fields {
            if spec.is_terminal() {
                end = DecodeEnd::Terminal;
                break;
            }
            let width = spec.bits.bits();
            if width > payload.remaining() {
                trace!(
                    "apid {}: field '{}' needs {} bits, {} left",
                    packet.apid_hex(),
                    spec.name,
                    width,
                    payload.remaining()
                );
                end = DecodeEnd::PayloadExhausted;
                break;
            }

            let bit_offset = payload.position();
            let fatal = |source: DecodeError| DecodeError::FieldDecode {
                apid: packet.apid,
                field: spec.name.trim().to_string(),
                bit_offset,
                source: Box::new(source),
            };

            let bits = payload.take(width).map_err(fatal)?;
            debug_assert_eq!(bits.len(), width);

            let format = spec.format.as_deref().filter(|tag| !is_not_applicable(tag));
            let value = match (format, width) {
                (None, 0) => None,
                (None, _) => {
                    let diagnostic = FormatDiagnostic {
                        apid: packet.apid,
                        field: spec.name.trim().to_string(),
                        format: spec.format.clone().unwrap_or_default(),
                        bits: bits.to_string(),
                        reason: "field has a width but no type tag".to_string(),
                    };
                    warn!("apid {}: field '{}' has no type tag", packet.apid_hex(), spec.name);
                    diagnostics.push(diagnostic);
                    None
                }
                (Some(tag), _) => match convert::binary_to_value(&bits, Some(tag), spec.conversion.as_deref()) {
                    Ok(value) => value,
                    Err(err) if !err.is_fatal() => {
                        warn!("apid {}: field '{}': {}", packet.apid_hex(), spec.name, err);
                        diagnostics.push(diagnostic_from(packet.apid, spec, tag, &bits.to_string(), err));
                        None
                    }
                    Err(err) => return Err(fatal(err)),
                },
            };

            decoded.push(DecodedField {
                name: spec.name.trim().to_string(),
                unit: spec.unit().map(str::to_string),
                bits: width,
                value,
            });
        }

        Ok(PacketDecode {
            packet: DecodedPacket {
                apid: packet.apid,
                sequence_count: packet.sequence_count,
                timestamp: packet.timestamp(),
                fields: decoded,
                end,
            },
            diagnostics,
        })
    }
}

fn diagnostic_from(apid: u16, spec: &FieldSpec, tag: &str, bits: &str, err: DecodeError) -> FormatDiagnostic {
    let reason = match &err {
        DecodeError::UnsupportedFormat { reason, .. } => reason.clone(),
        other => other.to_string(),
    };
    FormatDiagnostic {
        apid,
        field: spec.name.trim().to_string(),
        format: tag.to_string(),
        bits: bits.to_string(),
        reason,
    }
}
