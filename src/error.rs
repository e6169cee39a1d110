//! Error types for telemetry dump decoding.
//!
//! All errors implement `std::error::Error` and carry enough context (stream
//! identifier, byte offset, field name) to locate the offending packet.
//!
//! ## Error Categories
//!
//! - **Input Errors**: invalid hex digits or unreadable dump files (abort the decode)
//! - **Framing Errors**: truncated or malformed packets (halt framing, earlier packets stay valid)
//! - **Contract Errors**: header widths resolved out of order (framer bug, never bad input)
//! - **Field Errors**: unsupported formats and calibration failures (non-fatal, value becomes none)
//! - **Shape Errors**: vector/matrix bit counts that cannot be split (fatal for the packet)
//!
//! ## Fatal vs. per-field
//!
//! ```rust
//! use spacepacket::DecodeError;
//!
//! let error = DecodeError::unsupported_format("tristate", "101", "unknown type tag");
//! assert!(!error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for decode operations.
pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

/// Main error type for decode operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("Malformed input at offset {offset}: {details}")]
    MalformedInput { offset: usize, details: String },

    #[error("Out of bits: requested {requested}, {available} available at bit {bit_offset}")]
    OutOfBits { requested: usize, available: usize, bit_offset: usize },

    #[error("Truncated packet #{index} at byte offset {byte_offset:#x}{}", apid_suffix(.apid))]
    TruncatedPacket {
        index: usize,
        byte_offset: usize,
        apid: Option<u16>,
        #[source]
        source: Box<DecodeError>,
    },

    #[error("Malformed packet #{index} at byte offset {byte_offset:#x} (apid {apid:#x}): {details}")]
    MalformedPacket { index: usize, byte_offset: usize, apid: u16, details: String },

    #[error("Header field '{field}' resolved before '{dependency}' was decoded")]
    FieldOrdering { field: &'static str, dependency: &'static str },

    #[error("Unsupported format '{format}' for bits '{bits}': {reason}")]
    UnsupportedFormat { format: String, bits: String, reason: String },

    #[error("Calibration formula '{formula}' failed: {details}")]
    Calibration { formula: String, details: String },

    #[error("Field of format '{format}' cannot be split ({bit_len} bits): {details}")]
    FieldShape { format: String, bit_len: usize, details: String },

    #[error("Failed to decode field '{field}' of apid {apid:#x} at payload bit {bit_offset}")]
    FieldDecode {
        apid: u16,
        field: String,
        bit_offset: usize,
        #[source]
        source: Box<DecodeError>,
    },

    #[error("Telemetry dump error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog error in {context}: {details}")]
    Catalog { context: String, details: String },
}

fn apid_suffix(apid: &Option<u16>) -> String {
    apid.map(|apid| format!(" (apid {:#x})", apid)).unwrap_or_default()
}

impl DecodeError {
    /// Returns whether this error aborts the enclosing unit of work.
    ///
    /// Unsupported formats and calibration failures only null out one field;
    /// everything else is fatal at least for the packet it occurred in.
    pub fn is_fatal(&self) -> bool {
        match self {
            DecodeError::UnsupportedFormat { .. } => false,
            DecodeError::Calibration { .. } => false,
            DecodeError::MalformedInput { .. } => true,
            DecodeError::OutOfBits { .. } => true,
            DecodeError::TruncatedPacket { .. } => true,
            DecodeError::MalformedPacket { .. } => true,
            DecodeError::FieldOrdering { .. } => true,
            DecodeError::FieldShape { .. } => true,
            DecodeError::FieldDecode { .. } => true,
            DecodeError::File { .. } => true,
            DecodeError::Catalog { .. } => true,
        }
    }

    /// Returns suggested remediation steps for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            DecodeError::MalformedInput { .. } => vec![
                "Check the dump contains only hex digits and whitespace",
                "Open binary dumps as raw bytes instead of hex text",
            ],
            DecodeError::OutOfBits { .. } | DecodeError::TruncatedPacket { .. } => vec![
                "Check the dump was not cut short during transfer",
                "Packets decoded before the truncation remain valid",
            ],
            DecodeError::MalformedPacket { .. } => vec![
                "Check the packet data length field against the secondary header flag",
                "Verify the dump starts on a packet boundary",
            ],
            DecodeError::FieldOrdering { .. } => vec![
                "Decode header fields strictly in declaration order",
                "Report this as a framer defect",
            ],
            DecodeError::UnsupportedFormat { .. } => vec![
                "Add a conversion for this type tag",
                "Correct the type tag in the field catalog",
            ],
            DecodeError::Calibration { .. } => vec![
                "Check the calibration formula syntax in the field catalog",
                "Only + - * / ^, parentheses, numbers and 'adc' are accepted",
            ],
            DecodeError::FieldShape { .. } => vec![
                "Check the declared bit width matches the element count",
                "Verify the matrix dimensions encoded in the type tag",
            ],
            DecodeError::FieldDecode { .. } => vec![
                "Inspect the field catalog entry for this stream",
                "Compare the declared widths with the packet data length",
            ],
            DecodeError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            DecodeError::Catalog { .. } => vec![
                "Check the catalog YAML structure",
                "Verify stream identifiers are unique 11-bit values",
            ],
        }
    }

    /// Helper constructor for malformed input errors.
    pub fn malformed_input(offset: usize, details: impl Into<String>) -> Self {
        DecodeError::MalformedInput { offset, details: details.into() }
    }

    /// Helper constructor for unsupported format errors.
    pub fn unsupported_format(
        format: impl Into<String>,
        bits: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DecodeError::UnsupportedFormat {
            format: format.into(),
            bits: bits.into(),
            reason: reason.into(),
        }
    }

    /// Helper constructor for calibration errors.
    pub fn calibration(formula: impl Into<String>, details: impl Into<String>) -> Self {
        DecodeError::Calibration { formula: formula.into(), details: details.into() }
    }

    /// Helper constructor for shape errors.
    pub fn field_shape(format: impl Into<String>, bit_len: usize, details: impl Into<String>) -> Self {
        DecodeError::FieldShape { format: format.into(), bit_len, details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        DecodeError::File { path, source }
    }

    /// Helper constructor for catalog errors.
    pub fn catalog(context: impl Into<String>, details: impl Into<String>) -> Self {
        DecodeError::Catalog { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
