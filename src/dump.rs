//! Telemetry dump loading
//!
//! Dumps arrive either as text files of hex digits (split across lines) or as
//! raw binary captures. Text is detected by valid UTF-8; every line is
//! stripped of whitespace and the lines are concatenated.

use crate::bits::BitStream;
use crate::{DecodeError, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// A whole dump held in memory before framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryDump {
    Hex(String),
    Binary(Vec<u8>),
}

impl TelemetryDump {
    /// Read a dump file, as hex text when it is valid UTF-8 and raw bytes otherwise.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(&path).map_err(|e| DecodeError::file_error(path.as_ref().to_path_buf(), e))?;

        let dump = match String::from_utf8(data) {
            Ok(text) => Self::from_hex_str(&text),
            Err(err) => Self::from_bytes(err.into_bytes()),
        };
        debug!("Loaded {} dump from {}: {} bits", dump.kind(), path.as_ref().display(), dump.bit_len());
        Ok(dump)
    }

    /// Hex text; whitespace inside and between lines is dropped.
    pub fn from_hex_str(text: &str) -> Self {
        TelemetryDump::Hex(text.lines().flat_map(|line| line.split_whitespace()).collect())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        TelemetryDump::Binary(bytes.into())
    }

    /// Size of the dump in bits, assuming every hex character is a digit.
    pub fn bit_len(&self) -> usize {
        match self {
            TelemetryDump::Hex(hex) => hex.len() * 4,
            TelemetryDump::Binary(bytes) => bytes.len() * 8,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            TelemetryDump::Hex(_) => "hex",
            TelemetryDump::Binary(_) => "binary",
        }
    }

    /// Expand the dump into a bit stream.
    ///
    /// Fails with `MalformedInput` at the first non-hex character.
    pub fn bit_stream(&self) -> Result<BitStream> {
        match self {
            TelemetryDump::Hex(hex) => BitStream::from_hex(hex),
            TelemetryDump::Binary(bytes) => Ok(BitStream::from_bytes(bytes)),
        }
    }
}
