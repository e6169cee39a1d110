//! Decoded packet output handed to the visualization layer

use super::Value;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One named field of a decoded packet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedField {
    pub name: String,
    pub unit: Option<String>,
    /// Payload bits consumed; zero for group headers
    pub bits: usize,
    /// `None` for group headers, unsupported formats and failed calibrations
    pub value: Option<Value>,
}

/// Why field decoding stopped for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecodeEnd {
    /// Reached the `Total` sentinel
    Terminal,
    /// The next field was wider than the remaining payload
    PayloadExhausted,
    /// The catalog ran out of fields without a sentinel
    CatalogExhausted,
}

/// A packet whose payload has been converted into typed field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedPacket {
    pub apid: u16,
    pub sequence_count: u16,
    /// GPS time from the secondary header, if present
    pub timestamp: Option<DateTime<Utc>>,
    pub fields: Vec<DecodedField>,
    pub end: DecodeEnd,
}

impl DecodedPacket {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&DecodedField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Value of a named field, `None` if missing or null.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name)?.value.as_ref()
    }
}
