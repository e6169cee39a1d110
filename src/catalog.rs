//! Packet field catalog.
//!
//! The catalog describes, for every stream identifier (APID), the ordered list
//! of fields carried in that stream's payload. It is maintained outside this
//! crate (engineering spreadsheets) and injected here as read-only
//! configuration, typically as YAML:
//!
//! ```yaml
//! streams:
//!   - apid: 0x1A3
//!     name: EPS housekeeping
//!     identification: TM-EPS-01
//!     fields:
//!       - { name: Mode, bits: 8, format: uint8 }
//!       - { name: Battery, bits: N/A }
//!       - { name: Voltage, bits: 16, format: 12-bit ADC, conversion: "adc*0.01", unit: V }
//!       - { name: Total }
//! ```
//!
//! A field list ends logically at the `Total` sentinel.

use crate::{DecodeError, Result};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reserved field name marking the end of a stream's field list.
pub const TERMINAL_FIELD: &str = "Total";

/// Largest stream identifier representable in the 11-bit APID field.
pub const MAX_APID: u16 = 0x7FF;

/// Declared width of a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum BitWidth {
    Fixed(usize),
    /// Absent or `N/A`: consumes no bits (used for group headers)
    #[default]
    NotApplicable,
}

impl BitWidth {
    /// Bits consumed from the payload.
    pub fn bits(&self) -> usize {
        match self {
            BitWidth::Fixed(bits) => *bits,
            BitWidth::NotApplicable => 0,
        }
    }
}

impl<'de> Deserialize<'de> for BitWidth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawWidth {
            Int(u64),
            Float(f64),
            Text(String),
        }

        match Option::<RawWidth>::deserialize(deserializer)? {
            None => Ok(BitWidth::NotApplicable),
            Some(RawWidth::Int(bits)) => usize::try_from(bits)
                .map(BitWidth::Fixed)
                .map_err(|_| de::Error::custom(format!("bit width {} is too large", bits))),
            Some(RawWidth::Float(bits)) if bits >= 0.0 && bits.fract() == 0.0 => {
                Ok(BitWidth::Fixed(bits as usize))
            }
            Some(RawWidth::Float(bits)) => {
                Err(de::Error::custom(format!("bit width {} is not a whole number", bits)))
            }
            Some(RawWidth::Text(text)) if crate::convert::is_not_applicable(&text) => {
                Ok(BitWidth::NotApplicable)
            }
            Some(RawWidth::Text(text)) => text
                .trim()
                .parse::<usize>()
                .map(BitWidth::Fixed)
                .map_err(|_| de::Error::custom(format!("invalid bit width '{}'", text))),
        }
    }
}

/// Nominal range bound; spreadsheets mix numbers and free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Nominal {
    Number(f64),
    Text(String),
}

/// One payload field of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(alias = "field")]
    pub name: String,
    #[serde(default)]
    pub bits: BitWidth,
    /// Type tag, parsed by [`crate::convert::FieldType`]
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub nominal_min: Option<Nominal>,
    #[serde(default)]
    pub nominal_max: Option<Nominal>,
    /// Calibration formula for ADC fields
    #[serde(default)]
    pub conversion: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, bits: usize, format: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            bits: BitWidth::Fixed(bits),
            format: Some(format.into()),
            nominal_min: None,
            nominal_max: None,
            conversion: None,
            unit: None,
            note: None,
        }
    }

    /// A zero-width label row that groups the fields after it.
    pub fn group(name: impl Into<String>) -> Self {
        Self { bits: BitWidth::NotApplicable, format: None, ..Self::new(name, 0, "") }
    }

    /// The `Total` sentinel.
    pub fn terminal() -> Self {
        Self::group(TERMINAL_FIELD)
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_conversion(mut self, conversion: impl Into<String>) -> Self {
        self.conversion = Some(conversion.into());
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.nominal_min = Some(Nominal::Number(min));
        self.nominal_max = Some(Nominal::Number(max));
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.name.trim() == TERMINAL_FIELD
    }

    /// Unit, treating `N/A` as absent.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref().filter(|unit| !crate::convert::is_not_applicable(unit))
    }
}

/// Catalog entry for a single stream identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamCatalog {
    #[serde(deserialize_with = "deserialize_apid")]
    pub apid: u16,
    /// Human-readable stream/data name
    pub name: String,
    #[serde(default)]
    pub identification: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl StreamCatalog {
    pub fn new(apid: u16, name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self { apid, name: name.into(), identification: None, fields }
    }

    /// Payload bits declared before the sentinel.
    pub fn declared_bits(&self) -> usize {
        self.fields.iter().take_while(|field| !field.is_terminal()).map(|f| f.bits.bits()).sum()
    }
}

#[derive(Deserialize)]
struct CatalogDocument {
    streams: Vec<StreamCatalog>,
}

/// All stream catalogs, keyed by stream identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketCatalog {
    streams: BTreeMap<u16, StreamCatalog>,
}

impl PacketCatalog {
    /// Build a catalog, rejecting duplicate or out-of-range stream identifiers.
    pub fn new(streams: Vec<StreamCatalog>) -> Result<Self> {
        let mut by_apid = BTreeMap::new();
        for stream in streams {
            if stream.apid > MAX_APID {
                return Err(DecodeError::catalog(
                    "Catalog validation",
                    format!("apid {:#x} does not fit in 11 bits", stream.apid),
                ));
            }
            if stream.fields.is_empty() {
                return Err(DecodeError::catalog(
                    "Catalog validation",
                    format!("stream '{}' ({:#x}) has no fields", stream.name, stream.apid),
                ));
            }
            let apid = stream.apid;
            if by_apid.insert(apid, stream).is_some() {
                return Err(DecodeError::catalog(
                    "Catalog validation",
                    format!("apid {:#x} is defined more than once", apid),
                ));
            }
        }
        Ok(Self { streams: by_apid })
    }

    /// Parse a catalog from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: CatalogDocument =
            serde_yaml_ng::from_str(yaml).map_err(|e| DecodeError::Catalog {
                context: "Catalog YAML parsing".to_string(),
                details: e.to_string(),
            })?;
        let catalog = Self::new(document.streams)?;
        debug!("Loaded catalog with {} streams", catalog.len());
        Ok(catalog)
    }

    /// Load a catalog from a YAML file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = fs::read_to_string(&path)
            .map_err(|e| DecodeError::file_error(path.as_ref().to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn stream(&self, apid: u16) -> Option<&StreamCatalog> {
        self.streams.get(&apid)
    }

    /// Ordered field list for a stream.
    pub fn fields(&self, apid: u16) -> Option<&[FieldSpec]> {
        self.stream(apid).map(|stream| stream.fields.as_slice())
    }

    /// Stream name for display, falling back to the hex identifier.
    pub fn display_name(&self, apid: u16) -> String {
        match self.stream(apid) {
            Some(stream) if !stream.name.trim().is_empty() => stream.name.clone(),
            _ => format!("{:#x}", apid),
        }
    }

    /// Streams in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &StreamCatalog> {
        self.streams.values()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

fn deserialize_apid<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawApid {
        Int(u64),
        Text(String),
    }

    let apid = match RawApid::deserialize(deserializer)? {
        RawApid::Int(value) => value,
        RawApid::Text(text) => {
            let text = text.trim();
            let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
            u64::from_str_radix(digits, 16)
                .map_err(|_| de::Error::custom(format!("invalid apid '{}'", text)))?
        }
    };
    u16::try_from(apid).map_err(|_| de::Error::custom(format!("apid {} is out of range", apid)))
}
