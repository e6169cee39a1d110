//! Type-tag dispatched conversion from payload bits to typed values.
//!
//! Catalog type tags are free text coming from engineering spreadsheets. They
//! are parsed once into a closed [`FieldType`] and every variant owns its
//! decode path, so an unknown tag is an explicit `UnsupportedFormat` error
//! rather than a silent fallthrough.
//!
//! | Tag                          | Type                     | Value                  |
//! |------------------------------|--------------------------|------------------------|
//! | contains `uint`              | [`FieldType::UnsignedInt`] | [`Value::UInt`]      |
//! | `int16`, `int32`             | [`FieldType::SignedInt`] | [`Value::Int`]         |
//! | `float`                      | [`FieldType::Float`]     | [`Value::Float`]       |
//! | `quaternion`, contains `vector` | [`FieldType::Vector`] | [`Value::Vector`]      |
//! | `char` / `uchar`             | [`FieldType::Char`] / [`FieldType::UnsignedChar`] | [`Value::Char`] / [`Value::UInt`] |
//! | `bit`                        | [`FieldType::Bit`]       | [`Value::Bit`]         |
//! | `GPS time`                   | [`FieldType::GpsTime`]   | [`Value::Timestamp`]   |
//! | contains `matrix` (`matrix3`, `matrix43`) | [`FieldType::Matrix`] | [`Value::Matrix`] |
//! | `bitfield`, `css`            | [`FieldType::Opaque`]    | [`Value::Bits`]        |
//! | `12-bit ADC`, `10-bit ADC`   | [`FieldType::Adc`]       | [`Value::Calibrated`]  |

pub mod calibration;
pub mod gps;

use crate::bits::BitString;
use crate::types::Value;
use crate::{DecodeError, Result};
use calibration::{AdcResolution, CalibrationFormula};
use std::str::FromStr;

/// Supported payload field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    UnsignedInt,
    /// Two's complement over a 16 or 32 bit word
    SignedInt { word_bits: u32 },
    Float,
    Vector,
    Char,
    UnsignedChar,
    Bit,
    GpsTime,
    Matrix { rows: usize, cols: usize },
    Opaque,
    Adc(AdcResolution),
}

impl FieldType {
    /// Parse a catalog type tag.
    pub fn parse(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        let lower = tag.to_ascii_lowercase();

        let field_type = if tag.contains("uint") {
            FieldType::UnsignedInt
        } else if tag == "int16" {
            FieldType::SignedInt { word_bits: 16 }
        } else if tag == "int32" {
            FieldType::SignedInt { word_bits: 32 }
        } else if tag == "float" {
            FieldType::Float
        } else if tag == "quaternion" || tag.contains("vector") {
            FieldType::Vector
        } else if tag == "char" {
            FieldType::Char
        } else if tag == "uchar" {
            FieldType::UnsignedChar
        } else if tag == "bit" {
            FieldType::Bit
        } else if tag == "GPS time" {
            FieldType::GpsTime
        } else if lower.contains("matrix") {
            let (rows, cols) = matrix_dimensions(tag)?;
            FieldType::Matrix { rows, cols }
        } else if tag == "bitfield" || tag == "css" {
            FieldType::Opaque
        } else if tag.contains("ADC") {
            FieldType::Adc(AdcResolution::from_tag(tag)?)
        } else {
            return Err(DecodeError::unsupported_format(tag, "", "unrecognized type tag"));
        };

        Ok(field_type)
    }

    /// Convert `bits` to a value of this type.
    ///
    /// Empty input yields `Ok(None)` for every type. `conversion` is only
    /// consulted by ADC fields.
    pub fn decode(&self, bits: &BitString, conversion: Option<&str>) -> Result<Option<Value>> {
        if bits.is_empty() {
            return Ok(None);
        }

        let value = match *self {
            FieldType::UnsignedInt | FieldType::UnsignedChar => {
                Value::UInt(unsigned(bits, self.label())?)
            }
            FieldType::SignedInt { word_bits } => Value::Int(signed(bits, word_bits)?),
            FieldType::Float => Value::Float(float32(bits, "float")?),
            FieldType::Vector => Value::Vector(float_vector(bits)?),
            FieldType::Char => Value::Char(character(bits)?),
            FieldType::Bit => Value::Bit(single_bit(bits)?),
            FieldType::GpsTime => match gps::decode_gps_time(bits)? {
                Some(timestamp) => Value::Timestamp(timestamp),
                None => return Ok(None),
            },
            FieldType::Matrix { rows, cols } => Value::Matrix(matrix(bits, rows, cols)?),
            FieldType::Opaque => Value::Bits(bits.clone()),
            FieldType::Adc(resolution) => {
                let Some(formula) = conversion.filter(|text| !is_not_applicable(text)) else {
                    return Ok(None);
                };
                let raw = unsigned(bits, self.label())?;
                let adc = resolution.mask(raw);
                Value::Calibrated(CalibrationFormula::parse(formula)?.evaluate(adc as f64)?)
            }
        };

        Ok(Some(value))
    }

    /// Short name used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::UnsignedInt => "uint",
            FieldType::SignedInt { word_bits: 16 } => "int16",
            FieldType::SignedInt { .. } => "int32",
            FieldType::Float => "float",
            FieldType::Vector => "vector",
            FieldType::Char => "char",
            FieldType::UnsignedChar => "uchar",
            FieldType::Bit => "bit",
            FieldType::GpsTime => "GPS time",
            FieldType::Matrix { .. } => "matrix",
            FieldType::Opaque => "bitfield",
            FieldType::Adc(AdcResolution::Bits12) => "12-bit ADC",
            FieldType::Adc(AdcResolution::Bits10) => "10-bit ADC",
        }
    }
}

impl FromStr for FieldType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::parse(s)
    }
}

/// Convert `bits` according to a raw catalog type tag.
///
/// A missing tag or empty input yields `Ok(None)`. Errors carry the tag and
/// the offending bits.
pub fn binary_to_value(
    bits: &BitString,
    format: Option<&str>,
    conversion: Option<&str>,
) -> Result<Option<Value>> {
    let Some(format) = format else {
        return Ok(None);
    };
    if bits.is_empty() {
        return Ok(None);
    }

    let field_type = FieldType::parse(format).map_err(|err| with_bits(err, bits))?;
    field_type.decode(bits, conversion).map_err(|err| with_bits(err, bits))
}

/// Catalog placeholder for "no value".
pub fn is_not_applicable(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.eq_ignore_ascii_case("N/A")
}

fn with_bits(err: DecodeError, bits: &BitString) -> DecodeError {
    match err {
        DecodeError::UnsupportedFormat { format, reason, .. } => {
            DecodeError::UnsupportedFormat { format, bits: bits.to_string(), reason }
        }
        other => other,
    }
}

/// Parse matrix dimensions from tags such as `matrix3` (3x3) or `Matrix43` (4x3).
fn matrix_dimensions(tag: &str) -> Result<(usize, usize)> {
    let lower = tag.trim().to_ascii_lowercase();
    let digits = lower.rsplit("matrix").next().unwrap_or_default();

    let dimension = |ch: char| {
        ch.to_digit(10).filter(|&d| d > 0).map(|d| d as usize).ok_or_else(|| {
            DecodeError::unsupported_format(tag, "", format!("invalid matrix dimension {:?}", ch))
        })
    };

    let mut chars = digits.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (None, _, _) => Err(DecodeError::unsupported_format(
            tag,
            "",
            "matrix tag does not give rows and columns",
        )),
        (Some(n), None, _) => {
            let n = dimension(n)?;
            Ok((n, n))
        }
        (Some(r), Some(c), None) => Ok((dimension(r)?, dimension(c)?)),
        _ => Err(DecodeError::unsupported_format(tag, "", "too many matrix dimensions")),
    }
}

fn unsigned(bits: &BitString, format: &str) -> Result<u64> {
    bits.to_u64().ok_or_else(|| {
        DecodeError::unsupported_format(format, bits.to_string(), "integer wider than 64 bits")
    })
}

/// Two's complement over exactly one word: subtract 2^word when the leading bit is set.
fn signed(bits: &BitString, word_bits: u32) -> Result<i64> {
    let label = if word_bits == 16 { "int16" } else { "int32" };
    if bits.len() != word_bits as usize {
        return Err(DecodeError::field_shape(
            label,
            bits.len(),
            format!("signed integers must be exactly {} bits", word_bits),
        ));
    }
    let raw = unsigned(bits, label)? as i64;
    if bits.first() == Some(true) { Ok(raw - (1i64 << word_bits)) } else { Ok(raw) }
}

fn float32(bits: &BitString, format: &str) -> Result<f32> {
    if bits.len() > 32 {
        return Err(DecodeError::field_shape(
            format,
            bits.len(),
            "single precision floats are at most 32 bits",
        ));
    }
    let pattern = bits.to_u64().unwrap_or_default() as u32;
    Ok(f32::from_bits(pattern))
}

fn float_vector(bits: &BitString) -> Result<Vec<f32>> {
    if bits.len() % 32 != 0 {
        return Err(DecodeError::field_shape(
            "vector",
            bits.len(),
            "not a whole number of 32-bit floats",
        ));
    }
    bits.chunks(32).map(|chunk| float32(&chunk, "vector")).collect()
}

fn matrix(bits: &BitString, rows: usize, cols: usize) -> Result<Vec<Vec<f32>>> {
    let entries = rows * cols;
    let format = format!("matrix{}{}", rows, cols);
    if bits.len() % entries != 0 {
        return Err(DecodeError::field_shape(
            format,
            bits.len(),
            format!("cannot split into {} equal entries", entries),
        ));
    }

    let entry_bits = bits.len() / entries;
    let values = bits.chunks(entry_bits).map(|chunk| float32(&chunk, &format)).collect::<Result<Vec<_>>>()?;
    Ok(values.chunks(cols).map(|row| row.to_vec()).collect())
}

fn character(bits: &BitString) -> Result<char> {
    let code = unsigned(bits, "char")?;
    u32::try_from(code).ok().and_then(char::from_u32).ok_or_else(|| {
        DecodeError::unsupported_format("char", bits.to_string(), "not a valid character code")
    })
}

fn single_bit(bits: &BitString) -> Result<bool> {
    match bits.as_slice() {
        [bit] => Ok(*bit),
        _ => Err(DecodeError::unsupported_format(
            "bit",
            bits.to_string(),
            "bit fields must be exactly one bit wide",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bits(text: &str) -> BitString {
        BitString::from_binary_str(text).unwrap()
    }

    fn convert(text: &str, format: &str) -> Option<Value> {
        binary_to_value(&bits(text), Some(format), None).unwrap()
    }

    #[test]
    fn parses_known_tags() {
        assert_eq!(FieldType::parse("uint8").unwrap(), FieldType::UnsignedInt);
        assert_eq!(FieldType::parse("uint32").unwrap(), FieldType::UnsignedInt);
        assert_eq!(FieldType::parse("int16").unwrap(), FieldType::SignedInt { word_bits: 16 });
        assert_eq!(FieldType::parse("quaternion").unwrap(), FieldType::Vector);
        assert_eq!(FieldType::parse("vector3").unwrap(), FieldType::Vector);
        assert_eq!(FieldType::parse("GPS time").unwrap(), FieldType::GpsTime);
        assert_eq!(FieldType::parse("matrix3").unwrap(), FieldType::Matrix { rows: 3, cols: 3 });
        assert_eq!(FieldType::parse("Matrix43").unwrap(), FieldType::Matrix { rows: 4, cols: 3 });
        assert_eq!(FieldType::parse("css").unwrap(), FieldType::Opaque);
        assert_eq!(
            FieldType::parse("12-bit ADC").unwrap(),
            FieldType::Adc(AdcResolution::Bits12)
        );
        assert_eq!("10-bit ADC".parse::<FieldType>().unwrap(), FieldType::Adc(AdcResolution::Bits10));
    }

    #[test]
    fn unknown_tags_are_unsupported() {
        for tag in ["double", "int8", "matrix", "matrix123", "matrixab", "8-bit ADC"] {
            let err = FieldType::parse(tag).unwrap_err();
            assert!(
                matches!(err, DecodeError::UnsupportedFormat { .. }),
                "tag {tag} gave {err:?}"
            );
        }
    }

    #[test]
    fn unsupported_error_carries_offending_bits() {
        let err = binary_to_value(&bits("1011"), Some("tristate"), None).unwrap_err();
        match err {
            DecodeError::UnsupportedFormat { format, bits, .. } => {
                assert_eq!(format, "tristate");
                assert_eq!(bits, "1011");
            }
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn empty_input_or_missing_tag_is_none() {
        assert_eq!(binary_to_value(&BitString::new(), Some("uint8"), None).unwrap(), None);
        assert_eq!(binary_to_value(&bits("1"), None, None).unwrap(), None);
        assert_eq!(binary_to_value(&BitString::new(), Some("nonsense"), None).unwrap(), None);
    }

    #[test]
    fn int16_twos_complement() {
        assert_eq!(convert("1111111111111111", "int16"), Some(Value::Int(-1)));
        assert_eq!(convert("0000000000000000", "int16"), Some(Value::Int(0)));
        assert_eq!(convert("1000000000000000", "int16"), Some(Value::Int(-32768)));
        assert_eq!(convert("0111111111111111", "int16"), Some(Value::Int(32767)));
    }

    #[test]
    fn int32_twos_complement() {
        let minus_two = format!("{}0", "1".repeat(31));
        assert_eq!(convert(&minus_two, "int32"), Some(Value::Int(-2)));
        let min = format!("1{}", "0".repeat(31));
        assert_eq!(convert(&min, "int32"), Some(Value::Int(i32::MIN as i64)));
    }

    #[test]
    fn signed_width_must_match_word() {
        let wide = BitString::from_u64(0x8000_0000_0000_0000, 64);
        let err = binary_to_value(&wide, Some("int16"), None).unwrap_err();
        assert!(matches!(err, DecodeError::FieldShape { bit_len: 64, .. }));

        let narrow = binary_to_value(&bits("11111111"), Some("int16"), None).unwrap_err();
        assert!(matches!(narrow, DecodeError::FieldShape { bit_len: 8, .. }));
        assert!(narrow.is_fatal());

        assert!(binary_to_value(&bits("1111111111111111"), Some("int32"), None).is_err());
    }

    #[test]
    fn unsigned_and_char_types() {
        assert_eq!(convert("11111111", "uint8"), Some(Value::UInt(255)));
        assert_eq!(convert("01000001", "char"), Some(Value::Char('A')));
        assert_eq!(convert("01000001", "uchar"), Some(Value::UInt(65)));
        assert_eq!(convert("1", "bit"), Some(Value::Bit(true)));
        assert_eq!(convert("0", "bit"), Some(Value::Bit(false)));
    }

    #[test]
    fn bit_wider_than_one_is_unsupported() {
        let err = binary_to_value(&bits("101"), Some("bit"), None).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn float_from_bit_pattern() {
        let one = BitString::from_u64(1.0f32.to_bits() as u64, 32);
        assert_eq!(binary_to_value(&one, Some("float"), None).unwrap(), Some(Value::Float(1.0)));

        let negative = BitString::from_u64((-2.5f32).to_bits() as u64, 32);
        assert_eq!(
            binary_to_value(&negative, Some("float"), None).unwrap(),
            Some(Value::Float(-2.5))
        );
    }

    #[test]
    fn vector_of_floats() {
        let mut payload = BitString::new();
        for value in [0.5f32, -1.0, 2.0, 0.0] {
            payload.append(&BitString::from_u64(value.to_bits() as u64, 32));
        }
        assert_eq!(
            binary_to_value(&payload, Some("quaternion"), None).unwrap(),
            Some(Value::Vector(vec![0.5, -1.0, 2.0, 0.0]))
        );

        let ragged = payload.slice(0..100);
        let err = binary_to_value(&ragged, Some("vector4"), None).unwrap_err();
        assert!(matches!(err, DecodeError::FieldShape { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn matrix_is_row_major() {
        let mut payload = BitString::new();
        for value in 1..=6 {
            payload.append(&BitString::from_u64((value as f32).to_bits() as u64, 32));
        }
        assert_eq!(
            binary_to_value(&payload, Some("matrix23"), None).unwrap(),
            Some(Value::Matrix(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]))
        );
    }

    #[test]
    fn matrix_requires_even_split() {
        let payload = BitString::from_u64(0, 100);
        let err = binary_to_value(&payload, Some("matrix3"), None).unwrap_err();
        match err {
            DecodeError::FieldShape { bit_len, .. } => assert_eq!(bit_len, 100),
            other => panic!("Expected FieldShape, got {:?}", other),
        }
    }

    #[test]
    fn opaque_passthrough() {
        assert_eq!(convert("10110", "bitfield"), Some(Value::Bits(bits("10110"))));
        assert_eq!(convert("001", "css"), Some(Value::Bits(bits("001"))));
    }

    #[test]
    fn adc_masks_and_calibrates() {
        let raw = bits("0001000000001111");
        assert_eq!(
            binary_to_value(&raw, Some("12-bit ADC"), Some("adc")).unwrap(),
            Some(Value::Calibrated(15.0))
        );
        assert_eq!(
            binary_to_value(&raw, Some("12-bit ADC"), Some("adc+1")).unwrap(),
            Some(Value::Calibrated(16.0))
        );
        assert_eq!(
            binary_to_value(&bits("1111110000000011"), Some("10-bit ADC"), Some("adc*2")).unwrap(),
            Some(Value::Calibrated(6.0))
        );
    }

    #[test]
    fn adc_without_formula_is_none() {
        let raw = bits("0001000000001111");
        assert_eq!(binary_to_value(&raw, Some("12-bit ADC"), None).unwrap(), None);
        assert_eq!(binary_to_value(&raw, Some("12-bit ADC"), Some("N/A")).unwrap(), None);
    }

    proptest! {
        #[test]
        fn int16_matches_native_cast(value in any::<i16>()) {
            let raw = BitString::from_u64(value as u16 as u64, 16);
            prop_assert_eq!(
                binary_to_value(&raw, Some("int16"), None).unwrap(),
                Some(Value::Int(value as i64))
            );
        }

        #[test]
        fn uint_matches_native(value in any::<u32>()) {
            let raw = BitString::from_u64(value as u64, 32);
            prop_assert_eq!(
                binary_to_value(&raw, Some("uint32"), None).unwrap(),
                Some(Value::UInt(value as u64))
            );
        }
    }
}
