//! Decoded engineering values

use crate::bits::BitString;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Runtime value produced by converting one payload field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Unsigned integer, also used for `uchar`
    UInt(u64),
    /// Two's-complement signed integer
    Int(i64),
    /// IEEE-754 single precision
    Float(f32),
    Char(char),
    Bit(bool),
    Timestamp(DateTime<Utc>),
    /// Vector or quaternion of single precision floats
    Vector(Vec<f32>),
    /// Row-major matrix of single precision floats
    Matrix(Vec<Vec<f32>>),
    /// Bitfield or opaque passthrough
    Bits(BitString),
    /// Calibrated analog reading in engineering units
    Calibrated(f64),
}

impl Value {
    /// Scalar numeric view, for plotting and comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::UInt(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Bit(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Calibrated(v) => Some(*v),
            Value::Char(_)
            | Value::Timestamp(_)
            | Value::Vector(_)
            | Value::Matrix(_)
            | Value::Bits(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Bit(v) => write!(f, "{}", *v as u8),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.3f")),
            Value::Vector(v) => write!(f, "{:?}", v),
            Value::Matrix(v) => write!(f, "{:?}", v),
            Value::Bits(v) => write!(f, "{}", v),
            Value::Calibrated(v) => write!(f, "{}", v),
        }
    }
}
