//! Bit-level access to telemetry dumps.
//!
//! A dump arrives either as hex text or as raw bytes. Both are expanded into a
//! [`BitString`] (most significant bit first) and read through a [`BitStream`]
//! whose cursor only ever moves forward.
//!
//! ```rust
//! use spacepacket::bits::BitStream;
//!
//! # fn main() -> spacepacket::Result<()> {
//! // CCSDS primary header word 0x0A45: version 0, type 0, flag 1, apid 0x245
//! let mut stream = BitStream::from_hex("0A45")?;
//! assert_eq!(stream.take_u64(3)?, 0);
//! assert_eq!(stream.take_u64(1)?, 0);
//! assert_eq!(stream.take_u64(1)?, 1);
//! assert_eq!(stream.take_u64(11)?, 0x245);
//! assert!(stream.is_exhausted());
//! # Ok(())
//! # }
//! ```

use crate::{DecodeError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::Range;

/// An owned, ordered sequence of bits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitString {
    bits: Vec<bool>,
}

impl BitString {
    /// Create an empty bit string.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a hex string, four bits per digit.
    ///
    /// Upper and lower case digits are accepted. Any other character fails
    /// with `MalformedInput` carrying the character offset.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let mut bits = Vec::with_capacity(hex.len() * 4);
        for (offset, ch) in hex.chars().enumerate() {
            let nibble = ch.to_digit(16).ok_or_else(|| {
                DecodeError::malformed_input(offset, format!("invalid hex digit {:?}", ch))
            })?;
            for shift in (0..4).rev() {
                bits.push((nibble >> shift) & 1 == 1);
            }
        }
        Ok(Self { bits })
    }

    /// Expand raw bytes, eight bits per byte.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for byte in bytes {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 1 == 1);
            }
        }
        Self { bits }
    }

    /// Parse a textual `0`/`1` string.
    pub fn from_binary_str(text: &str) -> Result<Self> {
        let bits = text
            .chars()
            .enumerate()
            .map(|(offset, ch)| match ch {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(DecodeError::malformed_input(
                    offset,
                    format!("invalid binary digit {:?}", other),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { bits })
    }

    /// Build the `width` least significant bits of `value`, MSB first.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let bits = (0..width)
            .rev()
            .map(|shift| shift < 64 && (value >> shift) & 1 == 1)
            .collect();
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    /// First (most significant) bit, if any.
    pub fn first(&self) -> Option<bool> {
        self.bits.first().copied()
    }

    /// Copy out a sub-range. Panics on an out-of-range slice like `[T]::index`.
    pub fn slice(&self, range: Range<usize>) -> BitString {
        Self { bits: self.bits[range].to_vec() }
    }

    /// Append another bit string to the end of this one.
    pub fn append(&mut self, other: &BitString) {
        self.bits.extend_from_slice(&other.bits);
    }

    /// Interpret the bits as an unsigned big-endian integer.
    ///
    /// Returns `None` when wider than 64 bits. An empty string is zero.
    pub fn to_u64(&self) -> Option<u64> {
        if self.bits.len() > 64 {
            return None;
        }
        Some(self.bits.iter().fold(0u64, |acc, &bit| (acc << 1) | bit as u64))
    }

    /// Split into consecutive chunks of `width` bits; the last chunk may be short.
    pub fn chunks(&self, width: usize) -> impl Iterator<Item = BitString> + '_ {
        self.bits.chunks(width.max(1)).map(|chunk| BitString { bits: chunk.to_vec() })
    }

    /// Render as hex, or `None` if the length is not a multiple of four.
    pub fn to_hex(&self) -> Option<String> {
        if self.bits.len() % 4 != 0 {
            return None;
        }
        let hex = self
            .bits
            .chunks(4)
            .map(|nibble| {
                let value = nibble.iter().fold(0u32, |acc, &bit| (acc << 1) | bit as u32);
                char::from_digit(value, 16).map(|c| c.to_ascii_uppercase()).unwrap_or('0')
            })
            .collect();
        Some(hex)
    }

    /// Pack into bytes, or `None` if the length is not a multiple of eight.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        if self.bits.len() % 8 != 0 {
            return None;
        }
        Some(
            self.bits
                .chunks(8)
                .map(|byte| byte.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
                .collect(),
        )
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl Serialize for BitString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<Vec<bool>> for BitString {
    fn from(bits: Vec<bool>) -> Self {
        Self { bits }
    }
}

/// Forward-only reader over a [`BitString`].
#[derive(Debug, Clone)]
pub struct BitStream {
    bits: BitString,
    cursor: usize,
}

impl BitStream {
    pub fn new(bits: BitString) -> Self {
        Self { bits, cursor: 0 }
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        Ok(Self::new(BitString::from_hex(hex)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(BitString::from_bytes(bytes))
    }

    /// Take the next `n` bits and advance the cursor.
    ///
    /// Fails with `OutOfBits` (cursor unchanged) when fewer than `n` remain.
    pub fn take(&mut self, n: usize) -> Result<BitString> {
        let available = self.remaining();
        if n > available {
            return Err(DecodeError::OutOfBits {
                requested: n,
                available,
                bit_offset: self.cursor,
            });
        }
        let taken = self.bits.slice(self.cursor..self.cursor + n);
        self.cursor += n;
        Ok(taken)
    }

    /// Take the next `n` bits (at most 64) as an unsigned integer.
    pub fn take_u64(&mut self, n: usize) -> Result<u64> {
        if n > 64 {
            return Err(DecodeError::field_shape(
                "uint",
                n,
                "integer reads are limited to 64 bits",
            ));
        }
        let taken = self.take(n)?;
        Ok(taken.to_u64().unwrap_or_default())
    }

    /// Current cursor position in bits.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.bits.len() - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}
