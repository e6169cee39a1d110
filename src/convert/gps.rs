//! GPS time decoding
//!
//! A GPS timestamp is 64 bits: an unsigned 32-bit week count since the GPS
//! epoch (1980-01-06T00:00:00 UTC) followed by an unsigned 32-bit count of
//! milliseconds into that week.

use crate::bits::BitString;
use crate::{DecodeError, Result};
use chrono::{DateTime, TimeDelta, Utc};

/// Width of an encoded GPS timestamp.
pub const GPS_TIME_BITS: usize = 64;

/// Seconds between the Unix epoch and the GPS epoch.
const GPS_EPOCH_UNIX_SECONDS: i64 = 315_964_800;

/// Decode a 64-bit GPS timestamp.
///
/// Empty input means "no timestamp" and yields `Ok(None)`.
pub fn decode_gps_time(bits: &BitString) -> Result<Option<DateTime<Utc>>> {
    if bits.is_empty() {
        return Ok(None);
    }
    if bits.len() != GPS_TIME_BITS {
        return Err(DecodeError::unsupported_format(
            "GPS time",
            bits.to_string(),
            format!("expected exactly {} bits, got {}", GPS_TIME_BITS, bits.len()),
        ));
    }

    let week = bits.slice(0..32).to_u64().unwrap_or_default();
    let ms = bits.slice(32..64).to_u64().unwrap_or_default();

    gps_time_to_datetime(week, ms).map(Some).ok_or_else(|| {
        DecodeError::unsupported_format(
            "GPS time",
            bits.to_string(),
            format!("week {} ms {} is outside the representable range", week, ms),
        )
    })
}

/// GPS epoch plus `week` weeks and `ms` milliseconds.
pub fn gps_time_to_datetime(week: u64, ms: u64) -> Option<DateTime<Utc>> {
    let epoch = DateTime::<Utc>::from_timestamp(GPS_EPOCH_UNIX_SECONDS, 0)?;
    let days = TimeDelta::try_days(i64::try_from(week).ok()?.checked_mul(7)?)?;
    let millis = TimeDelta::try_milliseconds(i64::try_from(ms).ok()?)?;
    epoch.checked_add_signed(days)?.checked_add_signed(millis)
}
