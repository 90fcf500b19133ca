//! Timestamp conversion for archive entries.
//!
//! Every container stores modification times differently:
//!
//! - 7z: Windows FILETIME (100-nanosecond intervals since 1601-01-01 UTC)
//! - tar: Unix seconds
//! - zip and RAR: MS-DOS packed local date/time
//! - ISO9660: seven-byte recording date with a GMT offset in 15-minute units
//!
//! This module normalizes all of them to [`SystemTime`].
//!
//! # Example
//!
//! ```rust
//! use arcfs::Timestamp;
//! use std::time::SystemTime;
//!
//! let unix_epoch_filetime = 116444736000000000u64;
//! let ts = Timestamp::from_filetime(unix_epoch_filetime);
//! assert_eq!(ts.as_unix_secs(), 0);
//! assert_eq!(ts.as_system_time(), SystemTime::UNIX_EPOCH);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{FixedOffset, NaiveDate, TimeZone};

/// Windows FILETIME epoch: January 1, 1601 (UTC)
/// Difference from Unix epoch (January 1, 1970) in 100-nanosecond intervals.
const FILETIME_UNIX_DIFF: u64 = 116444736000000000;

/// Number of 100-nanosecond intervals per second.
const INTERVALS_PER_SECOND: u64 = 10_000_000;

/// A Windows FILETIME value.
///
/// Wraps 100-nanosecond intervals since January 1, 1601 and converts to
/// Unix time without losing precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    filetime: u64,
}

impl Timestamp {
    /// Creates a timestamp from a raw Windows FILETIME value.
    #[inline]
    pub const fn from_filetime(filetime: u64) -> Self {
        Self { filetime }
    }

    /// Creates a timestamp from Unix seconds (since January 1, 1970).
    ///
    /// Returns `None` if the timestamp would overflow.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        let intervals = secs.unsigned_abs().checked_mul(INTERVALS_PER_SECOND)?;
        if secs < 0 {
            FILETIME_UNIX_DIFF
                .checked_sub(intervals)
                .map(Self::from_filetime)
        } else {
            FILETIME_UNIX_DIFF
                .checked_add(intervals)
                .map(Self::from_filetime)
        }
    }

    /// Returns the raw Windows FILETIME value.
    #[inline]
    pub const fn as_filetime(&self) -> u64 {
        self.filetime
    }

    /// Returns the timestamp as Unix seconds.
    ///
    /// Sub-second precision is truncated towards negative infinity.
    pub fn as_unix_secs(&self) -> i64 {
        if self.filetime >= FILETIME_UNIX_DIFF {
            ((self.filetime - FILETIME_UNIX_DIFF) / INTERVALS_PER_SECOND) as i64
        } else {
            let intervals = FILETIME_UNIX_DIFF - self.filetime;
            -(intervals.div_ceil(INTERVALS_PER_SECOND) as i64)
        }
    }

    /// Converts to a `SystemTime`, preserving 100-nanosecond precision.
    pub fn as_system_time(&self) -> SystemTime {
        let (intervals, before_epoch) = if self.filetime >= FILETIME_UNIX_DIFF {
            (self.filetime - FILETIME_UNIX_DIFF, false)
        } else {
            (FILETIME_UNIX_DIFF - self.filetime, true)
        };
        let secs = intervals / INTERVALS_PER_SECOND;
        let nanos = ((intervals % INTERVALS_PER_SECOND) * 100) as u32;
        if before_epoch {
            UNIX_EPOCH - Duration::new(secs, nanos)
        } else {
            UNIX_EPOCH + Duration::new(secs, nanos)
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> SystemTime {
        ts.as_system_time()
    }
}

/// Converts Unix seconds to a `SystemTime`.
pub fn from_unix_secs(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

/// Converts a broken-down civil time to a `SystemTime`.
///
/// `offset_minutes` is the zone offset east of UTC. Returns `None` for
/// impossible dates (month 13, February 30, ...).
pub fn from_civil(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    offset_minutes: i32,
) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = FixedOffset::east_opt(offset_minutes * 60)?;
    let local = offset.from_local_datetime(&naive).single()?;
    Some(from_unix_secs(local.timestamp()))
}

/// Converts an MS-DOS packed date/time (date in the high word) to a
/// `SystemTime`, interpreting it as UTC.
///
/// Returns `None` for zero or invalid values.
pub fn from_dos_datetime(packed: u32) -> Option<SystemTime> {
    if packed == 0 {
        return None;
    }
    let date = (packed >> 16) as u16;
    let time = packed as u16;
    from_civil(
        1980 + i32::from(date >> 9),
        u32::from((date >> 5) & 0x0F),
        u32::from(date & 0x1F),
        u32::from(time >> 11),
        u32::from((time >> 5) & 0x3F),
        u32::from(time & 0x1F) * 2,
        0,
    )
}

/// Converts an ISO9660 directory-record recording date to a `SystemTime`.
///
/// Layout: years since 1900, month, day, hour, minute, second, and a signed
/// GMT offset in 15-minute intervals. An all-zero date means "not recorded".
pub fn from_iso_recording(raw: &[u8; 7]) -> Option<SystemTime> {
    if raw[..6].iter().all(|&b| b == 0) {
        return None;
    }
    from_civil(
        1900 + i32::from(raw[0]),
        u32::from(raw[1]),
        u32::from(raw[2]),
        u32::from(raw[3]),
        u32::from(raw[4]),
        u32::from(raw[5]),
        i32::from(raw[6] as i8) * 15,
    )
}
