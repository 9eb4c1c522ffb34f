//! NTP format time-tags.
//!
//! A time-tag is 64 bits: the upper 32 are seconds since 1900-01-01 and the
//! lower 32 are fractions of a second. The value `1` is reserved to mean
//! "immediately".

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds between the NTP epoch (1900) and the unix epoch (1970).
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A 64-bit NTP time-tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeTag(u64);

impl TimeTag {
    /// The reserved "execute upon receipt" value.
    pub const IMMEDIATE: TimeTag = TimeTag(1);

    /// A time-tag from its 64-bit wire value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// A time-tag from seconds since 1900 and a 2^-32 second fraction.
    pub const fn from_parts(seconds: u32, fraction: u32) -> Self {
        Self(((seconds as u64) << 32) | fraction as u64)
    }

    /// The 64-bit wire value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whole seconds since 1900-01-01.
    pub const fn seconds(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Fractional part in units of 2^-32 seconds.
    pub const fn fraction(self) -> u32 {
        self.0 as u32
    }

    /// Whether this is [`TimeTag::IMMEDIATE`].
    pub const fn is_immediate(self) -> bool {
        self.0 == Self::IMMEDIATE.0
    }

    /// The current system clock as a time-tag.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// The current system clock plus `offset`.
    pub fn after(offset: Duration) -> Self {
        Self::from_system_time(SystemTime::now() + offset)
    }

    /// Convert a system time. Times before 1970 clamp to the unix epoch.
    pub fn from_system_time(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let seconds = since_unix.as_secs() + NTP_UNIX_OFFSET;
        let fraction = (u64::from(since_unix.subsec_nanos()) << 32) / NANOS_PER_SEC;
        Self::from_parts(seconds as u32, fraction as u32)
    }

    /// Convert back to a system time, `None` for values before 1970
    /// (including [`TimeTag::IMMEDIATE`]).
    pub fn to_system_time(self) -> Option<SystemTime> {
        let seconds = u64::from(self.seconds()).checked_sub(NTP_UNIX_OFFSET)?;
        Some(UNIX_EPOCH + Duration::new(seconds, fraction_to_nanos(self.fraction())))
    }

    /// How long after `now` this time-tag falls due.
    ///
    /// Immediate and past time-tags yield [`Duration::ZERO`].
    pub fn duration_until(self, now: TimeTag) -> Duration {
        if self.is_immediate() || self <= now {
            return Duration::ZERO;
        }
        let diff = self.0 - now.0;
        Duration::new(diff >> 32, fraction_to_nanos(diff as u32))
    }

    /// Wall clock representation in UTC, e.g. `12:30:05.250000` or with the
    /// date, `2024-03-01 12:30:05.250000`.
    pub fn clock_string(self, include_date: bool) -> String {
        let total = u64::from(self.seconds());
        let micros = fraction_to_nanos(self.fraction()) / 1_000;
        let (h, m, s) = (total / 3600 % 24, total / 60 % 60, total % 60);
        if include_date {
            let (year, month, day) = civil_from_ntp_days(total / 86_400);
            format!("{year:04}-{month:02}-{day:02} {h:02}:{m:02}:{s:02}.{micros:06}")
        } else {
            format!("{h:02}:{m:02}:{s:02}.{micros:06}")
        }
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}

impl From<SystemTime> for TimeTag {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for TimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_immediate() {
            f.write_str("immediate")
        } else {
            write!(
                f,
                "{}.{:010} ({})",
                self.seconds(),
                self.fraction(),
                self.clock_string(true)
            )
        }
    }
}

fn fraction_to_nanos(fraction: u32) -> u32 {
    ((u64::from(fraction) * NANOS_PER_SEC) >> 32) as u32
}

/// Days since 1900-01-01 to a (year, month, day) triple in the proleptic
/// Gregorian calendar.
fn civil_from_ntp_days(days: u64) -> (i64, u32, u32) {
    // shift to days since 0000-03-01
    let z = days as i64 + 693_901;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
