//! TTL Normalization Module
//!
//! Every write path resolves its TTL through [`normalize_ttl`] before deciding
//! between a plain write, a write with expiry, or a delete.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::CacheError;

// == Raw TTL ==
/// TTL as supplied by a caller. Absence of a TTL is `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ttl {
    /// Whole seconds
    Seconds(i64),
    /// Seconds as text; non-numeric text counts as zero
    Text(String),
    /// Calendar interval added to the Unix epoch
    Interval(RelativeInterval),
}

impl Ttl {
    /// Resolves this TTL into its canonical form.
    pub fn normalize(&self) -> NormalizedTtl {
        let seconds = match self {
            Ttl::Seconds(seconds) => *seconds,
            Ttl::Text(text) => leading_integer(text),
            Ttl::Interval(interval) => interval.seconds_from_epoch(),
        };
        NormalizedTtl::from_seconds(seconds)
    }
}

impl From<i64> for Ttl {
    fn from(seconds: i64) -> Self {
        Ttl::Seconds(seconds)
    }
}

impl From<&str> for Ttl {
    fn from(text: &str) -> Self {
        Ttl::Text(text.to_string())
    }
}

impl From<String> for Ttl {
    fn from(text: String) -> Self {
        Ttl::Text(text)
    }
}

impl From<RelativeInterval> for Ttl {
    fn from(interval: RelativeInterval) -> Self {
        Ttl::Interval(interval)
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::Seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
    }
}

/// Accepts an integer, numeric text, or ISO-8601 duration text (`PT6H8M`).
impl<'de> Deserialize<'de> for Ttl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(seconds) => Ttl::Seconds(seconds),
            Raw::Text(text) => match text.parse::<RelativeInterval>() {
                Ok(interval) => Ttl::Interval(interval),
                Err(_) => Ttl::Text(text),
            },
        })
    }
}

// == Normalized TTL ==
/// Canonical TTL consumed by the write paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedTtl {
    /// Store without expiry
    Infinite,
    /// Zero or negative; the write must become a delete
    ExpiredImmediately,
    /// Expire after this many seconds
    AbsoluteSeconds(u64),
}

impl NormalizedTtl {
    /// Maps a raw second count, folding non-positive values into `ExpiredImmediately`.
    pub fn from_seconds(seconds: i64) -> Self {
        if seconds <= 0 {
            NormalizedTtl::ExpiredImmediately
        } else {
            NormalizedTtl::AbsoluteSeconds(seconds as u64)
        }
    }

    /// Seconds carried by this TTL: `None` for infinite, `Some(0)` for expired.
    pub fn as_seconds(&self) -> Option<u64> {
        match self {
            NormalizedTtl::Infinite => None,
            NormalizedTtl::ExpiredImmediately => Some(0),
            NormalizedTtl::AbsoluteSeconds(seconds) => Some(*seconds),
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, NormalizedTtl::ExpiredImmediately)
    }
}

// == Normalize ==
/// Total mapping from a raw (possibly absent) TTL to its canonical form.
pub fn normalize_ttl(ttl: Option<&Ttl>) -> NormalizedTtl {
    ttl.map_or(NormalizedTtl::Infinite, Ttl::normalize)
}

/// Integer value of the leading numeric prefix of `text`, or 0.
///
/// A prefix with a fraction or an exponent (`"1.5"`, `"1e3"`) is read as a
/// float and truncated toward zero. Out-of-range values saturate.
fn leading_integer(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();

    let sign = usize::from(matches!(bytes.first(), Some(b'-' | b'+')));
    let integer_end = sign + count_digits(&bytes[sign..]);
    let has_integer = integer_end > sign;

    let mut end = integer_end;
    let mut is_float = false;
    if bytes.get(end) == Some(&b'.') {
        let fraction = count_digits(&bytes[end + 1..]);
        if has_integer || fraction > 0 {
            end += 1 + fraction;
            is_float = true;
        }
    }
    if !has_integer && !is_float {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'-' | b'+')) {
            exponent += 1;
        }
        let digits = count_digits(&bytes[exponent..]);
        if digits > 0 {
            end = exponent + digits;
            is_float = true;
        }
    }

    if is_float {
        // `as` truncates toward zero and saturates
        return trimmed[..end].parse::<f64>().map_or(0, |value| value as i64);
    }
    match trimmed[..integer_end].parse::<i64>() {
        Ok(value) => value,
        Err(_) if bytes.first() == Some(&b'-') => i64::MIN,
        Err(_) => i64::MAX,
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

// == Relative Interval ==
/// A calendar interval. Years and months are resolved by calendar arithmetic
/// against 1970-01-01T00:00:00Z, so two years from the epoch are 730 days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelativeInterval {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    /// Interval points backwards in time
    pub inverted: bool,
}

impl RelativeInterval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn years(mut self, years: u32) -> Self {
        self.years = years;
        self
    }

    pub fn months(mut self, months: u32) -> Self {
        self.months = months;
        self
    }

    pub fn days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }

    pub fn hours(mut self, hours: u32) -> Self {
        self.hours = hours;
        self
    }

    pub fn minutes(mut self, minutes: u32) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn seconds(mut self, seconds: u32) -> Self {
        self.seconds = seconds;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = !self.inverted;
        self
    }

    // == Seconds From Epoch ==
    /// Unix timestamp reached by applying this interval to the epoch.
    ///
    /// Results outside chrono's calendar range saturate.
    pub fn seconds_from_epoch(&self) -> i64 {
        let saturated = if self.inverted { i64::MIN } else { i64::MAX };
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let months = Months::new(self.years.saturating_mul(12).saturating_add(self.months));
        let clock = TimeDelta::seconds(
            i64::from(self.days) * 86_400
                + i64::from(self.hours) * 3_600
                + i64::from(self.minutes) * 60
                + i64::from(self.seconds),
        );

        let shifted = if self.inverted {
            epoch
                .checked_sub_months(months)
                .and_then(|dt| dt.checked_sub_signed(clock))
        } else {
            epoch
                .checked_add_months(months)
                .and_then(|dt| dt.checked_add_signed(clock))
        };

        shifted.map_or(saturated, |dt| dt.timestamp())
    }
}

/// Parses ISO-8601 duration text such as `P2Y4D`, `PT6H8M` or `-P1W`.
impl FromStr for RelativeInterval {
    type Err = CacheError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || CacheError::Config(format!("Invalid interval: '{}'", text));

        let (inverted, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let body = body.strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() {
            return Err(invalid());
        }

        let mut interval = RelativeInterval {
            inverted,
            ..Self::default()
        };
        let mut in_time = false;
        let mut number = String::new();
        let mut seen_component = false;

        for c in body.chars() {
            if c.is_ascii_digit() {
                number.push(c);
                continue;
            }
            if c == 'T' {
                if in_time || !number.is_empty() {
                    return Err(invalid());
                }
                in_time = true;
                continue;
            }

            let value: u32 = number.parse().map_err(|_| invalid())?;
            number.clear();
            seen_component = true;
            match (in_time, c) {
                (false, 'Y') => interval.years = value,
                (false, 'M') => interval.months = value,
                (false, 'W') => interval.days = interval.days.saturating_add(value.saturating_mul(7)),
                (false, 'D') => interval.days = interval.days.saturating_add(value),
                (true, 'H') => interval.hours = value,
                (true, 'M') => interval.minutes = value,
                (true, 'S') => interval.seconds = value,
                _ => return Err(invalid()),
            }
        }

        if !number.is_empty() || !seen_component {
            return Err(invalid());
        }
        Ok(interval)
    }
}
