//! Timestamps and the logical clock used for engine-derived entries.
//!
//! Every time value in the claims log is a [`Timestamp`]: microseconds since
//! the Unix epoch in UTC. Equality is exact to the microsecond, which is what
//! the generation-marker comparison relies on. Input carrying a non-zero
//! sub-microsecond fraction is rejected rather than rounded, and so is any
//! instant outside years 0000 to 9999.
//!
//! Accepted text forms:
//!
//! - RFC 3339 (`2015-11-05T11:37:33.381Z`, any offset)
//! - naive `YYYY-MM-DD HH:MM:SS[.ffffff]` or with a `T` separator, taken as UTC
//! - a bare integer, taken as epoch milliseconds
//!
//! The canonical text form is RFC 3339 with microseconds and a `Z` suffix.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A UTC instant with microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp '{raw}'")]
pub struct TimestampError {
    /// The rejected input.
    pub raw: String,
}

/// `0000-01-01T00:00:00Z`, the earliest instant with a four-digit year.
const MIN_MICROS: i64 = -62_167_219_200_000_000;
/// `9999-12-31T23:59:59.999999Z`, the latest instant with a four-digit year.
const MAX_MICROS: i64 = 253_402_300_799_999_999;

const fn checked(micros: i64) -> Option<Timestamp> {
    if matches!(micros, MIN_MICROS..=MAX_MICROS) {
        Some(Timestamp(micros))
    } else {
        None
    }
}

impl Timestamp {
    /// Build a timestamp from microseconds since the Unix epoch.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Microseconds since the Unix epoch.
    #[must_use]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now().timestamp_micros())
    }

    /// Shift by a signed number of microseconds, saturating at the bounds.
    #[must_use]
    pub const fn offset_micros(self, delta: i64) -> Self {
        Self(self.0.saturating_add(delta))
    }

    /// Epoch milliseconds, if the instant falls in years 0000 to 9999.
    #[must_use]
    pub const fn from_epoch_millis(millis: i64) -> Option<Self> {
        match millis.checked_mul(1_000) {
            Some(micros) => checked(micros),
            None => None,
        }
    }

    /// Parse any of the accepted text forms.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] if the input matches none of them, has a
    /// fraction finer than a microsecond, or is out of range.
    pub fn parse(raw: &str) -> Result<Self, TimestampError> {
        let trimmed = raw.trim();
        let err = || TimestampError {
            raw: raw.to_string(),
        };

        if trimmed.is_empty() {
            return Err(err());
        }

        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let millis: i64 = trimmed.parse().map_err(|_| err())?;
            return Self::from_epoch_millis(millis).ok_or_else(err);
        }

        let utc = DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NAIVE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                    .map(|naive| naive.and_utc())
            })
            .ok_or_else(err)?;

        if utc.timestamp_subsec_nanos() % 1_000 != 0 {
            return Err(err());
        }
        checked(utc.timestamp_micros()).ok_or_else(err)
    }

    /// Canonical RFC 3339 text, e.g. `2015-11-05T11:37:33.381000Z`.
    ///
    /// Parsed values always render exactly. A value built with
    /// [`Timestamp::from_micros`] outside years 0000 to 9999 renders as the
    /// nearest bound, so the text always parses back.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        DateTime::<Utc>::from_timestamp_micros(self.0.clamp(MIN_MICROS, MAX_MICROS))
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(millis) => Self::from_epoch_millis(millis)
                .ok_or_else(|| serde::de::Error::custom("epoch milliseconds out of range")),
            Raw::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// Source of the run's logical "now".
///
/// Only `Removed` entries produced by a full diff use it; everything else
/// carries a remote-supplied time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock frozen at one instant, for deterministic runs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
