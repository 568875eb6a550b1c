//! Slack event timestamp parsing and ordering
//!
//! Slack identifies every message by its `ts` string (`"<seconds>.<micros>"`).
//! The value is unique per channel, increases monotonically and doubles as the
//! pagination cursor, so it gets a dedicated newtype with a numeric ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Event timestamp in Slack's `"<seconds>.<micros>"` format
///
/// Ordering is numeric (seconds, then microseconds); ties between different
/// spellings of the same instant fall back to the raw string so that `Ord`
/// stays consistent with `Eq`.
///
/// # Examples
///
/// ```
/// use slack_history_sync::timestamp::EventTimestamp;
///
/// let a = EventTimestamp::parse("1586390400.000100").unwrap();
/// let b = EventTimestamp::parse("1586390400.2").unwrap();
/// assert!(a < b);
/// assert_eq!(a.seconds(), 1586390400);
/// assert_eq!(a.micros(), 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTimestamp(String);

impl EventTimestamp {
    /// Parse and validate a raw `ts` value
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, has a non-numeric component or
    /// more than six fractional digits.
    pub fn parse(s: &str) -> Result<Self, TimestampError> {
        let raw = s.trim();
        split_components(raw)?;
        Ok(Self(raw.to_string()))
    }

    /// Build the timestamp of an instant, truncated to microseconds
    pub fn from_datetime(instant: DateTime<Utc>) -> Self {
        Self(format!(
            "{}.{:06}",
            instant.timestamp(),
            instant.timestamp_subsec_micros()
        ))
    }

    /// The timestamp one microsecond earlier, in canonical six-digit form
    ///
    /// Turns an inclusive lower bound into the exclusive `oldest` Slack expects.
    ///
    /// ```
    /// use slack_history_sync::timestamp::EventTimestamp;
    ///
    /// let midnight = EventTimestamp::parse("1586390400.000000").unwrap();
    /// assert_eq!(midnight.pred_micro().as_str(), "1586390399.999999");
    /// ```
    pub fn pred_micro(&self) -> Self {
        let (secs, micros) = self.key();
        let (secs, micros) = match micros.checked_sub(1) {
            Some(micros) => (secs, micros),
            None => (secs.saturating_sub(1), 999_999),
        };
        Self(format!("{secs}.{micros:06}"))
    }

    /// Raw string as sent by the API
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whole seconds since the Unix epoch
    pub fn seconds(&self) -> i64 {
        self.key().0
    }

    /// Microsecond part
    pub fn micros(&self) -> u32 {
        self.key().1
    }

    /// Convert to a UTC instant
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let (secs, micros) = self.key();
        DateTime::<Utc>::from_timestamp(secs, micros * 1_000)
    }

    fn key(&self) -> (i64, u32) {
        // Values that bypassed `parse` through deserialization sort first.
        split_components(&self.0).unwrap_or((i64::MIN, 0))
    }
}

impl Ord for EventTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .cmp(&other.key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for EventTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for EventTimestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn split_components(raw: &str) -> Result<(i64, u32), TimestampError> {
    if raw.is_empty() {
        return Err(TimestampError::InvalidFormat(
            "timestamp cannot be empty".to_string(),
        ));
    }

    let (secs, frac) = raw.split_once('.').unwrap_or((raw, ""));

    let secs: i64 = secs.parse().map_err(|_| {
        TimestampError::InvalidFormat(format!("invalid seconds component in '{raw}'"))
    })?;

    if frac.len() > 6 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(TimestampError::InvalidFormat(format!(
            "invalid fractional component in '{raw}'"
        )));
    }

    // "2" means 200000 micros, not 2.
    let micros = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<6}").parse().map_err(|_| {
            TimestampError::InvalidFormat(format!("invalid fractional component in '{raw}'"))
        })?
    };

    Ok((secs, micros))
}

/// Timestamp parsing errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimestampError {
    /// Malformed timestamp string
    #[error("invalid timestamp: {0}")]
    InvalidFormat(String),
}
