//! Journal records keyed by calendar day.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A value that does not name a calendar day in `YYYYMMDD` form.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid date key {0}; expected a calendar date as YYYYMMDD")]
pub struct InvalidDateKey(pub u32);

/// Calendar day encoded as the base-10 integer `YYYYMMDD`.
///
/// Primary key of a [`JournalRecord`] and, in string form, the id of its
/// search document. Construction validates that the digits name a real day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DateKey(u32);

impl DateKey {
    /// Validate a raw `YYYYMMDD` integer.
    pub fn new(raw: u32) -> Result<Self, InvalidDateKey> {
        let year = raw / 10_000;
        let month = (raw / 100) % 100;
        let day = raw % 100;
        if !(1000..=9999).contains(&year) {
            return Err(InvalidDateKey(raw));
        }
        NaiveDate::from_ymd_opt(year as i32, month, day)
            .map(|_| Self(raw))
            .ok_or(InvalidDateKey(raw))
    }

    /// Key for a calendar date.
    ///
    /// # Errors
    /// Returns [`InvalidDateKey`] for years outside `1000..=9999`.
    pub fn from_date(date: NaiveDate) -> Result<Self, InvalidDateKey> {
        let year = date.year();
        let raw = if (1000..=9999).contains(&year) {
            year as u32 * 10_000 + date.month() * 100 + date.day()
        } else {
            0
        };
        Self::new(raw)
    }

    /// Raw `YYYYMMDD` value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// Calendar date named by this key.
    pub fn date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(
            (self.0 / 10_000) as i32,
            (self.0 / 100) % 100,
            self.0 % 100,
        )
        .unwrap_or_default()
    }

    /// Search-document id for this day.
    pub fn object_id(self) -> String {
        self.0.to_string()
    }

    /// Seconds since the Unix epoch at midnight UTC of this day.
    pub fn timestamp(self) -> i64 {
        self.date()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp())
            .unwrap_or_default()
    }

    /// Human-readable day, e.g. `Tuesday January 02 2024`.
    pub fn pretty(self) -> String {
        self.date().format("%A %B %d %Y").to_string()
    }

    /// `YYYY-MM-DD` rendering used by exports.
    pub fn iso(self) -> String {
        self.date().format("%Y-%m-%d").to_string()
    }
}

impl TryFrom<u32> for DateKey {
    type Error = InvalidDateKey;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DateKey> for u32 {
    fn from(value: DateKey) -> Self {
        value.0
    }
}

impl FromStr for DateKey {
    type Err = InvalidDateKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != 8 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidDateKey(0));
        }
        let raw = trimmed.parse::<u32>().map_err(|_| InvalidDateKey(0))?;
        Self::new(raw)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One journal entry as stored: legacy plaintext or an envelope-encrypted blob.
///
/// Serialized with the `S`/`B` tags used by the change-event wire form so a
/// reader can tell textual entries from binary ones without inspecting bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPayload {
    #[serde(rename = "S")]
    Plaintext(String),
    #[serde(rename = "B", with = "base64_bytes")]
    Encrypted(Vec<u8>),
}

impl EntryPayload {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, EntryPayload::Encrypted(_))
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// All entries written for one day, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub date_key: DateKey,
    pub entries: Vec<EntryPayload>,
}

impl JournalRecord {
    pub fn new(date_key: DateKey, entries: Vec<EntryPayload>) -> Self {
        Self { date_key, entries }
    }

    /// Whether any entry is still stored as plaintext.
    pub fn has_plaintext(&self) -> bool {
        self.entries.iter().any(|entry| !entry.is_encrypted())
    }
}

/// Result of a get-or-create-then-append write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// `true` when the write created the day's record.
    pub created: bool,
    /// Number of entries in the record after the write.
    pub entry_count: usize,
}
