use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::TimestampError;

/// A single consumption interval as returned by the consumption endpoint.
///
/// `consumption` is in the meter's native unit: kWh for electricity, cubic
/// meters (or feet, for older imperial meters) for gas.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reading {
    pub consumption: f32,
    pub interval_start: String,
    pub interval_end: String,
}

impl Reading {
    /// Parse `interval_end` as an RFC 3339 timestamp. Offsets are kept.
    ///
    /// Stricter than the `time` crate alone: the date/time separator must be
    /// an uppercase `T`, a UTC designator must be an uppercase `Z`, and no
    /// surrounding whitespace is allowed.
    pub fn parse_interval_end(&self) -> Result<OffsetDateTime, TimestampError> {
        let s = self.interval_end.as_str();
        let bytes = s.as_bytes();
        if bytes.get(10) != Some(&b'T') || s.ends_with('z') || s.trim() != s {
            return Err(TimestampError::Format(s.to_string()));
        }
        Ok(OffsetDateTime::parse(s, &Rfc3339)?)
    }
}

/// One page of the consumption endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadingBatch {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Vec<Reading>,
}

impl ReadingBatch {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
