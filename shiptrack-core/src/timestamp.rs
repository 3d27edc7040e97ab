//! Parsing of the timestamp formats carriers use.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, ParseError as ChronoParseError};

use crate::model::ShipmentTimestamp;

/// Local layouts accepted in addition to RFC 3339 for [`TimestampFormat::Iso8601`].
const ISO_LOCAL_PATTERNS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d"];

/// How a carrier writes its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// ISO-8601, with or without an offset, or a bare date.
    Iso8601,
    /// `chrono` patterns tried in order. A date-only pattern yields local midnight.
    Patterns(&'static [&'static str]),
}

impl TimestampFormat {
    /// Parse `raw` according to this format.
    ///
    /// # Errors
    ///
    /// Returns the last `chrono` error when no layout matches.
    pub fn parse(self, raw: &str) -> Result<ShipmentTimestamp, ChronoParseError> {
        let raw = raw.trim();
        match self {
            TimestampFormat::Iso8601 => {
                if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
                    return Ok(ShipmentTimestamp::Zoned(zoned));
                }
                if let Ok(zoned) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
                    return Ok(ShipmentTimestamp::Zoned(zoned));
                }
                parse_local(raw, &ISO_LOCAL_PATTERNS)
            }
            TimestampFormat::Patterns(patterns) => parse_local(raw, patterns),
        }
    }
}

fn parse_local(raw: &str, patterns: &[&str]) -> Result<ShipmentTimestamp, ChronoParseError> {
    let mut last_error = None;
    for pattern in patterns {
        match NaiveDateTime::parse_from_str(raw, pattern) {
            Ok(local) => return Ok(ShipmentTimestamp::Local(local)),
            Err(err) => last_error = Some(err),
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, pattern) {
            return Ok(ShipmentTimestamp::Local(date.and_time(NaiveTime::MIN)));
        }
    }

    // An empty pattern list still has to report something; reuse chrono's own error.
    match last_error {
        Some(err) => Err(err),
        None => NaiveDateTime::parse_from_str(raw, "").map(ShipmentTimestamp::Local),
    }
}
