//! Generic event extraction driven by per-carrier field-path schemas.

use std::str;

use crate::model::{ShipmentTimestamp, format_location};
use crate::ports::ParseError;
use crate::timestamp::TimestampFormat;
use crate::xml::{XmlDocument, XmlElement};

/// Where an event's location lives.
#[derive(Debug, Clone, Copy)]
pub enum LocationFields {
    /// City and region in separate fields, joined as `"City, Region"`.
    Split {
        /// Path to the city.
        city: &'static str,
        /// Path to the state, province, or region code.
        region: &'static str,
    },
    /// A single field already formatted by the carrier.
    Single(&'static str),
}

/// Where an event's timestamp lives.
#[derive(Debug, Clone, Copy)]
pub enum TimestampFields {
    /// One field.
    Single(&'static str),
    /// Separate date and time fields, joined with `separator` before parsing.
    Split {
        /// Path to the date part.
        date: &'static str,
        /// Path to the time part.
        time: &'static str,
        /// Inserted between the two parts.
        separator: &'static str,
    },
}

/// Field layout of one carrier's event nodes.
#[derive(Debug, Clone, Copy)]
pub struct EventSchema {
    /// Query selecting the event nodes from the scope element.
    pub events: &'static str,
    /// Location fields.
    pub location: LocationFields,
    /// Free-text description.
    pub label: &'static str,
    /// Status code or phrase fed to the classification rules.
    pub status: &'static str,
    /// Timestamp fields.
    pub timestamp: TimestampFields,
    /// Timestamp layout.
    pub format: TimestampFormat,
}

/// Fields pulled out of one event node, before classification.
#[derive(Debug, Clone)]
pub struct RawEvent<'doc> {
    /// Index within the selected node set.
    pub position: usize,
    /// The event node, for carrier rules that need more than the common fields.
    pub node: &'doc XmlElement,
    /// Description; empty when absent.
    pub label: String,
    /// Status code or phrase; empty when absent.
    pub status: String,
    /// Formatted location.
    pub location: Option<String>,
    /// Parsed event time; `None` when absent or unreadable.
    pub date: Option<ShipmentTimestamp>,
}

/// Decode a UTF-8 response body and parse it.
///
/// # Errors
///
/// Returns [`ParseError::Encoding`] or [`ParseError::Xml`].
pub fn parse_document(body: &[u8]) -> Result<XmlDocument, ParseError> {
    Ok(XmlDocument::parse(str::from_utf8(body)?)?)
}

/// Select event nodes from `scope` and extract their fields according to `schema`.
///
/// Missing text fields become empty strings, and a missing location becomes `None`.
/// A missing, blank or unparsable timestamp also becomes `None`; the event is kept.
#[must_use]
pub fn extract_events<'doc>(scope: &'doc XmlElement, schema: &EventSchema) -> Vec<RawEvent<'doc>> {
    scope
        .select(schema.events)
        .into_iter()
        .enumerate()
        .map(|(position, node)| {
            let location = match schema.location {
                LocationFields::Split { city, region } => {
                    format_location(node.text_at(city), node.text_at(region))
                }
                LocationFields::Single(path) => node.non_empty_text_at(path).map(str::to_owned),
            };

            let date = match schema.timestamp {
                TimestampFields::Single(path) => read_timestamp(path, node.text_at(path), schema.format),
                TimestampFields::Split {
                    date,
                    time,
                    separator,
                } => {
                    let raw = format!(
                        "{}{separator}{}",
                        node.text_at(date).unwrap_or_default(),
                        node.text_at(time).unwrap_or_default()
                    );
                    read_timestamp(date, Some(&raw), schema.format)
                }
            };

            RawEvent {
                position,
                node,
                label: node.text_at(schema.label).unwrap_or_default().to_owned(),
                status: node.text_at(schema.status).unwrap_or_default().to_owned(),
                location,
                date,
            }
        })
        .collect()
}

/// Parse an optional estimated-delivery field, dropping values that do not parse.
#[must_use]
pub fn optional_timestamp(raw: Option<&str>, format: TimestampFormat) -> Option<ShipmentTimestamp> {
    read_timestamp("estimated delivery", raw, format)
}

fn read_timestamp(field: &str, raw: Option<&str>, format: TimestampFormat) -> Option<ShipmentTimestamp> {
    let raw = raw.map(str::trim).filter(|text| !text.is_empty())?;
    match format.parse(raw) {
        Ok(timestamp) => Some(timestamp),
        Err(err) => {
            tracing::warn!(field, value = raw, error = %err, "ignoring unparsable timestamp");
            None
        }
    }
}
