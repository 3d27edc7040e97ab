//! Domain data structures for carriers, shipment events, and tracking results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Parcel carriers supported by shiptrack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    /// FedEx Web Services (Track v9).
    Fedex,
    /// Landmark Global.
    Landmark,
    /// OnTrac.
    OnTrac,
    /// UPS XML tracking API.
    Ups,
    /// USPS Web Tools (`TrackV2`).
    Usps,
}

impl Carrier {
    /// All carriers, in slug order.
    pub const ALL: [Carrier; 5] = [
        Carrier::Fedex,
        Carrier::Landmark,
        Carrier::OnTrac,
        Carrier::Ups,
        Carrier::Usps,
    ];

    /// Stable lowercase identifier.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Carrier::Fedex => "fedex",
            Carrier::Landmark => "landmark",
            Carrier::OnTrac => "ontrac",
            Carrier::Ups => "ups",
            Carrier::Usps => "usps",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.slug())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Returned when a string names no known carrier.
#[error("Unknown carrier: {0}")]
pub struct UnknownCarrier(pub String);

impl FromStr for Carrier {
    type Err = UnknownCarrier;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        Carrier::ALL
            .into_iter()
            .find(|carrier| carrier.slug() == wanted)
            .ok_or_else(|| UnknownCarrier(raw.to_owned()))
    }
}

/// Point in time as reported by a carrier.
///
/// Some carriers send an explicit UTC offset, others only the local wall-clock
/// time at the scan location. The latter are kept as-is instead of guessing a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShipmentTimestamp {
    /// Timestamp with a known offset.
    Zoned(DateTime<FixedOffset>),
    /// Local time without offset information.
    Local(NaiveDateTime),
}

impl ShipmentTimestamp {
    /// Wall-clock time at the place the carrier reported it.
    #[must_use]
    pub fn naive_local(&self) -> NaiveDateTime {
        match self {
            ShipmentTimestamp::Zoned(zoned) => zoned.naive_local(),
            ShipmentTimestamp::Local(local) => *local,
        }
    }
}

impl fmt::Display for ShipmentTimestamp {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipmentTimestamp::Zoned(zoned) => write!(formatter, "{}", zoned.to_rfc3339()),
            ShipmentTimestamp::Local(local) => write!(formatter, "{}", local.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<DateTime<FixedOffset>> for ShipmentTimestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        ShipmentTimestamp::Zoned(value)
    }
}

impl From<NaiveDateTime> for ShipmentTimestamp {
    fn from(value: NaiveDateTime) -> Self {
        ShipmentTimestamp::Local(value)
    }
}

/// Semantic meaning of an event, when a carrier rule recognizes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Shipment handed to the recipient.
    Delivered,
    /// Shipment on its way back to (or back at) the shipper.
    ReturnedToShipper,
    /// Carrier tried to deliver and failed.
    DeliveryAttempted,
}

impl fmt::Display for EventType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventType::Delivered => "delivered",
            EventType::ReturnedToShipper => "returned to shipper",
            EventType::DeliveryAttempted => "delivery attempted",
        };
        formatter.write_str(label)
    }
}

/// One status update in a shipment's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentEvent {
    date: Option<ShipmentTimestamp>,
    label: String,
    location: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<EventType>,
}

impl ShipmentEvent {
    /// Create an event from already extracted carrier data.
    #[must_use]
    pub fn new(
        date: Option<ShipmentTimestamp>,
        label: impl Into<String>,
        location: Option<String>,
        event_type: Option<EventType>,
    ) -> Self {
        Self {
            date,
            label: label.into(),
            location,
            event_type,
        }
    }

    /// When the event happened, if the carrier sent a readable date.
    #[must_use]
    pub fn date(&self) -> Option<&ShipmentTimestamp> {
        self.date.as_ref()
    }

    /// Carrier free-text description.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// `"City, Region"` when the carrier reported both parts.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Classification, if any rule matched.
    #[must_use]
    pub fn event_type(&self) -> Option<EventType> {
        self.event_type
    }
}

/// Normalized tracking result for a single shipment.
///
/// Events keep the order in which the carrier returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentInformation {
    events: Vec<ShipmentEvent>,
    estimated_delivery_date: Option<ShipmentTimestamp>,
}

impl ShipmentInformation {
    /// Assemble a result from parsed events.
    #[must_use]
    pub fn new(events: Vec<ShipmentEvent>, estimated_delivery_date: Option<ShipmentTimestamp>) -> Self {
        Self {
            events,
            estimated_delivery_date,
        }
    }

    /// Events in carrier order.
    #[must_use]
    pub fn events(&self) -> &[ShipmentEvent] {
        &self.events
    }

    /// Carrier-predicted delivery date.
    #[must_use]
    pub fn estimated_delivery_date(&self) -> Option<&ShipmentTimestamp> {
        self.estimated_delivery_date.as_ref()
    }

    /// Date of the first delivered event in carrier order.
    ///
    /// `None` when nothing was delivered or the delivered event has no date.
    #[must_use]
    pub fn delivered_at(&self) -> Option<&ShipmentTimestamp> {
        self.events
            .iter()
            .find(|event| event.event_type == Some(EventType::Delivered))
            .and_then(ShipmentEvent::date)
    }
}

/// Join city and region into `"City, Region"`, or `None` if either is blank.
#[must_use]
pub fn format_location(city: Option<&str>, region: Option<&str>) -> Option<String> {
    match (city, region) {
        (Some(city), Some(region)) if !city.is_empty() && !region.is_empty() => {
            Some(format!("{city}, {region}"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32) -> ShipmentTimestamp {
        let date = NaiveDate::from_ymd_opt(2015, 4, 17).expect("valid date");
        ShipmentTimestamp::Local(date.and_hms_opt(hour, 0, 0).expect("valid time"))
    }

    #[test]
    fn delivered_at_uses_first_delivered_event_in_given_order() {
        let info = ShipmentInformation::new(
            vec![
                ShipmentEvent::new(Some(at(9)), "Out for delivery", None, None),
                ShipmentEvent::new(Some(at(12)), "Delivered", None, Some(EventType::Delivered)),
                ShipmentEvent::new(Some(at(8)), "Delivered again", None, Some(EventType::Delivered)),
            ],
            None,
        );

        assert_eq!(info.delivered_at(), Some(&at(12)), "first delivered event wins");
    }

    #[test]
    fn delivered_at_is_none_without_delivered_event() {
        let info = ShipmentInformation::new(
            vec![ShipmentEvent::new(
                Some(at(9)),
                "Returned",
                None,
                Some(EventType::ReturnedToShipper),
            )],
            Some(at(10)),
        );

        assert_eq!(info.delivered_at(), None, "no delivered event");
        assert_eq!(info.estimated_delivery_date(), Some(&at(10)), "estimate kept");
    }

    #[test]
    fn undated_delivery_has_no_delivered_at() {
        let info = ShipmentInformation::new(
            vec![
                ShipmentEvent::new(None, "Delivered", None, Some(EventType::Delivered)),
                ShipmentEvent::new(Some(at(12)), "Delivered", None, Some(EventType::Delivered)),
            ],
            None,
        );

        assert_eq!(info.delivered_at(), None, "first delivered event decides");
        assert_eq!(info.events().first().and_then(ShipmentEvent::date), None, "date kept absent");
    }

    #[test]
    fn location_requires_both_parts() {
        assert_eq!(
            format_location(Some("Richland"), Some("WA")).as_deref(),
            Some("Richland, WA"),
            "both parts present"
        );
        assert_eq!(format_location(Some("Richland"), Some("")), None, "empty region");
        assert_eq!(format_location(None, Some("WA")), None, "missing city");
    }

    #[test]
    fn carrier_round_trips_through_slug() {
        for carrier in Carrier::ALL {
            assert_eq!(carrier.slug().parse::<Carrier>(), Ok(carrier), "slug parses back");
        }
        assert_eq!(" UPS ".parse::<Carrier>(), Ok(Carrier::Ups), "case and padding ignored");
        assert!("dhl".parse::<Carrier>().is_err(), "unknown carrier rejected");
    }
}
