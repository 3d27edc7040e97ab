//! Provider implementation for the USPS Web Tools `TrackV2` API.

/// USPS event code classification tables.
pub mod codes;

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::escape::escape;
use serde::Deserialize;
use tracing::{debug, warn};

use shiptrack_core::{
    extract::{EventSchema, LocationFields, TimestampFields, extract_events, optional_timestamp, parse_document},
    model::{Carrier, ShipmentEvent, ShipmentInformation},
    ports::{TrackingError, TrackingProvider},
    timestamp::TimestampFormat,
    transport::{HttpRequest, HttpTransport, RequestBody},
};

pub use crate::codes::{EventCodeLists, EventCodeTable, OverlappingCode};

const DEFAULT_URL: &str = "http://production.shippingapis.com/ShippingAPI.dll";

const USPS_DATE_FORMAT: TimestampFormat = TimestampFormat::Patterns(&["%B %d, %Y %I:%M %P", "%B %d, %Y"]);

// Summary and detail events share one layout and stay in document order.
const EVENT_SCHEMA: EventSchema = EventSchema {
    events: "TrackDetail|TrackSummary",
    location: LocationFields::Split {
        city: "EventCity",
        region: "EventState",
    },
    label: "Event",
    status: "EventCode",
    timestamp: TimestampFields::Split {
        date: "EventDate",
        time: "EventTime",
        separator: " ",
    },
    format: USPS_DATE_FORMAT,
};

const NOT_FOUND: &str = "Tracking information not found in the response.";

/// USPS Web Tools account.
#[derive(Debug, Clone, Deserialize)]
pub struct UspsCredentials {
    /// Web Tools user id.
    pub user_id: String,
}

/// Tracking provider for USPS.
pub struct UspsProvider {
    credentials: UspsCredentials,
    url: String,
    codes: Arc<EventCodeTable>,
    transport: Arc<dyn HttpTransport>,
}

impl UspsProvider {
    /// Create a provider using the production endpoint and the built-in code table.
    #[must_use]
    pub fn new(credentials: UspsCredentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            url: DEFAULT_URL.to_owned(),
            codes: EventCodeTable::builtin(),
            transport,
        }
    }

    /// Use a different endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Classify events with `codes` instead of the built-in table.
    #[must_use]
    pub fn with_codes(mut self, codes: Arc<EventCodeTable>) -> Self {
        self.codes = codes;
        self
    }

    fn request_xml(&self, tracking_number: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<TrackFieldRequest USERID=\"{}\"><Revision>1</Revision><ClientIp>127.0.0.1</ClientIp><SourceId>1</SourceId><TrackID ID=\"{}\"/></TrackFieldRequest>\n",
            escape(self.credentials.user_id.as_str()),
            escape(tracking_number),
        )
    }
}

#[async_trait]
impl TrackingProvider for UspsProvider {
    fn carrier(&self) -> Carrier {
        Carrier::Usps
    }

    async fn track(&self, tracking_number: &str) -> Result<ShipmentInformation, TrackingError> {
        debug!(carrier = %Carrier::Usps, tracking_number, url = %self.url, "sending track request");

        let request = HttpRequest::post(&self.url).body(RequestBody::Form(vec![
            ("API".to_owned(), "TrackV2".to_owned()),
            ("XML".to_owned(), self.request_xml(tracking_number)),
        ]));
        let body = self.transport.execute(request).await?;

        let info = parse_track_response(&body, tracking_number, &self.codes)?;
        debug!(carrier = %Carrier::Usps, events = info.events().len(), "parsed track response");
        Ok(info)
    }
}

/// Parse a `TrackResponse` and pick the `TrackInfo` for `tracking_number`.
///
/// # Errors
///
/// Returns [`TrackingError::Carrier`] when no `TrackInfo` carries the requested
/// id, and [`TrackingError::Parse`] for malformed XML.
pub fn parse_track_response(
    body: &[u8],
    tracking_number: &str,
    codes: &EventCodeTable,
) -> Result<ShipmentInformation, TrackingError> {
    let document = parse_document(body)?;

    let Some(track_info) = document
        .select("//TrackInfo")
        .into_iter()
        .find(|info| info.attribute("ID") == Some(tracking_number))
    else {
        warn!(carrier = %Carrier::Usps, tracking_number, "no TrackInfo for tracking number");
        return Err(TrackingError::carrier(Carrier::Usps, NOT_FOUND));
    };

    let events = extract_events(track_info, &EVENT_SCHEMA)
        .into_iter()
        .map(|raw| {
            let event_type = codes.classify(&raw.status);
            ShipmentEvent::new(raw.date, raw.label, raw.location, event_type)
        })
        .collect();

    let estimated_delivery = optional_timestamp(track_info.text_at("ExpectedDeliveryDate"), USPS_DATE_FORMAT);

    Ok(ShipmentInformation::new(events, estimated_delivery))
}
