//! Provider implementation for the UPS XML tracking API.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::escape::escape;
use serde::Deserialize;
use tracing::{debug, warn};

use shiptrack_core::{
    extract::{EventSchema, LocationFields, TimestampFields, extract_events, optional_timestamp},
    model::{Carrier, EventType, ShipmentEvent, ShipmentInformation},
    ports::{ParseError, TrackingError, TrackingProvider},
    timestamp::TimestampFormat,
    transport::{HttpRequest, HttpTransport, RequestBody},
    xml::XmlDocument,
};

const DEFAULT_URL: &str = "https://onlinetools.ups.com/ups.app/xml/Track";

const EVENT_SCHEMA: EventSchema = EventSchema {
    events: "//Package/Activity",
    location: LocationFields::Split {
        city: "ActivityLocation/Address/City",
        region: "ActivityLocation/Address/StateProvinceCode",
    },
    label: "Status/StatusType/Description",
    status: "Status/StatusType/Code",
    timestamp: TimestampFields::Split {
        date: "Date",
        time: "Time",
        separator: "",
    },
    format: TimestampFormat::Patterns(&["%Y%m%d%H%M%S"]),
};

const SCHEDULED_DELIVERY_FORMAT: TimestampFormat = TimestampFormat::Patterns(&["%Y%m%d%H%M%S", "%Y%m%d"]);

const DELIVERED_CODE: &str = "D";
const EXCEPTION_CODE: &str = "X";

const UNKNOWN_FAILURE: &str = "Unknown failure from XML response";

/// Label-based rule for exception activities.
struct ExceptionRule {
    /// Upper-case text the label must contain.
    needle: &'static str,
    /// Only applies when the package carries a `ReturnTo` node.
    needs_return_to: bool,
    event_type: EventType,
}

/// Applied in order; a later match overrides an earlier one.
const EXCEPTION_RULES: [ExceptionRule; 2] = [
    ExceptionRule {
        needle: "DELIVERY ATTEMPT",
        needs_return_to: false,
        event_type: EventType::DeliveryAttempted,
    },
    ExceptionRule {
        needle: "RETURN",
        needs_return_to: true,
        event_type: EventType::ReturnedToShipper,
    },
];

/// UPS XML API access credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsCredentials {
    /// Access license number.
    pub access_license_number: String,
    /// My UPS user id.
    pub username: String,
    /// My UPS password.
    pub password: String,
}

/// Tracking provider for UPS.
pub struct UpsProvider {
    credentials: UpsCredentials,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

impl UpsProvider {
    /// Create a provider talking to the production endpoint.
    #[must_use]
    pub fn new(credentials: UpsCredentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            url: DEFAULT_URL.to_owned(),
            transport,
        }
    }

    /// Use a different endpoint, e.g. the customer integration environment.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Access request followed by the track request, as two XML documents in one body.
    fn request_body(&self, tracking_number: &str) -> String {
        format!(
            concat!(
                "<?xml version=\"1.0\"?>\n",
                "<AccessRequest><AccessLicenseNumber>{license}</AccessLicenseNumber><UserId>{user}</UserId><Password>{password}</Password></AccessRequest>\n",
                "<?xml version=\"1.0\"?>\n",
                "<TrackRequest><Request><RequestAction>Track</RequestAction><RequestOption>1</RequestOption></Request><TrackingNumber>{tracking}</TrackingNumber></TrackRequest>\n",
            ),
            license = escape(self.credentials.access_license_number.as_str()),
            user = escape(self.credentials.username.as_str()),
            password = escape(self.credentials.password.as_str()),
            tracking = escape(tracking_number),
        )
    }
}

#[async_trait]
impl TrackingProvider for UpsProvider {
    fn carrier(&self) -> Carrier {
        Carrier::Ups
    }

    async fn track(&self, tracking_number: &str) -> Result<ShipmentInformation, TrackingError> {
        debug!(carrier = %Carrier::Ups, tracking_number, url = %self.url, "sending track request");

        let request = HttpRequest::post(&self.url).body(RequestBody::Text(self.request_body(tracking_number)));
        let body = self.transport.execute(request).await?;

        let info = parse_track_response(&body)?;
        debug!(carrier = %Carrier::Ups, events = info.events().len(), "parsed track response");
        Ok(info)
    }
}

/// Reinterpret every byte as a Latin-1 code point.
///
/// UPS sends ISO-8859-1 without saying so in a way HTTP clients honour. A body
/// that is already UTF-8 gets double-encoded here, so non-ASCII names come out
/// garbled if UPS ever switches encodings.
fn latin1_to_utf8(body: &[u8]) -> String {
    body.iter().map(|&byte| char::from(byte)).collect()
}

/// Parse a `TrackResponse` document.
///
/// # Errors
///
/// Returns [`TrackingError::Carrier`] when UPS reports `Failure`, and
/// [`TrackingError::Parse`] for malformed XML.
pub fn parse_track_response(body: &[u8]) -> Result<ShipmentInformation, TrackingError> {
    let document = XmlDocument::parse(&latin1_to_utf8(body)).map_err(ParseError::from)?;
    let root = document.root();

    if root.text_at("Response/ResponseStatusDescription") == Some("Failure") {
        let message = root
            .non_empty_text_at("Response/Error/ErrorDescription")
            .unwrap_or(UNKNOWN_FAILURE);
        warn!(carrier = %Carrier::Ups, message, "carrier reported failure");
        return Err(TrackingError::carrier(Carrier::Ups, message));
    }

    // Only the first package decides whether the shipment is on its way back.
    let package_returned = root
        .first("Shipment/Package")
        .and_then(|package| package.first("ReturnTo"))
        .is_some();

    let events = extract_events(root, &EVENT_SCHEMA)
        .into_iter()
        .map(|raw| {
            let event_type = classify(&raw.status, &raw.label, package_returned);
            ShipmentEvent::new(raw.date, raw.label, raw.location, event_type)
        })
        .collect();

    let estimated_delivery = optional_timestamp(root.text_at("Shipment/ScheduledDeliveryDate"), SCHEDULED_DELIVERY_FORMAT);

    Ok(ShipmentInformation::new(events, estimated_delivery))
}

fn classify(code: &str, label: &str, package_returned: bool) -> Option<EventType> {
    match code {
        DELIVERED_CODE => Some(EventType::Delivered),
        EXCEPTION_CODE => {
            let label = label.to_ascii_uppercase();
            EXCEPTION_RULES
                .iter()
                .rev()
                .find(|rule| (package_returned || !rule.needs_return_to) && label.contains(rule.needle))
                .map(|rule| rule.event_type)
        }
        _ => None,
    }
}
