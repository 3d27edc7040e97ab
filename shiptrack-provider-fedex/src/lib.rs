//! Provider implementation for FedEx using the Track v9 SOAP web service.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::escape::escape;
use serde::Deserialize;
use tracing::debug;

use shiptrack_core::{
    extract::{EventSchema, LocationFields, TimestampFields, extract_events, optional_timestamp, parse_document},
    model::{Carrier, EventType, ShipmentEvent, ShipmentInformation},
    ports::{TrackingError, TrackingProvider},
    timestamp::TimestampFormat,
    transport::{HttpRequest, HttpTransport, RequestBody},
};

const DEFAULT_URL: &str = "https://ws.fedex.com:443/web-services";

const EVENT_SCHEMA: EventSchema = EventSchema {
    events: "//TrackDetails/Events",
    location: LocationFields::Split {
        city: "Address/City",
        region: "Address/StateOrProvinceCode",
    },
    label: "EventDescription",
    status: "EventType",
    timestamp: TimestampFields::Single("Timestamp"),
    format: TimestampFormat::Iso8601,
};

/// `EventType` codes with a meaning; anything else stays unclassified.
const STATUS_RULES: [(&str, EventType); 2] = [
    ("DL", EventType::Delivered),
    ("RS", EventType::ReturnedToShipper),
];

/// FedEx Web Services credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct FedexCredentials {
    /// Developer key.
    pub key: String,
    /// Developer password.
    pub password: String,
    /// Account number.
    pub account_number: String,
    /// Meter number.
    pub meter_number: String,
}

/// Tracking provider for FedEx.
pub struct FedexProvider {
    credentials: FedexCredentials,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

impl FedexProvider {
    /// Create a provider talking to the production endpoint.
    #[must_use]
    pub fn new(credentials: FedexCredentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            url: DEFAULT_URL.to_owned(),
            transport,
        }
    }

    /// Use a different endpoint, e.g. the FedEx test environment.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn request_xml(&self, tracking_number: &str) -> String {
        let FedexCredentials {
            key,
            password,
            account_number,
            meter_number,
        } = &self.credentials;

        format!(
            concat!(
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:v9="http://fedex.com/ws/track/v9">"#,
                "<soapenv:Body>",
                r#"<TrackRequest xmlns="http://fedex.com/ws/track/v9">"#,
                "<WebAuthenticationDetail><UserCredential><Key>{key}</Key><Password>{password}</Password></UserCredential></WebAuthenticationDetail>",
                "<ClientDetail><AccountNumber>{account}</AccountNumber><MeterNumber>{meter}</MeterNumber></ClientDetail>",
                "<Version><ServiceId>trck</ServiceId><Major>9</Major><Intermediate>1</Intermediate><Minor>0</Minor></Version>",
                "<SelectionDetails><PackageIdentifier><Type>TRACKING_NUMBER_OR_DOORTAG</Type><Value>{tracking}</Value></PackageIdentifier></SelectionDetails>",
                "<ProcessingOptions>INCLUDE_DETAILED_SCANS</ProcessingOptions>",
                "</TrackRequest>",
                "</soapenv:Body>",
                "</soapenv:Envelope>",
            ),
            key = escape(key.as_str()),
            password = escape(password.as_str()),
            account = escape(account_number.as_str()),
            meter = escape(meter_number.as_str()),
            tracking = escape(tracking_number),
        )
    }
}

#[async_trait]
impl TrackingProvider for FedexProvider {
    fn carrier(&self) -> Carrier {
        Carrier::Fedex
    }

    async fn track(&self, tracking_number: &str) -> Result<ShipmentInformation, TrackingError> {
        debug!(carrier = %Carrier::Fedex, tracking_number, url = %self.url, "sending track request");

        let request = HttpRequest::post(&self.url)
            .header("Content-Type", "text/xml")
            .body(RequestBody::Text(self.request_xml(tracking_number)));
        let body = self.transport.execute(request).await?;

        let info = parse_track_reply(&body)?;
        debug!(carrier = %Carrier::Fedex, events = info.events().len(), "parsed track reply");
        Ok(info)
    }
}

/// Parse a `TrackReply` SOAP response.
///
/// # Errors
///
/// Returns [`TrackingError::Parse`] when the body is not well-formed XML.
pub fn parse_track_reply(body: &[u8]) -> Result<ShipmentInformation, TrackingError> {
    let document = parse_document(body)?;

    let events = extract_events(document.root(), &EVENT_SCHEMA)
        .into_iter()
        .map(|raw| {
            let event_type = classify(&raw.status);
            ShipmentEvent::new(raw.date, raw.label, raw.location, event_type)
        })
        .collect();

    let estimated_delivery = optional_timestamp(
        document
            .root()
            .first("//TrackDetails")
            .and_then(|details| details.text_at("EstimatedDeliveryTimestamp")),
        TimestampFormat::Iso8601,
    );

    Ok(ShipmentInformation::new(events, estimated_delivery))
}

fn classify(status: &str) -> Option<EventType> {
    STATUS_RULES
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, event_type)| *event_type)
}
