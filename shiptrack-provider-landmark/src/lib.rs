//! Provider implementation for Landmark Global's v2 tracking API.

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
    transport::{HttpRequest, HttpTransport},
};

const DEFAULT_URL: &str = "https://api.landmarkglobal.com/v2/Track.php";

// Landmark reports a preformatted location and uses the status phrase as the label.
const EVENT_SCHEMA: EventSchema = EventSchema {
    events: "//Events/Event",
    location: LocationFields::Single("Location"),
    label: "Status",
    status: "Status",
    timestamp: TimestampFields::Single("DateTime"),
    format: TimestampFormat::Patterns(&["%Y-%m-%d %H:%M:%S"]),
};

/// Status phrases meaning the package reached the recipient. Matched exactly.
const DELIVERED_STATUSES: [&str; 3] = [
    "Item successfully delivered",
    "Delivered",
    "Delivered to your community mailbox, parcel locker or apt./condo mailbox",
];

/// Landmark API login.
#[derive(Debug, Clone, Deserialize)]
pub struct LandmarkCredentials {
    /// API user name.
    pub username: String,
    /// API password.
    pub password: String,
}

/// Tracking provider for Landmark Global.
pub struct LandmarkProvider {
    credentials: LandmarkCredentials,
    url: String,
    transport: Arc<dyn HttpTransport>,
}

impl LandmarkProvider {
    /// Create a provider talking to the production endpoint.
    #[must_use]
    pub fn new(credentials: LandmarkCredentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            url: DEFAULT_URL.to_owned(),
            transport,
        }
    }

    /// Use a different endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    fn request_xml(&self, tracking_number: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<TrackRequest><Login><Username>{}</Username><Password>{}</Password></Login><TrackingNumber>{}</TrackingNumber></TrackRequest>\n",
            escape(self.credentials.username.as_str()),
            escape(self.credentials.password.as_str()),
            escape(tracking_number),
        )
    }
}

#[async_trait]
impl TrackingProvider for LandmarkProvider {
    fn carrier(&self) -> Carrier {
        Carrier::Landmark
    }

    async fn track(&self, tracking_number: &str) -> Result<ShipmentInformation, TrackingError> {
        debug!(carrier = %Carrier::Landmark, tracking_number, url = %self.url, "sending track request");

        let request = HttpRequest::get(&self.url).query("RQXML", self.request_xml(tracking_number));
        let body = self.transport.execute(request).await?;

        let info = parse_track_response(&body)?;
        debug!(carrier = %Carrier::Landmark, events = info.events().len(), "parsed track response");
        Ok(info)
    }
}

/// Parse a `TrackResponse` document.
///
/// # Errors
///
/// Returns [`TrackingError::Parse`] when the body is not well-formed XML.
pub fn parse_track_response(body: &[u8]) -> Result<ShipmentInformation, TrackingError> {
    let document = parse_document(body)?;

    let events = extract_events(document.root(), &EVENT_SCHEMA)
        .into_iter()
        .map(|raw| {
            let event_type = DELIVERED_STATUSES
                .contains(&raw.status.as_str())
                .then_some(EventType::Delivered);
            ShipmentEvent::new(raw.date, raw.label, raw.location, event_type)
        })
        .collect();

    let estimated_delivery = optional_timestamp(
        document.root().text_at("Result/Packages/Package/ExpectedDelivery"),
        TimestampFormat::Iso8601,
    );

    Ok(ShipmentInformation::new(events, estimated_delivery))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use shiptrack_core::{
        model::ShipmentTimestamp,
        transport::{Method, RequestBody, testing::CannedTransport},
    };

    use super::*;

    const FIXTURE: &str = include_str!("../tests/fixtures/landmark.xml");

    fn credentials() -> LandmarkCredentials {
        LandmarkCredentials {
            username: "username".to_owned(),
            password: "password".to_owned(),
        }
    }

    fn local(text: &str) -> ShipmentTimestamp {
        ShipmentTimestamp::Local(NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").expect("test timestamp"))
    }

    fn response_with_statuses(statuses: &[&str]) -> String {
        let events: String = statuses
            .iter()
            .map(|status| format!("<Event><Status>{status}</Status><DateTime>2015-04-18 09:00:00</DateTime></Event>"))
            .collect();
        format!("<TrackResponse><Result><Packages><Package><Events>{events}</Events></Package></Packages></Result></TrackResponse>")
    }

    #[tokio::test]
    async fn tracks_delivered_shipment() {
        let transport = Arc::new(CannedTransport::responding(FIXTURE));
        let provider = LandmarkProvider::new(credentials(), transport.clone());

        let info = provider.track("ABC").await.expect("tracking succeeds");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1, "exactly one request");
        let request = requests.first().expect("request");
        assert_eq!(request.method, Method::Get, "method");
        assert_eq!(request.url, "https://api.landmarkglobal.com/v2/Track.php", "url");
        assert_eq!(request.body, RequestBody::Empty, "no body");
        assert_eq!(
            request.query,
            [(
                "RQXML".to_owned(),
                "<?xml version=\"1.0\"?>\n<TrackRequest><Login><Username>username</Username><Password>password</Password></Login><TrackingNumber>ABC</TrackingNumber></TrackRequest>\n".to_owned()
            )],
            "request xml in query"
        );

        assert_eq!(info.events().len(), 1, "single event");
        let event = info.events().first().expect("event");
        assert_eq!(event.date(), Some(&local("2015-04-20 15:10:10")), "event date");
        assert_eq!(event.label(), "Item successfully delivered", "label");
        assert_eq!(event.location(), Some("Toronto, ON"), "location");
        assert_eq!(event.event_type(), Some(EventType::Delivered), "classification");
        assert_eq!(info.delivered_at(), Some(&local("2015-04-20 15:10:10")), "delivered at");
        assert_eq!(info.estimated_delivery_date(), None, "no estimate in fixture");
    }

    #[test]
    fn only_exact_delivered_phrases_classify() {
        let body = response_with_statuses(&[
            "Delivered",
            "Delivered to your community mailbox, parcel locker or apt./condo mailbox",
            "delivered",
            "Item Successfully Delivered",
            "Returned to sender",
            "Delivery attempted",
        ]);

        let info = parse_track_response(body.as_bytes()).expect("parses");

        let types: Vec<_> = info.events().iter().map(ShipmentEvent::event_type).collect();
        assert_eq!(
            types,
            [Some(EventType::Delivered), Some(EventType::Delivered), None, None, None, None],
            "case-sensitive exact match"
        );
    }

    #[test]
    fn expected_delivery_and_missing_location() {
        let body = "<TrackResponse><Result><Packages><Package>\
            <ExpectedDelivery>2015-04-24</ExpectedDelivery>\
            <Events><Event><Status>In transit</Status><DateTime>2015-04-18 09:00:00</DateTime></Event></Events>\
            </Package></Packages></Result></TrackResponse>";

        let info = parse_track_response(body.as_bytes()).expect("parses");

        assert_eq!(info.estimated_delivery_date(), Some(&local("2015-04-24 00:00:00")), "estimate");
        let event = info.events().first().expect("event");
        assert_eq!(event.location(), None, "no location element");
        assert_eq!(info.delivered_at(), None, "not delivered");
    }

    #[test]
    fn events_without_readable_date_are_kept() {
        let body = "<TrackResponse><Result><Packages><Package><Events>\
            <Event><Status>Delivered</Status><DateTime></DateTime></Event>\
            <Event><Status>Shipment data received</Status></Event>\
            <Event><Status>In transit</Status><DateTime>20/04/2015</DateTime></Event>\
            </Events></Package></Packages></Result></TrackResponse>";

        let info = parse_track_response(body.as_bytes()).expect("parses");

        assert_eq!(info.events().len(), 3, "no event dropped");
        assert!(info.events().iter().all(|event| event.date().is_none()), "all undated");
        assert_eq!(
            info.events().first().expect("event").event_type(),
            Some(EventType::Delivered),
            "still classified"
        );
        assert_eq!(info.delivered_at(), None, "delivered event has no date");
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_track_response(FIXTURE.as_bytes()).expect("parses");
        let second = parse_track_response(FIXTURE.as_bytes()).expect("parses");

        assert_eq!(first, second, "same input, same result");
    }

    #[test]
    fn malformed_response_is_a_parse_failure() {
        let err = parse_track_response(b"<TrackResponse><Result>").expect_err("malformed");

        assert!(matches!(err, TrackingError::Parse(_)), "unexpected error: {err:?}");
    }
}
