//! Provider implementation for OnTrac's shipment web service.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use shiptrack_core::{
    extract::{EventSchema, LocationFields, RawEvent, TimestampFields, extract_events, optional_timestamp, parse_document},
    model::{Carrier, EventType, ShipmentEvent, ShipmentInformation},
    ports::{TrackingError, TrackingProvider},
    timestamp::TimestampFormat,
    transport::{HttpRequest, HttpTransport},
};

const DEFAULT_URL: &str = "https://www.shipontrac.net/OnTracWebServices/OnTracServices.svc/V1/shipments";

const EVENT_SCHEMA: EventSchema = EventSchema {
    events: "Events/Event",
    location: LocationFields::Split {
        city: "City",
        region: "State",
    },
    label: "Description",
    status: "Status",
    timestamp: TimestampFields::Single("EventTime"),
    format: TimestampFormat::Iso8601,
};

const RETURN_TO_SENDER_STATUS: &str = "RS";

/// Tracking provider for OnTrac. No credentials are needed.
pub struct OnTracProvider {
    url: String,
    transport: Arc<dyn HttpTransport>,
}

impl OnTracProvider {
    /// Create a provider talking to the production endpoint.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
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
}

#[async_trait]
impl TrackingProvider for OnTracProvider {
    fn carrier(&self) -> Carrier {
        Carrier::OnTrac
    }

    async fn track(&self, tracking_number: &str) -> Result<ShipmentInformation, TrackingError> {
        debug!(carrier = %Carrier::OnTrac, tracking_number, url = %self.url, "sending track request");

        let request = HttpRequest::get(&self.url).query("tn", tracking_number);
        let body = self.transport.execute(request).await?;

        let info = parse_shipment_status(&body)?;
        debug!(carrier = %Carrier::OnTrac, events = info.events().len(), "parsed shipment status");
        Ok(info)
    }
}

/// Parse an OnTrac shipment status document.
///
/// OnTrac lists events newest first, so when the package is flagged as
/// delivered the event at position 0 is the delivery, whatever its own status.
/// A response listing events in any other order would mark the wrong event.
///
/// A document without a `Package` yields no events and no estimate.
///
/// # Errors
///
/// Returns [`TrackingError::Parse`] when the body is not well-formed XML.
pub fn parse_shipment_status(body: &[u8]) -> Result<ShipmentInformation, TrackingError> {
    let document = parse_document(body)?;

    let Some(package) = document.root().first("//Package") else {
        warn!(carrier = %Carrier::OnTrac, "shipment status without a Package");
        return Ok(ShipmentInformation::new(Vec::new(), None));
    };
    let delivered = package.text_at("Delivered") == Some("true");

    let events = extract_events(package, &EVENT_SCHEMA)
        .into_iter()
        .map(|raw| {
            let event_type = classify(&raw, delivered);
            ShipmentEvent::new(raw.date, raw.label, raw.location, event_type)
        })
        .collect();

    let estimated_delivery = optional_timestamp(package.text_at("Exp_Del_Date"), TimestampFormat::Iso8601);

    Ok(ShipmentInformation::new(events, estimated_delivery))
}

fn classify(raw: &RawEvent<'_>, delivered: bool) -> Option<EventType> {
    if delivered && raw.position == 0 {
        Some(EventType::Delivered)
    } else if raw.status == RETURN_TO_SENDER_STATUS {
        Some(EventType::ReturnedToShipper)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use shiptrack_core::{
        model::ShipmentTimestamp,
        transport::{Method, testing::CannedTransport},
    };

    use super::*;

    const FIXTURE: &str = include_str!("../tests/fixtures/ontrac.xml");

    fn local(text: &str) -> ShipmentTimestamp {
        ShipmentTimestamp::Local(NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").expect("test timestamp"))
    }

    fn package(delivered: &str, statuses: &[&str]) -> String {
        let events: String = statuses
            .iter()
            .map(|status| {
                format!("<Event><Status>{status}</Status><Description>{status}</Description><EventTime>2015-04-20T10:00:00</EventTime></Event>")
            })
            .collect();
        format!(
            "<OnTracTrackingResult><Shipments><Package><Delivered>{delivered}</Delivered>\
             <Exp_Del_Date>2015-04-21T00:00:00</Exp_Del_Date><Events>{events}</Events></Package></Shipments></OnTracTrackingResult>"
        )
    }

    fn types(info: &ShipmentInformation) -> Vec<Option<EventType>> {
        info.events().iter().map(ShipmentEvent::event_type).collect()
    }

    #[tokio::test]
    async fn tracks_delivered_shipment() {
        let transport = Arc::new(CannedTransport::responding(FIXTURE));
        let provider = OnTracProvider::new(transport.clone());

        let info = provider.track("D10010733256578").await.expect("tracking succeeds");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1, "exactly one request");
        let request = requests.first().expect("request");
        assert_eq!(request.method, Method::Get, "method");
        assert_eq!(request.url, DEFAULT_URL, "url");
        assert_eq!(request.query, [("tn".to_owned(), "D10010733256578".to_owned())], "query");

        assert_eq!(info.events().len(), 4, "all events");
        assert_eq!(types(&info), [Some(EventType::Delivered), None, None, None], "newest event delivered");
        let first = info.events().first().expect("first event");
        assert_eq!(first.label(), "DELIVERED", "label");
        assert_eq!(first.location(), Some("PHOENIX, AZ"), "location");
        assert_eq!(info.delivered_at(), Some(&local("2015-04-21 13:42:11")), "delivered at");
        assert_eq!(info.estimated_delivery_date(), Some(&local("2015-04-21 00:00:00")), "estimate");
        let last = info.events().last().expect("last event");
        assert_eq!(last.location(), None, "blank city and state");
    }

    #[test]
    fn position_zero_wins_over_its_own_status() {
        let info = parse_shipment_status(package("true", &["RS", "RS", "OD"]).as_bytes()).expect("parses");

        assert_eq!(
            types(&info),
            [Some(EventType::Delivered), Some(EventType::ReturnedToShipper), None],
            "first event delivered, later RS returned"
        );
    }

    #[test]
    fn not_delivered_never_marks_position_zero() {
        let info = parse_shipment_status(package("false", &["OD", "RS"]).as_bytes()).expect("parses");

        assert_eq!(types(&info), [None, Some(EventType::ReturnedToShipper)], "no delivery from position");
        assert_eq!(info.delivered_at(), None, "not delivered");
    }

    #[test]
    fn delivered_flag_is_exactly_true() {
        let info = parse_shipment_status(package("True", &["DO"]).as_bytes()).expect("parses");

        assert_eq!(types(&info), [None], "flag comparison is case-sensitive");
    }

    #[test]
    fn oldest_first_ordering_mislabels_delivery() {
        // Position 0 is trusted even when the carrier lists the oldest event first.
        let info = parse_shipment_status(package("true", &["OS", "OD", "DO"]).as_bytes()).expect("parses");

        let first = info.events().first().expect("first event");
        assert_eq!(first.label(), "OS", "oldest event first");
        assert_eq!(types(&info), [Some(EventType::Delivered), None, None], "position 0 marked");
    }

    #[test]
    fn missing_package_yields_empty_history() {
        let info = parse_shipment_status(b"<OnTracTrackingResult><Shipments/></OnTracTrackingResult>").expect("parses");

        assert!(info.events().is_empty(), "no events");
        assert_eq!(info.estimated_delivery_date(), None, "no estimate");
    }

    #[test]
    fn absent_blank_or_unreadable_estimate_is_none() {
        for estimate in ["", "<Exp_Del_Date/>", "<Exp_Del_Date>  </Exp_Del_Date>", "<Exp_Del_Date>TBD</Exp_Del_Date>"] {
            let body = format!(
                "<OnTracTrackingResult><Package><Delivered>false</Delivered>{estimate}<Events/></Package></OnTracTrackingResult>"
            );

            let info = parse_shipment_status(body.as_bytes()).expect("parses");

            assert_eq!(info.estimated_delivery_date(), None, "estimate for {estimate:?}");
        }
    }

    #[test]
    fn events_without_readable_time_are_kept() {
        let body = "<OnTracTrackingResult><Package><Delivered>true</Delivered>\
            <Exp_Del_Date>2015-04-21T00:00:00</Exp_Del_Date><Events>\
            <Event><Status>DO</Status><Description>DELIVERED</Description><EventTime></EventTime></Event>\
            <Event><Status>OD</Status><Description>OUT FOR DELIVERY</Description></Event>\
            <Event><Status>OS</Status><Description>PACKAGE RECEIVED</Description><EventTime>2015-04-20T10:00:00</EventTime></Event>\
            </Events></Package></OnTracTrackingResult>";

        let info = parse_shipment_status(body.as_bytes()).expect("parses");

        let dates: Vec<_> = info.events().iter().map(ShipmentEvent::date).collect();
        assert_eq!(dates, [None, None, Some(&local("2015-04-20 10:00:00"))], "blank and missing times");
        assert_eq!(types(&info), [Some(EventType::Delivered), None, None], "classification unchanged");
        assert_eq!(info.delivered_at(), None, "delivery has no date");
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_shipment_status(FIXTURE.as_bytes()).expect("parses");
        let second = parse_shipment_status(FIXTURE.as_bytes()).expect("parses");

        assert_eq!(first, second, "same input, same result");
    }

    #[test]
    fn malformed_response_is_a_parse_failure() {
        let err = parse_shipment_status(b"<OnTracTrackingResult>").expect_err("malformed");

        assert!(matches!(err, TrackingError::Parse(_)), "unexpected error: {err:?}");
    }
}
