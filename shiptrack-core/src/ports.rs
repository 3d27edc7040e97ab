//! Provider capability and the error type every carrier reports through.

use std::str::Utf8Error;

use async_trait::async_trait;

use crate::model::{Carrier, ShipmentInformation};
use crate::transport::TransportError;
use crate::xml::XmlError;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while tracking a shipment.
pub enum TrackingError {
    /// The carrier could not be reached or answered with an HTTP error.
    #[error("An error occurred contacting the carrier's api: {0}")]
    Network(#[from] TransportError),
    /// The response was not the XML the carrier is expected to send.
    #[error("An error occurred while trying to parse the xml response: {0}")]
    Parse(#[from] ParseError),
    /// The carrier answered, but reported a failure or had no matching result.
    #[error("{carrier} reported a failure: {message}")]
    Carrier {
        /// Carrier that rejected the request.
        carrier: Carrier,
        /// Message reported by the carrier, or a generic one.
        message: String,
    },
}

impl TrackingError {
    /// Build a [`TrackingError::Carrier`].
    pub fn carrier(carrier: Carrier, message: impl Into<String>) -> Self {
        Self::Carrier {
            carrier,
            message: message.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
/// Ways a response body can fail to parse.
pub enum ParseError {
    /// Body is not well-formed XML.
    #[error(transparent)]
    Xml(#[from] XmlError),
    /// Body is not valid UTF-8.
    #[error("Response is not valid UTF-8: {0}")]
    Encoding(#[from] Utf8Error),
}

#[async_trait]
/// Trait implemented once per carrier.
pub trait TrackingProvider: Send + Sync {
    /// Carrier handled by this provider.
    fn carrier(&self) -> Carrier;

    /// Fetch and normalize the tracking history for `tracking_number`.
    ///
    /// Issues exactly one request; nothing is retried or cached.
    ///
    /// # Errors
    ///
    /// Returns a [`TrackingError`] when the request fails, the response does not
    /// parse, or the carrier reports a failure.
    async fn track(&self, tracking_number: &str) -> Result<ShipmentInformation, TrackingError>;
}
