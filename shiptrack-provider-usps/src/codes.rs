//! USPS event code tables.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use serde::Deserialize;

use shiptrack_core::model::EventType;

/// Event codes meaning the mail piece reached the addressee or an agent.
const DELIVERED_CODES: [&str; 3] = [
    "01", // Delivered
    "17", // Picked up by agent
    "43", // Picked up at Post Office
];

/// Event codes meaning the piece is on its way back to the sender.
const RETURNED_TO_SHIPPER_CODES: [&str; 12] = [
    "04", // Refused
    "05", // Undeliverable as addressed
    "09", // Return to sender
    "21", // No such number
    "22", // Insufficient address
    "23", // Moved, left no address
    "24", // Forward expired
    "25", // Addressee unknown
    "26", // Vacant
    "27", // Unclaimed
    "28", // Deceased
    "29", // Return to sender, not picked up
];

/// Event codes meaning delivery was tried and a notice left.
const DELIVERY_ATTEMPTED_CODES: [&str; 6] = [
    "02", // Notice left
    "51", // Business closed
    "52", // Notice left, receptacle full
    "53", // No authorized recipient available
    "55", // No secure location available
    "56", // No access to delivery location
];

static BUILTIN: LazyLock<Arc<EventCodeTable>> = LazyLock::new(|| {
    Arc::new(EventCodeTable {
        delivered: to_set(DELIVERED_CODES),
        returned_to_shipper: to_set(RETURNED_TO_SHIPPER_CODES),
        delivery_attempted: to_set(DELIVERY_ATTEMPTED_CODES),
    })
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// A code listed under more than one classification.
#[error("USPS event code {code:?} is listed as both {first} and {second}")]
pub struct OverlappingCode {
    /// The offending code.
    pub code: String,
    /// Earlier classification in priority order.
    pub first: EventType,
    /// Later classification.
    pub second: EventType,
}

/// Code lists as written in configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventCodeLists {
    /// Delivered codes.
    #[serde(default)]
    pub delivered: Vec<String>,
    /// Returned-to-shipper codes.
    #[serde(default)]
    pub returned_to_shipper: Vec<String>,
    /// Delivery-attempted codes.
    #[serde(default)]
    pub delivery_attempted: Vec<String>,
}

/// Three mutually exclusive sets of USPS event codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCodeTable {
    delivered: HashSet<String>,
    returned_to_shipper: HashSet<String>,
    delivery_attempted: HashSet<String>,
}

impl EventCodeTable {
    /// Build a table, rejecting codes that appear in more than one set.
    ///
    /// # Errors
    ///
    /// Returns [`OverlappingCode`] for the first shared code found.
    pub fn new<I, S>(delivered: I, returned_to_shipper: I, delivery_attempted: I) -> Result<Self, OverlappingCode>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = Self {
            delivered: to_set(delivered),
            returned_to_shipper: to_set(returned_to_shipper),
            delivery_attempted: to_set(delivery_attempted),
        };

        let sets = table.sets();
        for (index, (first, codes)) in sets.iter().enumerate() {
            for (second, other) in sets.iter().skip(index + 1) {
                if let Some(code) = codes.intersection(other).min() {
                    return Err(OverlappingCode {
                        code: code.clone(),
                        first: *first,
                        second: *second,
                    });
                }
            }
        }

        Ok(table)
    }

    /// Table shipped with this crate.
    #[must_use]
    pub fn builtin() -> Arc<Self> {
        Arc::clone(&BUILTIN)
    }

    /// Classify an event code, checking delivered, returned, then attempted.
    #[must_use]
    pub fn classify(&self, code: &str) -> Option<EventType> {
        self.sets()
            .into_iter()
            .find(|(_, codes)| codes.contains(code))
            .map(|(event_type, _)| event_type)
    }

    fn sets(&self) -> [(EventType, &HashSet<String>); 3] {
        [
            (EventType::Delivered, &self.delivered),
            (EventType::ReturnedToShipper, &self.returned_to_shipper),
            (EventType::DeliveryAttempted, &self.delivery_attempted),
        ]
    }
}

impl TryFrom<EventCodeLists> for EventCodeTable {
    type Error = OverlappingCode;

    fn try_from(lists: EventCodeLists) -> Result<Self, Self::Error> {
        Self::new(lists.delivered, lists.returned_to_shipper, lists.delivery_attempted)
    }
}

fn to_set<I, S>(codes: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    codes.into_iter().map(Into::into).collect()
}
