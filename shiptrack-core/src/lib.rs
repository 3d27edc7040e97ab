//! Core types and plumbing for the shiptrack carrier tracking aggregator.

/// Declarative field-path schemas and the generic event extraction routine.
pub mod extract;
/// Shipment model shared by all carriers.
pub mod model;
/// Registry resolving carrier providers.
pub mod plugin;
/// Traits describing the provider capability and the reported error type.
pub mod ports;
/// Carrier timestamp formats.
pub mod timestamp;
/// HTTP transport port and its `reqwest` implementation.
pub mod transport;
/// Namespace-stripping XML element tree.
pub mod xml;

pub use extract::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use timestamp::*;
pub use transport::*;
pub use xml::*;
