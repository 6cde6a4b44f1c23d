//! BlueZ transport for the bluebus engine
//!
//! Implements [`bluebus_core::BusTransport`] over the system D-Bus with
//! `zbus`, and converts between D-Bus variants and the engine's
//! [`bluebus_core::PropertyValue`].

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod convert;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use convert::{from_value, signal_from_message, to_dict, to_value};
pub use transport::BluezTransport;
