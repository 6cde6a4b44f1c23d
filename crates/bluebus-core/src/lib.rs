//! Bluetooth LE discovery and property watching over a system message bus
//!
//! This crate holds the transport-agnostic engine: the shared bus connection
//! and its signal multiplexer, match rule management, the object cache with
//! device and adapter projections, the discovery protocol and per-object
//! property watchers. The wire transport is supplied through
//! [`BusTransport`]; `bluebus-bluez` provides the system bus implementation.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod cache;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod hub;
pub mod match_rule;
pub mod object;
pub mod protocol;
pub mod uuids;
pub mod value;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use cache::ObjectCache;
pub use config::BluebusConfig;
pub use connection::{BusConnection, BusTransport, ManagedObjects, MethodCall, SignalStream};
pub use discovery::{DiscoveryController, DiscoveryEvent};
pub use error::{BluebusError, BluebusResult};
pub use hub::{Signal, SignalFilter, SignalHub, SignalTap, SubscriptionId};
pub use match_rule::{MatchGuard, MatchRule};
pub use object::{Adapter, BusObject, Device, InterfaceKind, ObjectPath};
pub use uuids::{long_uuid, uuids_include, valid_uuid};
pub use value::{Properties, PropertyValue};
pub use watcher::{PropertyChangeEvent, PropertyWatcher};

pub use tokio_util::sync::CancellationToken;
