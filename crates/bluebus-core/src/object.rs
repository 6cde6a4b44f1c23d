//! Bus objects and their device/adapter projections
//!
//! A [`BusObject`] is an immutable snapshot of one remote object: its path
//! and the property maps of the interfaces it advertises. It becomes a
//! [`Device`] or an [`Adapter`] purely by which interface it carries; the
//! projections are typed views that share the snapshot and the bus
//! connection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BluebusConfig;
use crate::connection::{BusConnection, MethodCall};
use crate::discovery::DiscoveryController;
use crate::error::{BluebusError, BluebusResult};
use crate::protocol::{
    ADAPTER_INTERFACE, CONNECT, DEVICE_INTERFACE, DISCONNECT, PAIR, SET_DISCOVERY_FILTER,
    START_DISCOVERY, STOP_DISCOVERY,
};
use crate::value::{Properties, PropertyValue};
use crate::watcher::PropertyWatcher;

// ----------------------------------------------------------------------------
// Object Path
// ----------------------------------------------------------------------------

/// Opaque identifier of a remote object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path element, e.g. `hci0` for `/org/bluez/hci0`
    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectPath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl From<String> for ObjectPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&ObjectPath> for ObjectPath {
    fn from(path: &ObjectPath) -> Self {
        path.clone()
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ----------------------------------------------------------------------------
// Bus Object
// ----------------------------------------------------------------------------

/// Role an object plays, selected by the interface it advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Device,
    Adapter,
}

impl InterfaceKind {
    pub fn interface(self) -> &'static str {
        match self {
            InterfaceKind::Device => DEVICE_INTERFACE,
            InterfaceKind::Adapter => ADAPTER_INTERFACE,
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.interface())
    }
}

/// Snapshot of one remote object
#[derive(Debug, Clone, PartialEq)]
pub struct BusObject {
    path: ObjectPath,
    interfaces: BTreeMap<String, Properties>,
}

impl BusObject {
    pub fn new(path: impl Into<ObjectPath>, interfaces: BTreeMap<String, Properties>) -> Self {
        Self {
            path: path.into(),
            interfaces,
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.keys().map(String::as_str)
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.contains_key(interface)
    }

    pub fn is(&self, kind: InterfaceKind) -> bool {
        self.has_interface(kind.interface())
    }

    pub fn properties(&self, interface: &str) -> Option<&Properties> {
        self.interfaces.get(interface)
    }

    /// Look up one property of `interface`
    pub fn property(&self, interface: &str, name: &str) -> BluebusResult<&PropertyValue> {
        self.properties(interface)
            .and_then(|props| props.get(name))
            .ok_or_else(|| BluebusError::MissingProperty {
                path: self.path.to_string(),
                property: name.to_string(),
            })
    }

    /// Display name for log lines: the `Name` property of the device or
    /// adapter interface, or the path when there is none.
    pub fn name(&self) -> String {
        [DEVICE_INTERFACE, ADAPTER_INTERFACE]
            .iter()
            .filter_map(|interface| self.properties(interface)?.get("Name"))
            .find_map(|value| value.as_str("Name").ok())
            .map_or_else(|| self.path.to_string(), str::to_string)
    }
}

// ----------------------------------------------------------------------------
// Device Projection
// ----------------------------------------------------------------------------

/// Device view of a bus object advertising `org.bluez.Device1`
#[derive(Clone)]
pub struct Device {
    object: Arc<BusObject>,
    conn: BusConnection,
    config: Arc<BluebusConfig>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("path", &self.object.path)
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Project `object`; `None` when it does not advertise the device interface
    pub fn new(
        object: Arc<BusObject>,
        conn: BusConnection,
        config: Arc<BluebusConfig>,
    ) -> Option<Self> {
        object.is(InterfaceKind::Device).then_some(Self {
            object,
            conn,
            config,
        })
    }

    pub fn object(&self) -> &BusObject {
        &self.object
    }

    pub fn path(&self) -> &ObjectPath {
        self.object.path()
    }

    pub fn name(&self) -> String {
        self.object.name()
    }

    fn property(&self, name: &str) -> BluebusResult<&PropertyValue> {
        self.object.property(DEVICE_INTERFACE, name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_ok()
    }

    pub fn uuids(&self) -> BluebusResult<&[String]> {
        self.property("UUIDs")?.as_str_list("UUIDs")
    }

    pub fn connected(&self) -> BluebusResult<bool> {
        self.property("Connected")?.as_bool("Connected")
    }

    pub fn paired(&self) -> BluebusResult<bool> {
        self.property("Paired")?.as_bool("Paired")
    }

    pub fn address(&self) -> BluebusResult<&str> {
        self.property("Address")?.as_str("Address")
    }

    pub fn alias(&self) -> BluebusResult<&str> {
        self.property("Alias")?.as_str("Alias")
    }

    pub fn rssi(&self) -> BluebusResult<i16> {
        self.property("RSSI")?.as_i16("RSSI")
    }

    /// Service UUID to advertised service data
    pub fn service_data(&self) -> BluebusResult<&BTreeMap<String, PropertyValue>> {
        self.property("ServiceData")?.as_dict("ServiceData")
    }

    fn method(&self, member: &str) -> MethodCall {
        MethodCall::new(&self.config.service, self.path(), DEVICE_INTERFACE, member)
    }

    pub async fn connect(&self) -> BluebusResult<()> {
        info!("{}: connecting", self.name());
        self.conn.call(self.method(CONNECT)).await
    }

    pub async fn disconnect(&self) -> BluebusResult<()> {
        info!("{}: disconnecting", self.name());
        self.conn.call(self.method(DISCONNECT)).await
    }

    pub async fn pair(&self) -> BluebusResult<()> {
        info!("{}: pairing", self.name());
        self.conn.call(self.method(PAIR)).await
    }

    /// Watcher for this device's property changes
    pub fn watcher(&self) -> PropertyWatcher {
        PropertyWatcher::new(
            self.conn.clone(),
            self.path().clone(),
            self.config.watch_buffer,
        )
    }

    /// Invoke `handler` with every property change set until `cancel` fires
    pub async fn watch_properties<F>(
        &self,
        cancel: CancellationToken,
        handler: F,
    ) -> BluebusResult<()>
    where
        F: FnMut(Properties) + Send,
    {
        self.watcher().watch(cancel, handler).await
    }
}

// ----------------------------------------------------------------------------
// Adapter Projection
// ----------------------------------------------------------------------------

/// Adapter view of a bus object advertising `org.bluez.Adapter1`
#[derive(Clone)]
pub struct Adapter {
    object: Arc<BusObject>,
    conn: BusConnection,
    config: Arc<BluebusConfig>,
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("path", &self.object.path)
            .finish_non_exhaustive()
    }
}

impl Adapter {
    /// Project `object`; `None` when it does not advertise the adapter interface
    pub fn new(
        object: Arc<BusObject>,
        conn: BusConnection,
        config: Arc<BluebusConfig>,
    ) -> Option<Self> {
        object.is(InterfaceKind::Adapter).then_some(Self {
            object,
            conn,
            config,
        })
    }

    pub fn object(&self) -> &BusObject {
        &self.object
    }

    pub fn path(&self) -> &ObjectPath {
        self.object.path()
    }

    pub fn name(&self) -> String {
        self.object.name()
    }

    pub fn connection(&self) -> &BusConnection {
        &self.conn
    }

    pub fn config(&self) -> &BluebusConfig {
        &self.config
    }

    fn property(&self, name: &str) -> BluebusResult<&PropertyValue> {
        self.object.property(ADAPTER_INTERFACE, name)
    }

    pub fn address(&self) -> BluebusResult<&str> {
        self.property("Address")?.as_str("Address")
    }

    pub fn powered(&self) -> BluebusResult<bool> {
        self.property("Powered")?.as_bool("Powered")
    }

    pub fn discovering(&self) -> BluebusResult<bool> {
        self.property("Discovering")?.as_bool("Discovering")
    }

    fn method(&self, member: &str) -> MethodCall {
        MethodCall::new(&self.config.service, self.path(), ADAPTER_INTERFACE, member)
    }

    /// Restrict discovery to devices advertising `uuids` on the configured transport
    pub async fn set_discovery_filter(&self, uuids: &[&str]) -> BluebusResult<()> {
        info!("{}: setting discovery filter {:?}", self.name(), uuids);
        let mut filter = Properties::new();
        filter.insert(
            "Transport".to_string(),
            PropertyValue::from(self.config.discovery_transport.as_str()),
        );
        filter.insert(
            "UUIDs".to_string(),
            PropertyValue::StrList(uuids.iter().map(|u| u.to_string()).collect()),
        );
        self.conn
            .call(
                self.method(SET_DISCOVERY_FILTER)
                    .with_arg(PropertyValue::Dict(filter)),
            )
            .await
    }

    pub async fn start_discovery(&self) -> BluebusResult<()> {
        info!("{}: starting discovery", self.name());
        self.conn.call(self.method(START_DISCOVERY)).await
    }

    pub async fn stop_discovery(&self) -> BluebusResult<()> {
        info!("{}: stopping discovery", self.name());
        self.conn.call(self.method(STOP_DISCOVERY)).await
    }

    /// Controller for discovery runs on this adapter
    pub fn controller(&self) -> DiscoveryController {
        DiscoveryController::new(self.clone())
    }

    /// Discover until a device is announced or `timeout` elapses (zero waits forever)
    pub async fn discover(&self, timeout: Duration, uuids: &[&str]) -> BluebusResult<()> {
        self.controller().discover(timeout, uuids).await
    }
}
