//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use std::sync::Arc;

use bluebus_core::protocol::{ADAPTER_INTERFACE, DEVICE_INTERFACE};
use bluebus_core::testing::{adapter_properties, device_properties, MockBus};
use bluebus_core::{BluebusConfig, BusConnection, ObjectCache};

pub const ADAPTER_PATH: &str = "/org/bluez/hci0";
pub const DEVICE_PATH: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF";
pub const OTHER_DEVICE_PATH: &str = "/org/bluez/hci0/dev_11_22_33_44_55_66";

pub const HEART_RATE: &str = "0000180d-0000-1000-8000-00805f9b34fb";
pub const BATTERY: &str = "0000180f-0000-1000-8000-00805f9b34fb";

// ----------------------------------------------------------------------------
// Bus Setup
// ----------------------------------------------------------------------------

/// Mock bus with a single powered adapter and no devices
pub async fn setup() -> (Arc<MockBus>, BusConnection) {
    let bus = MockBus::new();
    bus.insert_object(
        ADAPTER_PATH,
        ADAPTER_INTERFACE,
        adapter_properties("00:1A:7D:DA:71:13", "hci0"),
    );
    let conn = BusConnection::open(bus.clone())
        .await
        .expect("mock connection should open");
    (bus, conn)
}

pub fn insert_device(bus: &MockBus, path: &str, name: &str, uuids: &[&str], connected: bool) {
    let address = path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_start_matches("dev_")
        .replace('_', ":");
    bus.insert_object(
        path,
        DEVICE_INTERFACE,
        device_properties(&address, name, uuids, connected),
    );
}

pub async fn cache(conn: &BusConnection) -> ObjectCache {
    ObjectCache::new(conn.clone(), BluebusConfig::default())
        .await
        .expect("cache should enumerate")
}

/// Protocol calls in order, leaving out enumerations
pub fn protocol_calls(bus: &MockBus) -> Vec<String> {
    bus.calls()
        .iter()
        .map(|call| call.name().to_string())
        .filter(|name| name != "GetManagedObjects")
        .collect()
}
