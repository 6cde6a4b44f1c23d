//! Decoding of received D-Bus messages into engine signals

use std::collections::HashMap;

use bluebus_bluez::signal_from_message;
use bluebus_core::protocol::{
    DEVICE_INTERFACE, INTERFACES_ADDED, OBJECT_MANAGER_INTERFACE, PROPERTIES_CHANGED,
    PROPERTIES_INTERFACE,
};
use bluebus_core::watcher::decode_properties_changed;
use bluebus_core::discovery::decode_interfaces_added;
use bluebus_core::PropertyValue;
use zbus::zvariant::{ObjectPath, Value};
use zbus::Message;

const DEVICE_PATH: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF";

#[test]
fn test_properties_changed_round_trip() {
    let mut changed: HashMap<&str, Value<'_>> = HashMap::new();
    changed.insert("RSSI", Value::I16(-52));
    changed.insert("Connected", Value::Bool(true));
    let message = Message::signal(DEVICE_PATH, PROPERTIES_INTERFACE, PROPERTIES_CHANGED)
        .unwrap()
        .build(&(DEVICE_INTERFACE, changed, Vec::<&str>::new()))
        .unwrap();

    let signal = signal_from_message(&message).unwrap();
    assert_eq!(signal.path.as_str(), DEVICE_PATH);
    assert_eq!(signal.interface, PROPERTIES_INTERFACE);
    assert_eq!(signal.member, PROPERTIES_CHANGED);

    let event = decode_properties_changed(&signal).unwrap();
    assert_eq!(event.interface, DEVICE_INTERFACE);
    assert_eq!(event.changed["RSSI"], PropertyValue::Int16(-52));
    assert_eq!(event.changed["Connected"], PropertyValue::Bool(true));
    assert!(event.invalidated.is_empty());
}

#[test]
fn test_interfaces_added_round_trip() {
    let mut device: HashMap<&str, Value<'_>> = HashMap::new();
    device.insert("Address", Value::from("AA:BB:CC:DD:EE:FF"));
    device.insert(
        "UUIDs",
        Value::from(vec!["0000180d-0000-1000-8000-00805f9b34fb"]),
    );
    let mut added = HashMap::new();
    added.insert(DEVICE_INTERFACE, device);
    let message = Message::signal("/", OBJECT_MANAGER_INTERFACE, INTERFACES_ADDED)
        .unwrap()
        .build(&(ObjectPath::try_from(DEVICE_PATH).unwrap(), added))
        .unwrap();

    let signal = signal_from_message(&message).unwrap();
    let event = decode_interfaces_added(&signal).unwrap();
    assert_eq!(event.path.as_str(), DEVICE_PATH);
    assert!(event.contains_device());
}
