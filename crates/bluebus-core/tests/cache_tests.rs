//! Object cache and find-or-discover tests

mod test_utils;

use std::time::Duration;

use bluebus_core::protocol::{ADAPTER_INTERFACE, DEVICE_INTERFACE};
use bluebus_core::testing::{adapter_properties, device_properties, interfaces_added};
use bluebus_core::{BluebusConfig, BluebusError, InterfaceKind, ObjectCache, ObjectPath};
use test_utils::*;

// ----------------------------------------------------------------------------
// Lookups
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_cache_enumerates_objects() {
    let (bus, conn) = setup().await;
    insert_device(&bus, DEVICE_PATH, "Pulse", &[HEART_RATE, BATTERY], false);
    insert_device(&bus, OTHER_DEVICE_PATH, "Scale", &[BATTERY], true);

    let cache = cache(&conn).await;
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.devices().len(), 2);
    assert_eq!(cache.adapters().len(), 1);
    assert!(cache.object(&ObjectPath::from(DEVICE_PATH)).is_some());
    assert_eq!(bus.calls_named("GetManagedObjects"), 1);
}

#[tokio::test]
async fn test_get_device_requires_every_uuid() {
    let (bus, conn) = setup().await;
    insert_device(&bus, DEVICE_PATH, "Pulse", &[HEART_RATE, BATTERY], false);
    insert_device(&bus, OTHER_DEVICE_PATH, "Scale", &[BATTERY], true);
    let cache = cache(&conn).await;

    let device = cache.get_device(&[BATTERY]).unwrap();
    assert_eq!(device.path().as_str(), OTHER_DEVICE_PATH);

    let device = cache.get_device(&[BATTERY, HEART_RATE]).unwrap();
    assert_eq!(device.name(), "Pulse");

    let err = cache.get_device(&["00002a37-0000-1000-8000-00805f9b34fb"]).unwrap_err();
    assert_eq!(
        err,
        BluebusError::NotFound {
            interface: DEVICE_INTERFACE.to_string()
        }
    );
    assert!(cache.get_device(&["180D"]).is_err());
}

#[tokio::test]
async fn test_device_lookups_by_name_and_address() {
    let (bus, conn) = setup().await;
    insert_device(&bus, DEVICE_PATH, "Pulse", &[HEART_RATE], true);
    let cache = cache(&conn).await;

    let device = cache.get_device_by_name("Pulse").unwrap();
    assert_eq!(device.address().unwrap(), "AA:BB:CC:DD:EE:FF");
    assert!(device.connected().unwrap());
    assert_eq!(device.uuids().unwrap(), [HEART_RATE.to_string()]);

    let device = cache.get_device_by_address("AA:BB:CC:DD:EE:FF").unwrap();
    assert_eq!(device.path().as_str(), DEVICE_PATH);
    assert!(cache.get_device_by_name("Nobody").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_find_matching_is_kind_scoped() {
    let (bus, conn) = setup().await;
    insert_device(&bus, DEVICE_PATH, "hci0", &[], false);
    let cache = cache(&conn).await;

    let object = cache
        .find_matching(InterfaceKind::Adapter, |object| object.name() == "hci0")
        .unwrap();
    assert_eq!(object.path().as_str(), ADAPTER_PATH);
}

#[tokio::test]
async fn test_get_adapter_honours_configured_name() {
    let (bus, conn) = setup().await;
    bus.insert_object(
        "/org/bluez/hci1",
        ADAPTER_INTERFACE,
        adapter_properties("00:1A:7D:DA:71:14", "hci1"),
    );

    let first = cache(&conn).await.get_adapter().unwrap();
    assert_eq!(first.path().as_str(), ADAPTER_PATH);

    let config = BluebusConfig::default().with_adapter("hci1");
    let cache = ObjectCache::new(conn.clone(), config).await.unwrap();
    let adapter = cache.get_adapter().unwrap();
    assert_eq!(adapter.path().as_str(), "/org/bluez/hci1");
    assert!(adapter.powered().unwrap());

    let config = BluebusConfig::default().with_adapter("hci7");
    let cache = ObjectCache::new(conn, config).await.unwrap();
    assert_eq!(
        cache.get_adapter().unwrap_err(),
        BluebusError::NotFound {
            interface: ADAPTER_INTERFACE.to_string()
        }
    );
}

#[tokio::test]
async fn test_update_replaces_snapshot() {
    let (bus, conn) = setup().await;
    insert_device(&bus, DEVICE_PATH, "Pulse", &[HEART_RATE], false);
    let mut cache = cache(&conn).await;
    assert!(cache.get_device(&[HEART_RATE]).is_ok());

    bus.remove_object(DEVICE_PATH);
    cache.update().await.unwrap();
    assert!(cache.get_device(&[HEART_RATE]).is_err());
    assert_eq!(cache.len(), 1);
}

// ----------------------------------------------------------------------------
// Find Or Discover
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_cached_device_skips_discovery() {
    let (bus, conn) = setup().await;
    insert_device(&bus, DEVICE_PATH, "Pulse", &[HEART_RATE], false);
    let mut cache = cache(&conn).await;
    let before = bus.calls().len();

    let device = cache
        .discover(Duration::from_millis(50), &[HEART_RATE])
        .await
        .unwrap();

    assert_eq!(device.path().as_str(), DEVICE_PATH);
    assert_eq!(bus.calls().len(), before);
}

#[tokio::test]
async fn test_discover_refreshes_and_finds_device() {
    let (bus, conn) = setup().await;
    let mut cache = cache(&conn).await;

    let announce = {
        let bus = bus.clone();
        tokio::spawn(async move {
            bus.wait_for_call("StartDiscovery").await;
            insert_device(&bus, DEVICE_PATH, "Pulse", &[HEART_RATE], false);
            bus.emit(interfaces_added(
                DEVICE_PATH,
                DEVICE_INTERFACE,
                device_properties("AA:BB:CC:DD:EE:FF", "Pulse", &[HEART_RATE], false),
            ));
        })
    };

    let device = cache
        .discover(Duration::from_secs(5), &[HEART_RATE])
        .await
        .unwrap();
    announce.await.unwrap();

    assert_eq!(device.name(), "Pulse");
    assert_eq!(bus.calls_named("GetManagedObjects"), 2);
    assert_eq!(bus.calls_named("StopDiscovery"), 1);
    assert!(bus.installed_rules().is_empty());
}

#[tokio::test]
async fn test_discover_without_matching_device_reports_not_found() {
    let (bus, conn) = setup().await;
    let mut cache = cache(&conn).await;

    let announce = {
        let bus = bus.clone();
        tokio::spawn(async move {
            bus.wait_for_call("StartDiscovery").await;
            insert_device(&bus, OTHER_DEVICE_PATH, "Scale", &[BATTERY], false);
            bus.emit(interfaces_added(
                OTHER_DEVICE_PATH,
                DEVICE_INTERFACE,
                device_properties("11:22:33:44:55:66", "Scale", &[BATTERY], false),
            ));
        })
    };

    let err = cache
        .discover(Duration::from_secs(5), &[HEART_RATE])
        .await
        .unwrap_err();
    announce.await.unwrap();

    assert!(err.is_not_found());
    assert!(cache.is_synchronized());
}

#[tokio::test]
async fn test_discover_timeout_propagates() {
    let (bus, conn) = setup().await;
    let mut cache = cache(&conn).await;

    let err = cache
        .discover(Duration::from_millis(30), &[HEART_RATE])
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(cache.is_synchronized());
    assert!(bus.installed_rules().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_desynchronizes_cache() {
    let (bus, conn) = setup().await;
    let mut cache = cache(&conn).await;

    let announce = {
        let bus = bus.clone();
        tokio::spawn(async move {
            bus.wait_for_call("StartDiscovery").await;
            bus.fail(
                "GetManagedObjects",
                BluebusError::transport("GetManagedObjects", "org.bluez.Error.Failed"),
            );
            bus.emit(interfaces_added(
                DEVICE_PATH,
                DEVICE_INTERFACE,
                device_properties("AA:BB:CC:DD:EE:FF", "Pulse", &[HEART_RATE], false),
            ));
        })
    };

    let err = cache
        .discover(Duration::from_secs(5), &[HEART_RATE])
        .await
        .unwrap_err();
    announce.await.unwrap();

    assert!(matches!(err, BluebusError::CacheDesynchronized { .. }));
    assert!(!cache.is_synchronized());
    assert!(matches!(
        cache.get_adapter().unwrap_err(),
        BluebusError::CacheDesynchronized { .. }
    ));

    bus.clear_failure("GetManagedObjects");
    insert_device(&bus, DEVICE_PATH, "Pulse", &[HEART_RATE], false);
    cache.update().await.unwrap();
    assert!(cache.is_synchronized());
    assert_eq!(cache.get_device(&[HEART_RATE]).unwrap().name(), "Pulse");
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (_bus, conn) = setup().await;
    let config = BluebusConfig::default().with_discovery_buffer(0);

    let err = ObjectCache::new(conn, config).await.unwrap_err();
    assert!(matches!(err, BluebusError::Configuration { .. }));
}
