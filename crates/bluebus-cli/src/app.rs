//! Discover-then-connect flow

use std::sync::Arc;

use tracing::{debug, info};

use bluebus_bluez::BluezTransport;
use bluebus_core::{long_uuid, valid_uuid, BusConnection, Device, ObjectCache};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Open the system bus and connect to the device advertising `uuid`
pub async fn run(config: &AppConfig, uuid: &str) -> Result<()> {
    check_uuid(uuid)?;
    let transport = BluezTransport::system().await?;
    let conn = BusConnection::open(Arc::new(transport)).await?;
    let result = connect_device(conn.clone(), config, uuid).await;
    conn.shutdown();
    result.map(|_| ())
}

/// Reject malformed UUIDs before touching the bus
pub fn check_uuid(uuid: &str) -> Result<()> {
    if valid_uuid(uuid) {
        Ok(())
    } else {
        Err(CliError::InvalidUuid(uuid.to_string()))
    }
}

/// Find or discover the device advertising `uuid`, connecting unless it already is.
///
/// BlueZ reports service UUIDs in the 128-bit form, so a short `uuid` is
/// expanded before matching.
pub async fn connect_device(
    conn: BusConnection,
    config: &AppConfig,
    uuid: &str,
) -> Result<Device> {
    check_uuid(uuid)?;
    let uuid = long_uuid(uuid);
    let mut cache = ObjectCache::new(conn, config.engine_config()).await?;
    debug!("{} objects known before discovery", cache.len());

    let device = cache.discover(config.timeout(), &[uuid.as_str()]).await?;
    if device.connected()? {
        info!("{}: already connected", device.name());
    } else {
        device.connect().await?;
    }
    Ok(device)
}
