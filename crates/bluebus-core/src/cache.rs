//! Object cache and the find-or-discover facade
//!
//! The cache is a snapshot of every object the daemon manages, refreshed
//! only by full re-enumeration ([`ObjectCache::update`]). Property change
//! notifications go to active watchers and are not folded back in; callers
//! that need fresh state after a watch call `update`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::BluebusConfig;
use crate::connection::BusConnection;
use crate::error::{BluebusError, BluebusResult};
use crate::object::{Adapter, BusObject, Device, InterfaceKind, ObjectPath};
use crate::uuids::uuids_include;

// ----------------------------------------------------------------------------
// Object Cache
// ----------------------------------------------------------------------------

/// Path-ordered snapshot of the remote objects
pub struct ObjectCache {
    conn: BusConnection,
    config: Arc<BluebusConfig>,
    objects: BTreeMap<ObjectPath, Arc<BusObject>>,
    /// Set when a refresh after discovery failed; lookups refuse until the next good update
    desynchronized: Option<String>,
}

impl ObjectCache {
    /// Build a cache and populate it with an initial enumeration
    pub async fn new(conn: BusConnection, config: BluebusConfig) -> BluebusResult<Self> {
        config.validate()?;
        let mut cache = Self {
            conn,
            config: Arc::new(config),
            objects: BTreeMap::new(),
            desynchronized: None,
        };
        cache.update().await?;
        Ok(cache)
    }

    pub fn connection(&self) -> &BusConnection {
        &self.conn
    }

    pub fn config(&self) -> &BluebusConfig {
        &self.config
    }

    /// Re-enumerate every remote object, replacing the snapshot wholesale
    pub async fn update(&mut self) -> BluebusResult<()> {
        let managed = self.conn.managed_objects(&self.config.service).await?;
        self.objects = managed
            .into_iter()
            .map(|(path, interfaces)| {
                let object = Arc::new(BusObject::new(path.clone(), interfaces));
                (path, object)
            })
            .collect();
        self.desynchronized = None;
        debug!("object cache holds {} objects", self.objects.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn is_synchronized(&self) -> bool {
        self.desynchronized.is_none()
    }

    fn ensure_synchronized(&self) -> BluebusResult<()> {
        match &self.desynchronized {
            Some(reason) => Err(BluebusError::CacheDesynchronized {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn object(&self, path: &ObjectPath) -> Option<Arc<BusObject>> {
        self.objects.get(path).cloned()
    }

    /// First object of `kind`, in path order, satisfying `predicate`
    pub fn find_matching<P>(
        &self,
        kind: InterfaceKind,
        predicate: P,
    ) -> BluebusResult<Arc<BusObject>>
    where
        P: Fn(&BusObject) -> bool,
    {
        self.ensure_synchronized()?;
        self.objects
            .values()
            .filter(|object| object.is(kind))
            .find(|object| predicate(object))
            .cloned()
            .ok_or_else(|| BluebusError::NotFound {
                interface: kind.interface().to_string(),
            })
    }

    fn device(&self, object: Arc<BusObject>) -> Option<Device> {
        Device::new(object, self.conn.clone(), self.config.clone())
    }

    fn adapter(&self, object: Arc<BusObject>) -> Option<Adapter> {
        Adapter::new(object, self.conn.clone(), self.config.clone())
    }

    /// First device whose projection satisfies `predicate`
    pub fn match_device<P>(&self, predicate: P) -> BluebusResult<Device>
    where
        P: Fn(&Device) -> bool,
    {
        self.ensure_synchronized()?;
        self.objects
            .values()
            .filter_map(|object| self.device(object.clone()))
            .find(|device| predicate(device))
            .ok_or_else(|| BluebusError::NotFound {
                interface: InterfaceKind::Device.interface().to_string(),
            })
    }

    /// Device advertising every UUID in `uuids`
    pub fn get_device(&self, uuids: &[&str]) -> BluebusResult<Device> {
        self.match_device(|device| uuids_include(device.uuids().unwrap_or_default(), uuids))
    }

    pub fn get_device_by_name(&self, name: &str) -> BluebusResult<Device> {
        self.match_device(|device| device.name() == name)
    }

    pub fn get_device_by_address(&self, address: &str) -> BluebusResult<Device> {
        self.match_device(|device| device.address().is_ok_and(|a| a == address))
    }

    /// The configured adapter, or the first one when none is configured
    pub fn get_adapter(&self) -> BluebusResult<Adapter> {
        let wanted = self.config.adapter.as_deref();
        let object = self.find_matching(InterfaceKind::Adapter, |object| {
            wanted.map_or(true, |name| object.path().basename() == name)
        })?;
        self.adapter(object).ok_or_else(|| BluebusError::NotFound {
            interface: InterfaceKind::Adapter.interface().to_string(),
        })
    }

    pub fn devices(&self) -> Vec<Device> {
        self.objects
            .values()
            .filter_map(|object| self.device(object.clone()))
            .collect()
    }

    pub fn adapters(&self) -> Vec<Adapter> {
        self.objects
            .values()
            .filter_map(|object| self.adapter(object.clone()))
            .collect()
    }

    /// Find a device advertising `uuids`, discovering it if needed.
    ///
    /// A device already in the snapshot is returned without touching the
    /// bus. Otherwise discovery runs on the adapter and the cache is fully
    /// refreshed before looking again; the announced object may still not
    /// match, in which case the lookup's `NotFound` is returned.
    ///
    /// A refresh failure after a successful discovery leaves the cache
    /// desynchronized: it is returned as [`BluebusError::CacheDesynchronized`]
    /// and every lookup fails the same way until [`ObjectCache::update`]
    /// succeeds.
    pub async fn discover(&mut self, timeout: Duration, uuids: &[&str]) -> BluebusResult<Device> {
        if let Ok(device) = self.get_device(uuids) {
            info!("{}: already discovered", device.name());
            return Ok(device);
        }

        let adapter = self.get_adapter()?;
        adapter.discover(timeout, uuids).await?;

        if let Err(e) = self.update().await {
            error!("object cache lost synchronization: {}", e);
            let reason = e.to_string();
            self.desynchronized = Some(reason.clone());
            return Err(BluebusError::CacheDesynchronized { reason });
        }
        self.get_device(uuids)
    }
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("objects", &self.objects.keys().collect::<Vec<_>>())
            .field("desynchronized", &self.desynchronized)
            .finish()
    }
}
