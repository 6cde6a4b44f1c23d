//! Bounded-time discovery against one adapter
//!
//! A run arms a tap on the object manager signals and installs the
//! `InterfacesAdded` match rule, applies the UUID discovery filter, starts
//! discovery and then waits for an announcement carrying the device
//! interface, or for the deadline. Discovery is stopped, the rule removed
//! and the tap detached on every exit path, in that order. A cancelled run
//! detaches its tap at once and leaves stop-then-remove to one spawned task.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{first_failure, BluebusError, BluebusResult};
use crate::hub::{Signal, SignalFilter, SignalTap};
use crate::match_rule::{MatchGuard, MatchRule};
use crate::object::{Adapter, ObjectPath};
use crate::protocol::{DEVICE_INTERFACE, INTERFACES_ADDED, OBJECT_MANAGER_INTERFACE};
use crate::value::{Properties, PropertyValue};

// ----------------------------------------------------------------------------
// Announcements
// ----------------------------------------------------------------------------

/// Decoded `InterfacesAdded` announcement
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryEvent {
    pub path: ObjectPath,
    pub interfaces: BTreeMap<String, Properties>,
}

impl DiscoveryEvent {
    /// Whether the announced object is a device
    pub fn contains_device(&self) -> bool {
        self.interfaces.contains_key(DEVICE_INTERFACE)
    }
}

/// Decode an `InterfacesAdded` body `(o, a{sa{sv}})`.
///
/// Any shape mismatch yields `None`; callers treat that as "not the
/// announcement they wait for", never as a protocol error.
pub fn decode_interfaces_added(signal: &Signal) -> Option<DiscoveryEvent> {
    let path = match signal.args.first()? {
        PropertyValue::ObjectPath(p) | PropertyValue::Str(p) => ObjectPath::new(p.as_str()),
        _ => return None,
    };
    let PropertyValue::Dict(added) = signal.args.get(1)? else {
        return None;
    };
    let mut interfaces = BTreeMap::new();
    for (interface, props) in added {
        let PropertyValue::Dict(props) = props else {
            return None;
        };
        interfaces.insert(interface.clone(), props.clone());
    }
    Some(DiscoveryEvent { path, interfaces })
}

// ----------------------------------------------------------------------------
// Discovery Session
// ----------------------------------------------------------------------------

/// Match rule and started discovery of one run.
///
/// [`DiscoverySession::close`] stops discovery and then removes the rule.
/// Dropping an open session (the run was cancelled) spawns a single task
/// doing the same two steps in the same order.
struct DiscoverySession {
    adapter: Adapter,
    rule: Option<MatchGuard>,
    started: bool,
}

impl DiscoverySession {
    async fn open(adapter: &Adapter) -> BluebusResult<Self> {
        let rule = MatchGuard::install(adapter.connection(), MatchRule::interfaces_added()).await?;
        Ok(Self {
            adapter: adapter.clone(),
            rule: Some(rule),
            started: false,
        })
    }

    async fn start(&mut self) -> BluebusResult<()> {
        self.adapter.start_discovery().await?;
        self.started = true;
        Ok(())
    }

    async fn close(mut self) -> BluebusResult<()> {
        let stopped = if std::mem::take(&mut self.started) {
            stop_discovery(&self.adapter).await
        } else {
            Ok(())
        };
        let removed = match self.rule.take() {
            Some(rule) => rule.remove().await,
            None => Ok(()),
        };
        first_failure(stopped, removed)
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        let started = std::mem::take(&mut self.started);
        let rule = self.rule.take();
        if !started && rule.is_none() {
            return;
        }
        let adapter = self.adapter.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if started {
                        let _ = stop_discovery(&adapter).await;
                    }
                    if let Some(rule) = rule {
                        let _ = rule.remove().await;
                    }
                });
            }
            Err(_) if started => warn!("{}: no runtime left to stop discovery", adapter.name()),
            Err(_) => {}
        }
    }
}

async fn stop_discovery(adapter: &Adapter) -> BluebusResult<()> {
    let result = adapter.stop_discovery().await;
    if let Err(e) = &result {
        warn!("{}: failed to stop discovery: {}", adapter.name(), e);
    }
    result
}

// ----------------------------------------------------------------------------
// Controller
// ----------------------------------------------------------------------------

/// Runs the discovery protocol against one adapter.
///
/// `discover` takes `&mut self`, so a controller never has two runs in
/// flight.
#[derive(Debug)]
pub struct DiscoveryController {
    adapter: Adapter,
}

impl DiscoveryController {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Discover until a device announcement arrives.
    ///
    /// A zero `timeout` waits indefinitely; otherwise the run fails with
    /// [`BluebusError::DiscoveryTimeout`] once it elapses.
    pub async fn discover(&mut self, timeout: Duration, uuids: &[&str]) -> BluebusResult<()> {
        let mut tap = self.adapter.connection().subscribe(
            SignalFilter::interface(OBJECT_MANAGER_INTERFACE),
            self.adapter.config().discovery_buffer,
        );
        let mut session = DiscoverySession::open(&self.adapter).await?;

        let result = self.run(&mut session, &mut tap, timeout, uuids).await;

        let result = first_failure(result, session.close().await);
        drop(tap);
        result
    }

    async fn run(
        &self,
        session: &mut DiscoverySession,
        tap: &mut SignalTap,
        timeout: Duration,
        uuids: &[&str],
    ) -> BluebusResult<()> {
        self.adapter.set_discovery_filter(uuids).await?;
        session.start().await?;
        self.wait_for_device(tap, timeout).await
    }

    async fn wait_for_device(&self, tap: &mut SignalTap, timeout: Duration) -> BluebusResult<()> {
        let name = self.adapter.name();
        let deadline = async {
            if timeout.is_zero() {
                std::future::pending::<()>().await;
            } else {
                tokio::time::sleep(timeout).await;
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                signal = tap.recv() => {
                    let Some(signal) = signal else {
                        return Err(BluebusError::ConnectionClosed);
                    };
                    if signal.interface != OBJECT_MANAGER_INTERFACE || signal.member != INTERFACES_ADDED {
                        debug!("{}: unexpected signal {}", name, signal.name());
                        continue;
                    }
                    match decode_interfaces_added(&signal) {
                        Some(event) if event.contains_device() => {
                            info!("{}: discovery finished ({})", name, event.path);
                            return Ok(());
                        }
                        _ => debug!(
                            "{}: skipping signal {} with no device interface",
                            name,
                            signal.name()
                        ),
                    }
                }
                () = &mut deadline => {
                    return Err(BluebusError::DiscoveryTimeout {
                        duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{device_properties, interfaces_added};

    #[test]
    fn test_decode_device_announcement() {
        let signal = interfaces_added(
            "/org/bluez/hci0/dev_11_22_33_44_55_66",
            DEVICE_INTERFACE,
            device_properties("11:22:33:44:55:66", "Band", &[], false),
        );
        let event = decode_interfaces_added(&signal).unwrap();
        assert_eq!(event.path.as_str(), "/org/bluez/hci0/dev_11_22_33_44_55_66");
        assert!(event.contains_device());
    }

    #[test]
    fn test_decode_other_interfaces() {
        let signal = interfaces_added(
            "/org/bluez/hci0/dev_11_22_33_44_55_66/service0001",
            "org.bluez.GattService1",
            Properties::new(),
        );
        assert!(!decode_interfaces_added(&signal).unwrap().contains_device());
    }

    #[test]
    fn test_decode_failures() {
        let missing = Signal::new("/", OBJECT_MANAGER_INTERFACE, INTERFACES_ADDED, Vec::new());
        assert!(decode_interfaces_added(&missing).is_none());

        let flat = Signal::new(
            "/",
            OBJECT_MANAGER_INTERFACE,
            INTERFACES_ADDED,
            vec![
                PropertyValue::ObjectPath("/org/bluez/hci0/dev_1".into()),
                PropertyValue::Str(DEVICE_INTERFACE.into()),
            ],
        );
        assert!(decode_interfaces_added(&flat).is_none());

        let mut added = Properties::new();
        added.insert(DEVICE_INTERFACE.into(), PropertyValue::Bool(true));
        let wrong_props = Signal::new(
            "/",
            OBJECT_MANAGER_INTERFACE,
            INTERFACES_ADDED,
            vec![
                PropertyValue::ObjectPath("/org/bluez/hci0/dev_1".into()),
                PropertyValue::Dict(added),
            ],
        );
        assert!(decode_interfaces_added(&wrong_props).is_none());
    }
}
