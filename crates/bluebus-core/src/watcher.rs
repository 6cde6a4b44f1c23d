//! Per-object property change subscriptions

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::BusConnection;
use crate::error::{first_failure, BluebusError, BluebusResult};
use crate::hub::{Signal, SignalFilter};
use crate::match_rule::{MatchGuard, MatchRule};
use crate::object::ObjectPath;
use crate::protocol::{PROPERTIES_CHANGED, PROPERTIES_INTERFACE};
use crate::value::{Properties, PropertyValue};

// ----------------------------------------------------------------------------
// Change Notifications
// ----------------------------------------------------------------------------

/// Decoded `PropertiesChanged` notification for one object
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChangeEvent {
    pub path: ObjectPath,
    pub interface: String,
    pub changed: Properties,
    pub invalidated: Vec<String>,
}

/// Decode a `PropertiesChanged` body `(s, a{sv}, as)`; `None` on any shape mismatch
pub fn decode_properties_changed(signal: &Signal) -> Option<PropertyChangeEvent> {
    let PropertyValue::Str(interface) = signal.args.first()? else {
        return None;
    };
    let PropertyValue::Dict(changed) = signal.args.get(1)? else {
        return None;
    };
    let invalidated = match signal.args.get(2) {
        None => Vec::new(),
        Some(value) => value.as_str_list("invalidated").ok()?.to_vec(),
    };
    Some(PropertyChangeEvent {
        path: signal.path.clone(),
        interface: interface.clone(),
        changed: changed.clone(),
        invalidated,
    })
}

// ----------------------------------------------------------------------------
// Watcher
// ----------------------------------------------------------------------------

/// Long-lived subscription to the property changes of one object
#[derive(Debug, Clone)]
pub struct PropertyWatcher {
    conn: BusConnection,
    path: ObjectPath,
    buffer: usize,
}

impl PropertyWatcher {
    pub fn new(conn: BusConnection, path: ObjectPath, buffer: usize) -> Self {
        Self { conn, path, buffer }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Deliver each change set to `handler` until `cancel` fires.
    ///
    /// The handler runs inline on the watch loop: while it runs, this tap
    /// does not drain, and a full tap holds up the shared dispatcher.
    /// Cancellation is observed between signals. Malformed notifications are
    /// logged and skipped. Returns `Ok(())` on cancellation.
    pub async fn watch<F>(&self, cancel: CancellationToken, mut handler: F) -> BluebusResult<()>
    where
        F: FnMut(Properties) + Send,
    {
        let mut tap = self.conn.subscribe(
            SignalFilter::interface(PROPERTIES_INTERFACE)
                .with_member(PROPERTIES_CHANGED)
                .with_path(&self.path),
            self.buffer,
        );
        let rule =
            MatchGuard::install(&self.conn, MatchRule::properties_changed(&self.path)).await?;

        let result = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break Ok(()),
                signal = tap.recv() => match signal {
                    Some(signal) => match decode_properties_changed(&signal) {
                        Some(event) => handler(event.changed),
                        None => debug!("{}: ignoring malformed {}", self.path, signal.name()),
                    },
                    None => break Err(BluebusError::ConnectionClosed),
                },
            }
        };

        let cleanup = rule.remove().await;
        drop(tap);
        debug!("{}: property watch ended", self.path);
        first_failure(result, cleanup)
    }
}
