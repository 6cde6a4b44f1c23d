//! Signal demultiplexer
//!
//! The bus connection feeds every broadcast signal it receives into one
//! [`SignalHub`]. Components open a [`SignalTap`] for the lifetime of an
//! operation; the hub routes each signal to every tap whose
//! [`SignalFilter`] accepts it, in the order the transport produced them.
//!
//! ## Overflow policy
//!
//! Each tap owns a bounded queue and the hub **blocks** when a matching tap
//! is full: [`SignalHub::publish`] waits for space before moving on to the
//! next tap or the next signal. A consumer that falls behind (or a watch
//! handler that never returns) therefore stalls delivery to every other tap
//! on the same connection. Nothing is dropped or coalesced; choose tap
//! capacities and keep handlers short accordingly.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::trace;

use crate::object::ObjectPath;
use crate::value::PropertyValue;

// ----------------------------------------------------------------------------
// Signals and Filters
// ----------------------------------------------------------------------------

/// A broadcast signal as marshalled by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub args: Vec<PropertyValue>,
}

impl Signal {
    pub fn new(
        path: impl Into<ObjectPath>,
        interface: impl Into<String>,
        member: impl Into<String>,
        args: Vec<PropertyValue>,
    ) -> Self {
        Self {
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            args,
        }
    }

    /// Fully qualified signal name, `interface.member`
    pub fn name(&self) -> String {
        format!("{}.{}", self.interface, self.member)
    }
}

/// Routing key for a tap; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalFilter {
    interface: Option<String>,
    member: Option<String>,
    path: Option<ObjectPath>,
}

impl SignalFilter {
    /// Accept every signal
    pub fn any() -> Self {
        Self::default()
    }

    /// Accept signals of one interface
    pub fn interface(interface: impl Into<String>) -> Self {
        Self {
            interface: Some(interface.into()),
            ..Self::default()
        }
    }

    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<ObjectPath>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        self.interface
            .as_deref()
            .map_or(true, |i| i == signal.interface)
            && self.member.as_deref().map_or(true, |m| m == signal.member)
            && self.path.as_ref().map_or(true, |p| *p == signal.path)
    }
}

// ----------------------------------------------------------------------------
// Hub
// ----------------------------------------------------------------------------

/// Handle identifying one tap in the hub registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tap#{}", self.0)
    }
}

struct Subscriber {
    filter: SignalFilter,
    sender: mpsc::Sender<Signal>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<SubscriptionId, Subscriber>,
    closed: bool,
}

/// Publish/subscribe registry fanning one signal stream out to many taps
#[derive(Clone, Default)]
pub struct SignalHub {
    registry: Arc<Mutex<Registry>>,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a tap with a queue of `capacity` signals (at least one).
    ///
    /// A tap opened on a closed hub is immediately at end-of-stream.
    pub fn subscribe(&self, filter: SignalFilter, capacity: usize) -> SignalTap {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let mut registry = self.lock();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        if !registry.closed {
            registry
                .subscribers
                .insert(id, Subscriber { filter, sender });
        }
        trace!("{} subscribed", id);
        SignalTap {
            id,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a tap from the registry; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }

    /// Deliver `signal` to every matching tap, waiting for queue space.
    ///
    /// Returns the number of taps that received it. Taps whose receiver is
    /// gone are pruned.
    pub async fn publish(&self, signal: Signal) -> usize {
        let targets: Vec<(SubscriptionId, mpsc::Sender<Signal>)> = self
            .lock()
            .subscribers
            .iter()
            .filter(|(_, subscriber)| subscriber.filter.matches(&signal))
            .map(|(id, subscriber)| (*id, subscriber.sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in targets {
            if sender.send(signal.clone()).await.is_ok() {
                delivered += 1;
            } else {
                self.unsubscribe(id);
            }
        }
        trace!("{} delivered to {} taps", signal.name(), delivered);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Drop every tap sender; pending receives observe end-of-stream
    pub fn close(&self) {
        let mut registry = self.lock();
        registry.closed = true;
        registry.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

// ----------------------------------------------------------------------------
// Tap
// ----------------------------------------------------------------------------

/// Receiving end of a hub subscription; unregisters itself on drop
pub struct SignalTap {
    id: SubscriptionId,
    receiver: mpsc::Receiver<Signal>,
    registry: Weak<Mutex<Registry>>,
}

impl SignalTap {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next routed signal, or `None` once the hub has closed
    pub async fn recv(&mut self) -> Option<Signal> {
        self.receiver.recv().await
    }
}

impl Drop for SignalTap {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .remove(&self.id);
        }
        trace!("{} detached", self.id);
    }
}
