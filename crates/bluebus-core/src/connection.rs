//! The shared bus connection
//!
//! [`BusTransport`] is the seam to the underlying message bus: match rule
//! management, method calls, object enumeration and the raw signal stream.
//! [`BusConnection`] wraps one transport for the whole process. It is
//! constructed explicitly, cloned into every component that needs it, and
//! runs a single dispatcher task that pumps transport signals into the
//! [`SignalHub`].

use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::BluebusResult;
use crate::hub::{Signal, SignalFilter, SignalHub, SignalTap};
use crate::match_rule::MatchRule;
use crate::object::ObjectPath;
use crate::value::{Properties, PropertyValue};

/// Stream of every broadcast signal the transport receives
pub type SignalStream = Pin<Box<dyn Stream<Item = Signal> + Send>>;

/// Result of a full enumeration: path to interface to properties
pub type ManagedObjects = BTreeMap<ObjectPath, BTreeMap<String, Properties>>;

// ----------------------------------------------------------------------------
// Method Calls
// ----------------------------------------------------------------------------

/// A method invocation on a remote object
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub destination: String,
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub args: Vec<PropertyValue>,
}

impl MethodCall {
    pub fn new(
        destination: impl Into<String>,
        path: impl Into<ObjectPath>,
        interface: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            destination: destination.into(),
            path: path.into(),
            interface: interface.into(),
            member: member.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: PropertyValue) -> Self {
        self.args.push(arg);
        self
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} on {}", self.interface, self.member, self.path)
    }
}

// ----------------------------------------------------------------------------
// Transport Seam
// ----------------------------------------------------------------------------

/// Primitives the engine needs from the message bus
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Install a broadcast filter rule, passed verbatim
    async fn add_match(&self, rule: &str) -> BluebusResult<()>;

    /// Remove a previously installed filter rule
    async fn remove_match(&self, rule: &str) -> BluebusResult<()>;

    /// Invoke a method, discarding any reply body
    async fn call(&self, call: &MethodCall) -> BluebusResult<()>;

    /// Enumerate every object the service manages
    async fn managed_objects(&self, service: &str) -> BluebusResult<ManagedObjects>;

    /// Take the stream of incoming signals; called once per connection
    async fn signals(&self) -> BluebusResult<SignalStream>;
}

// ----------------------------------------------------------------------------
// Bus Connection
// ----------------------------------------------------------------------------

struct Inner {
    transport: Arc<dyn BusTransport>,
    hub: SignalHub,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .dispatcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.hub.close();
    }
}

/// Process-wide handle to the bus and its signal multiplexer
#[derive(Clone)]
pub struct BusConnection {
    inner: Arc<Inner>,
}

impl BusConnection {
    /// Open the connection: take the transport's signal stream and start
    /// dispatching it. Must be called inside a Tokio runtime.
    pub async fn open(transport: Arc<dyn BusTransport>) -> BluebusResult<Self> {
        let mut signals = transport.signals().await?;
        let hub = SignalHub::new();

        let dispatch_hub = hub.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(signal) = signals.next().await {
                trace!("signal {} from {}", signal.name(), signal.path);
                dispatch_hub.publish(signal).await;
            }
            debug!("signal stream ended");
            dispatch_hub.close();
        });

        debug!("bus connection opened");
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                hub,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        })
    }

    pub fn transport(&self) -> &Arc<dyn BusTransport> {
        &self.inner.transport
    }

    pub fn hub(&self) -> &SignalHub {
        &self.inner.hub
    }

    /// Open a tap on the shared signal stream
    pub fn subscribe(&self, filter: SignalFilter, capacity: usize) -> SignalTap {
        self.inner.hub.subscribe(filter, capacity)
    }

    pub async fn add_match(&self, rule: &MatchRule) -> BluebusResult<()> {
        debug!("adding match rule {}", rule);
        self.inner.transport.add_match(&rule.to_string()).await
    }

    pub async fn remove_match(&self, rule: &MatchRule) -> BluebusResult<()> {
        debug!("removing match rule {}", rule);
        self.inner.transport.remove_match(&rule.to_string()).await
    }

    pub async fn call(&self, call: MethodCall) -> BluebusResult<()> {
        trace!("calling {}", call);
        self.inner.transport.call(&call).await
    }

    pub async fn managed_objects(&self, service: &str) -> BluebusResult<ManagedObjects> {
        self.inner.transport.managed_objects(service).await
    }

    /// Stop dispatching and end every open tap
    pub fn shutdown(&self) {
        if let Some(handle) = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.inner.hub.close();
        debug!("bus connection shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.hub.is_closed()
    }
}

impl fmt::Debug for BusConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusConnection")
            .field("taps", &self.inner.hub.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
