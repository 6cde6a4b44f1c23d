//! In-memory bus transport for tests
//!
//! [`MockBus`] records every primitive it is asked to perform, keeps the
//! installed match rules as a multiset and serves a scripted object tree.
//! Signals are injected with [`MockBus::emit`]. Installing a rule that is
//! already present, or removing one that is not, fails; leaked or doubled
//! rules therefore surface as errors in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Notify};

use crate::connection::{BusTransport, ManagedObjects, MethodCall, SignalStream};
use crate::error::{BluebusError, BluebusResult};
use crate::hub::Signal;
use crate::object::ObjectPath;
use crate::protocol::{
    INTERFACES_ADDED, OBJECT_MANAGER_INTERFACE, OBJECT_MANAGER_PATH, PROPERTIES_CHANGED,
    PROPERTIES_INTERFACE,
};
use crate::value::{Properties, PropertyValue};

/// Operation name used for match rule installs
pub const ADD_MATCH: &str = "AddMatch";
/// Operation name used for match rule removals
pub const REMOVE_MATCH: &str = "RemoveMatch";
/// Operation name used for enumerations
pub const GET_MANAGED_OBJECTS: &str = "GetManagedObjects";

// ----------------------------------------------------------------------------
// Recorded Calls
// ----------------------------------------------------------------------------

/// One primitive the engine asked the transport to perform
#[derive(Debug, Clone, PartialEq)]
pub enum BusCall {
    AddMatch(String),
    RemoveMatch(String),
    Method(MethodCall),
    ManagedObjects(String),
}

impl BusCall {
    /// Operation name; method calls use their member name
    pub fn name(&self) -> &str {
        match self {
            BusCall::AddMatch(_) => ADD_MATCH,
            BusCall::RemoveMatch(_) => REMOVE_MATCH,
            BusCall::Method(call) => &call.member,
            BusCall::ManagedObjects(_) => GET_MANAGED_OBJECTS,
        }
    }
}

// ----------------------------------------------------------------------------
// Mock Bus
// ----------------------------------------------------------------------------

#[derive(Default)]
struct MockState {
    calls: Vec<BusCall>,
    rules: BTreeMap<String, usize>,
    objects: ManagedObjects,
    failures: HashMap<String, BluebusError>,
}

/// Scriptable [`BusTransport`] double
pub struct MockBus {
    state: Mutex<MockState>,
    sender: Mutex<Option<mpsc::UnboundedSender<Signal>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Signal>>>,
    activity: Notify,
}

impl MockBus {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            activity: Notify::new(),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `interface` with `properties` to the object at `path`
    pub fn insert_object(
        &self,
        path: impl Into<ObjectPath>,
        interface: impl Into<String>,
        properties: Properties,
    ) {
        self.state()
            .objects
            .entry(path.into())
            .or_default()
            .insert(interface.into(), properties);
    }

    pub fn remove_object(&self, path: impl Into<ObjectPath>) {
        self.state().objects.remove(&path.into());
    }

    /// Make every later `operation` fail with `error` until cleared
    pub fn fail(&self, operation: impl Into<String>, error: BluebusError) {
        self.state().failures.insert(operation.into(), error);
    }

    pub fn clear_failure(&self, operation: &str) {
        self.state().failures.remove(operation);
    }

    /// Deliver a signal to the connection's dispatcher
    pub fn emit(&self, signal: Signal) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            let _ = sender.send(signal);
        }
    }

    /// End the signal stream, as if the bus connection dropped
    pub fn end_signals(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.state().calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.name() == name)
            .count()
    }

    /// Currently installed rules, one entry per installation
    pub fn installed_rules(&self) -> Vec<String> {
        self.state()
            .rules
            .iter()
            .flat_map(|(rule, count)| std::iter::repeat(rule.clone()).take(*count))
            .collect()
    }

    /// Wait until at least one `name` call has been recorded
    pub async fn wait_for_call(&self, name: &str) {
        self.wait_for_calls(name, 1).await;
    }

    /// Wait until at least `count` `name` calls have been recorded
    pub async fn wait_for_calls(&self, name: &str, count: usize) {
        loop {
            let notified = self.activity.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.calls_named(name) >= count {
                return;
            }
            notified.await;
        }
    }

    /// Record `call` and return the scripted failure for it, if any
    fn record(&self, call: BusCall) -> BluebusResult<()> {
        let result = {
            let mut state = self.state();
            let failure = state.failures.get(call.name()).cloned();
            state.calls.push(call);
            failure.map_or(Ok(()), Err)
        };
        self.activity.notify_waiters();
        result
    }
}

#[async_trait]
impl BusTransport for MockBus {
    async fn add_match(&self, rule: &str) -> BluebusResult<()> {
        self.record(BusCall::AddMatch(rule.to_string()))?;
        let mut state = self.state();
        let count = state.rules.entry(rule.to_string()).or_insert(0);
        if *count > 0 {
            return Err(BluebusError::transport(
                ADD_MATCH,
                format!("rule already installed: {}", rule),
            ));
        }
        *count += 1;
        Ok(())
    }

    async fn remove_match(&self, rule: &str) -> BluebusResult<()> {
        self.record(BusCall::RemoveMatch(rule.to_string()))?;
        let mut state = self.state();
        match state.rules.get_mut(rule) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                state.rules.remove(rule);
            }
            None => {
                return Err(BluebusError::transport(
                    REMOVE_MATCH,
                    format!("rule not installed: {}", rule),
                ));
            }
        }
        Ok(())
    }

    async fn call(&self, call: &MethodCall) -> BluebusResult<()> {
        self.record(BusCall::Method(call.clone()))
    }

    async fn managed_objects(&self, service: &str) -> BluebusResult<ManagedObjects> {
        self.record(BusCall::ManagedObjects(service.to_string()))?;
        Ok(self.state().objects.clone())
    }

    async fn signals(&self) -> BluebusResult<SignalStream> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| BluebusError::transport("signals", "signal stream already taken"))?;
        let stream = stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|signal| (signal, receiver))
        });
        Ok(stream.boxed())
    }
}

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

/// Device interface properties as the daemon reports them
pub fn device_properties(
    address: &str,
    name: &str,
    uuids: &[&str],
    connected: bool,
) -> Properties {
    let mut props = Properties::new();
    props.insert("Address".into(), PropertyValue::from(address));
    props.insert("Name".into(), PropertyValue::from(name));
    props.insert("Alias".into(), PropertyValue::from(name));
    props.insert(
        "UUIDs".into(),
        PropertyValue::StrList(uuids.iter().map(|u| u.to_string()).collect()),
    );
    props.insert("Connected".into(), PropertyValue::Bool(connected));
    props.insert("Paired".into(), PropertyValue::Bool(false));
    props.insert("RSSI".into(), PropertyValue::Int16(-60));
    props
}

/// Adapter interface properties
pub fn adapter_properties(address: &str, name: &str) -> Properties {
    let mut props = Properties::new();
    props.insert("Address".into(), PropertyValue::from(address));
    props.insert("Name".into(), PropertyValue::from(name));
    props.insert("Powered".into(), PropertyValue::Bool(true));
    props.insert("Discovering".into(), PropertyValue::Bool(false));
    props
}

/// Object manager announcement of `interface` appearing at `path`
pub fn interfaces_added(
    path: impl Into<ObjectPath>,
    interface: &str,
    properties: Properties,
) -> Signal {
    let mut added = Properties::new();
    added.insert(interface.to_string(), PropertyValue::Dict(properties));
    Signal::new(
        OBJECT_MANAGER_PATH,
        OBJECT_MANAGER_INTERFACE,
        INTERFACES_ADDED,
        vec![
            PropertyValue::ObjectPath(path.into().as_str().to_string()),
            PropertyValue::Dict(added),
        ],
    )
}

/// Property change notification for `interface` on the object at `path`
pub fn properties_changed(
    path: impl Into<ObjectPath>,
    interface: &str,
    changed: Properties,
) -> Signal {
    Signal::new(
        path,
        PROPERTIES_INTERFACE,
        PROPERTIES_CHANGED,
        vec![
            PropertyValue::from(interface),
            PropertyValue::Dict(changed),
            PropertyValue::StrList(Vec::new()),
        ],
    )
}
