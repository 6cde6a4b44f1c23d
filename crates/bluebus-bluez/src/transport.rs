//! `BusTransport` over the system D-Bus

use std::collections::BTreeMap;

use async_trait::async_trait;
use bluebus_core::protocol::OBJECT_MANAGER_PATH;
use bluebus_core::{
    BluebusError, BluebusResult, BusTransport, ManagedObjects, MethodCall, ObjectPath,
    PropertyValue, SignalStream,
};
use futures::stream::StreamExt;
use tracing::{debug, warn};
use zbus::fdo::{DBusProxy, ObjectManagerProxy};
use zbus::{Connection, MatchRule, MessageStream};

use crate::convert::{from_value, signal_from_message, to_dict};

/// D-Bus connection to the daemon plus the bus driver proxy used for match rules
pub struct BluezTransport {
    conn: Connection,
    driver: DBusProxy<'static>,
}

impl BluezTransport {
    /// Connect to the system bus
    pub async fn system() -> BluebusResult<Self> {
        let conn = Connection::system()
            .await
            .map_err(|e| BluebusError::transport("connect", e))?;
        Self::with_connection(conn).await
    }

    /// Wrap an existing connection
    pub async fn with_connection(conn: Connection) -> BluebusResult<Self> {
        let driver = DBusProxy::new(&conn)
            .await
            .map_err(|e| BluebusError::transport("connect", e))?;
        debug!("connected to the system bus as {:?}", conn.unique_name());
        Ok(Self { conn, driver })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn parse_rule(rule: &str) -> BluebusResult<MatchRule<'_>> {
    MatchRule::try_from(rule).map_err(|_| BluebusError::InvalidMatchRule {
        rule: rule.to_string(),
    })
}

#[async_trait]
impl BusTransport for BluezTransport {
    async fn add_match(&self, rule: &str) -> BluebusResult<()> {
        let parsed = parse_rule(rule)?;
        self.driver
            .add_match_rule(parsed)
            .await
            .map_err(|e| BluebusError::transport("AddMatch", e))
    }

    async fn remove_match(&self, rule: &str) -> BluebusResult<()> {
        let parsed = parse_rule(rule)?;
        self.driver
            .remove_match_rule(parsed)
            .await
            .map_err(|e| BluebusError::transport("RemoveMatch", e))
    }

    async fn call(&self, call: &MethodCall) -> BluebusResult<()> {
        let destination = Some(call.destination.as_str());
        let path = call.path.as_str();
        let interface = Some(call.interface.as_str());
        let member = call.member.as_str();

        let reply = match call.args.as_slice() {
            [] => {
                self.conn
                    .call_method(destination, path, interface, member, &())
                    .await
            }
            [PropertyValue::Dict(map)] => {
                let body = to_dict(map)?;
                self.conn
                    .call_method(destination, path, interface, member, &body)
                    .await
            }
            [PropertyValue::Str(arg)] => {
                self.conn
                    .call_method(destination, path, interface, member, &arg.as_str())
                    .await
            }
            _ => {
                return Err(BluebusError::transport(
                    call.to_string(),
                    "unsupported argument list",
                ));
            }
        };
        reply
            .map(|_| ())
            .map_err(|e| BluebusError::transport(call.to_string(), e))
    }

    async fn managed_objects(&self, service: &str) -> BluebusResult<ManagedObjects> {
        let manager = ObjectManagerProxy::builder(&self.conn)
            .destination(service.to_string())
            .and_then(|builder| builder.path(OBJECT_MANAGER_PATH))
            .map_err(|e| BluebusError::transport("GetManagedObjects", e))?
            .build()
            .await
            .map_err(|e| BluebusError::transport("GetManagedObjects", e))?;
        let objects = manager
            .get_managed_objects()
            .await
            .map_err(|e| BluebusError::transport("GetManagedObjects", e))?;

        Ok(objects
            .into_iter()
            .map(|(path, interfaces)| {
                let interfaces = interfaces
                    .into_iter()
                    .map(|(interface, properties)| {
                        let properties = properties
                            .iter()
                            .map(|(name, value)| (name.clone(), from_value(value)))
                            .collect();
                        (interface.as_str().to_string(), properties)
                    })
                    .collect::<BTreeMap<_, _>>();
                (ObjectPath::new(path.as_str()), interfaces)
            })
            .collect())
    }

    async fn signals(&self) -> BluebusResult<SignalStream> {
        let stream = MessageStream::from(&self.conn).filter_map(|message| async move {
            match message {
                Ok(message) => signal_from_message(&message),
                Err(e) => {
                    warn!("error on the bus message stream: {}", e);
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}
