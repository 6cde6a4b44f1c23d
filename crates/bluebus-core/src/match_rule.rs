//! Broadcast match rules and their install/remove pairing

use std::fmt;

use tracing::warn;

use crate::connection::BusConnection;
use crate::error::BluebusResult;
use crate::object::ObjectPath;
use crate::protocol::{
    INTERFACES_ADDED, OBJECT_MANAGER_INTERFACE, PROPERTIES_CHANGED, PROPERTIES_INTERFACE,
};

// ----------------------------------------------------------------------------
// Match Rule
// ----------------------------------------------------------------------------

/// Filter scoping which broadcast signals the bus routes to this process.
///
/// A rule has no identity beyond its rendered string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchRule {
    interface: String,
    member: String,
    path: Option<ObjectPath>,
}

impl MatchRule {
    pub fn signal(interface: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            member: member.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<ObjectPath>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// New-object announcements from the object manager
    pub fn interfaces_added() -> Self {
        Self::signal(OBJECT_MANAGER_INTERFACE, INTERFACES_ADDED)
    }

    /// Property changes of the object at `path`
    pub fn properties_changed(path: impl Into<ObjectPath>) -> Self {
        Self::signal(PROPERTIES_INTERFACE, PROPERTIES_CHANGED).with_path(path)
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn path(&self) -> Option<&ObjectPath> {
        self.path.as_ref()
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type='signal',interface='{}',member='{}'",
            self.interface, self.member
        )?;
        if let Some(path) = &self.path {
            write!(f, ",path='{}'", path)?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Match Guard
// ----------------------------------------------------------------------------

/// An installed match rule that is removed exactly once.
///
/// Call [`MatchGuard::remove`] on every normal exit path. If the guard is
/// dropped while still armed (the owning future was cancelled), removal is
/// spawned onto the current runtime and its outcome logged.
pub struct MatchGuard {
    conn: BusConnection,
    rule: MatchRule,
    armed: bool,
}

impl MatchGuard {
    pub async fn install(conn: &BusConnection, rule: MatchRule) -> BluebusResult<Self> {
        conn.add_match(&rule).await?;
        Ok(Self {
            conn: conn.clone(),
            rule,
            armed: true,
        })
    }

    pub fn rule(&self) -> &MatchRule {
        &self.rule
    }

    /// Remove the rule; a failure is logged and returned
    pub async fn remove(mut self) -> BluebusResult<()> {
        self.armed = false;
        let result = self.conn.remove_match(&self.rule).await;
        if let Err(e) = &result {
            warn!("failed to remove match rule {}: {}", self.rule, e);
        }
        result
    }
}

impl Drop for MatchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let conn = self.conn.clone();
        let rule = self.rule.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = conn.remove_match(&rule).await {
                        warn!("failed to remove match rule {}: {}", rule, e);
                    }
                });
            }
            Err(_) => warn!("no runtime left to remove match rule {}", rule),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBus;

    #[test]
    fn test_interfaces_added_rule() {
        assert_eq!(
            MatchRule::interfaces_added().to_string(),
            "type='signal',interface='org.freedesktop.DBus.ObjectManager',member='InterfacesAdded'"
        );
    }

    #[test]
    fn test_properties_changed_rule_is_path_scoped() {
        let rule = MatchRule::properties_changed("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF");
        assert_eq!(
            rule.to_string(),
            "type='signal',interface='org.freedesktop.DBus.Properties',member='PropertiesChanged',path='/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF'"
        );
        assert_eq!(rule.member(), "PropertiesChanged");
    }

    #[tokio::test]
    async fn test_guard_removes_once() {
        let bus = MockBus::new();
        let conn = BusConnection::open(bus.clone()).await.unwrap();

        let guard = MatchGuard::install(&conn, MatchRule::interfaces_added())
            .await
            .unwrap();
        assert_eq!(bus.installed_rules().len(), 1);
        guard.remove().await.unwrap();
        assert!(bus.installed_rules().is_empty());
        assert_eq!(bus.calls_named("RemoveMatch"), 1);
    }

    #[tokio::test]
    async fn test_dropped_guard_removes_in_background() {
        let bus = MockBus::new();
        let conn = BusConnection::open(bus.clone()).await.unwrap();

        let guard = MatchGuard::install(&conn, MatchRule::interfaces_added())
            .await
            .unwrap();
        drop(guard);
        bus.wait_for_call("RemoveMatch").await;
        assert!(bus.installed_rules().is_empty());
    }
}
