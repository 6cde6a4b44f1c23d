//! Engine configuration

use std::time::Duration;

use crate::error::{BluebusError, BluebusResult};
use crate::protocol::BLUEZ_SERVICE;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration shared by the object cache, discovery and property watches
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BluebusConfig {
    /// Bus name of the remote device-management daemon
    pub service: String,
    /// Adapter to drive (e.g. `hci0`); the first adapter when unset
    pub adapter: Option<String>,
    /// Default discovery deadline; zero waits indefinitely
    pub discovery_timeout: Duration,
    /// Transport placed in the adapter discovery filter
    pub discovery_transport: String,
    /// Capacity of the signal tap used during discovery
    pub discovery_buffer: usize,
    /// Capacity of each property watch tap
    pub watch_buffer: usize,
}

impl Default for BluebusConfig {
    fn default() -> Self {
        Self {
            service: BLUEZ_SERVICE.to_string(),
            adapter: None,
            discovery_timeout: Duration::ZERO,
            discovery_transport: "le".to_string(),
            discovery_buffer: 10,
            watch_buffer: 10,
        }
    }
}

impl BluebusConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the adapter name
    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Set the default discovery timeout
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the discovery filter transport
    pub fn with_discovery_transport(mut self, transport: impl Into<String>) -> Self {
        self.discovery_transport = transport.into();
        self
    }

    /// Set the discovery tap capacity
    pub fn with_discovery_buffer(mut self, capacity: usize) -> Self {
        self.discovery_buffer = capacity;
        self
    }

    /// Set the property watch tap capacity
    pub fn with_watch_buffer(mut self, capacity: usize) -> Self {
        self.watch_buffer = capacity;
        self
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> BluebusResult<()> {
        if self.service.is_empty() {
            return Err(BluebusError::Configuration {
                reason: "service name must not be empty".to_string(),
            });
        }
        if self.discovery_buffer == 0 || self.watch_buffer == 0 {
            return Err(BluebusError::Configuration {
                reason: "signal buffers must hold at least one signal".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BluebusConfig::default();
        assert_eq!(config.service, "org.bluez");
        assert!(config.discovery_timeout.is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = BluebusConfig::new().with_watch_buffer(0);
        assert!(matches!(
            config.validate(),
            Err(BluebusError::Configuration { .. })
        ));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: BluebusConfig = serde_json::from_str(r#"{"adapter":"hci1"}"#).unwrap();
        assert_eq!(config.adapter.as_deref(), Some("hci1"));
        assert_eq!(config.watch_buffer, 10);
    }
}
