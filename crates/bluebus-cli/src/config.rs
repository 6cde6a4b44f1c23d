//! ble-connect configuration
//!
//! Settings are layered with figment, lowest priority first:
//! - built-in defaults
//! - `ble-connect.toml` in the working directory, or the `--config` file
//! - environment variables (`BLUEBUS_*`, e.g. `BLUEBUS_TIMEOUT_SECS`)
//! - command line flags

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use bluebus_core::protocol::BLUEZ_SERVICE;
use bluebus_core::BluebusConfig;

use crate::cli::Cli;
use crate::error::Result;

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "ble-connect.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "BLUEBUS_";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Bus name of the Bluetooth daemon
    pub service: String,

    /// Adapter name; the first adapter when unset
    pub adapter: Option<String>,

    /// Discovery timeout in seconds; 0 waits indefinitely
    pub timeout_secs: u64,

    /// Transport placed in the discovery filter
    pub transport: String,

    /// Enable verbose logging output
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: BLUEZ_SERVICE.to_string(),
            adapter: None,
            timeout_secs: 0,
            transport: "le".to_string(),
            verbose: false,
        }
    }
}

impl AppConfig {
    /// Load the full layered configuration for `cli`
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            // An explicit file must be readable; the default one is optional.
            Some(path) => {
                std::fs::metadata(path)?;
                path.as_path()
            }
            None => Path::new(DEFAULT_CONFIG_FILE),
        };
        let figment = Self::figment()
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX));
        Self::resolve(figment, cli)
    }

    /// Defaults only
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    /// Apply command line overrides on top of `figment` and extract
    pub fn resolve(mut figment: Figment, cli: &Cli) -> Result<Self> {
        if let Some(timeout) = cli.timeout {
            figment = figment.merge(("timeout_secs", timeout));
        }
        if let Some(adapter) = &cli.adapter {
            figment = figment.merge(("adapter", adapter));
        }
        if cli.verbose {
            figment = figment.merge(("verbose", true));
        }
        let config: AppConfig = figment.extract()?;
        config.engine_config().validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Engine settings derived from this configuration
    pub fn engine_config(&self) -> BluebusConfig {
        let mut config = BluebusConfig::new()
            .with_discovery_timeout(self.timeout())
            .with_discovery_transport(self.transport.clone());
        config.service = self.service.clone();
        if let Some(adapter) = &self.adapter {
            config = config.with_adapter(adapter.clone());
        }
        config
    }
}
