//! broker.toml configuration parser.
//!
//! ```toml
//! [broker]
//! max_wait_secs = 60
//! poll_interval_ms = 500
//!
//! [[remote_environments]]
//! name = "ec-prod"
//! access_label = "ec-prod"
//! source = { environment = "prod", type = "commerce", namespace = "com.example" }
//!
//! [[remote_environments.services]]
//! id = "orders-events"
//! display_name = "Orders events"
//! event_entry = {}
//!
//! [[mappings]]
//! environment = "ec-prod"
//! namespace = "production"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use rebroker_access::checker::DEFAULT_POLL_INTERVAL;
use rebroker_broker::BrokerConfig;
use rebroker_catalog::RemoteEnvironment;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerFileConfig {
    #[serde(default)]
    pub broker: EngineConfig,
    #[serde(default)]
    pub remote_environments: Vec<RemoteEnvironment>,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound of the access decision wait.
    pub max_wait_secs: Option<u64>,
    /// Pause between EnvironmentMapping lookups.
    pub poll_interval_ms: Option<u64>,
}

/// Enables a remote environment in a namespace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingConfig {
    pub environment: String,
    pub namespace: String,
}

impl BrokerFileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BrokerFileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Read `path` if given and present; defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) if path.exists() => {
                let config = Self::from_file(path)?;
                info!(
                    ?path,
                    remote_environments = config.remote_environments.len(),
                    mappings = config.mappings.len(),
                    "configuration loaded"
                );
                Ok(config)
            }
            Some(path) => {
                info!(?path, "configuration file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn engine(&self) -> BrokerConfig {
        let mut config = BrokerConfig::default();
        if let Some(secs) = self.broker.max_wait_secs {
            config.max_wait = Duration::from_secs(secs);
        }
        config
    }

    pub fn poll_interval(&self) -> Duration {
        self.broker
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }
}
