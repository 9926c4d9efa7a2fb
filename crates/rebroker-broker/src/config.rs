//! Engine settings.

use std::time::Duration;

/// How long the access decision may wait, per provision.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Upper bound handed to the access checker in the background phase.
    pub max_wait: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}
