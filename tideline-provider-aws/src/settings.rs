//! Provider settings
//!
//! Read from the `provider` section of a document; every field has a default
//! so the section may be omitted entirely.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tideline_core::poller::WaitConfig;

use crate::db_security_group::DEFAULT_AUTHORIZE_CONCURRENCY;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    pub region: String,
    /// Seconds between two convergence samples
    pub poll_interval_secs: u64,
    /// Seconds allowed for ingress authorizations to settle
    pub convergence_timeout_secs: u64,
    /// Authorize calls in flight at once
    pub authorize_concurrency: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            poll_interval_secs: WaitConfig::DEFAULT_INTERVAL.as_secs(),
            convergence_timeout_secs: WaitConfig::DEFAULT_TIMEOUT.as_secs(),
            authorize_concurrency: DEFAULT_AUTHORIZE_CONCURRENCY,
        }
    }
}

impl ProviderSettings {
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.convergence_timeout_secs),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.region.is_empty() {
            return Err("provider.region must not be empty".to_string());
        }
        if self.poll_interval_secs == 0 {
            return Err("provider.poll_interval_secs must be at least 1".to_string());
        }
        if self.authorize_concurrency == 0 {
            return Err("provider.authorize_concurrency must be at least 1".to_string());
        }
        Ok(())
    }
}
