//! Client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ProviderError, Result};

/// Chain id reserved for locally-run development networks.
pub const DEVELOPMENT_CHAIN_ID: u64 = 8996;

/// Provider client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Transport timeout in seconds (default: none, the caller's token governs)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Chain ids that select the legacy signing fallback
    #[serde(default = "default_legacy_chains")]
    pub legacy_signing_chain_ids: Vec<u64>,

    /// Job status polling cadence
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_user_agent() -> String {
    format!("provider-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_legacy_chains() -> Vec<u64> {
    vec![DEVELOPMENT_CHAIN_ID]
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: None,
            user_agent: default_user_agent(),
            legacy_signing_chain_ids: default_legacy_chains(),
            poll: PollConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// Parse configuration from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ProviderError::Config(e.to_string()))
    }

    /// Transport timeout, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Capped exponential backoff for status polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// First wait between polls in milliseconds
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    /// Upper bound on the wait between polls in milliseconds
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,

    /// Growth factor applied after every poll
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_initial_interval() -> u64 { 1_000 }
fn default_max_interval() -> u64 { 30_000 }
fn default_multiplier() -> u32 { 2 }

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
            multiplier: default_multiplier(),
        }
    }
}

impl PollConfig {
    /// Wait before poll number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(attempt);
        let ms = self
            .initial_interval_ms
            .saturating_mul(factor)
            .min(self.max_interval_ms);
        Duration::from_millis(ms)
    }
}
