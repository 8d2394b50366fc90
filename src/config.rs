//! Bus client configuration
//!
//! One config struct serves both sides of the transport: the publisher
//! reads the timeout/retry knobs, the subscriber reads the inflight bound
//! and queue-group override. Field types validate themselves on
//! deserialization; [`BusConfig::validate`] covers the plain fields.

use serde::{Deserialize, Serialize};

use crate::domain_types::{MaxInflight, MaxRetries, TimeoutMs};
use crate::error::ConfigError;

/// Default bus address
pub const DEFAULT_BUS_URL: &str = "nats://127.0.0.1:4222";

/// Reconnect delay between attempts (unbounded attempts)
pub const RECONNECT_DELAY_MS: u64 = 500;

/// Liveness ping interval
pub const PING_INTERVAL_SECS: u64 = 10;

/// Configuration recognised by the publisher and subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bus address, e.g. `nats://127.0.0.1:4222`
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-attempt reply timeout
    #[serde(default)]
    pub timeout_ms: TimeoutMs,

    /// Additional attempts after the first
    #[serde(default)]
    pub max_retries: MaxRetries,

    /// Subscriber concurrent-request bound
    #[serde(default)]
    pub max_inflight: MaxInflight,

    /// Worker group override; `None` uses `ditq.<expert_id>`
    #[serde(default)]
    pub queue_group: Option<String>,
}

fn default_url() -> String {
    DEFAULT_BUS_URL.to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_ms: TimeoutMs::default(),
            max_retries: MaxRetries::default(),
            max_inflight: MaxInflight::default(),
            queue_group: None,
        }
    }
}

impl BusConfig {
    /// Creates a config pointing at the given bus address
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Overrides the per-attempt timeout
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: TimeoutMs) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Overrides the retry budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: MaxRetries) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Overrides the subscriber inflight bound
    #[must_use]
    pub fn with_max_inflight(mut self, max_inflight: MaxInflight) -> Self {
        self.max_inflight = max_inflight;
        self
    }

    /// Overrides the worker group name
    #[must_use]
    pub fn with_queue_group(mut self, queue_group: impl Into<String>) -> Self {
        self.queue_group = Some(queue_group.into());
        self
    }

    /// Validates the plain (non-newtype) fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "url".to_string(),
                reason: "bus address must not be empty".to_string(),
            });
        }
        if let Some(group) = &self.queue_group {
            if group.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: "queue_group".to_string(),
                    reason: "override must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_knobs() {
        let config = BusConfig::default();
        assert_eq!(config.url, DEFAULT_BUS_URL);
        assert_eq!(config.timeout_ms.as_u64(), 3000);
        assert_eq!(config.max_retries.as_u32(), 2);
        assert_eq!(config.max_inflight.as_usize(), 64);
        assert!(config.queue_group.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_url_fails_validation() {
        let config = BusConfig::new("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_queue_group_override_fails_validation() {
        let config = BusConfig::default().with_queue_group("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults_for_missing_fields() {
        let config: BusConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.url, DEFAULT_BUS_URL);
        assert_eq!(config.timeout_ms.as_u64(), 3000);
    }

    #[test]
    fn out_of_range_timeout_is_rejected_on_deserialize() {
        let result: Result<BusConfig, _> =
            serde_json::from_str(r#"{"timeout_ms": 0}"#);
        assert!(result.is_err());
    }
}
