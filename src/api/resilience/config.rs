//! Resilience configuration
//!
//! Bundles the retry budget and the monitoring switches the client is built
//! with. Both halves come out of [`ClientConfig`](crate::config::ClientConfig).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::RetryConfig;

#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub monitoring: MonitoringConfig,
}

/// Monitoring and logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub correlation_ids: bool,
    pub request_logging: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

impl LogLevel {
    /// Whether a message at `level` passes a filter set to `self`
    pub fn allows(&self, level: LogLevel) -> bool {
        level <= *self
    }
}

impl ResilienceConfig {
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Single attempt, errors only
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig::immediate(0),
            monitoring: MonitoringConfig {
                correlation_ids: false,
                request_logging: false,
                log_level: LogLevel::Error,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn monitoring(mut self, monitoring: MonitoringConfig) -> Self {
        self.config.monitoring = monitoring;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}
