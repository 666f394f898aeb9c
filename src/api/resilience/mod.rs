//! Retry policy and structured call logging
//!
//! Every logical call runs its exchanges through a [`RetryPolicy`] and is
//! traced by an [`ApiLogger`] under one correlation id.

pub mod config;
pub mod logging;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig, ResilienceConfigBuilder};
pub use logging::{ApiLogger, OperationContext, OperationMetrics};
pub use retry::{RetryConfig, RetryPolicy};
