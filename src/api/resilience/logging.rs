//! Structured logging with correlation tracking
//!
//! Every logical call gets an [`OperationContext`]; each event is emitted as
//! a JSON line through the `log` facade so any installed logger can pick it
//! up.

use log::{debug, error, info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::config::{LogLevel, MonitoringConfig};

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_HEADER_MARKERS: &[&str] = &["authorization", "token", "secret", "key"];

#[derive(Debug, Clone, Default)]
pub struct ApiLogger {
    config: MonitoringConfig,
}

/// Context for a single logical call
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub correlation_id: String,
    pub operation_type: String,
    pub entity: String,
    pub start_time: Instant,
}

/// Outcome summary logged when a call completes
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub duration: Duration,
    pub exchanges: u32,
    pub pages: u32,
    pub success: bool,
    pub error_message: Option<String>,
}

impl ApiLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    pub fn start_operation(&self, operation_type: &str, entity: &str) -> OperationContext {
        let correlation_id = if self.config.correlation_ids {
            Uuid::new_v4().to_string()
        } else {
            String::new()
        };

        let context = OperationContext {
            correlation_id,
            operation_type: operation_type.to_string(),
            entity: entity.to_string(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Info) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "operation_type": context.operation_type,
                "entity": context.entity,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            info!("QuickBooks Operation Started: {}", log_data);
        }

        context
    }

    pub fn log_request(&self, context: &OperationContext, method: &str, url: &str, headers: &[(String, String)]) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let headers: HashMap<String, String> = headers.iter().cloned().collect();
        let log_data = json!({
            "event": "http_request",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "entity": context.entity,
            "method": method,
            "url": url,
            "headers": sanitize_headers(&headers),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("HTTP Request: {}", log_data);
    }

    pub fn log_response(&self, context: &OperationContext, status_code: u16, headers: &HashMap<String, String>, duration: Duration) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "http_response",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "entity": context.entity,
            "status_code": status_code,
            "duration_ms": duration.as_millis(),
            "headers": sanitize_headers(headers),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if status_code >= 400 {
            warn!("HTTP Response (Error): {}", log_data);
        } else {
            debug!("HTTP Response: {}", log_data);
        }
    }

    pub fn log_retry(&self, context: &OperationContext, attempt: u32, error: &str, delay: Duration) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "retry_attempt",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "entity": context.entity,
            "attempt": attempt,
            "error": error,
            "delay_ms": delay.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Retry Attempt: {}", log_data);
    }

    pub fn log_page(&self, context: &OperationContext, page_number: usize, page_count: usize, total_seen: usize) {
        if !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "page_fetched",
            "correlation_id": context.correlation_id,
            "entity": context.entity,
            "page_number": page_number,
            "page_count": page_count,
            "total_seen": total_seen,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("Page Fetched: {}", log_data);
    }

    pub fn log_invalidation(&self, context: &OperationContext, owner: &str, reason: &str) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "credential_invalidated",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "owner": owner,
            "reason": reason,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("Credential Invalidated: {}", log_data);
    }

    pub fn complete_operation(&self, context: &OperationContext, metrics: &OperationMetrics) {
        let level = if metrics.success { LogLevel::Info } else { LogLevel::Error };
        if !self.should_log(level) {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "operation_type": context.operation_type,
            "entity": context.entity,
            "duration_ms": metrics.duration.as_millis(),
            "exchanges": metrics.exchanges,
            "pages": metrics.pages,
            "success": metrics.success,
            "error_message": metrics.error_message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        if metrics.success {
            info!("QuickBooks Operation Completed: {}", log_data);
        } else {
            error!("QuickBooks Operation Failed: {}", log_data);
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        self.config.log_level.allows(level)
    }
}

/// Replace values of credential-bearing headers
pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(key, value)| {
            let key_lower = key.to_lowercase();
            if SENSITIVE_HEADER_MARKERS.iter().any(|marker| key_lower.contains(marker)) {
                (key.clone(), REDACTED.to_string())
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

impl OperationContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn create_metrics(&self, exchanges: u32, pages: u32, error_message: Option<String>) -> OperationMetrics {
        OperationMetrics {
            duration: self.elapsed(),
            exchanges,
            pages,
            success: error_message.is_none(),
            error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger(level: LogLevel) -> ApiLogger {
        ApiLogger::new(MonitoringConfig {
            correlation_ids: true,
            request_logging: true,
            log_level: level,
        })
    }

    #[test]
    fn test_operation_context_creation() {
        let context = logger(LogLevel::Debug).start_operation("read", "Customer");

        assert_eq!(context.operation_type, "read");
        assert_eq!(context.entity, "Customer");
        assert_eq!(context.correlation_id.len(), 36);
    }

    #[test]
    fn test_correlation_ids_can_be_disabled() {
        let logger = ApiLogger::new(MonitoringConfig {
            correlation_ids: false,
            ..MonitoringConfig::default()
        });
        assert!(logger.start_operation("get", "Item").correlation_id.is_empty());
    }

    #[test]
    fn test_metrics_success_follows_error() {
        let context = logger(LogLevel::Info).start_operation("create", "Invoice");
        assert!(context.create_metrics(1, 0, None).success);

        let failed = context.create_metrics(4, 0, Some("busy".to_string()));
        assert!(!failed.success);
        assert_eq!(failed.exchanges, 4);
    }

    #[test]
    fn test_header_sanitization() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "OAuth oauth_token=\"abc\"".to_string());
        headers.insert("Content-Type".to_string(), "text/xml".to_string());
        headers.insert("X-Consumer-Secret".to_string(), "s".to_string());

        let sanitized = sanitize_headers(&headers);

        assert_eq!(sanitized.get("Authorization"), Some(&REDACTED.to_string()));
        assert_eq!(sanitized.get("Content-Type"), Some(&"text/xml".to_string()));
        assert_eq!(sanitized.get("X-Consumer-Secret"), Some(&REDACTED.to_string()));
    }

    #[test]
    fn test_log_level_filtering() {
        let logger = logger(LogLevel::Warn);

        assert!(logger.should_log(LogLevel::Error));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(!logger.should_log(LogLevel::Info));
        assert!(!logger.should_log(LogLevel::Trace));
    }
}
