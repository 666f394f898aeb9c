use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::constants;
use crate::api::error::QuickbooksError;
use crate::api::resilience::{MonitoringConfig, ResilienceConfig, RetryConfig};

pub const ENV_CONSUMER_KEY: &str = "QUICKBOOKS_CONSUMER_KEY";
pub const ENV_CONSUMER_SECRET: &str = "QUICKBOOKS_CONSUMER_SECRET";
pub const ENV_TIMEOUT_SECS: &str = "QUICKBOOKS_TIMEOUT_SECS";

/// Base URLs per backend and protocol generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub online_v3: String,
    pub desktop_v3: String,
    pub online_xml: String,
    pub desktop_xml: String,
    pub appcenter: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            online_v3: constants::V3_URL_BASE.to_string(),
            desktop_v3: constants::V3_URL_BASE.to_string(),
            online_xml: constants::ONLINE_XML_URL_BASE.to_string(),
            desktop_xml: constants::DESKTOP_XML_URL_BASE.to_string(),
            appcenter: constants::APPCENTER_URL_BASE.to_string(),
        }
    }
}

impl Endpoints {
    /// Point every endpoint at one base, e.g. a local stub server
    pub fn all(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            online_v3: format!("{}/v3", base_url),
            desktop_v3: format!("{}/v3", base_url),
            online_xml: format!("{}/resource", base_url),
            desktop_xml: format!("{}/sb", base_url),
            appcenter: format!("{}/appcenter", base_url),
        }
    }
}

/// Application-level client settings. The consumer key/secret identify the
/// application; per-tenant tokens live in a [`Credential`](crate::auth::Credential).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub endpoints: Endpoints,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: String,
    pub monitoring: MonitoringConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            endpoints: Endpoints::default(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
            retry_delay_ms: 0,
            user_agent: format!("quickbooks-client/{}", env!("CARGO_PKG_VERSION")),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("endpoints", &self.endpoints)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("user_agent", &self.user_agent)
            .field("monitoring", &self.monitoring)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            ..Self::default()
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("qb-cli")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".qb-cli")
        };

        Ok(config_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);

        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load the default file if present, then apply environment overrides
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            info!("Config file {:?} doesn't exist, using defaults", path);
            Self::default()
        };

        dotenvy::dotenv().ok();
        Ok(config.with_overrides(|name| std::env::var(name).ok()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid client configuration")
    }

    /// Defaults plus whatever the environment (and `.env`) provides
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::default().with_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply `QUICKBOOKS_*` overrides from `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(ENV_CONSUMER_KEY) {
            self.consumer_key = key;
        }
        if let Some(secret) = lookup(ENV_CONSUMER_SECRET) {
            self.consumer_secret = secret;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS).and_then(|value| value.trim().parse().ok()) {
            self.request_timeout_secs = timeout;
        }
        self
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {:?}", path))?;

        info!("Config saved to {:?}", path);
        Ok(())
    }

    /// The application identity is required before any client is built
    pub fn validate(&self) -> Result<(), QuickbooksError> {
        if self.consumer_key.trim().is_empty() {
            return Err(QuickbooksError::Configuration(format!(
                "consumer key is not set (config file or {})",
                ENV_CONSUMER_KEY
            )));
        }
        if self.consumer_secret.trim().is_empty() {
            return Err(QuickbooksError::Configuration(format!(
                "consumer secret is not set (config file or {})",
                ENV_CONSUMER_SECRET
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn resilience(&self) -> ResilienceConfig {
        let retry = if self.retry_delay_ms == 0 {
            RetryConfig::immediate(self.max_retries)
        } else {
            RetryConfig::backoff(self.max_retries, Duration::from_millis(self.retry_delay_ms))
        };

        ResilienceConfig {
            retry,
            monitoring: self.monitoring.clone(),
        }
    }
}
