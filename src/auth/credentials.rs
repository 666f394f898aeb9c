use crate::api::error::{QuickbooksError, Result};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

/// Which physical service variant is being addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    /// Online multi-tenant service (`QBO`)
    Online,
    /// Desktop-gateway-proxied service (`QBD`)
    Desktop,
}

/// Wire-protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProtocolVersion {
    LegacyXml,
    WrappedXml,
    JsonV3,
}

impl BackendKind {
    pub fn as_tag(&self) -> &'static str {
        match self {
            BackendKind::Online => "QBO",
            BackendKind::Desktop => "QBD",
        }
    }
}

impl FromStr for BackendKind {
    type Err = QuickbooksError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "QBO" | "ONLINE" => Ok(BackendKind::Online),
            "QBD" | "DESKTOP" => Ok(BackendKind::Desktop),
            other => Err(QuickbooksError::Configuration(format!(
                "unrecognized backend kind '{}'",
                other
            ))),
        }
    }
}

impl ProtocolVersion {
    pub fn as_tag(&self) -> &'static str {
        match self {
            ProtocolVersion::LegacyXml => "legacy",
            ProtocolVersion::WrappedXml => "wrapped",
            ProtocolVersion::JsonV3 => "v3",
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = QuickbooksError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" | "legacy_xml" | "v1" => Ok(ProtocolVersion::LegacyXml),
            "wrapped" | "wrapped_xml" | "v2" => Ok(ProtocolVersion::WrappedXml),
            "v3" | "json" | "json_v3" => Ok(ProtocolVersion::JsonV3),
            other => Err(QuickbooksError::Configuration(format!(
                "unrecognized protocol version '{}'",
                other
            ))),
        }
    }
}

macro_rules! string_conversions {
    ($ty:ty) => {
        impl TryFrom<String> for $ty {
            type Error = QuickbooksError;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_tag().to_string()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_tag())
            }
        }
    };
}

string_conversions!(BackendKind);
string_conversions!(ProtocolVersion);

/// Per-tenant access credential. Immutable once issued; owned by the
/// credential store and borrowed by the client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_key: String,
    pub access_secret: String,
    pub tenant_id: String,
    pub backend: BackendKind,
    pub protocol: ProtocolVersion,
}

impl Credential {
    pub fn new(
        access_key: impl Into<String>,
        access_secret: impl Into<String>,
        tenant_id: impl Into<String>,
        backend: BackendKind,
        protocol: ProtocolVersion,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            access_secret: access_secret.into(),
            tenant_id: tenant_id.into(),
            backend,
            protocol,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &"[REDACTED]")
            .field("access_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("backend", &self.backend)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// External owner of credentials. The client only looks credentials up and
/// asks for invalidation after an authentication failure.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn lookup(&self, owner: &str) -> anyhow::Result<Option<Credential>>;

    async fn invalidate(&self, owner: &str) -> anyhow::Result<()>;
}

/// Thread-safe in-process credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner: impl Into<String>, credential: Credential) -> anyhow::Result<()> {
        let owner = owner.into();
        debug!("Storing credential for owner {}", owner);
        let mut credentials = self
            .credentials
            .write()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        credentials.insert(owner, credential);
        Ok(())
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.credentials
            .read()
            .map(|credentials| credentials.contains_key(owner))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup(&self, owner: &str) -> anyhow::Result<Option<Credential>> {
        let credentials = self
            .credentials
            .read()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        Ok(credentials.get(owner).cloned())
    }

    async fn invalidate(&self, owner: &str) -> anyhow::Result<()> {
        let mut credentials = self
            .credentials
            .write()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))?;
        if credentials.remove(owner).is_some() {
            info!("Invalidated credential for owner {}", owner);
        }
        Ok(())
    }
}
