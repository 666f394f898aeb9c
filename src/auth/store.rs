use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::credentials::{Credential, CredentialStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    credentials: HashMap<String, Credential>,
}

/// Credential store persisted as a TOML file, one table per owner
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store in the platform config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_path()?))
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

        Ok(config_dir.join("credentials.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add or replace the credential for `owner`
    pub async fn save(&self, owner: &str, credential: Credential) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file()?;
        info!("Saving credential for owner: {}", owner);
        file.credentials.insert(owner.to_string(), credential);
        self.write_file(&file)
    }

    pub async fn owners(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let mut owners: Vec<String> = self.read_file()?.credentials.into_keys().collect();
        owners.sort();
        Ok(owners)
    }

    fn read_file(&self) -> Result<CredentialFile> {
        if !self.path.exists() {
            debug!("Credential file {:?} doesn't exist yet", self.path);
            return Ok(CredentialFile::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credential file: {:?}", self.path))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse credential file: {:?}", self.path))
    }

    fn write_file(&self, file: &CredentialFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        let content = toml::to_string_pretty(file).context("Failed to serialize credentials to TOML")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write credential file: {:?}", self.path))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn lookup(&self, owner: &str) -> Result<Option<Credential>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_file()?.credentials.get(owner).cloned())
    }

    async fn invalidate(&self, owner: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read_file()?;

        if file.credentials.remove(owner).is_none() {
            warn!("No stored credential for owner {} to invalidate", owner);
            return Ok(());
        }

        info!("Removed credential for owner: {}", owner);
        self.write_file(&file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{BackendKind, ProtocolVersion};

    fn credential(tenant: &str) -> Credential {
        Credential::new("key", "secret", tenant, BackendKind::Desktop, ProtocolVersion::WrappedXml)
    }

    #[tokio::test]
    async fn test_save_lookup_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("nested").join("credentials.toml"));

        assert!(store.lookup("alice").await.unwrap().is_none());

        store.save("alice", credential("111")).await.unwrap();
        store.save("bob", credential("222")).await.unwrap();
        assert_eq!(store.owners().await.unwrap(), vec!["alice", "bob"]);

        let found = store.lookup("alice").await.unwrap().unwrap();
        assert_eq!(found.tenant_id, "111");
        assert_eq!(found.backend, BackendKind::Desktop);

        store.invalidate("alice").await.unwrap();
        assert!(store.lookup("alice").await.unwrap().is_none());
        assert!(store.lookup("bob").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalidate_unknown_owner_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials.toml"));
        store.invalidate("nobody").await.unwrap();
        assert!(!store.path().exists());
    }
}
