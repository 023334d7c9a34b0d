//! Credential Store
//!
//! Durable persistence of the bearer token and the cached user profile across
//! restarts. The two values live under separate keys of a string key-value
//! medium, but the store only ever exposes them as a pair:
//!
//! - [`CredentialStore::save`] writes both, and rolls back to the prior pair if
//!   the medium fails part-way.
//! - [`CredentialStore::load`] returns both or neither; a missing half or an
//!   unparseable profile reads as "no credentials".
//! - [`CredentialStore::clear`] removes both and is a no-op on an empty store.
//!
//! Failures are logged and swallowed: persistence problems never abort a
//! login or logout.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gavel::client::store::{CredentialStore, FileStore};
//! use gavel::client::types::UserProfile;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let medium = FileStore::open("/tmp/gavel/credentials.json").await?;
//! let store = CredentialStore::new(Arc::new(medium));
//!
//! store.save("token", &UserProfile::new(serde_json::json!({"fname": "A"}))).await;
//! let restored = store.load().await;
//! store.clear().await;
//! # Ok(())
//! # }
//! ```

use crate::client::types::UserProfile;
use crate::shared::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "auth_token";

/// Key holding the JSON-serialized profile.
pub const USER_DATA_KEY: &str = "user_data";

/// String key-value medium that survives process restarts.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// In-process medium, used by tests and as a fallback when no data dir exists.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// JSON document on disk holding every key.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash mid-write leaves the previous document intact.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the document at `path`.
    ///
    /// A corrupt document is treated as empty and will be overwritten by the
    /// next write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable credential file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        if keys.iter().all(|key| !entries.contains_key(*key)) {
            return Ok(());
        }
        let mut next = entries.clone();
        for key in keys {
            next.remove(*key);
        }
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}

/// Token and profile as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub token: String,
    pub profile: UserProfile,
}

/// Pairwise persistence of the session credentials.
#[derive(Clone)]
pub struct CredentialStore {
    medium: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    pub fn new(medium: Arc<dyn KeyValueStore>) -> Self {
        Self { medium }
    }

    /// Persist token and profile together. Returns whether the write landed.
    pub async fn save(&self, token: &str, profile: &UserProfile) -> bool {
        let profile_json = match serde_json::to_string(profile) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Error serializing user data: {}", e);
                return false;
            }
        };

        let prior_token = self.medium.get(TOKEN_KEY).await.ok().flatten();
        let prior_profile = self.medium.get(USER_DATA_KEY).await.ok().flatten();

        let result = match self.medium.set(TOKEN_KEY, token).await {
            Ok(()) => self.medium.set(USER_DATA_KEY, &profile_json).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::debug!("Credentials saved");
                true
            }
            Err(e) => {
                tracing::error!("Error saving credentials: {}", e);
                self.restore(prior_token, prior_profile).await;
                false
            }
        }
    }

    /// Read the persisted pair. Anything short of a complete, parseable pair is `None`.
    pub async fn load(&self) -> Option<Credentials> {
        let token = match self.medium.get(TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Error retrieving token: {}", e);
                return None;
            }
        };
        let profile = match self.medium.get(USER_DATA_KEY).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::error!("Error retrieving user data: {}", e);
                return None;
            }
        };

        match (token, profile) {
            (Some(token), Some(raw)) if !token.is_empty() => {
                match serde_json::from_str::<UserProfile>(&raw) {
                    Ok(profile) if !profile.as_value().is_null() => {
                        Some(Credentials { token, profile })
                    }
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!("Stored user data is corrupt, ignoring: {}", e);
                        None
                    }
                }
            }
            (None, None) => None,
            _ => {
                tracing::warn!("Stored credentials are incomplete, ignoring");
                None
            }
        }
    }

    /// Remove both keys.
    pub async fn clear(&self) {
        match self.medium.remove(&[TOKEN_KEY, USER_DATA_KEY]).await {
            Ok(()) => tracing::debug!("Stored credentials cleared"),
            Err(e) => tracing::error!("Error clearing stored credentials: {}", e),
        }
    }

    async fn restore(&self, token: Option<String>, profile: Option<String>) {
        let outcome = match (token, profile) {
            (Some(token), Some(profile)) => match self.medium.set(TOKEN_KEY, &token).await {
                Ok(()) => self.medium.set(USER_DATA_KEY, &profile).await,
                Err(e) => Err(e),
            },
            _ => self.medium.remove(&[TOKEN_KEY, USER_DATA_KEY]).await,
        };
        if let Err(e) = outcome {
            tracing::error!("Error rolling back credentials: {}", e);
        }
    }
}
