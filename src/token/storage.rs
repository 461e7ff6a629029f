//! Token Storage
//!
//! Key/value storage of credential sets with per-entry TTL. The backend
//! guarantees atomic get/set per key only; concurrent writes to the same key
//! are last-write-wins, and no cross-key transactions exist.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{ApiError, StorageError};
use crate::types::ApiCredentials;

/// Token storage interface.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Store credentials under a key, with an optional TTL.
    async fn store(
        &self,
        key: &str,
        credentials: ApiCredentials,
        ttl: Option<std::time::Duration>,
    ) -> Result<(), ApiError>;

    /// Retrieve credentials for a key. Expired entries read as absent.
    async fn retrieve(&self, key: &str) -> Result<Option<ApiCredentials>, ApiError>;

    /// Delete the entry for a key. Returns whether an entry existed.
    async fn delete(&self, key: &str) -> Result<bool, ApiError>;

    /// Clear all entries.
    async fn clear(&self) -> Result<(), ApiError>;
}

struct Entry {
    credentials: ApiCredentials,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }
}

/// In-memory token storage implementation.
pub struct InMemoryTokenStorage {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryTokenStorage {
    /// Create new in-memory token storage.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStorage for InMemoryTokenStorage {
    async fn store(
        &self,
        key: &str,
        credentials: ApiCredentials,
        ttl: Option<std::time::Duration>,
    ) -> Result<(), ApiError> {
        let expires_at = ttl.map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64));
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                credentials,
                expires_at,
            },
        );
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<ApiCredentials>, ApiError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.credentials.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), ApiError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct FileEntry {
    credentials: ApiCredentials,
    expires_at: Option<DateTime<Utc>>,
}

impl FileEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }
}

/// Filesystem-backed token storage, one JSON file per key.
///
/// Keys are restricted to the `token.*` namespace this crate generates, so
/// they are safe to use as file names directly.
pub struct FileTokenStorage {
    directory: std::path::PathBuf,
}

impl FileTokenStorage {
    /// Create storage rooted at a directory, creating it if needed.
    pub fn new(directory: impl Into<std::path::PathBuf>) -> Result<Self, ApiError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| {
            ApiError::Storage(StorageError::WriteFailed {
                message: format!("cannot create cache directory: {}", e),
            })
        })?;
        Ok(Self { directory })
    }

    fn path_for(&self, key: &str) -> std::path::PathBuf {
        self.directory.join(format!("{}.json", key))
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn store(
        &self,
        key: &str,
        credentials: ApiCredentials,
        ttl: Option<std::time::Duration>,
    ) -> Result<(), ApiError> {
        let entry = FileEntry {
            credentials,
            expires_at: ttl.map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64)),
        };
        let json = serde_json::to_string(&entry).map_err(|e| {
            ApiError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;
        tokio::fs::write(self.path_for(key), json).await.map_err(|e| {
            ApiError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })
    }

    async fn retrieve(&self, key: &str) -> Result<Option<ApiCredentials>, ApiError> {
        let path = self.path_for(key);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ApiError::Storage(StorageError::ReadFailed {
                    message: e.to_string(),
                }))
            }
        };

        // A corrupt entry reads as a cache miss rather than a hard error.
        let entry: FileEntry = match serde_json::from_str(&json) {
            Ok(entry) => entry,
            Err(_) => return Ok(None),
        };
        Ok((!entry.is_expired()).then_some(entry.credentials))
    }

    async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ApiError::Storage(StorageError::DeleteFailed {
                message: e.to_string(),
            })),
        }
    }

    async fn clear(&self) -> Result<(), ApiError> {
        let mut dir = tokio::fs::read_dir(&self.directory).await.map_err(|e| {
            ApiError::Storage(StorageError::ReadFailed {
                message: e.to_string(),
            })
        })?;
        while let Some(entry) = dir.next_entry().await.map_err(|e| {
            ApiError::Storage(StorageError::ReadFailed {
                message: e.to_string(),
            })
        })? {
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                tokio::fs::remove_file(entry.path()).await.map_err(|e| {
                    ApiError::Storage(StorageError::DeleteFailed {
                        message: e.to_string(),
                    })
                })?;
            }
        }
        Ok(())
    }
}

/// Mock token storage for testing.
#[derive(Default)]
pub struct MockTokenStorage {
    entries: Mutex<HashMap<String, ApiCredentials>>,
    store_history: Mutex<Vec<(String, ApiCredentials, Option<std::time::Duration>)>>,
    delete_history: Mutex<Vec<String>>,
    should_fail: Mutex<bool>,
}

impl MockTokenStorage {
    /// Create new mock token storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set storage to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Pre-populate credentials.
    pub fn add_credentials(&self, key: &str, credentials: ApiCredentials) -> &Self {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), credentials);
        self
    }

    /// Get store history, including the TTL passed for each write.
    pub fn get_store_history(&self) -> Vec<(String, ApiCredentials, Option<std::time::Duration>)> {
        self.store_history.lock().unwrap().clone()
    }

    /// Get delete history.
    pub fn get_delete_history(&self) -> Vec<String> {
        self.delete_history.lock().unwrap().clone()
    }

    fn check_error(&self) -> Result<(), ApiError> {
        if *self.should_fail.lock().unwrap() {
            return Err(ApiError::Storage(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for MockTokenStorage {
    async fn store(
        &self,
        key: &str,
        credentials: ApiCredentials,
        ttl: Option<std::time::Duration>,
    ) -> Result<(), ApiError> {
        self.check_error()?;
        self.store_history
            .lock()
            .unwrap()
            .push((key.to_string(), credentials.clone(), ttl));
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), credentials);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<ApiCredentials>, ApiError> {
        self.check_error()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, ApiError> {
        self.check_error()?;
        self.delete_history.lock().unwrap().push(key.to_string());
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), ApiError> {
        self.check_error()?;
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}
