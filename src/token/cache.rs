//! Token Cache
//!
//! Per-identity credential cache. Each identity (authenticated username, or
//! the anonymous sentinel) maps to one storage key; `save` performs a
//! read-merge-write against that key. The read-merge-write is not locked:
//! two concurrent saves for the same identity are last-write-wins, which is
//! acceptable because both hold valid tokens.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::ApiError;
use crate::token::storage::TokenStorage;
use crate::types::{ApiCredentials, Principal, TokenResponse, TOKEN_TTL_MARGIN_SECS};

/// Identity sentinel used when no principal is authenticated.
pub const ANONYMOUS_IDENTITY: &str = "anon.";

/// Compute the storage key for an identity.
pub fn token_id(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("token.{}", hex)
}

#[derive(Clone)]
struct CacheIdentity {
    token_id: String,
    user_token: Option<String>,
}

/// Per-identity credential cache over a [`TokenStorage`] backend.
pub struct TokenCache<S: TokenStorage> {
    storage: Arc<S>,
    default_ttl: Duration,
    identity: Mutex<Option<CacheIdentity>>,
}

impl<S: TokenStorage> TokenCache<S> {
    /// Create a cache over a storage backend.
    ///
    /// `default_ttl` bounds entries whose token response carried no
    /// `expires_in`.
    pub fn new(storage: Arc<S>, default_ttl: Duration) -> Self {
        Self {
            storage,
            default_ttl,
            identity: Mutex::new(None),
        }
    }

    /// Bind the cache to a principal (or the anonymous identity).
    ///
    /// Must run before `save`/`set_user_token`; `get` auto-initializes
    /// anonymously when it has not.
    pub fn init(&self, principal: Option<&Principal>) {
        let identity = match principal {
            Some(p) => CacheIdentity {
                token_id: token_id(&p.username),
                user_token: p.user_token.clone(),
            },
            None => CacheIdentity {
                token_id: token_id(ANONYMOUS_IDENTITY),
                user_token: None,
            },
        };
        *self.identity.lock().unwrap() = Some(identity);
    }

    fn ensure_init(&self) -> CacheIdentity {
        let mut guard = self.identity.lock().unwrap();
        guard
            .get_or_insert_with(|| CacheIdentity {
                token_id: token_id(ANONYMOUS_IDENTITY),
                user_token: None,
            })
            .clone()
    }

    /// Storage key currently in use.
    pub fn current_token_id(&self) -> String {
        self.ensure_init().token_id
    }

    /// Get the cached credentials, or `None` if absent or expired.
    pub async fn get(&self) -> Result<Option<ApiCredentials>, ApiError> {
        let identity = self.ensure_init();
        self.storage.retrieve(&identity.token_id).await
    }

    /// Merge a token response into the cached credentials and persist them.
    ///
    /// Backfills `user_token` from the bound principal when the stored
    /// credentials have none. The entry TTL is `expires_in` minus a safety
    /// margin, floored at zero.
    pub async fn save(&self, response: &TokenResponse) -> Result<ApiCredentials, ApiError> {
        let identity = self.ensure_init();

        let mut credentials = self
            .storage
            .retrieve(&identity.token_id)
            .await?
            .unwrap_or_default();

        credentials.merge(response);

        if credentials.user_token.is_none() {
            credentials.user_token = identity.user_token.clone();
        }

        let ttl = response
            .expires_in
            .map(|secs| Duration::from_secs(secs.saturating_sub(TOKEN_TTL_MARGIN_SECS)))
            .unwrap_or(self.default_ttl);

        self.storage
            .store(&identity.token_id, credentials.clone(), Some(ttl))
            .await?;

        Ok(credentials)
    }

    /// Set the user token on the cached credentials and persist them.
    pub async fn set_user_token(&self, token: &str) -> Result<ApiCredentials, ApiError> {
        let identity = self.ensure_init();

        let mut credentials = self
            .storage
            .retrieve(&identity.token_id)
            .await?
            .unwrap_or_default();
        credentials.user_token = Some(token.to_string());

        self.storage
            .store(&identity.token_id, credentials.clone(), Some(self.default_ttl))
            .await?;

        Ok(credentials)
    }

    /// Delete the cache entry for the bound identity.
    pub async fn clear(&self) -> Result<bool, ApiError> {
        let identity = self.ensure_init();
        self.storage.delete(&identity.token_id).await
    }
}
