//! Token Types
//!
//! Wire types for token endpoint responses and the cached credential set.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token response from the authorization server.
///
/// Every field is optional: a grant response carries `access_token` and
/// `expires_in`, a code exchange may additionally echo `state`, and a
/// malformed response deserializes to an empty shell that leaves cached
/// credentials untouched on merge.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Anti-CSRF state echoed back on an authorization-code exchange.
    #[serde(default)]
    pub state: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Cached credential set for one identity.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiCredentials {
    /// Application-issued token identifying the local principal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_token: Option<String>,
    /// Bearer token authorizing REST calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Token usable to obtain a new access token without a full grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute time after which `access_token` is invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ApiCredentials {
    /// Merge a token response into this credential set.
    ///
    /// `access_token` and `expires_at` are updated only when the response
    /// carries them. A previously held `refresh_token` is preserved when the
    /// response omits one; the server is not required to rotate it.
    pub fn merge(&mut self, response: &TokenResponse) {
        if let Some(token) = &response.access_token {
            self.access_token = Some(token.clone());
            if let Some(secs) = response.expires_in {
                self.expires_at = Some(Utc::now() + Duration::seconds(secs as i64));
            }
        }
        if let Some(refresh) = &response.refresh_token {
            self.refresh_token = Some(refresh.clone());
        }
    }

    /// Check whether the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp <= Utc::now()).unwrap_or(false)
    }

    /// Whether a usable access token is present.
    pub fn has_valid_access_token(&self) -> bool {
        self.access_token.is_some() && !self.is_expired()
    }

    /// Remaining access token lifetime in seconds.
    pub fn remaining_lifetime(&self) -> Option<i64> {
        self.expires_at.map(|exp| {
            let now = Utc::now();
            if exp > now {
                (exp - now).num_seconds()
            } else {
                0
            }
        })
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("user_token", &self.user_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Locally authenticated principal, as seen by the token cache.
#[derive(Clone, Debug, PartialEq)]
pub struct Principal {
    /// Username, hashed into the cache key.
    pub username: String,
    /// Application-issued user token, if one has been assigned.
    pub user_token: Option<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_token: None,
        }
    }

    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }
}
