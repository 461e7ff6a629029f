//! Authorization Flow
//!
//! User-facing authorization-code flow: building the redirect to the remote
//! authorization page, and handling the callback by exchanging the code and
//! caching the resulting credentials under the caller's identity.

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::error::{ApiError, AuthorizationError, ConfigurationError, ProtocolError};
use crate::token::{TokenCache, TokenStorage};
use crate::types::{ApiConfig, Principal};

/// Default path users land on after a completed authorization.
const DEFAULT_POST_LOGIN_PATH: &str = "/";

/// Where to send the user's browser to start the authorization flow.
#[derive(Clone, Debug, PartialEq)]
pub struct RedirectTarget {
    pub url: String,
}

/// Orchestrates the authorization-code flow.
pub struct AuthorizationFlow<A: Authenticator, TS: TokenStorage> {
    config: ApiConfig,
    authenticator: Arc<A>,
    cache: Arc<TokenCache<TS>>,
    post_login_path: Mutex<Option<String>>,
}

impl<A: Authenticator, TS: TokenStorage> AuthorizationFlow<A, TS> {
    /// Create new authorization flow.
    pub fn new(config: ApiConfig, authenticator: Arc<A>, cache: Arc<TokenCache<TS>>) -> Self {
        Self {
            config,
            authenticator,
            cache,
            post_login_path: Mutex::new(None),
        }
    }

    /// Set the path to return from [`handle_callback`].
    ///
    /// [`handle_callback`]: AuthorizationFlow::handle_callback
    pub fn set_post_login_path(&self, path: impl Into<String>) {
        *self.post_login_path.lock().unwrap() = Some(path.into());
    }

    /// Build the redirect that starts the authorization flow.
    ///
    /// Issues a fresh anti-CSRF state as part of the query. Requires
    /// `authorization_url` to be configured.
    pub fn initiate_authorization(
        &self,
        user_token: Option<&str>,
    ) -> Result<RedirectTarget, ApiError> {
        let authorization_url = self.config.authorization_url.clone().ok_or_else(|| {
            ApiError::Configuration(ConfigurationError::MissingField {
                field: "authorization_url".to_string(),
            })
        })?;

        let params = self.authenticator.build_authorization_params(user_token)?;
        let query = serde_urlencoded::to_string(&params).map_err(|e| {
            ApiError::Protocol(ProtocolError::InvalidResponse {
                message: e.to_string(),
            })
        })?;

        Ok(RedirectTarget {
            url: format!("{}?{}", authorization_url, query),
        })
    }

    /// Handle the authorization callback.
    ///
    /// Exchanges the code for credentials, caches them under the principal's
    /// identity, and returns the path to redirect the user to. A state
    /// mismatch aborts before anything is cached.
    pub async fn handle_callback(
        &self,
        code: &str,
        principal: Option<&Principal>,
    ) -> Result<String, ApiError> {
        let principal = principal.ok_or_else(|| {
            ApiError::Authorization(AuthorizationError::AccessDenied {
                message: "No authenticated principal for the authorization callback".to_string(),
            })
        })?;
        let user_token = principal.user_token.clone().ok_or_else(|| {
            ApiError::Authorization(AuthorizationError::AccessDenied {
                message: "Principal has no user token".to_string(),
            })
        })?;

        self.cache.init(Some(principal));

        let response = self
            .authenticator
            .authorize_code(code, &user_token)
            .await
            .map_err(|e| {
                warn!(error_code = e.error_code(), "authorization code exchange failed");
                match e {
                    ApiError::Provider(provider) => {
                        ApiError::Authorization(AuthorizationError::InvalidRequest {
                            message: provider.to_string(),
                        })
                    }
                    other => other,
                }
            })?;

        self.cache.save(&response).await?;
        info!(username = %principal.username, "authorization flow completed");

        let path = self.post_login_path.lock().unwrap().take();
        Ok(path.unwrap_or_else(|| DEFAULT_POST_LOGIN_PATH.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthenticator;
    use crate::builders::api_config;
    use crate::token::{token_id, InMemoryTokenStorage};
    use std::time::Duration;

    fn config() -> ApiConfig {
        api_config()
            .host_url("https://api.example.com")
            .client_id("client-1")
            .client_secret("secret-1")
            .redirect_url("https://app.example.com/oauth2/authorize")
            .authorization_url("https://api.example.com/authorize")
            .build()
            .unwrap()
    }

    fn flow(
        authenticator: Arc<MockAuthenticator>,
        storage: Arc<InMemoryTokenStorage>,
    ) -> AuthorizationFlow<MockAuthenticator, InMemoryTokenStorage> {
        let cache = Arc::new(TokenCache::new(storage, Duration::from_secs(3600)));
        AuthorizationFlow::new(config(), authenticator, cache)
    }

    #[test]
    fn test_initiate_authorization_builds_redirect() {
        let flow = flow(
            Arc::new(MockAuthenticator::new()),
            Arc::new(InMemoryTokenStorage::new()),
        );

        let target = flow.initiate_authorization(Some("ut-1")).unwrap();
        assert!(target
            .url
            .starts_with("https://api.example.com/authorize?"));
        assert!(target.url.contains("response_type=code"));
        assert!(target.url.contains("state=mock-state"));
        assert!(target.url.contains("x-auth-token=ut-1"));
    }

    #[test]
    fn test_initiate_without_authorization_url_fails() {
        let config = api_config()
            .host_url("https://api.example.com")
            .client_id("client-1")
            .client_secret("secret-1")
            .build()
            .unwrap();
        let cache = Arc::new(TokenCache::new(
            Arc::new(InMemoryTokenStorage::new()),
            Duration::from_secs(3600),
        ));
        let flow = AuthorizationFlow::new(config, Arc::new(MockAuthenticator::new()), cache);

        assert!(matches!(
            flow.initiate_authorization(None),
            Err(ApiError::Configuration(
                ConfigurationError::MissingField { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_callback_requires_principal() {
        let flow = flow(
            Arc::new(MockAuthenticator::new()),
            Arc::new(InMemoryTokenStorage::new()),
        );

        assert!(matches!(
            flow.handle_callback("code", None).await,
            Err(ApiError::Authorization(
                AuthorizationError::AccessDenied { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_callback_requires_user_token() {
        let flow = flow(
            Arc::new(MockAuthenticator::new()),
            Arc::new(InMemoryTokenStorage::new()),
        );
        let principal = Principal::new("alice");

        assert!(matches!(
            flow.handle_callback("code", Some(&principal)).await,
            Err(ApiError::Authorization(
                AuthorizationError::AccessDenied { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_callback_caches_credentials_for_principal() {
        let authenticator = Arc::new(MockAuthenticator::new());
        let storage = Arc::new(InMemoryTokenStorage::new());
        let flow = flow(authenticator.clone(), storage.clone());

        let principal = Principal::new("alice").with_user_token("ut-alice");
        let path = flow.handle_callback("the-code", Some(&principal)).await.unwrap();
        assert_eq!(path, "/");

        assert_eq!(
            authenticator.get_authorize_history(),
            vec![("the-code".to_string(), "ut-alice".to_string())]
        );

        use crate::token::TokenStorage as _;
        let cached = storage.retrieve(&token_id("alice")).await.unwrap().unwrap();
        assert_eq!(cached.access_token, Some("mock-user-token".to_string()));
        assert_eq!(cached.user_token, Some("ut-alice".to_string()));
    }

    #[tokio::test]
    async fn test_callback_returns_post_login_path_once() {
        let flow = flow(
            Arc::new(MockAuthenticator::new()),
            Arc::new(InMemoryTokenStorage::new()),
        );
        flow.set_post_login_path("/account");

        let principal = Principal::new("alice").with_user_token("ut-alice");
        let first = flow.handle_callback("c1", Some(&principal)).await.unwrap();
        assert_eq!(first, "/account");

        let second = flow.handle_callback("c2", Some(&principal)).await.unwrap();
        assert_eq!(second, "/");
    }

    #[tokio::test]
    async fn test_callback_state_mismatch_leaves_cache_untouched() {
        let authenticator = Arc::new(MockAuthenticator::new());
        authenticator.set_next_error(ApiError::Authorization(
            AuthorizationError::StateMismatch {
                expected: "a".to_string(),
                received: "b".to_string(),
            },
        ));
        let storage = Arc::new(InMemoryTokenStorage::new());
        let flow = flow(authenticator, storage.clone());

        let principal = Principal::new("alice").with_user_token("ut-alice");
        let result = flow.handle_callback("the-code", Some(&principal)).await;
        assert!(matches!(
            result,
            Err(ApiError::Authorization(
                AuthorizationError::StateMismatch { .. }
            ))
        ));

        use crate::token::TokenStorage as _;
        assert!(storage.retrieve(&token_id("alice")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_callback_maps_provider_error() {
        let authenticator = Arc::new(MockAuthenticator::new());
        authenticator.set_next_error(ApiError::Provider(
            crate::error::ProviderError::InvalidGrant {
                message: "code expired".to_string(),
            },
        ));
        let flow = flow(authenticator, Arc::new(InMemoryTokenStorage::new()));

        let principal = Principal::new("alice").with_user_token("ut-alice");
        let result = flow.handle_callback("the-code", Some(&principal)).await;
        assert!(matches!(
            result,
            Err(ApiError::Authorization(
                AuthorizationError::InvalidRequest { .. }
            ))
        ));
    }
}
