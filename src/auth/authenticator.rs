//! Token Authenticator
//!
//! The three OAuth2 grant flows against the remote authorization server's
//! token endpoint, plus generation of the authorization-redirect query
//! parameters. All grants POST a form-encoded body to `/oauth/v2/token`.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::core::{HttpMethod, HttpRequest, HttpTransport, StateManager};
use crate::error::{
    create_error_from_response, ApiError, ConfigurationError, ProtocolError,
};
use crate::types::{ApiConfig, TokenResponse, SHOWROOM_HEADER, USER_TOKEN_HEADER};

/// Authenticator interface (for dependency injection).
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate the service itself with the client-credentials grant.
    async fn authenticate_client_credentials(&self) -> Result<TokenResponse, ApiError>;

    /// Obtain a new access token from a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ApiError>;

    /// Exchange an authorization code bound to a user token.
    ///
    /// Validates the echoed `state` against the stored one; a mismatch is
    /// fatal and nothing is persisted.
    async fn authorize_code(
        &self,
        code: &str,
        user_token: &str,
    ) -> Result<TokenResponse, ApiError>;

    /// Build the query parameters for the authorization redirect.
    ///
    /// Issues a fresh anti-CSRF state and stores it for later validation.
    /// Optional parameters with no value are omitted.
    fn build_authorization_params(
        &self,
        user_token: Option<&str>,
    ) -> Result<Vec<(String, String)>, ApiError>;
}

/// Token authenticator against the remote authorization server.
pub struct TokenAuthenticator<T: HttpTransport, S: StateManager> {
    config: ApiConfig,
    transport: Arc<T>,
    state_manager: Arc<S>,
}

impl<T: HttpTransport, S: StateManager> TokenAuthenticator<T, S> {
    /// Create new token authenticator.
    pub fn new(config: ApiConfig, transport: Arc<T>, state_manager: Arc<S>) -> Self {
        Self {
            config,
            transport,
            state_manager,
        }
    }

    fn form_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());
        headers
    }

    fn encode_body(params: &[(&str, String)]) -> Result<String, ApiError> {
        serde_urlencoded::to_string(params).map_err(|e| {
            ApiError::Protocol(ProtocolError::InvalidResponse {
                message: e.to_string(),
            })
        })
    }

    async fn post_token_request(
        &self,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<TokenResponse, ApiError> {
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.config.token_endpoint(),
            headers,
            body: Some(body),
            timeout: Some(self.config.timeout),
        };

        let response = self.transport.send(request).await?;

        if response.status != 200 {
            if (400..500).contains(&response.status) {
                error!(
                    status = response.status,
                    body = %response.body,
                    "token endpoint rejected the grant"
                );
            }
            return Err(create_error_from_response(response.status, &response.body));
        }

        response.json::<TokenResponse>()
    }
}

#[async_trait]
impl<T: HttpTransport, S: StateManager> Authenticator for TokenAuthenticator<T, S> {
    async fn authenticate_client_credentials(&self) -> Result<TokenResponse, ApiError> {
        let body = Self::encode_body(&[
            ("grant_type", "client_credentials".to_string()),
            ("client_id", self.config.credentials.client_id.clone()),
            (
                "client_secret",
                self.config
                    .credentials
                    .client_secret
                    .expose_secret()
                    .to_string(),
            ),
        ])?;

        self.post_token_request(self.form_headers(), body).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        let body = Self::encode_body(&[
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
            ("client_id", self.config.credentials.client_id.clone()),
            (
                "client_secret",
                self.config
                    .credentials
                    .client_secret
                    .expose_secret()
                    .to_string(),
            ),
        ])?;

        self.post_token_request(self.form_headers(), body).await
    }

    async fn authorize_code(
        &self,
        code: &str,
        user_token: &str,
    ) -> Result<TokenResponse, ApiError> {
        let redirect_uri = self.config.redirect_url.clone().ok_or_else(|| {
            ApiError::Configuration(ConfigurationError::MissingField {
                field: "redirect_url".to_string(),
            })
        })?;

        let body = Self::encode_body(&[
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.credentials.client_id.clone()),
            (
                "client_secret",
                self.config
                    .credentials
                    .client_secret
                    .expose_secret()
                    .to_string(),
            ),
        ])?;

        let mut headers = self.form_headers();
        headers.insert(USER_TOKEN_HEADER.to_string(), user_token.to_string());
        if let Some(showroom) = &self.config.showroom {
            headers.insert(SHOWROOM_HEADER.to_string(), showroom.clone());
        }

        let response = self.post_token_request(headers, body).await?;

        // An echoed state must match the one issued for this session before
        // anything is persisted.
        if let Some(state) = &response.state {
            self.state_manager.validate(state)?;
        }

        Ok(response)
    }

    fn build_authorization_params(
        &self,
        user_token: Option<&str>,
    ) -> Result<Vec<(String, String)>, ApiError> {
        let redirect_uri = self.config.redirect_url.clone().ok_or_else(|| {
            ApiError::Configuration(ConfigurationError::MissingField {
                field: "redirect_url".to_string(),
            })
        })?;

        let state = self.state_manager.issue();

        let mut params = vec![
            ("response_type".to_string(), "code".to_string()),
            ("state".to_string(), state),
            (
                "client_id".to_string(),
                self.config.credentials.client_id.clone(),
            ),
            ("redirect_uri".to_string(), redirect_uri),
        ];

        if let Some(token) = user_token {
            params.push(("x-auth-token".to_string(), token.to_string()));
        }
        if let Some(showroom) = &self.config.showroom {
            params.push(("x-showroom-name".to_string(), showroom.clone()));
        }

        Ok(params)
    }
}

/// Mock authenticator for testing.
#[derive(Default)]
pub struct MockAuthenticator {
    client_credentials_responses: std::sync::Mutex<Vec<TokenResponse>>,
    client_credentials_calls: std::sync::Mutex<u32>,
    refresh_history: std::sync::Mutex<Vec<String>>,
    authorize_history: std::sync::Mutex<Vec<(String, String)>>,
    next_error: std::sync::Mutex<Option<ApiError>>,
}

impl MockAuthenticator {
    /// Create new mock authenticator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a client-credentials response (FIFO).
    pub fn queue_client_credentials_response(&self, response: TokenResponse) -> &Self {
        self.client_credentials_responses
            .lock()
            .unwrap()
            .push(response);
        self
    }

    /// Set next error for any grant call.
    pub fn set_next_error(&self, error: ApiError) -> &Self {
        *self.next_error.lock().unwrap() = Some(error);
        self
    }

    /// Number of client-credentials exchanges performed.
    pub fn client_credentials_calls(&self) -> u32 {
        *self.client_credentials_calls.lock().unwrap()
    }

    /// Get authorize-code call history as `(code, user_token)` pairs.
    pub fn get_authorize_history(&self) -> Vec<(String, String)> {
        self.authorize_history.lock().unwrap().clone()
    }

    /// Get the refresh tokens passed to `refresh_token`, in call order.
    pub fn get_refresh_history(&self) -> Vec<String> {
        self.refresh_history.lock().unwrap().clone()
    }

    fn check_error(&self) -> Result<(), ApiError> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(())
    }

    fn default_response(token: &str) -> TokenResponse {
        TokenResponse {
            access_token: Some(token.to_string()),
            token_type: "Bearer".to_string(),
            expires_in: Some(3600),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn authenticate_client_credentials(&self) -> Result<TokenResponse, ApiError> {
        self.check_error()?;
        *self.client_credentials_calls.lock().unwrap() += 1;

        let queued = {
            let mut responses = self.client_credentials_responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };
        Ok(queued.unwrap_or_else(|| Self::default_response("mock-service-token")))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ApiError> {
        self.check_error()?;
        self.refresh_history
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        Ok(Self::default_response("mock-refreshed-token"))
    }

    async fn authorize_code(
        &self,
        code: &str,
        user_token: &str,
    ) -> Result<TokenResponse, ApiError> {
        self.check_error()?;
        self.authorize_history
            .lock()
            .unwrap()
            .push((code.to_string(), user_token.to_string()));
        Ok(Self::default_response("mock-user-token"))
    }

    fn build_authorization_params(
        &self,
        user_token: Option<&str>,
    ) -> Result<Vec<(String, String)>, ApiError> {
        self.check_error()?;
        let mut params = vec![
            ("response_type".to_string(), "code".to_string()),
            ("state".to_string(), "mock-state".to_string()),
            ("client_id".to_string(), "mock-client".to_string()),
            (
                "redirect_uri".to_string(),
                "https://app.example.com/oauth2/authorize".to_string(),
            ),
        ];
        if let Some(token) = user_token {
            params.push(("x-auth-token".to_string(), token.to_string()));
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::api_config;
    use crate::core::{InMemoryStateManager, MockHttpTransport, MockStateManager};
    use serde_json::json;

    fn config() -> ApiConfig {
        api_config()
            .host_url("https://api.example.com")
            .client_id("client-1")
            .client_secret("secret-1")
            .redirect_url("https://app.example.com/oauth2/authorize")
            .build()
            .unwrap()
    }

    fn authenticator(
        transport: Arc<MockHttpTransport>,
        state: Arc<MockStateManager>,
    ) -> TokenAuthenticator<MockHttpTransport, MockStateManager> {
        TokenAuthenticator::new(config(), transport, state)
    }

    #[tokio::test]
    async fn test_client_credentials_grant() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"access_token": "abc", "expires_in": 3600}));

        let auth = authenticator(transport.clone(), Arc::new(MockStateManager::new()));
        let response = auth.authenticate_client_credentials().await.unwrap();

        assert_eq!(response.access_token, Some("abc".to_string()));

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, "https://api.example.com/oauth/v2/token");
        assert_eq!(request.method, HttpMethod::Post);
        let body = request.body.unwrap();
        assert!(body.contains("grant_type=client_credentials"));
        assert!(body.contains("client_id=client-1"));
        assert!(body.contains("client_secret=secret-1"));
    }

    #[tokio::test]
    async fn test_client_credentials_failure_propagates() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(401, &json!({"error": "invalid_client"}));

        let auth = authenticator(transport, Arc::new(MockStateManager::new()));
        let result = auth.authenticate_client_credentials().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_refresh_grant_body() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({"access_token": "new", "expires_in": 3600, "refresh_token": "rt-2"}),
        );

        let auth = authenticator(transport.clone(), Arc::new(MockStateManager::new()));
        let response = auth.refresh_token("rt-1").await.unwrap();

        assert_eq!(response.refresh_token, Some("rt-2".to_string()));
        let body = transport.get_last_request().unwrap().body.unwrap();
        assert!(body.contains("grant_type=refresh_token"));
        assert!(body.contains("refresh_token=rt-1"));
    }

    #[tokio::test]
    async fn test_authorize_code_sends_user_token_header() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"access_token": "ua", "expires_in": 3600}));

        let auth = authenticator(transport.clone(), Arc::new(MockStateManager::new()));
        auth.authorize_code("the-code", "ut-1").await.unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(
            request.headers.get(USER_TOKEN_HEADER),
            Some(&"ut-1".to_string())
        );
        let body = request.body.unwrap();
        assert!(body.contains("grant_type=authorization_code"));
        assert!(body.contains("code=the-code"));
    }

    #[tokio::test]
    async fn test_authorize_code_state_mismatch_is_fatal() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({"access_token": "ua", "expires_in": 3600, "state": "foo"}),
        );

        let state = Arc::new(MockStateManager::new());
        state.set_stored_state("bar");

        let auth = authenticator(transport, state);
        let result = auth.authorize_code("the-code", "ut-1").await;
        assert!(matches!(
            result,
            Err(ApiError::Authorization(
                crate::error::AuthorizationError::StateMismatch { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_authorize_code_matching_state_passes() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({"access_token": "ua", "expires_in": 3600, "state": "good"}),
        );

        let state = Arc::new(MockStateManager::new());
        state.set_stored_state("good");

        let auth = authenticator(transport, state);
        assert!(auth.authorize_code("the-code", "ut-1").await.is_ok());
    }

    #[test]
    fn test_build_authorization_params() {
        let state = Arc::new(InMemoryStateManager::new());
        let auth = TokenAuthenticator::new(
            config(),
            Arc::new(MockHttpTransport::new()),
            state.clone(),
        );

        let params = auth.build_authorization_params(Some("ut-1")).unwrap();
        let map: std::collections::HashMap<_, _> = params.into_iter().collect();

        assert_eq!(map.get("response_type"), Some(&"code".to_string()));
        assert_eq!(map.get("client_id"), Some(&"client-1".to_string()));
        assert_eq!(map.get("x-auth-token"), Some(&"ut-1".to_string()));
        // The issued state is stored for later validation.
        assert_eq!(map.get("state").cloned(), state.current());
    }

    #[test]
    fn test_build_authorization_params_omits_absent_optionals() {
        let auth = TokenAuthenticator::new(
            config(),
            Arc::new(MockHttpTransport::new()),
            Arc::new(InMemoryStateManager::new()),
        );

        let params = auth.build_authorization_params(None).unwrap();
        assert!(params.iter().all(|(k, _)| k != "x-auth-token"));
        assert!(params.iter().all(|(k, _)| k != "x-showroom-name"));
    }

    #[test]
    fn test_states_differ_across_calls() {
        let auth = TokenAuthenticator::new(
            config(),
            Arc::new(MockHttpTransport::new()),
            Arc::new(InMemoryStateManager::new()),
        );

        let first = auth.build_authorization_params(None).unwrap();
        let second = auth.build_authorization_params(None).unwrap();
        let state_of = |params: &[(String, String)]| {
            params
                .iter()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_ne!(state_of(&first), state_of(&second));
    }

    #[tokio::test]
    async fn test_mock_authenticator_records_calls() {
        let mock = MockAuthenticator::new();
        mock.refresh_token("rt-1").await.unwrap();
        mock.refresh_token("rt-2").await.unwrap();
        mock.authorize_code("code", "ut-1").await.unwrap();

        assert_eq!(mock.get_refresh_history(), vec!["rt-1", "rt-2"]);
        assert_eq!(
            mock.get_authorize_history(),
            vec![("code".to_string(), "ut-1".to_string())]
        );
        assert_eq!(mock.client_credentials_calls(), 0);
    }

    #[test]
    fn test_missing_redirect_url_is_config_error() {
        let config = api_config()
            .host_url("https://api.example.com")
            .client_id("client-1")
            .client_secret("secret-1")
            .build()
            .unwrap();
        let auth = TokenAuthenticator::new(
            config,
            Arc::new(MockHttpTransport::new()),
            Arc::new(InMemoryStateManager::new()),
        );

        assert!(matches!(
            auth.build_authorization_params(None),
            Err(ApiError::Configuration(
                ConfigurationError::MissingField { .. }
            ))
        ));
    }
}
