//! API Request Gateway
//!
//! Sends authenticated requests to the catalog API. Every request carries a
//! bearer token obtained with the client-credentials grant; the service token
//! is memoized in-process and persisted in token storage, and both layers are
//! evicted when the API answers 401. Responses are returned as-is: a 4xx/5xx
//! status is not an error here and no request is retried.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::auth::Authenticator;
use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::error::{ApiError, ProtocolError};
use crate::token::TokenStorage;
use crate::types::{
    ApiConfig, ApiCredentials, RequestOptions, SHOWROOM_HEADER, TOKEN_TTL_MARGIN_SECS,
};

/// Storage key for the service's own client-credentials token.
pub const SERVICE_TOKEN_KEY: &str = "token.service";

/// Gateway for authenticated catalog API requests.
pub struct ApiProvider<A: Authenticator, T: HttpTransport, TS: TokenStorage> {
    config: ApiConfig,
    authenticator: Arc<A>,
    transport: Arc<T>,
    storage: Arc<TS>,
    service_token: RwLock<Option<ApiCredentials>>,
}

impl<A: Authenticator, T: HttpTransport, TS: TokenStorage> ApiProvider<A, T, TS> {
    /// Create new API provider.
    pub fn new(
        config: ApiConfig,
        authenticator: Arc<A>,
        transport: Arc<T>,
        storage: Arc<TS>,
    ) -> Self {
        Self {
            config,
            authenticator,
            transport,
            storage,
            service_token: RwLock::new(None),
        }
    }

    /// Resolve the bearer token for outgoing requests.
    ///
    /// Checks the in-process memo, then persistent storage, and finally
    /// performs a client-credentials exchange.
    pub async fn bearer_token(&self) -> Result<String, ApiError> {
        let memoized = self
            .service_token
            .read()
            .unwrap()
            .clone()
            .filter(|c| c.has_valid_access_token())
            .and_then(|c| c.access_token);
        if let Some(token) = memoized {
            return Ok(token);
        }

        if let Some(stored) = self.storage.retrieve(SERVICE_TOKEN_KEY).await? {
            if stored.has_valid_access_token() {
                let token = stored.access_token.clone();
                *self.service_token.write().unwrap() = Some(stored);
                if let Some(token) = token {
                    return Ok(token);
                }
            }
        }

        let response = self.authenticator.authenticate_client_credentials().await?;

        let mut credentials = ApiCredentials::default();
        credentials.merge(&response);
        let token = credentials.access_token.clone().ok_or_else(|| {
            ApiError::Protocol(ProtocolError::MissingField {
                field: "access_token".to_string(),
            })
        })?;

        let ttl = response
            .expires_in
            .map(|secs| std::time::Duration::from_secs(secs.saturating_sub(TOKEN_TTL_MARGIN_SECS)))
            .unwrap_or(self.config.cache_ttl);
        self.storage
            .store(SERVICE_TOKEN_KEY, credentials.clone(), Some(ttl))
            .await?;
        *self.service_token.write().unwrap() = Some(credentials);

        debug!("service token refreshed via client-credentials grant");
        Ok(token)
    }

    /// Drop the service token from both cache layers.
    async fn evict_service_token(&self) -> Result<(), ApiError> {
        *self.service_token.write().unwrap() = None;
        self.storage.delete(SERVICE_TOKEN_KEY).await?;
        Ok(())
    }

    fn build_url(&self, path: &str, options: &RequestOptions) -> Result<String, ApiError> {
        let mut query: Vec<(String, String)> = Vec::new();

        // Request options override the configured defaults.
        if !options.query.iter().any(|(k, _)| k == "light") {
            query.push((
                "light".to_string(),
                if self.config.light_data { "1" } else { "0" }.to_string(),
            ));
        }
        if !options.query.iter().any(|(k, _)| k == "analytics") {
            query.push((
                "analytics".to_string(),
                if self.config.analytics { "1" } else { "0" }.to_string(),
            ));
        }
        query.extend(options.query.iter().cloned());

        let encoded = serde_urlencoded::to_string(&query).map_err(|e| {
            ApiError::Protocol(ProtocolError::InvalidResponse {
                message: e.to_string(),
            })
        })?;

        let base = self.config.api_url(path);
        if encoded.is_empty() {
            Ok(base)
        } else {
            Ok(format!("{}?{}", base, encoded))
        }
    }

    fn build_headers(&self, token: &str, options: &RequestOptions) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), format!("Bearer {}", token));
        headers.insert("accept".to_string(), "application/json".to_string());

        if let Some(showroom) = &self.config.showroom {
            headers.insert(SHOWROOM_HEADER.to_string(), showroom.clone());
        }
        if let Some(locale) = &options.locale {
            headers.insert("accept-language".to_string(), locale.clone());
        }
        if let Some(cookie) = &options.cookie {
            headers.insert("cookie".to_string(), cookie.clone());
        }
        if options.json_body.is_some() {
            headers.insert("content-type".to_string(), "application/json".to_string());
        }

        for (name, value) in &options.headers {
            headers.insert(name.to_lowercase(), value.clone());
        }

        headers
    }

    /// Send an authenticated request and return the raw response.
    ///
    /// A 401 evicts the cached service token so the next call performs a
    /// fresh exchange; the 401 response itself is still returned.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        let token = self.bearer_token().await?;

        let body = match &options.json_body {
            Some(value) => Some(serde_json::to_string(value).map_err(|e| {
                ApiError::Protocol(ProtocolError::InvalidJson {
                    message: e.to_string(),
                })
            })?),
            None => None,
        };

        let request = HttpRequest {
            method,
            url: self.build_url(path, &options)?,
            headers: self.build_headers(&token, &options),
            body,
            timeout: Some(options.timeout.unwrap_or(self.config.timeout)),
        };

        let response = self.transport.send(request).await?;

        if response.status == 401 {
            warn!(path, "API rejected the bearer token, evicting service token");
            self.evict_service_token().await?;
        }

        Ok(response)
    }

    /// Config this provider was built with.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

impl<A, T, TS> ApiProvider<A, T, TS>
where
    A: Authenticator + 'static,
    T: HttpTransport + 'static,
    TS: TokenStorage + 'static,
{
    /// Send a request on a background task.
    ///
    /// The returned handle resolves to the same result [`request`] would
    /// have produced, including the 401 eviction side effect.
    ///
    /// [`request`]: ApiProvider::request
    pub fn request_detached(
        self: Arc<Self>,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> tokio::task::JoinHandle<Result<HttpResponse, ApiError>> {
        let path = path.to_string();
        tokio::spawn(async move { self.request(method, &path, options).await })
    }
}
