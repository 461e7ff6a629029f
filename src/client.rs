//! Catalog API Client
//!
//! Facade wiring the authenticator, request gateway, token cache and
//! authorization flow together over shared transport and storage.

use std::sync::Arc;

use crate::auth::TokenAuthenticator;
use crate::core::{
    HttpMethod, HttpResponse, HttpTransport, InMemoryStateManager, ReqwestHttpTransport,
    StateManager,
};
use crate::error::ApiError;
use crate::flow::AuthorizationFlow;
use crate::provider::ApiProvider;
use crate::token::{FileTokenStorage, InMemoryTokenStorage, TokenCache, TokenStorage};
use crate::types::{ApiConfig, RequestOptions};

/// Catalog API client.
pub struct CatalogClient<T: HttpTransport, S: StateManager, TS: TokenStorage> {
    config: ApiConfig,
    provider: Arc<ApiProvider<TokenAuthenticator<T, S>, T, TS>>,
    cache: Arc<TokenCache<TS>>,
    flow: Arc<AuthorizationFlow<TokenAuthenticator<T, S>, TS>>,
}

impl CatalogClient<ReqwestHttpTransport, InMemoryStateManager, InMemoryTokenStorage> {
    /// Create a client with the default transport, state manager and storage.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestHttpTransport::new()?);
        Ok(Self::with_components(
            config,
            transport,
            Arc::new(InMemoryStateManager::new()),
            Arc::new(InMemoryTokenStorage::new()),
        ))
    }
}

impl CatalogClient<ReqwestHttpTransport, InMemoryStateManager, FileTokenStorage> {
    /// Create a client whose token cache persists under `cache_directory`.
    pub fn with_file_cache(config: ApiConfig) -> Result<Self, ApiError> {
        let directory = config.cache_directory.clone().ok_or_else(|| {
            ApiError::Configuration(crate::error::ConfigurationError::MissingField {
                field: "cache_directory".to_string(),
            })
        })?;
        let transport = Arc::new(ReqwestHttpTransport::new()?);
        let storage = Arc::new(FileTokenStorage::new(directory)?);
        Ok(Self::with_components(
            config,
            transport,
            Arc::new(InMemoryStateManager::new()),
            storage,
        ))
    }
}

impl<T: HttpTransport, S: StateManager, TS: TokenStorage> CatalogClient<T, S, TS> {
    /// Create a client from explicit components.
    pub fn with_components(
        config: ApiConfig,
        transport: Arc<T>,
        state_manager: Arc<S>,
        storage: Arc<TS>,
    ) -> Self {
        let authenticator = Arc::new(TokenAuthenticator::new(
            config.clone(),
            Arc::clone(&transport),
            state_manager,
        ));
        let provider = Arc::new(ApiProvider::new(
            config.clone(),
            Arc::clone(&authenticator),
            transport,
            Arc::clone(&storage),
        ));
        let cache = Arc::new(TokenCache::new(storage, config.cache_ttl));
        let flow = Arc::new(AuthorizationFlow::new(
            config.clone(),
            authenticator,
            Arc::clone(&cache),
        ));

        Self {
            config,
            provider,
            cache,
            flow,
        }
    }

    /// Send an authenticated request to the catalog API.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        self.provider.request(method, path, options).await
    }

    /// The request gateway.
    pub fn provider(&self) -> &Arc<ApiProvider<TokenAuthenticator<T, S>, T, TS>> {
        &self.provider
    }

    /// Send an authenticated request on a background task.
    pub fn request_detached(
        &self,
        method: HttpMethod,
        path: &str,
        options: RequestOptions,
    ) -> tokio::task::JoinHandle<Result<HttpResponse, ApiError>>
    where
        T: 'static,
        S: 'static,
        TS: 'static,
    {
        Arc::clone(&self.provider).request_detached(method, path, options)
    }

    /// The per-identity token cache.
    pub fn token_cache(&self) -> &Arc<TokenCache<TS>> {
        &self.cache
    }

    /// The user-facing authorization flow.
    pub fn authorization_flow(&self) -> &Arc<AuthorizationFlow<TokenAuthenticator<T, S>, TS>> {
        &self.flow
    }

    /// Client configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}
