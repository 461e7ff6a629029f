//! Configuration Builder
//!
//! Fluent builder for the catalog API client configuration.

use std::time::Duration;

use crate::error::{ApiError, ConfigurationError};
use crate::types::{
    ApiConfig, ClientCredentials, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT,
};
use secrecy::SecretString;
use url::Url;

/// Catalog API configuration builder.
///
/// `host_url`, `client_id` and `client_secret` are mandatory; `build()` fails
/// without them, which callers should treat as a fatal startup error.
#[derive(Default)]
pub struct ApiConfigBuilder {
    host_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    redirect_url: Option<String>,
    authorization_url: Option<String>,
    showroom: Option<String>,
    cache_directory: Option<std::path::PathBuf>,
    timeout: Option<Duration>,
    cache_ttl: Option<Duration>,
    analytics: bool,
    light_data: bool,
}

impl ApiConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            light_data: true,
            ..Default::default()
        }
    }

    /// Set the base URL of the remote API.
    pub fn host_url(mut self, url: impl Into<String>) -> Self {
        self.host_url = Some(url.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set the OAuth2 callback URL.
    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    /// Set the remote authorization page URL.
    pub fn authorization_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_url = Some(url.into());
        self
    }

    /// Set the showroom scoping value.
    pub fn showroom(mut self, showroom: impl Into<String>) -> Self {
        self.showroom = Some(showroom.into());
        self
    }

    /// Set the directory for filesystem-backed token storage.
    pub fn cache_directory(mut self, directory: impl Into<std::path::PathBuf>) -> Self {
        self.cache_directory = Some(directory.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default credential cache TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Enable the analytics query flag.
    pub fn analytics(mut self, enabled: bool) -> Self {
        self.analytics = enabled;
        self
    }

    /// Enable the light-data query flag.
    pub fn light_data(mut self, enabled: bool) -> Self {
        self.light_data = enabled;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ApiConfig, ApiError> {
        let host_url = self.host_url.ok_or_else(|| {
            ApiError::Configuration(ConfigurationError::MissingField {
                field: "host_url".to_string(),
            })
        })?;

        if Url::parse(&host_url).is_err() {
            return Err(ApiError::Configuration(ConfigurationError::InvalidHostUrl {
                url: host_url,
            }));
        }

        let client_id = self.client_id.ok_or_else(|| {
            ApiError::Configuration(ConfigurationError::MissingField {
                field: "client_id".to_string(),
            })
        })?;

        let client_secret = self.client_secret.ok_or_else(|| {
            ApiError::Configuration(ConfigurationError::MissingField {
                field: "client_secret".to_string(),
            })
        })?;

        Ok(ApiConfig {
            host_url,
            credentials: ClientCredentials {
                client_id,
                client_secret,
            },
            redirect_url: self.redirect_url,
            authorization_url: self.authorization_url,
            showroom: self.showroom,
            cache_directory: self.cache_directory,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            cache_ttl: self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            analytics: self.analytics,
            light_data: self.light_data,
        })
    }
}

/// Create a new configuration builder.
pub fn api_config() -> ApiConfigBuilder {
    ApiConfigBuilder::new()
}
