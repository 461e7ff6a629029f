//! Configuration Types
//!
//! Client configuration for the catalog API and its authorization server.

use secrecy::SecretString;
use std::time::Duration;

/// Path of the token endpoint on the remote authorization server.
pub const TOKEN_ENDPOINT_PATH: &str = "/oauth/v2/token";

/// Header carrying the application-issued user token on a code exchange.
pub const USER_TOKEN_HEADER: &str = "X-AUTH-TOKEN";

/// Header narrowing responses to a showroom context.
pub const SHOWROOM_HEADER: &str = "X-Showroom-Name";

/// Default HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default TTL for cached per-identity credentials without an explicit expiry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Safety margin subtracted from `expires_in` when caching the service token.
pub const TOKEN_TTL_MARGIN_SECS: u64 = 5;

/// Catalog API client configuration.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL of the remote API and authorization server.
    pub host_url: String,
    /// OAuth2 client credentials.
    pub credentials: ClientCredentials,
    /// Callback URL the authorization server redirects back to.
    pub redirect_url: Option<String>,
    /// Remote authorization page; required only for the user-facing flow.
    pub authorization_url: Option<String>,
    /// Showroom scoping value, sent as a header on every request.
    pub showroom: Option<String>,
    /// Directory for filesystem-backed token storage.
    pub cache_directory: Option<std::path::PathBuf>,
    /// HTTP timeout applied to all outbound calls.
    pub timeout: Duration,
    /// TTL for cached credentials lacking an `expires_in`.
    pub cache_ttl: Duration,
    /// Default `analytics` query flag.
    pub analytics: bool,
    /// Default `light` query flag (reduced payloads).
    pub light_data: bool,
}

impl ApiConfig {
    /// Full URL of the token endpoint.
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.host_url.trim_end_matches('/'),
            TOKEN_ENDPOINT_PATH
        )
    }

    /// Resolve an API path against the host URL.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.host_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("host_url", &self.host_url)
            .field("credentials", &self.credentials)
            .field("redirect_url", &self.redirect_url)
            .field("authorization_url", &self.authorization_url)
            .field("showroom", &self.showroom)
            .field("cache_directory", &self.cache_directory)
            .field("timeout", &self.timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("analytics", &self.analytics)
            .field("light_data", &self.light_data)
            .finish()
    }
}

/// OAuth2 client credentials for the service.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: SecretString,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ApiConfig {
        ApiConfig {
            host_url: "https://api.example.com/".to_string(),
            credentials: ClientCredentials {
                client_id: "client".to_string(),
                client_secret: SecretString::new("secret".to_string()),
            },
            redirect_url: None,
            authorization_url: None,
            showroom: None,
            cache_directory: None,
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            analytics: false,
            light_data: true,
        }
    }

    #[test]
    fn test_token_endpoint_trims_slash() {
        assert_eq!(
            config().token_endpoint(),
            "https://api.example.com/oauth/v2/token"
        );
    }

    #[test]
    fn test_api_url_joins_path() {
        assert_eq!(
            config().api_url("/api/designers"),
            "https://api.example.com/api/designers"
        );
        assert_eq!(
            config().api_url("api/designers"),
            "https://api.example.com/api/designers"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let output = format!("{:?}", config().credentials);
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("secret"));
    }
}
