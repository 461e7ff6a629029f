//! Error Types
//!
//! Error hierarchy for the catalog API client.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the catalog API client.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ApiError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "API_CONFIG",
            Self::Authorization(_) => "API_AUTH",
            Self::Token(_) => "API_TOKEN",
            Self::Network(_) => "API_NETWORK",
            Self::Storage(_) => "API_STORAGE",
            Self::Protocol(_) => "API_PROTOCOL",
            Self::Provider(_) => "API_PROVIDER",
        }
    }

    /// Check if error requires re-authentication.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Token(TokenError::Expired) => true,
            Self::Token(TokenError::NoRefreshToken) => true,
            Self::Token(TokenError::RefreshFailed { .. }) => true,
            Self::Provider(ProviderError::InvalidGrant { .. }) => true,
            Self::Authorization(AuthorizationError::AccessDenied { .. }) => true,
            _ => false,
        }
    }
}

/// Configuration error. Missing mandatory settings are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid host URL: {url}")]
    InvalidHostUrl { url: String },

    #[error("Failed to create HTTP client: {message}")]
    HttpClient { message: String },
}

/// Authorization flow error.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch { expected: String, received: String },

    #[error("State parameter expired")]
    StateExpired,

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Invalid authorization request: {message}")]
    InvalidRequest { message: String },
}

/// Token-related error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No credentials cached for key: {key}")]
    NotFound { key: String },

    #[error("Access token expired")]
    Expired,

    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },

    #[error("No refresh token available")]
    NoRefreshToken,
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Storage error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

/// Provider (remote authorization server) error.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid client credentials")]
    InvalidClient { error_description: Option<String> },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid scope: {scope}")]
    InvalidScope { scope: String },

    #[error("Unauthorized client for this grant type")]
    UnauthorizedClient { error_description: Option<String> },

    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType { grant_type: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Server temporarily unavailable")]
    TemporarilyUnavailable { retry_after: Option<Duration> },
}

/// Result type for catalog API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// OAuth2 error response from the authorization server.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProviderErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Map token endpoint error response to error type.
pub fn map_token_error(response: &ProviderErrorResponse) -> ProviderError {
    match response.error.as_str() {
        "invalid_client" => ProviderError::InvalidClient {
            error_description: response.error_description.clone(),
        },
        "invalid_grant" => ProviderError::InvalidGrant {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| "Invalid grant".to_string()),
        },
        "invalid_request" => ProviderError::InvalidRequest {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| "Invalid request".to_string()),
        },
        "invalid_scope" => ProviderError::InvalidScope {
            scope: response.error_description.clone().unwrap_or_default(),
        },
        "unauthorized_client" => ProviderError::UnauthorizedClient {
            error_description: response.error_description.clone(),
        },
        "unsupported_grant_type" => ProviderError::UnsupportedGrantType {
            grant_type: response.error_description.clone().unwrap_or_default(),
        },
        "server_error" => ProviderError::ServerError {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| "Server error".to_string()),
        },
        "temporarily_unavailable" => ProviderError::TemporarilyUnavailable { retry_after: None },
        _ => ProviderError::InvalidRequest {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| response.error.clone()),
        },
    }
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<ProviderErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create error from an HTTP error response.
pub fn create_error_from_response(status: u16, body: &str) -> ApiError {
    if let Some(response) = parse_error_response(body) {
        return ApiError::Provider(map_token_error(&response));
    }

    let error = match status {
        400 => ProviderError::InvalidRequest {
            message: "Bad request".to_string(),
        },
        401 => ProviderError::InvalidClient {
            error_description: Some("Unauthorized".to_string()),
        },
        403 => ProviderError::UnauthorizedClient {
            error_description: Some("Forbidden".to_string()),
        },
        429 => ProviderError::TemporarilyUnavailable {
            retry_after: Some(Duration::from_secs(60)),
        },
        _ => ProviderError::ServerError {
            message: format!("HTTP {}", status),
        },
    };

    ApiError::Provider(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":"invalid_grant","error_description":"The code is expired"}"#;
        let response = parse_error_response(body).unwrap();
        assert_eq!(response.error, "invalid_grant");
        assert_eq!(
            response.error_description,
            Some("The code is expired".to_string())
        );
    }

    #[test]
    fn test_create_error_from_status() {
        let error = create_error_from_response(401, "not json");
        assert!(matches!(
            error,
            ApiError::Provider(ProviderError::InvalidClient { .. })
        ));

        let error = create_error_from_response(503, "");
        assert!(matches!(
            error,
            ApiError::Provider(ProviderError::ServerError { .. })
        ));
    }

    #[test]
    fn test_create_error_prefers_body() {
        let body = r#"{"error":"invalid_client"}"#;
        let error = create_error_from_response(400, body);
        assert!(matches!(
            error,
            ApiError::Provider(ProviderError::InvalidClient { .. })
        ));
    }

    #[test]
    fn test_error_code_per_category() {
        assert_eq!(
            ApiError::Configuration(ConfigurationError::MissingField {
                field: "host_url".to_string()
            })
            .error_code(),
            "API_CONFIG"
        );
        assert_eq!(
            ApiError::Authorization(AuthorizationError::StateExpired).error_code(),
            "API_AUTH"
        );
        assert_eq!(
            ApiError::Provider(ProviderError::InvalidGrant {
                message: "expired".to_string()
            })
            .error_code(),
            "API_PROVIDER"
        );
    }

    #[test]
    fn test_needs_reauth() {
        assert!(ApiError::Token(TokenError::Expired).needs_reauth());
        assert!(ApiError::Token(TokenError::NoRefreshToken).needs_reauth());
        assert!(!ApiError::Network(NetworkError::ConnectionFailed {
            message: "down".to_string()
        })
        .needs_reauth());
    }
}
