//! # Catalog API Client
//!
//! Client for a fashion-catalog REST API protected by an OAuth2
//! authorization server. The crate covers the full token lifecycle:
//!
//! - **Authenticator**: the client-credentials, refresh-token and
//!   authorization-code grants against the remote token endpoint, with
//!   anti-CSRF state validation on code exchanges.
//! - **Token cache**: per-identity credential storage keyed by a hash of
//!   the identity, with read-merge-write semantics and TTLs derived from
//!   `expires_in`.
//! - **Request gateway**: authenticated REST calls carrying a memoized
//!   service bearer token, evicted when the API answers 401.
//! - **Authorization flow**: building the user-facing authorization
//!   redirect and handling its callback.
//!
//! ## Example
//!
//! ```no_run
//! use catalog_api_client::builders::api_config;
//! use catalog_api_client::client::CatalogClient;
//! use catalog_api_client::core::HttpMethod;
//! use catalog_api_client::types::RequestOptions;
//!
//! # async fn run() -> Result<(), catalog_api_client::error::ApiError> {
//! let config = api_config()
//!     .host_url("https://api.example.com")
//!     .client_id("my-client")
//!     .client_secret("my-secret")
//!     .build()?;
//!
//! let client = CatalogClient::new(config)?;
//! let response = client
//!     .request(HttpMethod::Get, "/api/designers", RequestOptions::default())
//!     .await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flow;
pub mod provider;
pub mod token;
pub mod types;

pub use auth::{Authenticator, TokenAuthenticator};
pub use builders::api_config;
pub use client::CatalogClient;
pub use error::{ApiError, ApiResult};
pub use flow::{AuthorizationFlow, RedirectTarget};
pub use provider::ApiProvider;
pub use token::{TokenCache, TokenStorage};
pub use types::{ApiConfig, ApiCredentials, Principal, RequestOptions, TokenResponse};
