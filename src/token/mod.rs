//! Token Lifecycle
//!
//! Credential storage and the per-identity token cache.

pub mod cache;
pub mod storage;

pub use cache::{token_id, TokenCache, ANONYMOUS_IDENTITY};
pub use storage::{FileTokenStorage, InMemoryTokenStorage, MockTokenStorage, TokenStorage};
