//! Token Authenticator
//!
//! OAuth2 grant exchanges against the remote authorization server.

pub mod authenticator;

pub use authenticator::{Authenticator, MockAuthenticator, TokenAuthenticator};
