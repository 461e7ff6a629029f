//! Data Types
//!
//! Configuration, token, and request types for the catalog API client.

pub mod config;
pub mod request;
pub mod token;

pub use config::*;
pub use request::*;
pub use token::*;
