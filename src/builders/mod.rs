//! Builders
//!
//! Fluent builders for client configuration.

pub mod config;

pub use config::{api_config, ApiConfigBuilder};
