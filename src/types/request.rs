//! Request Options
//!
//! Explicit per-request options for the API gateway. The recognized options
//! are enumerated here instead of accepting an open-ended map, so callers get
//! compile-time checking of what the gateway understands.

use std::collections::HashMap;
use std::time::Duration;

/// Caller-supplied options merged with the gateway defaults.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Extra headers; override gateway defaults on key collision.
    pub headers: HashMap<String, String>,
    /// Extra query parameters, appended after the default flags.
    pub query: Vec<(String, String)>,
    /// JSON request body.
    pub json_body: Option<serde_json::Value>,
    /// Locale for the `Accept-Language` header.
    pub locale: Option<String>,
    /// Session cookie passed through to the remote API.
    pub cookie: Option<String>,
    /// Per-call timeout override.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.json_body = Some(body);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let options = RequestOptions::new()
            .with_header("X-Custom", "1")
            .with_query("type", "designer")
            .with_locale("fr")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(options.headers.get("X-Custom"), Some(&"1".to_string()));
        assert_eq!(options.query.len(), 1);
        assert_eq!(options.locale, Some("fr".to_string()));
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }
}
