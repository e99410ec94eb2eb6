//! Request descriptor passed down the pipeline.
//!
//! Every stage receives its own `Request` value. Headers and params sit
//! behind `Arc` so clones handed to concurrent branches share them; a stage
//! that needs a different set goes through `Arc::make_mut`, which copies
//! before writing.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

/// Inbound or outbound call descriptor.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    /// Fully built target, set by the load-balancing stage.
    pub url: Option<Url>,
    /// Path on the backend, set by the request-builder stage.
    pub path: String,
    /// Ordered query multimap.
    pub query: Vec<(String, String)>,
    /// Path template params; keys start with an upper-case letter.
    pub params: Arc<HashMap<String, String>>,
    pub headers: Arc<HashMap<String, Vec<String>>>,
    pub body: Option<Bytes>,
}

impl Request {
    /// Create a request for `method` and `path` with no params.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Replace the params, normalizing every key.
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.params = Arc::new(
            params
                .into_iter()
                .map(|(k, v)| (normalize_param(k.as_ref()), v.into()))
                .collect(),
        );
        self
    }

    /// Add one header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.headers)
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Add one query pair.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Insert a param on this copy only.
    pub fn set_param(&mut self, key: &str, value: impl Into<String>) {
        Arc::make_mut(&mut self.params).insert(normalize_param(key), value.into());
    }
}

/// Upper-case the first letter of a param name.
pub fn normalize_param(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
