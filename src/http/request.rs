//! Inbound request translation.
//!
//! # Responsibilities
//! - Assign a request ID (reuse the caller's, or a fresh UUID v4)
//! - Turn an axum request into a pipeline `Request`
//! - Forward only the query strings and headers an endpoint whitelists
//!
//! # Design Decisions
//! - Header whitelist matching ignores case; forwarded names use the configured spelling
//! - `X-Request-Id` is always forwarded so backend logs can be correlated

use std::collections::HashMap;

use axum::http::request::Parts;
use axum::http::HeaderMap;
use bytes::Bytes;

use crate::config::EndpointConfig;
use crate::proxy::Request;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Per-endpoint whitelist applied to inbound requests.
#[derive(Debug, Clone, Default)]
pub struct InputFilter {
    query_strings: Vec<String>,
    headers: Vec<String>,
}

impl InputFilter {
    pub fn new(endpoint: &EndpointConfig) -> Self {
        Self {
            query_strings: endpoint.input_query_strings.clone(),
            headers: endpoint.input_headers.clone(),
        }
    }

    /// Build the pipeline request for one inbound call.
    pub fn build(
        &self,
        parts: &Parts,
        params: HashMap<String, String>,
        body: Bytes,
        request_id: &str,
    ) -> Request {
        let mut req = Request::new(parts.method.as_str(), parts.uri.path()).with_params(params);

        if let Some(raw) = parts.uri.query() {
            for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
                if self.query_strings.iter().any(|q| q == key.as_ref()) {
                    req = req.with_query(key, value);
                }
            }
        }

        for name in &self.headers {
            for value in parts.headers.get_all(name.as_str()) {
                if let Ok(value) = value.to_str() {
                    req = req.with_header(name.as_str(), value);
                }
            }
        }
        req = req.with_header("X-Request-Id", request_id);

        if !body.is_empty() {
            req = req.with_body(body);
        }
        req
    }
}

/// The caller's request ID, or a new one.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use axum::http::HeaderValue;

    fn filter() -> InputFilter {
        let mut endpoint = EndpointConfig::new("/users/{id}", vec![BackendConfig::new("/", vec![])]);
        endpoint.input_query_strings = vec!["page".into(), "tag".into()];
        endpoint.input_headers = vec!["Authorization".into()];
        InputFilter::new(&endpoint)
    }

    fn parts(method: &str, uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_whitelists_applied() {
        let parts = parts(
            "GET",
            "/users/7?page=2&debug=1&tag=a%20b&tag=c",
            &[("authorization", "Bearer t"), ("cookie", "secret")],
        );
        let params = HashMap::from([("id".to_string(), "7".to_string())]);
        let req = filter().build(&parts, params, Bytes::new(), "rid-1");

        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/users/7");
        assert_eq!(req.params.get("Id").map(String::as_str), Some("7"));
        assert_eq!(
            req.query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("tag".to_string(), "a b".to_string()),
                ("tag".to_string(), "c".to_string()),
            ]
        );
        assert_eq!(req.headers.get("Authorization"), Some(&vec!["Bearer t".to_string()]));
        assert!(req.headers.get("cookie").is_none());
        assert_eq!(req.headers.get("X-Request-Id"), Some(&vec!["rid-1".to_string()]));
        assert!(req.body.is_none());
    }

    #[test]
    fn test_body_kept() {
        let parts = parts("POST", "/users/7", &[]);
        let req = filter().build(&parts, HashMap::new(), Bytes::from_static(b"{}"), "rid");
        assert_eq!(req.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_request_id_reused_or_generated() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");

        let generated = request_id(&HeaderMap::new());
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
    }
}
