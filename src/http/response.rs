//! Outbound response translation.
//!
//! # Responsibilities
//! - Map a pipeline result to an HTTP response
//! - Report completeness in `X-Gateway-Completed`
//! - Pass raw backend bodies through for `no-op` backends
//!
//! # Design Decisions
//! - Partial data is still served with 200; completeness is signalled by the header only
//! - Deadline errors become 504 Gateway Timeout, every other failure 500
//! - Hop-by-hop headers of pass-through responses are not copied

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::Json;
use serde_json::Value;

use crate::proxy::{ProxyError, ProxyResult, Response};

pub const X_GATEWAY_COMPLETED: &str = "x-gateway-completed";

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
];

/// Convert a pipeline result into the response sent to the client.
pub fn into_http_response(result: ProxyResult) -> HttpResponse {
    match result {
        Ok(Some(response)) => from_response(response),
        Ok(None) => {
            tracing::error!("Pipeline returned no response");
            (StatusCode::INTERNAL_SERVER_ERROR, "Empty pipeline result").into_response()
        }
        Err(ProxyError::Partial { response, source }) => {
            tracing::warn!(error = %source, "Serving partial response");
            let mut response = *response;
            response.is_complete = false;
            from_response(response)
        }
        Err(err) if err.is_timeout() => {
            tracing::warn!(error = %err, "Pipeline timed out");
            (StatusCode::GATEWAY_TIMEOUT, "Backend timeout").into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "Pipeline failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Backend request failed").into_response()
        }
    }
}

fn from_response(response: Response) -> HttpResponse {
    let complete = response.is_complete;
    let mut out = match response.io {
        Some(body) => passthrough(response.metadata.status_code, &response.metadata.headers, body),
        None => Json(Value::Object(response.data)).into_response(),
    };
    out.headers_mut().insert(
        X_GATEWAY_COMPLETED,
        HeaderValue::from_static(if complete { "true" } else { "false" }),
    );
    out
}

fn passthrough(
    status: u16,
    headers: &std::collections::HashMap<String, Vec<String>>,
    body: bytes::Bytes,
) -> HttpResponse {
    let mut out = HttpResponse::new(Body::from(body));
    *out.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

    for (name, values) in headers {
        if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                out.headers_mut().append(name.clone(), value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::response::Metadata;
    use crate::proxy::Data;
    use serde_json::json;
    use std::collections::HashMap;

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn completed(response: &HttpResponse) -> &str {
        response.headers()[X_GATEWAY_COMPLETED].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_complete_response() {
        let mut data = Data::new();
        data.insert("a".into(), json!(1));
        let response = into_http_response(Ok(Some(Response::complete(data))));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(completed(&response), "true");
        assert_eq!(body_json(response).await, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_partial_response() {
        let mut data = Data::new();
        data.insert("a".into(), json!(1));
        let err = ProxyError::partial(Response::complete(data), ProxyError::DeadlineExceeded);
        let response = into_http_response(Err(err));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(completed(&response), "false");
        assert_eq!(body_json(response).await, json!({"a": 1}));
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            into_http_response(Err(ProxyError::DeadlineExceeded)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            into_http_response(Err(ProxyError::InvalidStatus(404))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            into_http_response(Ok(None)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_passthrough() {
        let response = Response {
            is_complete: true,
            metadata: Metadata {
                status_code: 404,
                headers: HashMap::from([
                    ("content-type".to_string(), vec!["text/plain".to_string()]),
                    ("connection".to_string(), vec!["close".to_string()]),
                ]),
            },
            io: Some(bytes::Bytes::from_static(b"missing")),
            ..Default::default()
        };
        let response = into_http_response(Ok(Some(response)));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert!(response.headers().get("connection").is_none());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"missing");
    }
}
