//! Pipeline error definitions.

use thiserror::Error;

use crate::proxy::response::Response;

/// Errors produced while building or running a pipeline.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The endpoint has no backends to build a pipeline from.
    #[error("all endpoints must have at least one backend")]
    NoBackends,

    /// A call succeeded but produced no response.
    #[error("the backend returned a null result")]
    NullResult,

    /// The time budget of the current layer expired.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// The caller gave up on the request.
    #[error("context canceled")]
    Cancelled,

    /// The subscriber yielded no hosts.
    #[error("no hosts available")]
    NoHosts,

    /// The subscriber itself failed.
    #[error("subscriber error: {0}")]
    Subscriber(String),

    /// Host plus path did not form a valid URL.
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// The request reached the network leaf without a target URL.
    #[error("request has no target url")]
    MissingUrl,

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// The backend answered with a status treated as a failure.
    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decoding error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Usable partial data plus the reason full success did not happen.
    #[error("{source}")]
    Partial {
        response: Box<Response>,
        source: Box<ProxyError>,
    },
}

impl ProxyError {
    /// Pair a partial response with its cause. Nested partials are flattened.
    pub fn partial(response: Response, source: ProxyError) -> Self {
        Self::Partial {
            response: Box::new(response),
            source: Box::new(source.into_cause()),
        }
    }

    /// The partial response carried by this error, if any.
    pub fn partial_response(&self) -> Option<&Response> {
        match self {
            Self::Partial { response, .. } => Some(response),
            _ => None,
        }
    }

    /// The underlying cause, looking through `Partial`.
    pub fn root_cause(&self) -> &ProxyError {
        match self {
            Self::Partial { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Split into the partial response (if any) and the cause.
    pub fn into_parts(self) -> (Option<Response>, ProxyError) {
        match self {
            Self::Partial { response, source } => (Some(*response), *source),
            other => (None, other),
        }
    }

    fn into_cause(self) -> ProxyError {
        self.into_parts().1
    }

    /// True for deadline expiry, even behind a partial response.
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), Self::DeadlineExceeded)
    }
}

/// What every proxy returns: `Ok(None)` means no data and no error.
pub type ProxyResult = Result<Option<Response>, ProxyError>;

/// Split a proxy result into its response and error halves.
pub fn split_result(result: ProxyResult) -> (Option<Response>, Option<ProxyError>) {
    match result {
        Ok(response) => (response, None),
        Err(err) => {
            let (response, cause) = err.into_parts();
            (response, Some(cause))
        }
    }
}

/// Rebuild a proxy result from a response and error pair.
pub fn join_result(response: Option<Response>, error: Option<ProxyError>) -> ProxyResult {
    match (response, error) {
        (response, None) => Ok(response),
        (Some(response), Some(err)) => Err(ProxyError::partial(response, err)),
        (None, Some(err)) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_is_flattened() {
        let inner = ProxyError::partial(Response::incomplete(), ProxyError::NullResult);
        let outer = ProxyError::partial(Response::incomplete(), inner);
        match outer {
            ProxyError::Partial { source, .. } => assert!(matches!(*source, ProxyError::NullResult)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_split_and_join() {
        let (resp, err) = split_result(Err(ProxyError::partial(
            Response::incomplete(),
            ProxyError::DeadlineExceeded,
        )));
        assert!(resp.is_some());
        assert!(matches!(err, Some(ProxyError::DeadlineExceeded)));

        let joined = join_result(resp, err).unwrap_err();
        assert!(joined.is_timeout());
        assert!(joined.partial_response().is_some());
        assert_eq!(joined.to_string(), "context deadline exceeded");
    }
}
