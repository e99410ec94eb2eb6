//! Proxy pipeline engine.
//!
//! # Data Flow
//! ```text
//! Pipeline (factory.rs)
//!     → merge.rs (fan out when the endpoint has several backends)
//!         → per backend:
//!             request_builder.rs (backend path + method)
//!             → balancing.rs (pick host, build URL)
//!             → concurrent.rs (redundant attempts, first complete wins)
//!             → backend.rs (network call, decode, formatter.rs)
//!     ← partial responses combined into one
//! ```
//!
//! # Design Decisions
//! - A `Proxy` is a boxed async function; a `Middleware` turns next proxies into a proxy
//! - Middlewares are composed once at startup, never per request
//! - Errors and partial data travel together (`ProxyError::Partial`)
//! - Arity violations are construction defects and panic

pub mod backend;
pub mod balancing;
pub mod concurrent;
pub mod context;
pub mod error;
pub mod factory;
pub mod formatter;
pub mod merge;
pub mod request;
pub mod request_builder;
pub mod response;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use context::Context;
pub use error::{ProxyError, ProxyResult};
pub use factory::{Pipeline, PipelineFactory};
pub use request::Request;
pub use response::{Data, Response};

/// One stage of the pipeline: context and request in, response out.
pub type Proxy = Arc<dyn Fn(Context, Request) -> BoxFuture<'static, ProxyResult> + Send + Sync>;

/// Wraps next proxies into a single proxy.
pub type Middleware = Arc<dyn Fn(Vec<Proxy>) -> Proxy + Send + Sync>;

/// Box an async closure as a `Proxy`.
pub fn proxy_fn<F, Fut>(f: F) -> Proxy
where
    F: Fn(Context, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProxyResult> + Send + 'static,
{
    Arc::new(move |ctx: Context, req: Request| -> BoxFuture<'static, ProxyResult> {
        Box::pin(f(ctx, req))
    })
}

/// Box a closure as a `Middleware`.
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Vec<Proxy>) -> Proxy + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Middleware that hands back its single next proxy unchanged.
pub fn empty_middleware() -> Middleware {
    middleware_fn(|next| single_next(next, "empty"))
}

/// Unwrap the only next proxy, panicking on any other arity.
pub(crate) fn single_next(mut next: Vec<Proxy>, name: &str) -> Proxy {
    match next.len() {
        1 => next.remove(0),
        0 => panic!("no next proxy given to the {name} middleware"),
        n => panic!("too many proxies for the {name} middleware: {n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy() -> Proxy {
        proxy_fn(|_, _| async { Ok(Some(Response::complete(Data::new()))) })
    }

    #[tokio::test]
    async fn test_empty_middleware_is_identity() {
        let next = dummy();
        let wrapped = empty_middleware()(vec![next.clone()]);
        assert!(Arc::ptr_eq(&next, &wrapped));

        let result = wrapped(Context::background(), Request::default()).await.unwrap();
        assert!(result.unwrap().is_complete);
    }

    #[test]
    #[should_panic(expected = "too many proxies")]
    fn test_empty_middleware_rejects_two() {
        empty_middleware()(vec![dummy(), dummy()]);
    }

    #[test]
    #[should_panic(expected = "no next proxy")]
    fn test_empty_middleware_rejects_none() {
        empty_middleware()(Vec::new());
    }
}
