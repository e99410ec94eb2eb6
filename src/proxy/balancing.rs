//! Load-balancing middleware.
//!
//! Picks a host per invocation and builds the target URL from
//! host + path + query before handing the request on.

use std::sync::Arc;

use url::Url;

use crate::load_balancer::LoadBalancer;
use crate::proxy::error::ProxyError;
use crate::proxy::request::Request;
use crate::proxy::{middleware_fn, proxy_fn, single_next, Middleware};

pub fn new_load_balanced_middleware(lb: Arc<dyn LoadBalancer>) -> Middleware {
    middleware_fn(move |next| {
        let next = single_next(next, "load balancing");
        let lb = lb.clone();
        proxy_fn(move |ctx, req| {
            let next = next.clone();
            let target = lb.host().and_then(|host| with_target(&host, req));
            async move {
                match target {
                    Ok(req) => next(ctx, req).await,
                    Err(err) => {
                        tracing::warn!(error = %err, "Host resolution failed");
                        Err(err)
                    }
                }
            }
        })
    })
}

/// Set `req.url` to host + path, appending the request query pairs.
fn with_target(host: &str, mut req: Request) -> Result<Request, ProxyError> {
    let raw = format!("{}{}", host, req.path);
    let mut url = Url::parse(&raw).map_err(|source| ProxyError::InvalidUrl { url: raw, source })?;
    if !req.query.is_empty() {
        url.query_pairs_mut().extend_pairs(req.query.iter());
    }
    req.url = Some(url);
    Ok(req)
}
