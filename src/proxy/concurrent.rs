//! Concurrent-call middleware.
//!
//! Hedges a single backend by issuing the same call several times in
//! parallel. The first complete response wins and every other attempt is
//! cancelled. If none is complete, the last response and the last error
//! seen are returned together.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::proxy::error::{join_result, ProxyError, ProxyResult};
use crate::proxy::{middleware_fn, proxy_fn, single_next, Context, Middleware, Proxy, Request};

/// Share of the backend timeout granted to the attempts.
const CONCURRENT_BUDGET_RATIO: f64 = 0.75;

/// Build the middleware. Panics when `calls` is below 2.
pub fn new_concurrent_middleware(calls: usize, backend_timeout: Duration) -> Middleware {
    assert!(
        calls > 1,
        "too few concurrent calls for the concurrent middleware: {}",
        calls
    );
    let budget = backend_timeout.mul_f64(CONCURRENT_BUDGET_RATIO);

    middleware_fn(move |next| {
        let next = single_next(next, "concurrent");
        proxy_fn(move |ctx, req| {
            let next = next.clone();
            async move {
                let ctx = ctx.with_timeout(budget);
                let _guard = ctx.cancel_on_drop();
                race(&ctx, calls, next, req).await
            }
        })
    })
}

async fn race(ctx: &Context, calls: usize, next: Proxy, req: Request) -> ProxyResult {
    let (tx, mut rx) = mpsc::channel::<ProxyResult>(calls);

    for _ in 0..calls {
        let attempt = ctx.child();
        let tx = tx.clone();
        let next = next.clone();
        let req = req.clone();
        tokio::spawn(async move {
            let result = attempt.run(next(attempt.clone(), req)).await;
            attempt.cancel();
            let result = match result {
                Ok(None) => Err(ProxyError::NullResult),
                other => other,
            };
            // Capacity equals the number of attempts, so this never waits.
            let _ = tx.try_send(result);
        });
    }
    drop(tx);

    let mut last_response = None;
    let mut last_error = None;

    for _ in 0..calls {
        tokio::select! {
            received = rx.recv() => match received {
                Some(Ok(Some(response))) if response.is_complete => {
                    ctx.cancel();
                    metrics::record_concurrent_winner(true);
                    return Ok(Some(response));
                }
                Some(Ok(response)) => {
                    if response.is_some() {
                        last_response = response;
                    }
                }
                Some(Err(err)) => {
                    let (response, cause) = err.into_parts();
                    if response.is_some() {
                        last_response = response;
                    }
                    tracing::debug!(error = %cause, "Concurrent attempt failed");
                    last_error = Some(cause);
                }
                None => break,
            },
            err = ctx.done() => {
                last_error = Some(err);
            }
        }
    }

    ctx.cancel();
    metrics::record_concurrent_winner(false);
    join_result(last_response, last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{proxy_fn, Data, Response};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn complete() -> Response {
        let mut data = Data::new();
        data.insert("ok".into(), json!(true));
        Response::complete(data)
    }

    #[tokio::test]
    async fn test_first_complete_wins() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let next = proxy_fn(move |_, _| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n % 2 == 1 {
                    Ok(Some(complete()))
                } else {
                    Ok(None)
                }
            }
        });

        let timeout = Duration::from_millis(400);
        let proxy = new_concurrent_middleware(3, timeout)(vec![next]);

        let start = Instant::now();
        let result = proxy(Context::background(), Request::default()).await;
        let response = result.unwrap().unwrap();
        assert!(response.is_complete);
        assert!(start.elapsed() < timeout.mul_f64(CONCURRENT_BUDGET_RATIO));
    }

    struct Finished(Arc<AtomicUsize>);

    impl Drop for Finished {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_slow_attempts_are_cancelled_after_win() {
        let counter = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (calls, done) = (counter.clone(), finished.clone());
        let next = proxy_fn(move |_, _| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let done = done.clone();
            async move {
                if n == 0 {
                    return Ok(Some(complete()));
                }
                let _finished = Finished(done);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Some(complete()))
            }
        });

        let proxy = new_concurrent_middleware(3, Duration::from_secs(10))(vec![next]);
        let response = proxy(Context::background(), Request::default()).await.unwrap().unwrap();
        assert!(response.is_complete);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_caller_cancel_stops_attempts() {
        let finished = Arc::new(AtomicUsize::new(0));
        let done = finished.clone();
        let next = proxy_fn(move |_, _| {
            let done = done.clone();
            async move {
                let _finished = Finished(done);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Some(complete()))
            }
        });

        let proxy = new_concurrent_middleware(3, Duration::from_secs(10))(vec![next]);
        let ctx = Context::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let err = proxy(ctx, Request::default()).await.unwrap_err();
        assert!(matches!(err.root_cause(), ProxyError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_incomplete_and_error_returned_together() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = counter.clone();
        let next = proxy_fn(move |_, _| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(Some(Response::incomplete()))
                } else {
                    Err(ProxyError::InvalidStatus(500))
                }
            }
        });

        let proxy = new_concurrent_middleware(2, Duration::from_millis(200))(vec![next]);
        let err = proxy(Context::background(), Request::default()).await.unwrap_err();
        assert!(matches!(err.root_cause(), ProxyError::InvalidStatus(500)));
        assert!(!err.partial_response().unwrap().is_complete);
    }

    #[tokio::test]
    async fn test_all_attempts_time_out() {
        let next = proxy_fn(|_, _| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(complete()))
        });

        let proxy = new_concurrent_middleware(2, Duration::from_millis(40))(vec![next]);
        let start = Instant::now();
        let err = proxy(Context::background(), Request::default()).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    #[should_panic(expected = "too few concurrent calls")]
    fn test_single_call_rejected() {
        new_concurrent_middleware(1, Duration::from_secs(1));
    }

    #[test]
    #[should_panic(expected = "too many proxies")]
    fn test_two_next_rejected() {
        let next = proxy_fn(|_, _| async { Ok(None) });
        new_concurrent_middleware(2, Duration::from_secs(1))(vec![next.clone(), next]);
    }
}
