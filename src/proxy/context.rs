//! Cancellation and deadline propagation.
//!
//! A `Context` is passed by value down the call chain. Layers never mutate
//! the one they receive; they derive a child with a shorter deadline or a
//! separately cancellable token. Cancelling a parent cancels every child.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::proxy::error::{ProxyError, ProxyResult};

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A root context: never cancelled, no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a cancellable child keeping the parent deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Guard that cancels this context when dropped.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Non-blocking check: the reason this context is done, if it is.
    pub fn err(&self) -> Option<ProxyError> {
        if self.token.is_cancelled() {
            return Some(ProxyError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ProxyError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ProxyError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => ProxyError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ProxyError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ProxyError::Cancelled
            }
        }
    }

    /// Drive `fut` until it finishes or this context is done.
    pub async fn run<F>(&self, fut: F) -> ProxyResult
    where
        F: Future<Output = ProxyResult>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            err = self.done() => Err(err),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::response::Response;

    #[tokio::test]
    async fn test_child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = Context::background().with_timeout(Duration::from_millis(20));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Some(Response::incomplete()))
            })
            .await;
        assert!(matches!(result, Err(ProxyError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_parent_cancel_cascades() {
        let parent = Context::background();
        let child = parent.child().with_timeout(Duration::from_secs(5));
        parent.cancel();
        assert!(matches!(child.err(), Some(ProxyError::Cancelled)));
        assert!(matches!(child.done().await, ProxyError::Cancelled));
    }

    #[tokio::test]
    async fn test_drop_guard_cancels() {
        let ctx = Context::background();
        let child = ctx.child();
        {
            let _guard = child.cancel_on_drop();
        }
        assert!(child.err().is_some());
        assert!(ctx.err().is_none());
    }
}
