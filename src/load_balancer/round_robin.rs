//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{subscriber::Subscriber, LoadBalancer};
use crate::proxy::error::ProxyError;

/// Round-robin selector.
/// Stores an internal counter to rotate through the subscriber's hosts.
#[derive(Debug)]
pub struct RoundRobin {
    subscriber: Arc<dyn Subscriber>,
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new(subscriber: Arc<dyn Subscriber>) -> Self {
        Self {
            subscriber,
            counter: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancer for RoundRobin {
    fn host(&self) -> Result<String, ProxyError> {
        let hosts = self.subscriber.hosts()?;
        if hosts.is_empty() {
            return Err(ProxyError::NoHosts);
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % hosts.len();
        Ok(hosts[index].clone())
    }
}
