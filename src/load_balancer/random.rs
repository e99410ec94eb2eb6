//! Random load balancing strategy.

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::load_balancer::{subscriber::Subscriber, LoadBalancer};
use crate::proxy::error::ProxyError;

/// Uniform random selector, seeded once at construction.
#[derive(Debug)]
pub struct RandomBalancer {
    subscriber: Arc<dyn Subscriber>,
    rng: Mutex<StdRng>,
}

impl RandomBalancer {
    pub fn new(subscriber: Arc<dyn Subscriber>) -> Self {
        Self::with_rng(subscriber, StdRng::from_entropy())
    }

    /// Deterministic selector for reproducible runs.
    pub fn with_seed(subscriber: Arc<dyn Subscriber>, seed: u64) -> Self {
        Self::with_rng(subscriber, StdRng::seed_from_u64(seed))
    }

    fn with_rng(subscriber: Arc<dyn Subscriber>, rng: StdRng) -> Self {
        Self {
            subscriber,
            rng: Mutex::new(rng),
        }
    }
}

impl LoadBalancer for RandomBalancer {
    fn host(&self) -> Result<String, ProxyError> {
        let hosts = self.subscriber.hosts()?;
        if hosts.is_empty() {
            return Err(ProxyError::NoHosts);
        }

        let index = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..hosts.len());
        Ok(hosts[index].clone())
    }
}
