//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Backend call about to be made
//!     → subscriber.rs (current host list, static or refreshed externally)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through hosts)
//!         - random.rs (uniform pick)
//!     → Return one host or an error when the list is empty
//! ```
//!
//! # Design Decisions
//! - Balancers read the host list on every call; they never cache it
//! - Algorithm selection per backend
//! - An empty host list is an error, never a silent default

pub mod random;
pub mod round_robin;
pub mod subscriber;

use std::sync::Arc;

use crate::config::BalancerKind;
use crate::proxy::error::ProxyError;

pub use random::RandomBalancer;
pub use round_robin::RoundRobin;
pub use subscriber::{DynamicSubscriber, FixedSubscriber, Subscriber};

/// Trait for host selection algorithms.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Select the host for the next call.
    fn host(&self) -> Result<String, ProxyError>;
}

/// Build the balancer for a strategy over a subscriber.
pub fn new_balancer(kind: BalancerKind, subscriber: Arc<dyn Subscriber>) -> Arc<dyn LoadBalancer> {
    match kind {
        BalancerKind::RoundRobin => Arc::new(RoundRobin::new(subscriber)),
        BalancerKind::Random => Arc::new(RandomBalancer::new(subscriber)),
    }
}
