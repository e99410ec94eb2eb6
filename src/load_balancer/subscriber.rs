//! Host list providers.
//!
//! # Responsibilities
//! - Yield the current host list for one backend
//! - Sanitize hosts (default scheme, no trailing slash)
//! - Allow an external discovery process to swap the list atomically
//!
//! # Design Decisions
//! - Subscribers own their synchronization; balancers only read
//! - Dynamic lists are replaced wholesale, never edited in place

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::proxy::error::ProxyError;

/// Source of the resolved hosts for a backend.
pub trait Subscriber: Send + Sync + std::fmt::Debug {
    fn hosts(&self) -> Result<Vec<String>, ProxyError>;
}

/// A static host list.
#[derive(Debug, Clone)]
pub struct FixedSubscriber {
    hosts: Vec<String>,
}

impl FixedSubscriber {
    pub fn new(hosts: &[String]) -> Self {
        Self {
            hosts: sanitize_hosts(hosts),
        }
    }
}

impl Subscriber for FixedSubscriber {
    fn hosts(&self) -> Result<Vec<String>, ProxyError> {
        Ok(self.hosts.clone())
    }
}

/// A host list refreshed from outside (e.g., by service discovery).
#[derive(Debug)]
pub struct DynamicSubscriber {
    hosts: ArcSwap<Vec<String>>,
}

impl DynamicSubscriber {
    pub fn new(hosts: &[String]) -> Self {
        Self {
            hosts: ArcSwap::from_pointee(sanitize_hosts(hosts)),
        }
    }

    /// Replace the current host list.
    pub fn update(&self, hosts: &[String]) {
        let hosts = sanitize_hosts(hosts);
        tracing::debug!(count = hosts.len(), "Host list updated");
        self.hosts.store(Arc::new(hosts));
    }
}

impl Subscriber for DynamicSubscriber {
    fn hosts(&self) -> Result<Vec<String>, ProxyError> {
        Ok(self.hosts.load().as_ref().clone())
    }
}

/// Add `http://` when no scheme is given and strip trailing slashes.
pub fn sanitize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

fn sanitize_hosts(hosts: &[String]) -> Vec<String> {
    hosts
        .iter()
        .filter(|h| !h.trim().is_empty())
        .map(|h| sanitize_host(h))
        .collect()
}
