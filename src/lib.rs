//! API gateway library: endpoint pipelines that fan out to backends and merge their answers.

pub mod config;
pub mod http;
pub mod load_balancer;
pub mod observability;
pub mod proxy;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use proxy::{Pipeline, PipelineFactory};
