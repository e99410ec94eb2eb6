//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages and the HTTP adapter produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric updates go through the `metrics` facade and are no-ops until a recorder is installed
//! - Request IDs are attached as span fields by the HTTP adapter

pub mod logging;
pub mod metrics;
