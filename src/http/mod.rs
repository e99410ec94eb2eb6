//! HTTP transport adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum Router, one route per endpoint)
//!     → request.rs (request ID, whitelisted query strings and headers)
//!     → endpoint Pipeline
//!     → response.rs (status mapping, X-Gateway-Completed)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{InputFilter, X_REQUEST_ID};
pub use response::{into_http_response, X_GATEWAY_COMPLETED};
pub use server::HttpServer;
