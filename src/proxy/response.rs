//! Response descriptor carried back through the pipeline.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value};

/// Decoded payload tree: string keys to scalars, nested maps or lists.
pub type Data = Map<String, Value>;

/// Result of one or more backend calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    /// Decoded, formatted payload.
    pub data: Data,
    /// True only if every contributing backend succeeded and was complete.
    pub is_complete: bool,
    /// Status and headers, filled for pass-through responses.
    pub metadata: Metadata,
    /// Raw body, set only when decoding is disabled.
    pub io: Option<Bytes>,
}

/// Backend response metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub status_code: u16,
    pub headers: HashMap<String, Vec<String>>,
}

impl Response {
    /// A complete response holding `data`.
    pub fn complete(data: Data) -> Self {
        Self {
            data,
            is_complete: true,
            ..Default::default()
        }
    }

    /// An empty, incomplete response.
    pub fn incomplete() -> Self {
        Self::default()
    }
}
