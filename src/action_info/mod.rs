//! Action info: application metadata sent ahead of a resource transfer.
//!
//! A peer may send a small JSON message of the shape
//! `{"<resource name>": {"key": value, ...}, ...}` before (or while) it
//! transfers the named resources. Each record is cached under its resource
//! name until the matching transfer finishes and pops it.

pub mod cache;


pub use cache::*;

use std::collections::HashMap;

/// Metadata record associated with exactly one resource name
pub type ActionInfo = serde_json::Map<String, serde_json::Value>;

/// Decode a metadata payload into `(resource name, record)` pairs.
///
/// The whole payload must be an object whose values are all objects;
/// anything else is rejected as a unit.
pub fn decode_payload(data: &[u8]) -> Result<HashMap<String, ActionInfo>, serde_json::Error> {
    serde_json::from_slice(data)
}
