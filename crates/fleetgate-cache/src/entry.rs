//! The cached unit: a recorded upstream response body plus the provider
//! headers worth replaying on a hit.

use serde::{Deserialize, Serialize};

/// A complete, idempotent response recorded for a cache fingerprint.
///
/// Only unary (non-streaming) responses are ever stored: spec eligibility
/// (`temperature == 0`, `stream == false`) is enforced by the caller before
/// a [`crate::ResponseCache::put`] is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Id of the instance that produced this entry, carried so a later
    /// cache hit can still record a complete Usage record (instance id is
    /// one of its required fields) without re-selecting anything.
    pub instance_id: String,
}

impl ResponseCacheEntry {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>, instance_id: String) -> Self {
        Self {
            status,
            headers,
            body,
            instance_id,
        }
    }
}
