//! Realtime session state, persisted under `session:realtime:<id>` with a
//! TTL lease (spec.md §6 store schema).
//!
//! Unlike the principal/budget/latency records, which decompose into flat
//! hash fields, a realtime session carries client-negotiated configuration
//! (audio format, modalities, tool definitions, ...) that is naturally
//! nested JSON — so it is stored as one serialized blob via
//! [`SharedStore::set_ex`]/[`SharedStore::get`] rather than a hash.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::store::SharedStore;

/// Snapshot of one realtime session: the model in use, how far the
/// conversation has progressed, and the client's nested configuration
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub key_id: String,
    pub model: String,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
    pub turn_count: u64,
    /// Client-negotiated configuration, arbitrarily nested (e.g.
    /// `{"audio": {"voice": "...", "format": {"sample_rate": 24000}}}`).
    pub config: HashMap<String, Value>,
}

impl SessionState {
    pub fn store_key(session_id: &str) -> String {
        format!("session:realtime:{session_id}")
    }

    /// Persists this session under its `session:realtime:<id>` key with the
    /// given lease TTL.
    pub async fn save(&self, store: &dyn SharedStore, ttl: Duration) -> Result<(), StoreError> {
        let json = serde_json::to_string(self).expect("SessionState always serializes");
        store.set_ex(&Self::store_key(&self.session_id), json, ttl).await
    }

    /// Loads a session by id. `None` if absent, the lease expired, or the
    /// stored blob fails to decode.
    pub async fn load(store: &dyn SharedStore, session_id: &str) -> Result<Option<Self>, StoreError> {
        let Some(raw) = store.get(&Self::store_key(session_id)).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    /// Deletes the session's lease outright (e.g. on explicit session close).
    pub async fn delete(store: &dyn SharedStore, session_id: &str) -> Result<(), StoreError> {
        store.del(&Self::store_key(session_id)).await
    }
}
