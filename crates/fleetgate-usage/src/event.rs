use serde::{Deserialize, Serialize};

/// A single pending usage event, enqueued by the dispatch pipeline once an
/// upstream call's real token counts are known (spec.md §4.9, §3 "Usage
/// Record").
///
/// Serialized as JSON before being pushed onto the shared-store list; the
/// worker deserializes each popped entry independently, so one malformed
/// entry never blocks the rest of the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub request_id: String,
    pub team_id: Option<String>,
    pub user_id: Option<String>,
    pub key_id: String,
    pub model: String,
    pub instance_id: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub error: Option<String>,
    pub recorded_at_ms: u64,
}

impl UsageEvent {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl UsageEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("UsageEvent fields are all JSON-representable")
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
