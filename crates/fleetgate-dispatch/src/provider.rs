//! Provider dialect trait and the one reference adapter.
//!
//! The core only depends on this trio of operations; additional provider
//! kinds (Anthropic, Azure, Bedrock wire dialects) plug in by implementing
//! the same trait and are out of scope here.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Chat/completions request as the client sent it, already deserialized.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ChatRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The request prepared for one specific upstream instance: a ready-to-send
/// body plus the endpoint and auth to send it to.
pub struct WireRequest {
    pub url: String,
    pub bearer: String,
    pub body: serde_json::Value,
}

/// Token usage as reported by (or inferred from) the upstream's response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParsedUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// A chunk of bytes forwarded from upstream to the client while streaming.
pub type UpstreamByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// A unary (fully-buffered) upstream response.
pub struct UnaryResponse {
    pub status: u16,
    pub body: Bytes,
    pub headers: Vec<(String, String)>,
}

/// A provider's wire dialect: how to shape a request, how to invoke it, and
/// how to read token usage back out of the response.
#[async_trait]
pub trait ProviderDialect: Send + Sync {
    /// Shape the normalized request for this instance's endpoint/credential.
    fn prepare(&self, instance_endpoint: &str, credential: &str, request: &ChatRequest) -> WireRequest;

    /// Issue the call and return a streaming byte source.
    async fn invoke_streaming(&self, wire: WireRequest) -> Result<(u16, UpstreamByteStream), reqwest::Error>;

    /// Issue the call and fully buffer the response.
    async fn invoke_unary(&self, wire: WireRequest) -> Result<UnaryResponse, reqwest::Error>;

    /// Extract token usage from a complete unary body, or from the
    /// accumulated content of a streamed response if the dialect reports
    /// usage out of band (best-effort; zero if genuinely unknown).
    fn parse_usage(&self, body: &[u8]) -> ParsedUsage;
}

/// The OpenAI-compatible wire dialect: `POST <endpoint>` with a bearer token,
/// JSON body, and `usage.{prompt_tokens,completion_tokens}` in the response.
pub struct OpenAiDialect {
    client: reqwest::Client,
}

impl OpenAiDialect {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .build()
                .expect("reqwest client with default rustls config"),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for OpenAiDialect {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDialect for OpenAiDialect {
    fn prepare(&self, instance_endpoint: &str, credential: &str, request: &ChatRequest) -> WireRequest {
        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), serde_json::Value::String(request.model.clone()));
        body.insert(
            "messages".to_string(),
            serde_json::Value::Array(request.messages.clone()),
        );
        body.insert(
            "temperature".to_string(),
            serde_json::json!(request.temperature),
        );
        body.insert("stream".to_string(), serde_json::json!(request.stream));
        if let Some(max_tokens) = request.max_tokens {
            body.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
        }
        for (k, v) in &request.extra {
            body.entry(k.clone()).or_insert_with(|| v.clone());
        }
        WireRequest {
            url: instance_endpoint.to_string(),
            bearer: credential.to_string(),
            body: serde_json::Value::Object(body),
        }
    }

    async fn invoke_streaming(&self, wire: WireRequest) -> Result<(u16, UpstreamByteStream), reqwest::Error> {
        let response = self
            .client
            .post(&wire.url)
            .bearer_auth(&wire.bearer)
            .json(&wire.body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let stream = Box::pin(response.bytes_stream());
        Ok((status, stream))
    }

    async fn invoke_unary(&self, wire: WireRequest) -> Result<UnaryResponse, reqwest::Error> {
        let response = self
            .client
            .post(&wire.url)
            .bearer_auth(&wire.bearer)
            .json(&wire.body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        Ok(UnaryResponse {
            status,
            body,
            headers,
        })
    }

    fn parse_usage(&self, body: &[u8]) -> ParsedUsage {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
            return ParsedUsage::default();
        };
        let usage = &value["usage"];
        ParsedUsage {
            prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_carries_model_and_temperature() {
        let dialect = OpenAiDialect::new();
        let request = ChatRequest {
            model: "gpt-4".into(),
            messages: vec![serde_json::json!({"role": "user", "content": "hi"})],
            temperature: 0.0,
            stream: false,
            max_tokens: Some(64),
            extra: serde_json::Map::new(),
        };
        let wire = dialect.prepare("https://upstream/v1/chat/completions", "sk-upstream", &request);
        assert_eq!(wire.body["model"], "gpt-4");
        assert_eq!(wire.body["max_tokens"], 64);
        assert_eq!(wire.bearer, "sk-upstream");
    }

    #[test]
    fn parse_usage_reads_token_counts() {
        let dialect = OpenAiDialect::new();
        let body = br#"{"usage": {"prompt_tokens": 12, "completion_tokens": 34}}"#;
        let usage = dialect.parse_usage(body);
        assert_eq!(usage.prompt_tokens, 12);
        assert_eq!(usage.completion_tokens, 34);
    }

    #[test]
    fn parse_usage_defaults_on_malformed_body() {
        let dialect = OpenAiDialect::new();
        let usage = dialect.parse_usage(b"not json");
        assert_eq!(usage.prompt_tokens, 0);
        assert_eq!(usage.completion_tokens, 0);
    }
}
