//! End-to-end dispatch scenarios exercising the full [`GatewayContext`]
//! wiring against an in-memory store and a scripted [`ProviderDialect`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;

use fleetgate_breaker::{BreakerConfig, Manager as BreakerManager};
use fleetgate_budget::{BudgetConfig, BudgetService};
use fleetgate_cache::{CacheConfig, ResponseCache};
use fleetgate_core::{InMemoryStore, SharedStore};
use fleetgate_dispatch::{
    credential_hash, ChatRequest, DispatchConfig, GatewayContext, ParsedUsage, ProviderDialect, UnaryResponse,
    UpstreamByteStream, WireRequest,
};
use fleetgate_latency::LatencyTracker;
use fleetgate_registry::{ModelInstanceSpec, ModelRegistry};
use fleetgate_retry::{RetryController, RetryPolicy};
use fleetgate_router::{Router, RouterConfig, RoutingStrategy};
use fleetgate_usage::{SettlementWorker, WorkerConfig};

/// Seeds a `principal:key:<hash>` record so [`fleetgate_dispatch::PrincipalResolver`]
/// resolves `credential` to `key_id` with no budget/allow-list restrictions.
async fn seed_key(store: &Arc<InMemoryStore>, credential: &str, key_id: &str) {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), key_id.to_string());
    fields.insert("enabled".to_string(), "true".to_string());
    let key = format!("principal:key:{}", credential_hash(credential));
    SharedStore::hset_ex(store.as_ref(), &key, fields, Duration::from_secs(3600))
        .await
        .unwrap();
}

fn test_instance(id: &str, endpoint: &str, priority: u32) -> ModelInstanceSpec {
    ModelInstanceSpec {
        id: id.to_string(),
        logical_model: "gpt-4".to_string(),
        provider: "openai".to_string(),
        priority,
        weight: 1,
        endpoint: endpoint.to_string(),
        credential: "sk-upstream-test".to_string(),
        enabled: true,
        tokens_per_minute: None,
        requests_per_minute: None,
        prompt_price_per_1k: 0.01,
        completion_price_per_1k: 0.02,
    }
}

fn chat_request_body(model: &str, prompt: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0.0,
        "stream": false,
    }))
    .unwrap()
}

fn streaming_chat_request_body(model: &str, prompt: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
        "temperature": 0.7,
        "stream": true,
    }))
    .unwrap()
}

/// A dialect whose unary behavior is keyed by the target endpoint, so a
/// test can script "this instance fails, that one succeeds" without any
/// real network access.
struct ScriptedDialect {
    /// Endpoints that answer with a 503 on their first call, then succeed.
    fails_once: Vec<String>,
    attempts: Arc<std::sync::Mutex<HashMap<String, usize>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDialect {
    fn new(fails_once: Vec<String>) -> Self {
        Self {
            fails_once,
            attempts: Arc::new(std::sync::Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ProviderDialect for ScriptedDialect {
    fn prepare(&self, instance_endpoint: &str, credential: &str, request: &ChatRequest) -> WireRequest {
        WireRequest {
            url: instance_endpoint.to_string(),
            bearer: credential.to_string(),
            body: serde_json::json!({"model": request.model}),
        }
    }

    async fn invoke_streaming(&self, wire: WireRequest) -> Result<(u16, UpstreamByteStream), reqwest::Error> {
        let body = br#"{"usage":{"prompt_tokens":5,"completion_tokens":5}}"#.to_vec();
        let _ = wire;
        let stream = stream::once(async move { Ok(Bytes::from(body)) });
        Ok((200, Box::pin(stream)))
    }

    async fn invoke_unary(&self, wire: WireRequest) -> Result<UnaryResponse, reqwest::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(wire.url.clone()).or_insert(0);
        *count += 1;

        if self.fails_once.contains(&wire.url) && *count == 1 {
            return Ok(UnaryResponse {
                status: 503,
                body: Bytes::from_static(b"{}"),
                headers: vec![],
            });
        }

        Ok(UnaryResponse {
            status: 200,
            body: Bytes::from_static(br#"{"usage":{"prompt_tokens":10,"completion_tokens":20}}"#),
            headers: vec![],
        })
    }

    fn parse_usage(&self, body: &[u8]) -> ParsedUsage {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
            return ParsedUsage::default();
        };
        ParsedUsage {
            prompt_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        }
    }
}

/// A streaming dialect that emits one chunk and then hangs forever, so a
/// test can drop the response stream mid-flight to simulate a client
/// disconnect before the upstream would naturally finish.
struct HangingStreamDialect;

#[async_trait]
impl ProviderDialect for HangingStreamDialect {
    fn prepare(&self, instance_endpoint: &str, credential: &str, request: &ChatRequest) -> WireRequest {
        WireRequest {
            url: instance_endpoint.to_string(),
            bearer: credential.to_string(),
            body: serde_json::json!({"model": request.model}),
        }
    }

    async fn invoke_streaming(&self, _wire: WireRequest) -> Result<(u16, UpstreamByteStream), reqwest::Error> {
        let first = stream::iter(vec![Ok(Bytes::from_static(b"data: {\"choices\":[]}\n\n"))]);
        let hang = stream::pending::<Result<Bytes, reqwest::Error>>();
        Ok((200, Box::pin(first.chain(hang))))
    }

    async fn invoke_unary(&self, _wire: WireRequest) -> Result<UnaryResponse, reqwest::Error> {
        unreachable!("this test only exercises the streaming path")
    }

    fn parse_usage(&self, _body: &[u8]) -> ParsedUsage {
        ParsedUsage::default()
    }
}

async fn build_context(
    instances: Vec<ModelInstanceSpec>,
    dialect: Arc<dyn ProviderDialect>,
) -> (Arc<GatewayContext>, Arc<InMemoryStore>) {
    let store = InMemoryStore::new();
    let registry = Arc::new(ModelRegistry::new(instances));
    let latency = Arc::new(LatencyTracker::with_defaults(Arc::clone(&store) as Arc<dyn SharedStore>));
    let router = Arc::new(Router::new(
        Arc::clone(&registry),
        Arc::clone(&latency),
        RouterConfig::builder().default_strategy(RoutingStrategy::Priority).build(),
    ));
    let breakers = Arc::new(BreakerManager::new(BreakerConfig::default()));
    let budget = Arc::new(BudgetService::new(Arc::clone(&store) as Arc<dyn SharedStore>, BudgetConfig::default()));
    let cache = Arc::new(ResponseCache::new(Arc::clone(&store) as Arc<dyn SharedStore>, CacheConfig::default()));
    let settlement = Arc::new(SettlementWorker::new(
        Arc::clone(&store) as Arc<dyn SharedStore>,
        Arc::clone(&budget),
        WorkerConfig::builder().retry(RetryPolicy::builder().max_attempts(1).build()).build(),
    ));
    let retry = Arc::new(RetryController::new(
        RetryPolicy::builder()
            .max_attempts(2)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(1))
            .jitter(false)
            .build(),
    ));

    let ctx = GatewayContext::new(
        store.clone() as Arc<dyn SharedStore>,
        registry,
        router,
        breakers,
        latency,
        budget,
        cache,
        settlement,
        retry,
        dialect,
        DispatchConfig::default(),
    );
    (Arc::new(ctx), store)
}

/// Scenario 4 ("Retry with fallback"): two instances configured for the
/// same logical model, the higher-priority one answers 503 once. The
/// retry controller excludes it and the dispatch succeeds against the
/// second instance, with exactly one failure recorded against the first
/// instance's breaker.
#[tokio::test]
async fn retries_with_fallback_to_second_instance() {
    let primary = test_instance("gpt4-a", "https://instance-a.invalid", 0);
    let secondary = test_instance("gpt4-b", "https://instance-b.invalid", 1);
    let dialect = Arc::new(ScriptedDialect::new(vec!["https://instance-a.invalid".to_string()]));

    let (ctx, store) = build_context(vec![primary, secondary], dialect).await;
    seed_key(&store, "sk-test-abc123", "key-1").await;

    let pipeline = fleetgate_dispatch::DispatchPipeline::new(Arc::clone(&ctx));
    let outcome = pipeline
        .handle("sk-test-abc123", &chat_request_body("gpt-4", "hello"))
        .await
        .expect("second instance should serve the request");

    match outcome {
        fleetgate_dispatch::DispatchOutcome::Unary { status, cache_hit, .. } => {
            assert_eq!(status, 200);
            assert!(!cache_hit);
        }
        fleetgate_dispatch::DispatchOutcome::Streaming { .. } => panic!("expected a unary outcome"),
    }

    assert_eq!(ctx.breakers.breaker("gpt4-a").state(), fleetgate_breaker::CircuitState::Closed);
    assert_eq!(ctx.breakers.breaker("gpt4-a").metrics().consecutive_failures, 1);
    assert_eq!(ctx.breakers.breaker("gpt4-b").metrics().consecutive_failures, 0);
}

/// Scenario 5 ("Cache hit with single-flight"): two concurrent identical
/// `temperature=0`/`stream=false` requests from the same principal only
/// invoke the upstream once; both callers get the same body, and exactly
/// one of the two settled usage records is a cache hit with zero cost.
#[tokio::test]
async fn concurrent_identical_requests_single_flight_and_cache() {
    let instance = test_instance("gpt4-a", "https://instance-a.invalid", 0);
    let dialect = Arc::new(ScriptedDialect::new(vec![]));
    let calls = Arc::clone(&dialect.calls);

    let (ctx, store) = build_context(vec![instance], dialect).await;
    seed_key(&store, "sk-test-abc123", "key-1").await;

    let pipeline_a = fleetgate_dispatch::DispatchPipeline::new(Arc::clone(&ctx));
    let pipeline_b = pipeline_a.clone();
    let body = chat_request_body("gpt-4", "identical prompt");
    let body_b = body.clone();

    let (outcome_a, outcome_b) = tokio::join!(
        pipeline_a.handle("sk-test-abc123", &body),
        pipeline_b.handle("sk-test-abc123", &body_b),
    );

    let extract = |outcome: fleetgate_dispatch::DispatchOutcome| match outcome {
        fleetgate_dispatch::DispatchOutcome::Unary { request_id, body, cache_hit, .. } => (request_id, body, cache_hit),
        fleetgate_dispatch::DispatchOutcome::Streaming { .. } => panic!("expected a unary outcome"),
    };
    let (request_id_a, body_a, hit_a) = extract(outcome_a.unwrap());
    let (request_id_b, body_b, hit_b) = extract(outcome_b.unwrap());

    assert_eq!(body_a, body_b);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "only one upstream call for two identical concurrent requests");
    assert_ne!(hit_a, hit_b, "exactly one of the two responses should be the cache hit");

    let drained = ctx.settlement.run_once().await;
    assert_eq!(drained, 2);

    let mut cache_hit_costs = vec![];
    for request_id in [&request_id_a, &request_id_b] {
        let key = format!("usage:record:{request_id}");
        let fields = SharedStore::hgetall(store.as_ref(), &key).await.unwrap().unwrap();
        let cache_hit: bool = fields["cache_hit"].parse().unwrap();
        let cost: f64 = fields["cost"].parse().unwrap();
        if cache_hit {
            cache_hit_costs.push(cost);
        }
    }
    assert_eq!(cache_hit_costs.len(), 1);
    assert_eq!(cache_hit_costs[0], 0.0, "a cache hit settles at zero additional cost");
}

/// A client that disconnects mid-stream must still close the instance's
/// in-flight counter and settle a partial Usage record, without counting
/// the disconnect as a breaker failure (spec.md §7 `Cancelled`).
#[tokio::test]
async fn client_disconnect_mid_stream_settles_partial_usage_without_a_breaker_failure() {
    let instance = test_instance("gpt4-a", "https://instance-a.invalid", 0);
    let dialect = Arc::new(HangingStreamDialect);

    let (ctx, store) = build_context(vec![instance], dialect).await;
    seed_key(&store, "sk-test-abc123", "key-1").await;

    let pipeline = fleetgate_dispatch::DispatchPipeline::new(Arc::clone(&ctx));
    let outcome = pipeline
        .handle("sk-test-abc123", &streaming_chat_request_body("gpt-4", "hello"))
        .await
        .expect("first chunk should dispatch fine");

    let mut stream = match outcome {
        fleetgate_dispatch::DispatchOutcome::Streaming { stream, .. } => stream,
        fleetgate_dispatch::DispatchOutcome::Unary { .. } => panic!("expected a streaming outcome"),
    };

    assert!(stream.next().await.is_some(), "the first chunk should forward normally");
    assert_eq!(ctx.breakers.breaker("gpt4-a").metrics().in_flight, 1);

    drop(stream);

    // Settlement on disconnect is spawned onto a detached task; give it a
    // moment to run before asserting on its effects.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        ctx.breakers.breaker("gpt4-a").metrics().in_flight,
        0,
        "the in-flight counter must close on client disconnect"
    );
    assert_eq!(
        ctx.breakers.breaker("gpt4-a").metrics().consecutive_failures,
        0,
        "a client disconnect must not count against the breaker"
    );

    let drained = ctx.settlement.run_once().await;
    assert_eq!(drained, 1, "a partial Usage record must still be settled");
}
