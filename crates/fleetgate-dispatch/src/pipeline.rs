//! The orchestrator that carries one request through every collaborator.
//!
//! Written as a plain async function rather than a `tower::Service` stack:
//! the admission → cache → select → invoke → settle sequence has too much
//! cross-talk (a cache hit skips invocation entirely; a streamed response
//! defers settlement past the point the HTTP layer has already started
//! forwarding bytes) to compose cleanly as nested `poll_ready`/`call`
//! layers. `DispatchPipeline` is the single place that sequence lives.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use pin_project_lite::pin_project;

use fleetgate_budget::{estimate_cost, estimate_tokens, BudgetDecision};
use fleetgate_cache::{is_cache_eligible, CacheError, Fingerprint, ResponseCacheEntry};
use fleetgate_registry::ModelInstance;
use fleetgate_retry::UpstreamErrorKind;
use fleetgate_usage::UsageEvent;

use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::principal::Principal;
use crate::provider::{ChatRequest, UnaryResponse, UpstreamByteStream};

/// The outcome of one dispatched request: either a fully buffered body or a
/// still-open byte stream the caller forwards as it arrives.
pub enum DispatchOutcome {
    Unary {
        request_id: String,
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
        cache_hit: bool,
        model: String,
        /// Wall-clock time of the actual upstream call. `None` on a cache
        /// hit, since nothing was invoked.
        upstream_latency_ms: Option<u64>,
    },
    Streaming {
        request_id: String,
        status: u16,
        stream: UpstreamByteStream,
        model: String,
    },
}

/// Carries one request from inbound credential to outbound response.
///
/// Cheap to clone: it is just a handle to the shared [`GatewayContext`], so
/// the cache-producer closure and the streaming settlement task can each
/// hold their own copy.
#[derive(Clone)]
pub struct DispatchPipeline {
    ctx: Arc<GatewayContext>,
}

impl DispatchPipeline {
    pub fn new(ctx: Arc<GatewayContext>) -> Self {
        Self { ctx }
    }

    /// The shared collaborator handle, for callers (the HTTP layer's
    /// `/v1/models` and `/ready` handlers) that need registry or health
    /// state the dispatch outcome itself doesn't carry.
    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    /// Runs the full admission-through-dispatch sequence for one inbound
    /// request. `body` is the raw (not yet deserialized) JSON payload.
    pub async fn handle(&self, raw_credential: &str, body: &[u8]) -> Result<DispatchOutcome, GatewayError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let principal = self.ctx.principals.resolve(raw_credential).await?;

        let request: ChatRequest =
            serde_json::from_slice(body).map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

        if !principal.is_model_allowed(&request.model) {
            return Err(GatewayError::Permission { model: request.model.clone() });
        }

        let average_health = self.ctx.average_health_score().await;
        if self.ctx.shedder.should_shed(average_health) {
            return Err(GatewayError::Overloaded);
        }

        self.admit(&principal, &request).await?;

        self.ctx.shedder.request_started();
        let outcome = if is_cache_eligible(request.temperature, request.stream) {
            self.handle_cacheable(&request_id, &principal, &request).await
        } else {
            self.handle_uncached(&request_id, &principal, &request).await
        };
        self.ctx.shedder.request_finished();
        outcome
    }

    /// Rate limit then budget precheck, in that order (spec.md §4): a
    /// principal over their request rate never reaches the budget store at
    /// all.
    async fn admit(&self, principal: &Principal, request: &ChatRequest) -> Result<(), GatewayError> {
        let allowed = self
            .ctx
            .rate_limiter
            .allow(
                principal.scope(),
                1,
                self.ctx.config.default_requests_per_minute,
                Duration::from_secs(60),
            )
            .await
            .unwrap_or(true);
        if !allowed {
            return Err(GatewayError::RateLimited { retry_after_secs: 60 });
        }

        let estimated_cost = self.estimate_precheck_cost(request);
        let decision = self
            .ctx
            .budget
            .check_budget_cached(principal.team_id(), principal.user_id(), principal.key_id(), estimated_cost)
            .await;
        match decision {
            BudgetDecision::Allowed => Ok(()),
            BudgetDecision::Denied { tier, remaining, .. } => Err(GatewayError::BudgetExceeded {
                tier: tier.as_str().to_string(),
                remaining,
            }),
            BudgetDecision::DeniedStoreUnavailable => Err(GatewayError::BudgetExceeded {
                tier: "unavailable".to_string(),
                remaining: 0.0,
            }),
        }
    }

    /// Pricing for the precheck comes from the highest-priority candidate
    /// currently configured for the model: instance selection itself hasn't
    /// happened yet at this point in the flow. No configured instances means
    /// no known price and a zero estimate — a request with nothing to
    /// dispatch to fails at selection regardless of what the budget check
    /// decides here.
    fn estimate_precheck_cost(&self, request: &ChatRequest) -> f64 {
        let prompt_chars: usize = request.messages.iter().map(|m| m.to_string().len()).sum();
        let (prompt_tokens, completion_tokens) =
            estimate_tokens(prompt_chars, request.max_tokens.map(|t| t as u32));
        let (prompt_price, completion_price) = self
            .ctx
            .registry
            .resolve(&request.model)
            .first()
            .map(|i| (i.prompt_price_per_1k, i.completion_price_per_1k))
            .unwrap_or((0.0, 0.0));
        estimate_cost(prompt_tokens, completion_tokens, prompt_price, completion_price)
    }

    async fn handle_cacheable(
        &self,
        request_id: &str,
        principal: &Principal,
        request: &ChatRequest,
    ) -> Result<DispatchOutcome, GatewayError> {
        let normalized = serde_json::to_string(&request.messages).unwrap_or_default();
        let fingerprint = Fingerprint::compute(principal.scope(), &request.model, &normalized);

        // The cache crate has no notion of the dispatch error taxonomy, so a
        // failure inside the producer closure is relayed through this slot
        // and a placeholder `CacheError::Producer` satisfies the closure's
        // return type; only the single-flight leader ever populates it.
        let dispatch_error: Arc<Mutex<Option<GatewayError>>> = Arc::new(Mutex::new(None));
        let error_slot = Arc::clone(&dispatch_error);
        let dispatch_latency_ms: Arc<Mutex<Option<u64>>> = Arc::new(Mutex::new(None));
        let latency_slot = Arc::clone(&dispatch_latency_ms);

        let pipeline = self.clone();
        let request_owned = request.clone();
        let principal_owned = principal.clone();
        let request_id_owned = request_id.to_string();

        let result = self
            .ctx
            .cache
            .get_or_populate(&fingerprint, move || {
                let pipeline = pipeline.clone();
                let request = request_owned.clone();
                let principal = principal_owned.clone();
                let request_id = request_id_owned.clone();
                let error_slot = Arc::clone(&error_slot);
                let latency_slot = Arc::clone(&latency_slot);
                async move {
                    match pipeline.dispatch_unary(&request).await {
                        Ok((instance, unary, elapsed)) => {
                            pipeline
                                .settle_unary(&request_id, &principal, &instance, &request, &unary, elapsed, false)
                                .await;
                            *latency_slot.lock() = Some(elapsed.as_millis() as u64);
                            Ok(ResponseCacheEntry::new(unary.status, unary.headers, unary.body.to_vec(), instance.id.clone()))
                        }
                        Err(err) => {
                            let message = err.to_string();
                            *error_slot.lock() = Some(err);
                            Err(CacheError::Producer(message))
                        }
                    }
                }
            })
            .await;

        match result {
            Ok((entry, was_cache_hit)) => {
                if was_cache_hit {
                    self.settle_cache_hit(request_id, principal, &entry.instance_id, request).await;
                }
                Ok(DispatchOutcome::Unary {
                    request_id: request_id.to_string(),
                    status: entry.status,
                    headers: entry.headers,
                    body: Bytes::from(entry.body),
                    cache_hit: was_cache_hit,
                    model: request.model.clone(),
                    upstream_latency_ms: if was_cache_hit { None } else { dispatch_latency_ms.lock().take() },
                })
            }
            Err(CacheError::Producer(_)) => Err(dispatch_error
                .lock()
                .take()
                .unwrap_or(GatewayError::Cache(CacheError::Producer("dispatch failed".to_string())))),
            Err(other) => Err(GatewayError::from(other)),
        }
    }

    async fn handle_uncached(
        &self,
        request_id: &str,
        principal: &Principal,
        request: &ChatRequest,
    ) -> Result<DispatchOutcome, GatewayError> {
        if request.stream {
            let (instance, status, stream, started) = self.dispatch_streaming(request).await?;
            let settlement = StreamSettlement {
                ctx: Arc::clone(&self.ctx),
                request_id: request_id.to_string(),
                instance_id: instance.id.clone(),
                model: request.model.clone(),
                key_id: principal.key_id().to_string(),
                team_id: principal.team_id().map(str::to_string),
                user_id: principal.user_id().map(str::to_string),
                prompt_price_per_1k: instance.prompt_price_per_1k,
                completion_price_per_1k: instance.completion_price_per_1k,
                started,
            };
            let settling = SettlingStream::new(stream, settlement);
            Ok(DispatchOutcome::Streaming {
                request_id: request_id.to_string(),
                status,
                stream: Box::pin(settling),
                model: request.model.clone(),
            })
        } else {
            let (instance, unary, elapsed) = self.dispatch_unary(request).await?;
            self.settle_unary(request_id, principal, &instance, request, &unary, elapsed, false).await;
            Ok(DispatchOutcome::Unary {
                request_id: request_id.to_string(),
                status: unary.status,
                headers: unary.headers,
                body: unary.body,
                cache_hit: false,
                model: request.model.clone(),
                upstream_latency_ms: Some(elapsed.as_millis() as u64),
            })
        }
    }

    async fn settle_unary(
        &self,
        request_id: &str,
        principal: &Principal,
        instance: &ModelInstance,
        request: &ChatRequest,
        unary: &UnaryResponse,
        elapsed: Duration,
        cache_hit: bool,
    ) {
        let usage = self.ctx.dialect.parse_usage(&unary.body);
        let cost = estimate_cost(
            usage.prompt_tokens,
            usage.completion_tokens,
            instance.prompt_price_per_1k,
            instance.completion_price_per_1k,
        );
        let event = UsageEvent {
            request_id: request_id.to_string(),
            team_id: principal.team_id().map(str::to_string),
            user_id: principal.user_id().map(str::to_string),
            key_id: principal.key_id().to_string(),
            model: request.model.clone(),
            instance_id: instance.id.clone(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cost,
            latency_ms: elapsed.as_millis() as u64,
            cache_hit,
            error: None,
            recorded_at_ms: now_ms(),
        };
        let _ = self.ctx.settlement.enqueue(&event).await;
    }

    /// Records a zero-cost Usage for a cache hit (spec.md §4.8 step 5: "On
    /// hit ... record a zero-cost Usage"). No upstream call happened, so
    /// there is nothing to attribute latency or tokens to.
    async fn settle_cache_hit(&self, request_id: &str, principal: &Principal, instance_id: &str, request: &ChatRequest) {
        let event = UsageEvent {
            request_id: request_id.to_string(),
            team_id: principal.team_id().map(str::to_string),
            user_id: principal.user_id().map(str::to_string),
            key_id: principal.key_id().to_string(),
            model: request.model.clone(),
            instance_id: instance_id.to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            cost: 0.0,
            latency_ms: 0,
            cache_hit: true,
            error: None,
            recorded_at_ms: now_ms(),
        };
        let _ = self.ctx.settlement.enqueue(&event).await;
    }

    /// Selects a candidate for `logical_model` excluding the given ids.
    /// `None` from the router (exhausted candidates or an unknown model)
    /// surfaces the same way a breaker-open selection does: no instance is
    /// currently willing to take the request.
    async fn select_open_instance(&self, logical_model: &str, excluded: &[String]) -> Result<ModelInstance, GatewayError> {
        self.ctx
            .router
            .select(logical_model, self.ctx.config.routing_strategy, excluded)
            .await
            .ok_or_else(|| GatewayError::CircuitOpen { model: logical_model.to_string() })
    }

    async fn dispatch_unary(&self, request: &ChatRequest) -> Result<(ModelInstance, UnaryResponse, Duration), GatewayError> {
        let pipeline = self.clone();
        let request = request.clone();
        self.ctx
            .retry
            .execute(gateway_error_is_retryable, move |excluded, _attempt| {
                let pipeline = pipeline.clone();
                let request = request.clone();
                let excluded = excluded.to_vec();
                async move { pipeline.attempt_unary(&request, &excluded).await }
            })
            .await
    }

    async fn attempt_unary(
        &self,
        request: &ChatRequest,
        excluded: &[String],
    ) -> Result<(String, (ModelInstance, UnaryResponse, Duration)), (String, GatewayError)> {
        let instance = self
            .select_open_instance(&request.model, excluded)
            .await
            .map_err(|e| (String::new(), e))?;

        if !self.ctx.breakers.can_request(&instance.id) {
            return Err((instance.id.clone(), GatewayError::CircuitOpen { model: request.model.clone() }));
        }

        self.ctx.breakers.in_flight_start(&instance.id);
        let wire = self.ctx.dialect.prepare(&instance.endpoint, instance.credential(), request);
        let started = Instant::now();

        match self.ctx.dialect.invoke_unary(wire).await {
            Ok(unary) if (200..300).contains(&unary.status) => {
                let elapsed = started.elapsed();
                self.ctx.breakers.record_success(&instance.id, elapsed);
                self.ctx.breakers.in_flight_end(&instance.id);
                instance.record_latency(elapsed.as_secs_f64() * 1000.0, 0.2);
                self.ctx.latency.record(&instance.id, elapsed).await;
                Ok((instance.id.clone(), (instance, unary, elapsed)))
            }
            Ok(unary) => {
                self.ctx.breakers.record_failure(&instance.id);
                self.ctx.breakers.in_flight_end(&instance.id);
                Err((
                    instance.id.clone(),
                    GatewayError::Upstream { status: unary.status, message: "upstream returned an error status".to_string() },
                ))
            }
            Err(err) => {
                self.ctx.breakers.record_failure(&instance.id);
                self.ctx.breakers.in_flight_end(&instance.id);
                Err((instance.id.clone(), classify_invoke_error(&err)))
            }
        }
    }

    async fn dispatch_streaming(
        &self,
        request: &ChatRequest,
    ) -> Result<(ModelInstance, u16, UpstreamByteStream, Instant), GatewayError> {
        let pipeline = self.clone();
        let request = request.clone();
        self.ctx
            .retry
            .execute(gateway_error_is_retryable, move |excluded, _attempt| {
                let pipeline = pipeline.clone();
                let request = request.clone();
                let excluded = excluded.to_vec();
                async move { pipeline.attempt_streaming(&request, &excluded).await }
            })
            .await
    }

    async fn attempt_streaming(
        &self,
        request: &ChatRequest,
        excluded: &[String],
    ) -> Result<(String, (ModelInstance, u16, UpstreamByteStream, Instant)), (String, GatewayError)> {
        let instance = self
            .select_open_instance(&request.model, excluded)
            .await
            .map_err(|e| (String::new(), e))?;

        if !self.ctx.breakers.can_request(&instance.id) {
            return Err((instance.id.clone(), GatewayError::CircuitOpen { model: request.model.clone() }));
        }

        self.ctx.breakers.in_flight_start(&instance.id);
        let wire = self.ctx.dialect.prepare(&instance.endpoint, instance.credential(), request);
        let started = Instant::now();

        match self.ctx.dialect.invoke_streaming(wire).await {
            Ok((status, stream)) if (200..300).contains(&status) => {
                Ok((instance.id.clone(), (instance, status, stream, started)))
            }
            Ok((status, _stream)) => {
                self.ctx.breakers.record_failure(&instance.id);
                self.ctx.breakers.in_flight_end(&instance.id);
                Err((
                    instance.id.clone(),
                    GatewayError::Upstream { status, message: "upstream returned an error status".to_string() },
                ))
            }
            Err(err) => {
                self.ctx.breakers.record_failure(&instance.id);
                self.ctx.breakers.in_flight_end(&instance.id);
                Err((instance.id.clone(), classify_invoke_error(&err)))
            }
        }
    }
}

/// Maps a transport-level failure onto the gateway's taxonomy so the retry
/// controller's `is_retryable` predicate and the eventual HTTP response can
/// both work from it.
fn classify_invoke_error(err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        return GatewayError::Timeout;
    }
    if err.is_connect() {
        return GatewayError::UpstreamRetryable(err.to_string());
    }
    if let Some(status) = err.status() {
        return GatewayError::Upstream { status: status.as_u16(), message: err.to_string() };
    }
    GatewayError::UpstreamRetryable(err.to_string())
}

fn gateway_error_is_retryable(err: &GatewayError) -> bool {
    match err {
        GatewayError::Timeout => UpstreamErrorKind::Timeout.is_retryable(),
        GatewayError::UpstreamRetryable(_) => UpstreamErrorKind::ConnectionReset.is_retryable(),
        GatewayError::Upstream { status, .. } => UpstreamErrorKind::Status(*status).is_retryable(),
        GatewayError::CircuitOpen { .. } => true,
        _ => false,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Deferred bookkeeping for one streamed response: which breaker/latency
/// cell to update and which usage event to enqueue once the stream ends.
struct StreamSettlement {
    ctx: Arc<GatewayContext>,
    request_id: String,
    instance_id: String,
    model: String,
    key_id: String,
    team_id: Option<String>,
    user_id: Option<String>,
    prompt_price_per_1k: f64,
    completion_price_per_1k: f64,
    started: Instant,
}

impl StreamSettlement {
    fn spawn_success(self, body: Vec<u8>) {
        tokio::spawn(async move {
            let elapsed = self.started.elapsed();
            self.ctx.breakers.record_success(&self.instance_id, elapsed);
            self.ctx.breakers.in_flight_end(&self.instance_id);
            self.ctx.latency.record(&self.instance_id, elapsed).await;

            let usage = self.ctx.dialect.parse_usage(&body);
            let cost = estimate_cost(
                usage.prompt_tokens,
                usage.completion_tokens,
                self.prompt_price_per_1k,
                self.completion_price_per_1k,
            );
            let event = UsageEvent {
                request_id: self.request_id,
                team_id: self.team_id,
                user_id: self.user_id,
                key_id: self.key_id,
                model: self.model,
                instance_id: self.instance_id,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                cost,
                latency_ms: elapsed.as_millis() as u64,
                cache_hit: false,
                error: None,
                recorded_at_ms: now_ms(),
            };
            let _ = self.ctx.settlement.enqueue(&event).await;
        });
    }

    fn spawn_failure(self) {
        tokio::spawn(async move {
            self.ctx.breakers.record_failure(&self.instance_id);
            self.ctx.breakers.in_flight_end(&self.instance_id);
        });
    }

    /// The client disconnected before the stream reached `Poll::Ready(None)`
    /// or an `Err` (spec.md §5 "Cancellation" / §7 `Cancelled`): the
    /// instance's health is not implicated, so no breaker failure is
    /// recorded, but the in-flight counter still needs to close and a
    /// partial Usage is still settled from whatever bytes arrived.
    fn spawn_cancelled(self, body: Vec<u8>) {
        tokio::spawn(async move {
            self.ctx.breakers.in_flight_end(&self.instance_id);

            let usage = self.ctx.dialect.parse_usage(&body);
            let cost = estimate_cost(
                usage.prompt_tokens,
                usage.completion_tokens,
                self.prompt_price_per_1k,
                self.completion_price_per_1k,
            );
            let elapsed = self.started.elapsed();
            let event = UsageEvent {
                request_id: self.request_id,
                team_id: self.team_id,
                user_id: self.user_id,
                key_id: self.key_id,
                model: self.model,
                instance_id: self.instance_id,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                cost,
                latency_ms: elapsed.as_millis() as u64,
                cache_hit: false,
                error: Some("cancelled".to_string()),
                recorded_at_ms: now_ms(),
            };
            let _ = self.ctx.settlement.enqueue(&event).await;
        });
    }
}

/// Owns the settlement handle and the bytes accumulated so far, and settles
/// cancellation on drop if nothing else already disarmed it. A plain
/// (non-pin-projected) type: `pin_project_lite` has no `#[pinned_drop]`
/// escape hatch, so `Drop` logic for a pin-projected stream has to live on
/// an ordinary field instead of on the stream struct itself.
struct CancellationGuard {
    settlement: Option<StreamSettlement>,
    accumulated: Vec<u8>,
}

impl CancellationGuard {
    fn new(settlement: StreamSettlement) -> Self {
        Self {
            settlement: Some(settlement),
            accumulated: Vec::new(),
        }
    }

    /// Takes the settlement handle so the caller can settle it itself;
    /// leaves `drop` with nothing left to do.
    fn disarm(&mut self) -> Option<StreamSettlement> {
        self.settlement.take()
    }
}

impl Drop for CancellationGuard {
    /// Only runs if `disarm` was never called — i.e. the stream was dropped
    /// before `poll_next` ever reached a terminal `Ready(None)` or
    /// `Ready(Some(Err(_)))`. That is a client disconnect mid-stream: without
    /// this, the breaker's in-flight counter incremented at selection time
    /// would never close, and no Usage at all would be recorded for an
    /// abandoned request (spec.md §7 `Cancelled`: "do not record to breaker;
    /// still record partial Usage").
    fn drop(&mut self) {
        if let Some(settlement) = self.settlement.take() {
            let body = std::mem::take(&mut self.accumulated);
            settlement.spawn_cancelled(body);
        }
    }
}

pin_project! {
    /// Forwards upstream bytes to the caller immediately; settlement runs
    /// once the inner stream ends (or errors), off the forwarding path, so
    /// a slow or abandoned client never delays bookkeeping for others.
    struct SettlingStream {
        inner: UpstreamByteStream,
        guard: CancellationGuard,
    }
}

impl SettlingStream {
    fn new(inner: UpstreamByteStream, settlement: StreamSettlement) -> Self {
        Self {
            inner,
            guard: CancellationGuard::new(settlement),
        }
    }
}

impl Stream for SettlingStream {
    type Item = Result<Bytes, reqwest::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.guard.accumulated.extend_from_slice(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(settlement) = this.guard.disarm() {
                    settlement.spawn_failure();
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if let Some(settlement) = this.guard.disarm() {
                    let body = std::mem::take(&mut this.guard.accumulated);
                    settlement.spawn_success(body);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
