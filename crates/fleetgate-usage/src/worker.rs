use crate::config::WorkerConfig;
use crate::event::UsageEvent;
use crate::events::WorkerEvent;
use fleetgate_budget::{BudgetService, EntityKind};
use fleetgate_core::{EventListener, EventListeners, SharedStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub const QUEUE_KEY: &str = "usage:queue";
pub const DEAD_LETTER_KEY: &str = "usage:dlq";
const RECORD_TTL_SECS: u64 = 90 * 86_400;

/// Drains the durable usage queue in batches and settles each event against
/// [`BudgetService`] (spec.md §4.9).
///
/// Each event's Usage record write and its budget-counter increments are
/// treated as one unit: if either fails the whole event is retried
/// independently of the rest of the batch, up to
/// [`WorkerConfig::retry`]'s `max_attempts`, before being moved to the
/// dead-letter list. A malformed entry (cannot deserialize) cannot be
/// usefully retried and is dead-lettered immediately.
pub struct SettlementWorker {
    store: Arc<dyn SharedStore>,
    budget: Arc<BudgetService>,
    config: WorkerConfig,
    events: EventListeners<WorkerEvent>,
}

impl SettlementWorker {
    pub fn new(store: Arc<dyn SharedStore>, budget: Arc<BudgetService>, config: WorkerConfig) -> Self {
        Self {
            store,
            budget,
            config,
            events: EventListeners::new(),
        }
    }

    pub fn with_defaults(store: Arc<dyn SharedStore>, budget: Arc<BudgetService>) -> Self {
        Self::new(store, budget, WorkerConfig::default())
    }

    pub fn on_event<L>(&mut self, listener: L)
    where
        L: EventListener<WorkerEvent> + 'static,
    {
        self.events.add(listener);
    }

    /// Enqueues one event for later settlement. Producers (the dispatch
    /// pipeline) call this; it never blocks on settlement.
    pub async fn enqueue(&self, event: &UsageEvent) -> Result<(), fleetgate_core::StoreError> {
        self.store.lpush(QUEUE_KEY, event.to_json()).await
    }

    /// Drains up to `batch_size` events and settles each independently.
    /// Returns the number of raw entries popped (settled + dead-lettered).
    pub async fn run_once(&self) -> usize {
        let batch = self.store.rpop_batch(QUEUE_KEY, self.config.batch_size).await.unwrap_or_default();
        let drained = batch.len();
        for raw in batch {
            self.settle_with_retry(raw).await;
        }
        drained
    }

    /// Runs the batch-or-timeout loop until `shutdown` fires (spec.md §4.9:
    /// "pops up to batch_size events or waits up to processing_interval").
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            let pending = self.store.llen(QUEUE_KEY).await.unwrap_or(0);
            if pending == 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.processing_interval) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }

            self.run_once().await;

            if *shutdown.borrow() {
                return;
            }
        }
    }

    async fn settle_with_retry(&self, raw: String) {
        let event = match UsageEvent::from_json(&raw) {
            Ok(event) => event,
            Err(_) => {
                self.dead_letter(raw).await;
                return;
            }
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.settle(&event).await {
                Ok(()) => {
                    self.events.emit(&WorkerEvent::Settled {
                        request_id: event.request_id.clone(),
                        timestamp: Instant::now(),
                    });
                    return;
                }
                Err(_) if attempt >= self.config.retry.max_attempts => {
                    self.dead_letter(raw).await;
                    return;
                }
                Err(_) => {
                    self.events.emit(&WorkerEvent::RetryScheduled {
                        request_id: event.request_id.clone(),
                        attempt,
                        timestamp: Instant::now(),
                    });
                    tokio::time::sleep(self.config.retry.delay_for(attempt)).await;
                }
            }
        }
    }

    async fn dead_letter(&self, raw: String) {
        let request_id = UsageEvent::from_json(&raw).map(|e| e.request_id).unwrap_or_else(|_| "<malformed>".to_string());
        let _ = self.store.lpush(DEAD_LETTER_KEY, raw).await;
        self.events.emit(&WorkerEvent::DeadLettered {
            request_id,
            timestamp: Instant::now(),
        });
    }

    async fn settle(&self, event: &UsageEvent) -> Result<(), fleetgate_budget::BudgetError> {
        self.write_record(event).await?;

        if let Some(team_id) = &event.team_id {
            self.budget.apply_usage(EntityKind::Team, team_id, event.cost).await?;
        }
        if let Some(user_id) = &event.user_id {
            self.budget.apply_usage(EntityKind::User, user_id, event.cost).await?;
        }
        self.budget.apply_usage(EntityKind::Key, &event.key_id, event.cost).await?;

        let _ = self.store.publish("events:usage", event.to_json()).await;
        let _ = self
            .store
            .publish("events:budget", format!("{{\"key_id\":\"{}\",\"cost\":{}}}", event.key_id, event.cost))
            .await;

        Ok(())
    }

    async fn write_record(&self, event: &UsageEvent) -> Result<(), fleetgate_budget::BudgetError> {
        let mut fields = HashMap::new();
        fields.insert("model".to_string(), event.model.clone());
        fields.insert("instance_id".to_string(), event.instance_id.clone());
        fields.insert("key_id".to_string(), event.key_id.clone());
        fields.insert("team_id".to_string(), event.team_id.clone().unwrap_or_default());
        fields.insert("user_id".to_string(), event.user_id.clone().unwrap_or_default());
        fields.insert("prompt_tokens".to_string(), event.prompt_tokens.to_string());
        fields.insert("completion_tokens".to_string(), event.completion_tokens.to_string());
        fields.insert("cost".to_string(), event.cost.to_string());
        fields.insert("latency_ms".to_string(), event.latency_ms.to_string());
        fields.insert("cache_hit".to_string(), event.cache_hit.to_string());
        fields.insert("error".to_string(), event.error.clone().unwrap_or_default());
        fields.insert("recorded_at_ms".to_string(), event.recorded_at_ms.to_string());

        self.store
            .hset_ex(
                &format!("usage:record:{}", event.request_id),
                fields,
                std::time::Duration::from_secs(RECORD_TTL_SECS),
            )
            .await
            .map_err(fleetgate_budget::BudgetError::from)
    }
}
