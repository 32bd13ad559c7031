use crate::config::BudgetConfig;
use crate::decision::BudgetDecision;
use crate::error::BudgetError;
use crate::types::{BudgetCounter, EntityKind, Period};
use fleetgate_core::SharedStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Two-level budget admission and settlement against per-principal counters
/// (spec.md §4.4).
///
/// `check_budget` is the durable-truth path: it reads the raw counter,
/// performs period rollover if due, and evaluates the limit. `check_budget_cached`
/// is the hot path: it reads the 5-minute cached aggregate and only falls
/// back to `check_budget` on a cache miss or staleness.
pub struct BudgetService {
    store: Arc<dyn SharedStore>,
    config: BudgetConfig,
}

impl BudgetService {
    pub fn new(store: Arc<dyn SharedStore>, config: BudgetConfig) -> Self {
        Self { store, config }
    }

    pub fn with_defaults(store: Arc<dyn SharedStore>) -> Self {
        Self::new(store, BudgetConfig::default())
    }

    fn counter_key(kind: EntityKind, id: &str) -> String {
        format!("budget:counter:{}:{id}", kind.as_str())
    }

    fn cache_key(kind: EntityKind, id: &str) -> String {
        format!("budget:cache:{}:{id}", kind.as_str())
    }

    /// Seeds or replaces a tier's configured limit. Administration is out of
    /// scope (spec.md §1 Non-goals); this exists so a caller that already
    /// resolved a principal's configured limits can install them once.
    pub async fn configure_limit(&self, kind: EntityKind, id: &str, max: Option<f64>, period: Period) -> Result<(), BudgetError> {
        let counter = BudgetCounter {
            max,
            spend: 0.0,
            period,
            next_reset_ms: period.duration().map(|d| now_ms() + d.as_millis() as u64),
        };
        self.write_counter(kind, id, &counter).await?;
        self.refresh_cache(kind, id, &counter).await
    }

    /// Durable-truth precheck. Consults TEAM, then USER, then KEY; the first
    /// tier that would be exceeded wins (spec.md §4.4: "denial wins").
    pub async fn check_budget(&self, team_id: Option<&str>, user_id: Option<&str>, key_id: &str, estimated_cost: f64) -> BudgetDecision {
        for (kind, id) in principal_chain(team_id, user_id, key_id) {
            match self.read_counter(kind, &id).await {
                Ok(counter) => {
                    if let Some(max) = counter.max {
                        if counter.spend + estimated_cost > max {
                            return BudgetDecision::exceeded(kind, &id, max - counter.spend);
                        }
                    }
                }
                Err(_) => return BudgetDecision::DeniedStoreUnavailable,
            }
        }
        BudgetDecision::Allowed
    }

    /// Cached hot-path precheck. Falls back to [`Self::check_budget`] on the
    /// first tier whose cache entry is missing or stale.
    pub async fn check_budget_cached(&self, team_id: Option<&str>, user_id: Option<&str>, key_id: &str, estimated_cost: f64) -> BudgetDecision {
        for (kind, id) in principal_chain(team_id, user_id, key_id) {
            match self.read_cached(kind, &id).await {
                Ok(Some(cached)) => {
                    if cached.exceeded {
                        return BudgetDecision::exceeded(kind, &id, cached.available.unwrap_or(0.0));
                    }
                    if let Some(limit) = cached.limit {
                        if cached.spent + estimated_cost > limit {
                            return BudgetDecision::exceeded(kind, &id, limit - cached.spent);
                        }
                    }
                }
                Ok(None) => return self.check_budget(team_id, user_id, key_id, estimated_cost).await,
                Err(_) => return BudgetDecision::DeniedStoreUnavailable,
            }
        }
        BudgetDecision::Allowed
    }

    /// Applies settled usage to one tier's durable counter and refreshes its
    /// cache (spec.md §4.9: "atomically increments KEY / USER / TEAM
    /// `current_spend`, updates the cached counters").
    pub async fn apply_usage(&self, kind: EntityKind, id: &str, cost: f64) -> Result<(), BudgetError> {
        let mut counter = self.read_counter(kind, id).await?;
        counter.spend += cost;
        self.write_counter(kind, id, &counter).await?;
        self.refresh_cache(kind, id, &counter).await
    }

    async fn read_counter(&self, kind: EntityKind, id: &str) -> Result<BudgetCounter, BudgetError> {
        let key = Self::counter_key(kind, id);
        let Some(fields) = self.store.hgetall(&key).await? else {
            return Ok(BudgetCounter::unlimited());
        };
        let mut counter = parse_counter(&fields)?;

        if let Some(next_reset_ms) = counter.next_reset_ms {
            if now_ms() >= next_reset_ms {
                counter.spend = 0.0;
                counter.next_reset_ms = counter.period.duration().map(|d| now_ms() + d.as_millis() as u64);
                self.write_counter(kind, id, &counter).await?;
            }
        }

        Ok(counter)
    }

    async fn write_counter(&self, kind: EntityKind, id: &str, counter: &BudgetCounter) -> Result<(), BudgetError> {
        let mut fields = HashMap::new();
        fields.insert("spend".to_string(), counter.spend.to_string());
        fields.insert("period".to_string(), counter.period.as_str().to_string());
        if let Some(max) = counter.max {
            fields.insert("max".to_string(), max.to_string());
        }
        if let Some(next_reset_ms) = counter.next_reset_ms {
            fields.insert("next_reset_ms".to_string(), next_reset_ms.to_string());
        }
        self.store.hset_ex(&Self::counter_key(kind, id), fields, self.config.counter_ttl).await?;
        Ok(())
    }

    async fn refresh_cache(&self, kind: EntityKind, id: &str, counter: &BudgetCounter) -> Result<(), BudgetError> {
        let mut fields = HashMap::new();
        fields.insert("spent".to_string(), counter.spend.to_string());
        fields.insert("exceeded".to_string(), (counter.max.is_some_and(|m| counter.spend >= m)).to_string());
        if let Some(max) = counter.max {
            fields.insert("limit".to_string(), max.to_string());
            fields.insert("available".to_string(), (max - counter.spend).to_string());
        }
        self.store.hset_ex(&Self::cache_key(kind, id), fields, self.config.cache_ttl).await?;
        Ok(())
    }

    async fn read_cached(&self, kind: EntityKind, id: &str) -> Result<Option<CachedBudget>, BudgetError> {
        let Some(fields) = self.store.hgetall(&Self::cache_key(kind, id)).await? else {
            return Ok(None);
        };
        let spent: f64 = fields
            .get("spent")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| BudgetError::Malformed("cached entry missing 'spent'".to_string()))?;
        let exceeded = fields.get("exceeded").map(|v| v == "true").unwrap_or(false);
        let limit = fields.get("limit").and_then(|v| v.parse().ok());
        let available = fields.get("available").and_then(|v| v.parse().ok());
        Ok(Some(CachedBudget {
            spent,
            exceeded,
            limit,
            available,
        }))
    }
}

struct CachedBudget {
    spent: f64,
    exceeded: bool,
    limit: Option<f64>,
    available: Option<f64>,
}

fn principal_chain(team_id: Option<&str>, user_id: Option<&str>, key_id: &str) -> Vec<(EntityKind, String)> {
    let mut chain = Vec::with_capacity(3);
    if let Some(team) = team_id {
        chain.push((EntityKind::Team, team.to_string()));
    }
    if let Some(user) = user_id {
        chain.push((EntityKind::User, user.to_string()));
    }
    chain.push((EntityKind::Key, key_id.to_string()));
    chain
}

fn parse_counter(fields: &HashMap<String, String>) -> Result<BudgetCounter, BudgetError> {
    let max = fields.get("max").and_then(|v| v.parse().ok());
    let spend = fields
        .get("spend")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| BudgetError::Malformed("counter missing 'spend'".to_string()))?;
    let period = fields.get("period").map(|v| Period::parse(v)).unwrap_or(Period::None);
    let next_reset_ms = fields.get("next_reset_ms").and_then(|v| v.parse().ok());
    Ok(BudgetCounter {
        max,
        spend,
        period,
        next_reset_ms,
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as u64
}
