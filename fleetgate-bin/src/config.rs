//! Process configuration: loaded once at startup from a TOML file plus
//! environment overrides (SPEC_FULL.md §1 ambient stack; spec.md §6
//! "Configuration surface").
//!
//! Deliberately hand-rolled `toml` + `serde` rather than a config-merging
//! crate (`figment`, `config`): the teacher carries no such dependency, and
//! the surface here is small enough that a plain `Deserialize` plus a
//! handful of `FLEETGATE_*` environment overrides covers it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use fleetgate_registry::ModelInstanceSpec;

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_routing_strategy() -> String {
    "priority".to_string()
}

fn default_requests_per_minute() -> u64 {
    600
}

fn default_health_floor() -> f64 {
    50.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub router: RouterSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub ratelimit: RateLimitSection,

    #[serde(default)]
    pub latency: LatencySection,

    #[serde(default)]
    pub worker: WorkerSection,

    #[serde(default)]
    pub model_list: Vec<ModelInstanceSpec>,

    /// Seed API key records for standalone/dev operation. Administration
    /// (issuing, rotating, revoking keys at runtime) is out of scope
    /// (spec.md §1 Non-goals); this is only startup bootstrap data, the
    /// same role `model_list` plays for instances.
    #[serde(default)]
    pub key_list: Vec<ApiKeySeed>,

    #[serde(default = "default_requests_per_minute")]
    pub default_requests_per_minute: u64,

    #[serde(default = "default_health_floor")]
    pub health_floor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySeed {
    pub credential: String,
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub allowed_models: Vec<String>,
    #[serde(default)]
    pub blocked_models: Vec<String>,
    #[serde(default)]
    pub budget_max: Option<f64>,
    #[serde(default = "default_period")]
    pub budget_period: String,
}

fn default_period() -> String {
    "monthly".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_routing_strategy")]
    pub strategy: String,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,
    #[serde(default = "default_slow_ms")]
    pub slow_ms: u64,
    #[serde(default = "default_slow_limit")]
    pub slow_limit: usize,
    #[serde(default)]
    pub retry: RetrySection,
}

fn default_cooldown_ms() -> u64 {
    30_000
}
fn default_failure_threshold() -> usize {
    5
}
fn default_slow_ms() -> u64 {
    2_000
}
fn default_slow_limit() -> usize {
    10
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            strategy: default_routing_strategy(),
            cooldown_ms: default_cooldown_ms(),
            failure_threshold: default_failure_threshold(),
            slow_ms: default_slow_ms(),
            slow_limit: default_slow_limit(),
            retry: RetrySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_attempts() -> usize {
    3
}
fn default_initial_ms() -> u64 {
    1_000
}
fn default_max_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> bool {
    true
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_s")]
    pub ttl_s: u64,
    /// Accepted for configuration-surface parity with spec.md §6; the
    /// in-process cache has no fixed-capacity eviction policy to bound
    /// (entries expire by TTL only), so this is currently unused. Noted in
    /// DESIGN.md rather than silently dropped.
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

fn default_true() -> bool {
    true
}
fn default_cache_ttl_s() -> u64 {
    300
}
fn default_cache_max_size() -> usize {
    10_000
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_s: default_cache_ttl_s(),
            max_size: default_cache_max_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_window_s")]
    pub window_s: u64,
    #[serde(default = "default_ratelimit_mode")]
    pub mode: String,
}

fn default_window_s() -> u64 {
    60
}
fn default_ratelimit_mode() -> String {
    "sliding".to_string()
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            window_s: default_window_s(),
            mode: default_ratelimit_mode(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatencySection {
    #[serde(default = "default_latency_window_s")]
    pub window_s: u64,
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

fn default_latency_window_s() -> u64 {
    300
}
fn default_max_samples() -> usize {
    1000
}

impl Default for LatencySection {
    fn default() -> Self {
        Self {
            window_s: default_latency_window_s(),
            max_samples: default_max_samples(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_worker_max_retries")]
    pub max_retries: usize,
}

fn default_batch_size() -> usize {
    50
}
fn default_interval_s() -> u64 {
    30
}
fn default_worker_max_retries() -> usize {
    3
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_s: default_interval_s(),
            max_retries: default_worker_max_retries(),
        }
    }
}

impl RouterSection {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn slow_call_duration(&self) -> Duration {
        Duration::from_millis(self.slow_ms)
    }
}

impl RetrySection {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

impl GatewayConfig {
    /// Loads `path` as TOML, then applies a small set of `FLEETGATE_*`
    /// environment overrides on top (listen address and strategy only —
    /// the rest of the surface is either structural (`model_list`) or rare
    /// enough to edit in the file directly).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_string(), e.to_string()))?;
        let mut config: GatewayConfig = toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("FLEETGATE_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(strategy) = std::env::var("FLEETGATE_ROUTER_STRATEGY") {
            self.router.strategy = strategy;
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::Parse(format!("invalid listen_addr '{}'", self.listen_addr)))
    }
}

/// Fields a seeded key record contributes to the shared store's
/// `principal:key:<hash>` hash, alongside the credential's own derived key.
impl ApiKeySeed {
    pub fn to_store_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        fields.insert("id".to_string(), self.id.clone());
        fields.insert("enabled".to_string(), "true".to_string());
        if let Some(user_id) = &self.user_id {
            fields.insert("user_id".to_string(), user_id.clone());
        }
        if let Some(team_id) = &self.team_id {
            fields.insert("team_id".to_string(), team_id.clone());
        }
        if !self.allowed_models.is_empty() {
            fields.insert("allowed_models".to_string(), self.allowed_models.join(","));
        }
        if !self.blocked_models.is_empty() {
            fields.insert("blocked_models".to_string(), self.blocked_models.join(","));
        }
        fields
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    Read(String, String),
    #[error("failed to parse config: {0}")]
    Parse(String),
}
