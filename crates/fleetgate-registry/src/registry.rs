use crate::group::LogicalModelGroup;
use crate::instance::{ModelInstance, ModelInstanceSpec};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Snapshot {
    groups: HashMap<String, Arc<LogicalModelGroup>>,
}

/// Observability summary over the current snapshot (spec.md §4.5 `Stats()`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    pub group_count: usize,
    pub total_instances: usize,
    pub enabled_instances: usize,
}

/// Loads the configured set of model instances, groups them by logical
/// model name, and exposes atomic hot-reload.
///
/// "Reloading replaces the registry atomically; in-flight requests continue
/// against their captured snapshots" (spec.md §4.5) is realized with
/// `arc_swap::ArcSwap`: a `resolve()` caller holds an owned `Vec<ModelInstance>`
/// cloned out of the snapshot that was current at call time, so a `reload`
/// racing with an in-flight request never mutates data that request is
/// using.
pub struct ModelRegistry {
    snapshot: ArcSwap<Snapshot>,
}

impl ModelRegistry {
    pub fn new(specs: Vec<ModelInstanceSpec>) -> Self {
        let registry = Self::empty();
        registry.reload(specs);
        registry
    }

    pub fn empty() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    /// Atomically replaces the whole registry from a fresh set of specs.
    pub fn reload(&self, specs: Vec<ModelInstanceSpec>) {
        let mut by_model: HashMap<String, Vec<ModelInstance>> = HashMap::new();
        for spec in specs {
            let instance = ModelInstance::from_spec(spec);
            by_model.entry(instance.logical_model.clone()).or_default().push(instance);
        }

        let groups = by_model
            .into_iter()
            .map(|(name, instances)| {
                let group = Arc::new(LogicalModelGroup::new(name.clone(), instances));
                (name, group)
            })
            .collect();

        self.snapshot.store(Arc::new(Snapshot { groups }));
    }

    /// Ordered, enabled-only instances for a logical model name (spec.md
    /// §4.5 `Resolve(name)`). Breaker-closed filtering is composed by the
    /// dispatch pipeline, the only layer holding both this registry and the
    /// breaker manager.
    pub fn resolve(&self, logical_model: &str) -> Vec<ModelInstance> {
        self.snapshot
            .load()
            .groups
            .get(logical_model)
            .map(|g| g.enabled_instances())
            .unwrap_or_default()
    }

    /// The whole group, for strategies that need the shared round-robin
    /// counter alongside the instance list (spec.md §4.5
    /// `RoundRobinCounter(name)`).
    pub fn group(&self, logical_model: &str) -> Option<Arc<LogicalModelGroup>> {
        self.snapshot.load().groups.get(logical_model).cloned()
    }

    pub fn list_all(&self) -> Vec<ModelInstance> {
        self.snapshot
            .load()
            .groups
            .values()
            .flat_map(|g| g.instances.clone())
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let snapshot = self.snapshot.load();
        let total_instances: usize = snapshot.groups.values().map(|g| g.instances.len()).sum();
        let enabled_instances: usize = snapshot
            .groups
            .values()
            .map(|g| g.instances.iter().filter(|i| i.enabled).count())
            .sum();
        RegistryStats {
            group_count: snapshot.groups.len(),
            total_instances,
            enabled_instances,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, model: &str, priority: u32, enabled: bool) -> ModelInstanceSpec {
        ModelInstanceSpec {
            id: id.to_string(),
            logical_model: model.to_string(),
            provider: "openai".to_string(),
            priority,
            weight: 1,
            endpoint: "https://example.invalid".to_string(),
            credential: "sk-test".to_string(),
            enabled,
            tokens_per_minute: None,
            requests_per_minute: None,
            prompt_price_per_1k: 0.0,
            completion_price_per_1k: 0.0,
        }
    }

    #[test]
    fn resolve_groups_by_logical_model_and_sorts_by_priority() {
        let registry = ModelRegistry::new(vec![
            spec("gpt4-b", "gpt-4", 1, true),
            spec("gpt4-a", "gpt-4", 0, true),
            spec("claude-a", "claude-3", 0, true),
        ]);

        let gpt4 = registry.resolve("gpt-4");
        assert_eq!(gpt4.len(), 2);
        assert_eq!(gpt4[0].id, "gpt4-a");
        assert_eq!(gpt4[1].id, "gpt4-b");

        assert_eq!(registry.resolve("claude-3").len(), 1);
        assert!(registry.resolve("nonexistent").is_empty());
    }

    #[test]
    fn resolve_excludes_disabled_instances() {
        let registry = ModelRegistry::new(vec![
            spec("on", "gpt-4", 0, true),
            spec("off", "gpt-4", 1, false),
        ]);
        let resolved = registry.resolve("gpt-4");
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "on");
    }

    #[test]
    fn reload_replaces_snapshot_atomically_without_affecting_captured_references() {
        let registry = ModelRegistry::new(vec![spec("v1", "gpt-4", 0, true)]);
        let captured = registry.resolve("gpt-4");
        assert_eq!(captured[0].id, "v1");

        registry.reload(vec![spec("v2", "gpt-4", 0, true)]);

        // The captured Vec from before the reload is untouched.
        assert_eq!(captured[0].id, "v1");
        // Fresh calls see the new configuration.
        assert_eq!(registry.resolve("gpt-4")[0].id, "v2");
    }

    #[test]
    fn group_exposes_shared_round_robin_counter() {
        let registry = ModelRegistry::new(vec![spec("a", "gpt-4", 0, true)]);
        let group = registry.group("gpt-4").unwrap();
        assert_eq!(group.round_robin_counter().load(std::sync::atomic::Ordering::SeqCst), 0);
        group.round_robin_counter().fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let group_again = registry.group("gpt-4").unwrap();
        assert_eq!(group_again.round_robin_counter().load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn stats_reports_totals_across_groups() {
        let registry = ModelRegistry::new(vec![
            spec("a", "gpt-4", 0, true),
            spec("b", "gpt-4", 1, false),
            spec("c", "claude-3", 0, true),
        ]);
        let stats = registry.stats();
        assert_eq!(stats.group_count, 2);
        assert_eq!(stats.total_instances, 3);
        assert_eq!(stats.enabled_instances, 2);
    }
}
