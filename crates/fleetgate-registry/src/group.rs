use crate::instance::ModelInstance;
use std::sync::atomic::AtomicUsize;

/// The set of instances sharing a logical model name (spec.md §3), sorted
/// by priority ascending, with one monotonic round-robin counter shared by
/// every strategy that cycles through this group.
pub struct LogicalModelGroup {
    pub name: String,
    pub instances: Vec<ModelInstance>,
    round_robin: AtomicUsize,
}

impl LogicalModelGroup {
    pub fn new(name: String, mut instances: Vec<ModelInstance>) -> Self {
        instances.sort_by_key(|i| i.priority);
        Self {
            name,
            instances,
            round_robin: AtomicUsize::new(0),
        }
    }

    pub fn enabled_instances(&self) -> Vec<ModelInstance> {
        self.instances.iter().filter(|i| i.enabled).cloned().collect()
    }

    pub fn round_robin_counter(&self) -> &AtomicUsize {
        &self.round_robin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instances_are_sorted_by_priority_ascending() {
        let group = LogicalModelGroup::new(
            "gpt-4".to_string(),
            vec![
                ModelInstance::for_test("b", "gpt-4", 2, 1),
                ModelInstance::for_test("a", "gpt-4", 0, 1),
                ModelInstance::for_test("c", "gpt-4", 1, 1),
            ],
        );
        let ids: Vec<&str> = group.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn enabled_instances_filters_disabled() {
        let mut disabled = ModelInstance::for_test("x", "gpt-4", 0, 1);
        disabled.enabled = false;
        let group = LogicalModelGroup::new(
            "gpt-4".to_string(),
            vec![disabled, ModelInstance::for_test("y", "gpt-4", 1, 1)],
        );
        let enabled = group.enabled_instances();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "y");
    }
}
