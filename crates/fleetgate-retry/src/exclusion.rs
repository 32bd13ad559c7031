use std::collections::HashSet;

/// Instances excluded from candidate selection on the current request's
/// retry chain, so a failing instance isn't picked again.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet(HashSet<String>);

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(&mut self, instance_id: impl Into<String>) {
        self.0.insert(instance_id.into());
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.0.contains(instance_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Snapshot of the excluded ids, for handing to a selection strategy
    /// that filters candidates by an owned `&[String]`.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_accumulate() {
        let mut set = ExclusionSet::new();
        assert!(set.is_empty());
        set.exclude("inst-1");
        set.exclude("inst-2");
        assert_eq!(set.len(), 2);
        assert!(set.contains("inst-1"));
        assert!(!set.contains("inst-3"));
    }

    #[test]
    fn to_vec_snapshots_current_members() {
        let mut set = ExclusionSet::new();
        set.exclude("inst-1");
        set.exclude("inst-2");
        let mut snapshot = set.to_vec();
        snapshot.sort();
        assert_eq!(snapshot, vec!["inst-1".to_string(), "inst-2".to_string()]);
    }
}
