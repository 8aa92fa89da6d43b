use crate::components::caldav::EventKey;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of event keys with an outstanding, not-yet-fired reminder task.
///
/// Owned by the reminders component and handed by clone to every scheduler
/// task. A key is inserted when a new event is first observed and removed by
/// the task that fires its reminder; the set never survives a restart.
#[derive(Clone, Default)]
pub struct PendingRegistry {
    inner: Arc<Mutex<HashSet<EventKey>>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, returning true if it was not present before
    pub fn insert(&self, key: EventKey) -> bool {
        self.inner.lock().expect("registry lock poisoned").insert(key)
    }

    /// Remove a key, returning true if it was present
    pub fn remove(&self, key: &EventKey) -> bool {
        self.inner.lock().expect("registry lock poisoned").remove(key)
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.inner.lock().expect("registry lock poisoned").contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn key(summary: &str, hour: u32) -> EventKey {
        EventKey {
            summary: summary.to_string(),
            start: Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn insert_deduplicates_by_key() {
        let registry = PendingRegistry::new();
        assert!(registry.insert(key("Standup", 9)));
        assert!(!registry.insert(key("Standup", 9)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn same_summary_different_start_is_a_new_key() {
        let registry = PendingRegistry::new();
        assert!(registry.insert(key("Standup", 9)));
        assert!(registry.insert(key("Standup", 10)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_reports_presence() {
        let registry = PendingRegistry::new();
        registry.insert(key("Standup", 9));
        assert!(registry.remove(&key("Standup", 9)));
        assert!(!registry.remove(&key("Standup", 9)));
        assert!(registry.is_empty());
    }

    #[test]
    fn clones_share_the_same_set() {
        let registry = PendingRegistry::new();
        let clone = registry.clone();
        registry.insert(key("Standup", 9));
        assert!(clone.contains(&key("Standup", 9)));
    }
}
