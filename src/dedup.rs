use std::collections::HashSet;

/// Message ids already dispatched upon during the current bot session.
///
/// Grows without eviction while the session runs; the session resets it on
/// every start and stop.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn mark_seen(&mut self, id: &str) {
        if !self.seen.contains(id) {
            self.seen.insert(id.to_string());
        }
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_by_default() {
        let tracker = DedupTracker::new();
        assert!(!tracker.has_seen("1"));
    }

    #[test]
    fn test_mark_seen_is_idempotent() {
        let mut tracker = DedupTracker::new();
        tracker.mark_seen("1");
        tracker.mark_seen("1");
        assert!(tracker.has_seen("1"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_reset_forgets_everything() {
        let mut tracker = DedupTracker::new();
        for id in ["1", "2", "3"] {
            tracker.mark_seen(id);
        }
        tracker.reset();
        for id in ["1", "2", "3"] {
            assert!(!tracker.has_seen(id));
        }
        assert_eq!(tracker.len(), 0);
    }
}
