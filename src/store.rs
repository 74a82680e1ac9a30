//! In-memory table of downloaded trajectories keyed by segment.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::trajectory::Trajectory;

/// Shared trajectory table.
///
/// Entries are `Arc`s swapped under a write lock, so a reader holds either the
/// previous or the new trajectory in full, never a partially written one.
#[derive(Debug, Default)]
pub struct TrajectoryStore {
    segments: RwLock<HashMap<String, Arc<Trajectory>>>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the trajectory for `segment`. Last writer wins.
    pub fn put(&self, segment: &str, trajectory: Trajectory) -> Option<Arc<Trajectory>> {
        let trajectory = Arc::new(trajectory);
        self.segments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(segment.to_string(), trajectory)
    }

    pub fn get(&self, segment: &str) -> Option<Arc<Trajectory>> {
        self.segments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(segment)
            .cloned()
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.segments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(segment)
    }

    pub fn remove(&self, segment: &str) -> Option<Arc<Trajectory>> {
        self.segments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(segment)
    }

    /// Stored segment names, sorted.
    pub fn segments(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .segments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.segments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Frame;

    fn trajectory(frames: usize) -> Trajectory {
        Trajectory::new(vec![Frame::identity(); frames], 10.0).unwrap()
    }

    #[test]
    fn test_put_get_replace() {
        let store = TrajectoryStore::new();
        assert!(store.is_empty());
        assert!(store.get("a").is_none());

        assert!(store.put("a", trajectory(2)).is_none());
        assert_eq!(store.get("a").unwrap().frame_count(), 2);

        let old = store.put("a", trajectory(5)).unwrap();
        assert_eq!(old.frame_count(), 2);
        assert_eq!(store.get("a").unwrap().frame_count(), 5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reader_keeps_snapshot() {
        let store = TrajectoryStore::new();
        store.put("seg", trajectory(3));
        let held = store.get("seg").unwrap();
        store.put("seg", trajectory(7));
        assert_eq!(held.frame_count(), 3);
        assert_eq!(store.get("seg").unwrap().frame_count(), 7);
    }

    #[test]
    fn test_remove_and_list() {
        let store = TrajectoryStore::new();
        store.put("b", trajectory(1));
        store.put("a", trajectory(1));
        assert_eq!(store.segments(), vec!["a".to_string(), "b".to_string()]);
        assert!(store.remove("a").is_some());
        assert!(!store.contains("a"));
        assert!(store.contains("b"));
    }

    #[test]
    fn test_concurrent_puts_never_partial() {
        let store = Arc::new(TrajectoryStore::new());
        let writers: Vec<_> = (1..=8)
            .map(|n| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.put("seg", trajectory(n));
                        let seen = store.get("seg").unwrap();
                        assert!((1..=8).contains(&seen.frame_count()));
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}
