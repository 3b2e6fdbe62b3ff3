//! Most recent matches per target.
//!
//! Each entry is an immutable `Arc<[Match]>`. A save swaps the handle under
//! the write lock, and readers clone the handle under the read lock, so a
//! reader sees either the previous list or the new one and never a mix.

use crate::search::Match;
use crate::target::TargetId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Search outcome recorded for a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchState {
    /// Never searched, or cleared since.
    Unsearched,
    /// Last search produced at least one match.
    Found,
    /// Last search completed without a match.
    NotFound,
}

/// Thread-safe map from target to its last matches.
#[derive(Debug, Default)]
pub struct MatchCache {
    entries: RwLock<HashMap<TargetId, Arc<[Match]>>>,
}

impl MatchCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entry for `target`. An empty list records a completed
    /// search that found nothing.
    pub fn save(&self, target: &TargetId, matches: Vec<Match>) {
        let entry: Arc<[Match]> = matches.into();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target.clone(), entry);
    }

    /// Snapshot of the entry, empty if none.
    pub fn get(&self, target: &TargetId) -> Arc<[Match]> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Highest scoring match of the last search.
    pub fn best(&self, target: &TargetId) -> Option<Match> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .and_then(|m| m.first().cloned())
    }

    /// Returns the search state recorded for `target`.
    pub fn state(&self, target: &TargetId) -> SearchState {
        match self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
        {
            None => SearchState::Unsearched,
            Some(m) if m.is_empty() => SearchState::NotFound,
            Some(_) => SearchState::Found,
        }
    }

    /// Removes the entry; returns true if one existed.
    pub fn clear(&self, target: &TargetId) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
            .is_some()
    }

    /// Removes every entry.
    pub fn clear_all(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{MatchCache, SearchState};
    use crate::geometry::Rect;
    use crate::search::Match;
    use crate::target::TargetId;
    use std::sync::Arc;

    fn hit(target: &TargetId, x: i32, score: f32) -> Match {
        Match {
            rect: Rect::new(x, 0, 10, 10),
            score,
            target: target.clone(),
            pattern: Arc::from("p"),
        }
    }

    #[test]
    fn save_replaces_and_clear_removes() {
        let cache = MatchCache::new();
        let id = TargetId::from("button");
        assert_eq!(cache.state(&id), SearchState::Unsearched);
        assert!(cache.get(&id).is_empty());

        cache.save(&id, vec![hit(&id, 1, 0.9), hit(&id, 40, 0.8)]);
        assert_eq!(cache.get(&id).len(), 2);
        assert_eq!(cache.best(&id).unwrap().rect.x, 1);
        assert_eq!(cache.state(&id), SearchState::Found);

        cache.save(&id, Vec::new());
        assert!(cache.get(&id).is_empty());
        assert_eq!(cache.state(&id), SearchState::NotFound);
        assert!(cache.best(&id).is_none());

        assert!(cache.clear(&id));
        assert!(!cache.clear(&id));
        assert_eq!(cache.state(&id), SearchState::Unsearched);
    }

    #[test]
    fn snapshot_survives_later_save() {
        let cache = MatchCache::new();
        let id = TargetId::from("icon");
        cache.save(&id, vec![hit(&id, 5, 0.95)]);
        let snapshot = cache.get(&id);
        cache.save(&id, vec![hit(&id, 7, 0.75), hit(&id, 9, 0.72)]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].rect.x, 5);
    }

    #[test]
    fn clear_all_empties_every_entry() {
        let cache = MatchCache::new();
        let a = TargetId::from("a");
        let b = TargetId::from("b");
        cache.save(&a, vec![hit(&a, 0, 1.0)]);
        cache.save(&b, Vec::new());
        cache.clear_all();
        assert_eq!(cache.state(&a), SearchState::Unsearched);
        assert_eq!(cache.state(&b), SearchState::Unsearched);
    }
}
