//! Region dependencies between targets.
//!
//! An edge `target -> (anchor, offset)` says the target is searched in the
//! anchor's last match rectangle adjusted by the offset. Every target has at
//! most one anchor and the graph is kept acyclic at registration time, so the
//! chain above any target is a finite path.

use crate::geometry::RegionOffset;
use crate::target::{RegionDependency, TargetId};
use crate::util::GraphError;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub mod resolve;

pub use resolve::RegionResolver;

/// Thread-safe, acyclic-by-construction dependency graph.
#[derive(Debug, Default)]
pub struct RegionDependencyGraph {
    edges: RwLock<HashMap<TargetId, RegionDependency>>,
}

impl RegionDependencyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the anchor of `target`.
    ///
    /// Fails with `CyclicDependency` if `anchor` is `target` or already
    /// depends on it, directly or transitively. A failed call leaves the graph
    /// unchanged.
    pub fn add_dependency(
        &self,
        target: &TargetId,
        anchor: &TargetId,
        offset: RegionOffset,
    ) -> Result<(), GraphError> {
        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        if reaches(&edges, anchor, target) {
            return Err(GraphError::CyclicDependency {
                target: target.clone(),
                anchor: anchor.clone(),
            });
        }
        edges.insert(
            target.clone(),
            RegionDependency {
                anchor: anchor.clone(),
                offset,
            },
        );
        Ok(())
    }

    /// Removes the edge of `target`, returning it if present.
    pub fn remove_dependency(&self, target: &TargetId) -> Option<RegionDependency> {
        self.edges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
    }

    /// Returns the dependency registered for `target`.
    pub fn dependency(&self, target: &TargetId) -> Option<RegionDependency> {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .cloned()
    }

    /// Targets anchored directly on `anchor`, sorted by id.
    pub fn dependents(&self, anchor: &TargetId) -> Vec<TargetId> {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<TargetId> = edges
            .iter()
            .filter(|(_, dep)| &dep.anchor == anchor)
            .map(|(id, _)| id.clone())
            .collect();
        out.sort();
        out
    }

    /// Orders `targets` so every anchor precedes its dependents. Targets at
    /// the same chain depth keep their input order.
    pub fn search_order(&self, targets: &[TargetId]) -> Vec<TargetId> {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        let mut ordered: Vec<(usize, TargetId)> = targets
            .iter()
            .map(|t| (depth(&edges, t), t.clone()))
            .collect();
        ordered.sort_by_key(|(d, _)| *d);
        ordered.into_iter().map(|(_, t)| t).collect()
    }

    /// Returns the number of dependency edges.
    pub fn len(&self) -> usize {
        self.edges.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no dependency is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// True if following anchors from `from` arrives at `to` (or `from == to`).
fn reaches(edges: &HashMap<TargetId, RegionDependency>, from: &TargetId, to: &TargetId) -> bool {
    let mut current = from;
    for _ in 0..=edges.len() {
        if current == to {
            return true;
        }
        match edges.get(current) {
            Some(dep) => current = &dep.anchor,
            None => return false,
        }
    }
    false
}

/// Number of anchors above `target`.
fn depth(edges: &HashMap<TargetId, RegionDependency>, target: &TargetId) -> usize {
    let mut n = 0;
    let mut current = target;
    while let Some(dep) = edges.get(current) {
        n += 1;
        if n > edges.len() {
            break;
        }
        current = &dep.anchor;
    }
    n
}
