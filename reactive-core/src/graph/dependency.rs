//! Dependency Graph
//!
//! Bidirectional mapping between cells and the subscribers that read them.
//! Forward edges (cell -> subscribers) drive notification; reverse edges
//! (subscriber -> cells) let a subscriber drop every edge before it re-runs.
//! Both directions are updated together so the mapping stays symmetric.
//!
//! The graph holds no execution policy: [`DependencyGraph::notify`] only
//! answers "who is affected", the runtime decides what to do with them.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use super::cell::{Cell, Key, SourceId};
use crate::reactive::SubscriberId;

/// Edges between cells and subscribers.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Forward edges, grouped by source so a dropped container can be
    /// forgotten in one step.
    subscribers: HashMap<SourceId, IndexMap<Key, IndexSet<SubscriberId>>>,

    /// Reverse edges.
    cells: HashMap<SubscriberId, IndexSet<Cell>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `subscriber` read `cell`.
    ///
    /// Returns `false` if the edge already existed.
    pub fn track(&mut self, cell: Cell, subscriber: SubscriberId) -> bool {
        let inserted = self
            .subscribers
            .entry(cell.source)
            .or_default()
            .entry(cell.key.clone())
            .or_default()
            .insert(subscriber);

        if inserted {
            self.cells.entry(subscriber).or_default().insert(cell);
        }
        inserted
    }

    /// Remove every edge of `subscriber`, in both directions.
    ///
    /// Returns the number of edges removed.
    pub fn untrack_all(&mut self, subscriber: SubscriberId) -> usize {
        let Some(cells) = self.cells.remove(&subscriber) else {
            return 0;
        };

        for cell in &cells {
            if let Some(keys) = self.subscribers.get_mut(&cell.source) {
                if let Some(subs) = keys.get_mut(&cell.key) {
                    subs.shift_remove(&subscriber);
                    if subs.is_empty() {
                        keys.shift_remove(&cell.key);
                    }
                }
                if keys.is_empty() {
                    self.subscribers.remove(&cell.source);
                }
            }
        }
        cells.len()
    }

    /// Cells `subscriber` read during its latest run.
    pub fn cells_of(&self, subscriber: SubscriberId) -> Vec<Cell> {
        self.cells
            .get(&subscriber)
            .map(|cells| cells.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Subscribers currently depending on `cell`.
    pub fn subscribers_of(&self, cell: &Cell) -> Vec<SubscriberId> {
        self.subscribers
            .get(&cell.source)
            .and_then(|keys| keys.get(&cell.key))
            .map(|subs| subs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The deduplicated set of subscribers affected by a write to `cells`,
    /// in edge-creation order.
    pub fn notify(&self, cells: &[Cell]) -> Vec<SubscriberId> {
        let mut affected = IndexSet::new();
        for cell in cells {
            if let Some(subs) = self
                .subscribers
                .get(&cell.source)
                .and_then(|keys| keys.get(&cell.key))
            {
                affected.extend(subs.iter().copied());
            }
        }
        affected.into_iter().collect()
    }

    /// Drop every cell owned by `source`.
    ///
    /// Called when a container or derived value goes away so edges never
    /// outlive the data they describe.
    pub fn forget_source(&mut self, source: SourceId) -> usize {
        let Some(keys) = self.subscribers.remove(&source) else {
            return 0;
        };

        let mut removed = 0;
        for (key, subs) in keys {
            let cell = Cell::new(source, key);
            for subscriber in subs {
                if let Some(cells) = self.cells.get_mut(&subscriber) {
                    cells.shift_remove(&cell);
                    if cells.is_empty() {
                        self.cells.remove(&subscriber);
                    }
                }
                removed += 1;
            }
        }
        removed
    }

    /// Number of cells `subscriber` depends on.
    pub fn dependency_count(&self, subscriber: SubscriberId) -> usize {
        self.cells.get(&subscriber).map_or(0, IndexSet::len)
    }

    /// Number of subscribers depending on `cell`.
    pub fn subscriber_count(&self, cell: &Cell) -> usize {
        self.subscribers
            .get(&cell.source)
            .and_then(|keys| keys.get(&cell.key))
            .map_or(0, IndexSet::len)
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.cells.values().map(IndexSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(source: SourceId, name: &str) -> Cell {
        Cell::new(source, Key::from(name))
    }

    #[test]
    fn track_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let source = SourceId::new();
        let sub = SubscriberId::new();

        assert!(graph.track(cell(source, "x"), sub));
        assert!(!graph.track(cell(source, "x"), sub));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.subscribers_of(&cell(source, "x")), vec![sub]);
    }

    #[test]
    fn untrack_all_removes_both_directions() {
        let mut graph = DependencyGraph::new();
        let source = SourceId::new();
        let sub = SubscriberId::new();
        let other = SubscriberId::new();

        graph.track(cell(source, "a"), sub);
        graph.track(cell(source, "b"), sub);
        graph.track(cell(source, "a"), other);

        assert_eq!(graph.untrack_all(sub), 2);
        assert!(graph.cells_of(sub).is_empty());
        assert_eq!(graph.subscribers_of(&cell(source, "a")), vec![other]);
        assert!(graph.subscribers_of(&cell(source, "b")).is_empty());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn notify_deduplicates_across_cells() {
        let mut graph = DependencyGraph::new();
        let source = SourceId::new();
        let first = SubscriberId::new();
        let second = SubscriberId::new();

        graph.track(cell(source, "a"), first);
        graph.track(cell(source, "b"), first);
        graph.track(cell(source, "b"), second);

        let affected = graph.notify(&[cell(source, "a"), cell(source, "b")]);
        assert_eq!(affected, vec![first, second]);
    }

    #[test]
    fn notify_unknown_cell_is_empty() {
        let graph = DependencyGraph::new();
        assert!(graph.notify(&[Cell::shape(SourceId::new())]).is_empty());
    }

    #[test]
    fn forget_source_cleans_reverse_edges() {
        let mut graph = DependencyGraph::new();
        let dropped = SourceId::new();
        let kept = SourceId::new();
        let sub = SubscriberId::new();

        graph.track(cell(dropped, "a"), sub);
        graph.track(Cell::shape(dropped), sub);
        graph.track(cell(kept, "a"), sub);

        assert_eq!(graph.forget_source(dropped), 2);
        assert_eq!(graph.cells_of(sub), vec![cell(kept, "a")]);
        assert_eq!(graph.dependency_count(sub), 1);
    }
}
