//! Snapshot-based undo/redo.
//!
//! Every mutating editor operation records a full copy of the diagram *before*
//! it runs. Undo swaps the current diagram with the newest snapshot and keeps
//! the current one on the redo stack, so undo followed by redo is exact.

use crate::constants::MAX_UNDO_HISTORY;
use crate::types::Diagram;
use std::collections::VecDeque;

/// A labelled copy of the diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Short description of the operation that followed this state, e.g. "Move nodes"
    pub label: String,
    /// The diagram before the operation
    pub diagram: Diagram,
}

/// Manages undo/redo snapshots for the editor.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: Vec<Snapshot>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    /// Creates an empty history that keeps at most `limit` undo snapshots.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Records `diagram` as the state before an operation named `label`.
    ///
    /// This clears the redo stack since a new action invalidates any previously
    /// undone actions. A state identical to the newest snapshot is not pushed
    /// again.
    pub fn checkpoint(&mut self, label: impl Into<String>, diagram: &Diagram) {
        self.redo.clear();
        if self.undo.back().is_some_and(|top| top.diagram == *diagram) {
            return;
        }
        self.undo.push_back(Snapshot {
            label: label.into(),
            diagram: diagram.clone(),
        });
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Restores the newest undo snapshot into `diagram`.
    ///
    /// # Returns
    ///
    /// The label of the undone operation, or `None` if there was nothing to undo.
    pub fn undo(&mut self, diagram: &mut Diagram) -> Option<String> {
        let snapshot = self.undo.pop_back()?;
        let current = std::mem::replace(diagram, snapshot.diagram);
        self.redo.push(Snapshot {
            label: snapshot.label.clone(),
            diagram: current,
        });
        Some(snapshot.label)
    }

    /// Re-applies the newest redo snapshot into `diagram`.
    pub fn redo(&mut self, diagram: &mut Diagram) -> Option<String> {
        let snapshot = self.redo.pop()?;
        let current = std::mem::replace(diagram, snapshot.diagram);
        self.undo.push_back(Snapshot {
            label: snapshot.label.clone(),
            diagram: current,
        });
        Some(snapshot.label)
    }

    /// Whether there is a snapshot to undo to.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether an undone snapshot can be re-applied.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Label of the operation the next undo would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.back().map(|s| s.label.as_str())
    }

    /// Label of the operation the next redo would re-apply.
    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|s| s.label.as_str())
    }

    /// Clears all undo and redo history.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Number of undo snapshots held.
    pub fn len(&self) -> usize {
        self.undo.len()
    }

    /// True when there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Maximum number of undo snapshots.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Changes the snapshot limit, dropping the oldest snapshots if needed.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeShape;

    #[test]
    fn test_undo_redo_roundtrip() {
        let mut history = History::default();
        let mut diagram = Diagram::new();

        history.checkpoint("Create node", &diagram);
        diagram.create_node(NodeShape::Rectangle, (0.0, 0.0));
        let after = diagram.clone();

        assert_eq!(history.undo(&mut diagram).as_deref(), Some("Create node"));
        assert!(diagram.is_empty());
        assert!(history.can_redo());
        assert_eq!(history.redo_label(), Some("Create node"));

        assert_eq!(history.redo(&mut diagram).as_deref(), Some("Create node"));
        assert_eq!(diagram, after);
        assert!(!history.can_redo());
        assert_eq!(history.undo_label(), Some("Create node"));
    }

    #[test]
    fn test_empty_history() {
        let mut history = History::default();
        let mut diagram = Diagram::new();
        assert!(!history.can_undo());
        assert!(history.undo(&mut diagram).is_none());
        assert!(history.redo(&mut diagram).is_none());
    }

    #[test]
    fn test_checkpoint_clears_redo() {
        let mut history = History::default();
        let mut diagram = Diagram::new();

        history.checkpoint("First", &diagram);
        diagram.create_node(NodeShape::Rectangle, (0.0, 0.0));
        history.undo(&mut diagram);
        assert!(history.can_redo());

        history.checkpoint("Second", &diagram);
        diagram.create_node(NodeShape::Circle, (0.0, 0.0));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let mut history = History::new(3);
        let mut diagram = Diagram::new();
        for i in 0..5 {
            history.checkpoint(format!("Step {i}"), &diagram);
            diagram.create_node(NodeShape::Rectangle, (i as f32, 0.0));
        }
        assert_eq!(history.len(), 3);

        let mut labels = Vec::new();
        while let Some(label) = history.undo(&mut diagram) {
            labels.push(label);
        }
        assert_eq!(labels, vec!["Step 4", "Step 3", "Step 2"]);
        // The two oldest operations can no longer be undone
        assert_eq!(diagram.nodes.len(), 2);
    }

    #[test]
    fn test_default_limit_is_fifty() {
        let mut history = History::default();
        let mut diagram = Diagram::new();
        for i in 0..60 {
            history.checkpoint("Create node", &diagram);
            diagram.create_node(NodeShape::Rectangle, (i as f32, 0.0));
        }
        assert_eq!(history.len(), MAX_UNDO_HISTORY);
    }

    #[test]
    fn test_identical_checkpoint_is_skipped() {
        let mut history = History::default();
        let diagram = Diagram::new();
        history.checkpoint("A", &diagram);
        history.checkpoint("B", &diagram);
        assert_eq!(history.len(), 1);
        assert_eq!(history.undo_label(), Some("A"));
    }

    #[test]
    fn test_set_limit_trims() {
        let mut history = History::default();
        let mut diagram = Diagram::new();
        for i in 0..10 {
            history.checkpoint("Step", &diagram);
            diagram.create_node(NodeShape::Rectangle, (i as f32, 0.0));
        }
        history.set_limit(4);
        assert_eq!(history.len(), 4);
        history.clear();
        assert!(history.is_empty());
        assert!(!history.can_redo());
    }
}
