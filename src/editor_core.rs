//! Coordination of the diagram, undo history, code sync and selection.
//!
//! Every mutating operation follows the same sequence: apply any pending code
//! edit, snapshot the diagram, mutate, mark the document dirty and regenerate
//! the code. The UI only talks to the diagram through [`EditorCore`], which
//! keeps those steps from being skipped.

use crate::constants::DUPLICATE_OFFSET;
use crate::error::{EditorError, ParseError};
use crate::history::History;
use crate::mermaid::{layout, parse_mermaid, to_mermaid};
use crate::sync::{SyncAction, SyncEngine};
use crate::types::*;

/// What is currently selected. Nodes and a connection are never selected together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    nodes: Vec<NodeId>,
    connection: Option<ConnectionId>,
}

impl Selection {
    /// Selected node ids, in selection order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The selected link, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Whether the node with `id` is selected.
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n == id)
    }

    /// The node id when exactly one node is selected.
    pub fn single_node(&self) -> Option<&NodeId> {
        match self.nodes.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// True when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connection.is_none()
    }
}

/// The editable document: diagram, history, code sync and selection.
#[derive(Debug, Clone)]
pub struct EditorCore {
    diagram: Diagram,
    history: History,
    sync: SyncEngine,
    selection: Selection,
    dirty: bool,
    /// Diagram at the start of an in-progress drag
    move_origin: Option<Diagram>,
}

impl Default for EditorCore {
    fn default() -> Self {
        Self::new(Diagram::default())
    }
}

impl EditorCore {
    /// Starts editing `diagram` with empty history and a clean document.
    pub fn new(diagram: Diagram) -> Self {
        Self {
            sync: SyncEngine::new(&diagram),
            diagram,
            history: History::default(),
            selection: Selection::default(),
            dirty: false,
            move_origin: None,
        }
    }

    /// The diagram as currently drawn on the canvas.
    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// Undo and redo snapshots.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The code panel text and its parse state.
    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    /// The current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Whether the diagram changed since it was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag after a successful save.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Caps the number of undo snapshots kept.
    pub fn set_undo_limit(&mut self, limit: usize) {
        self.history.set_limit(limit);
    }

    /// Typing pause before code edits are applied.
    pub fn set_debounce_secs(&mut self, secs: f64) {
        self.sync.set_debounce_secs(secs);
    }

    /// Mermaid text for the current diagram, including the layout comment.
    pub fn mermaid_text(&mut self) -> String {
        self.flush_text();
        to_mermaid(&self.diagram)
    }

    /// Runs `op` as one undoable step named `label`.
    ///
    /// Nothing is recorded when the operation fails or leaves the diagram unchanged.
    fn mutate<T>(
        &mut self,
        label: &str,
        op: impl FnOnce(&mut Diagram) -> Result<T, EditorError>,
    ) -> Result<T, EditorError> {
        self.end_move();
        self.flush_text();
        let before = self.diagram.clone();
        let value = op(&mut self.diagram)?;
        if self.diagram != before {
            self.history.checkpoint(label, &before);
            self.dirty = true;
            self.sync.diagram_changed(&self.diagram);
            self.prune_selection();
            log::debug!("{label}");
        }
        Ok(value)
    }

    fn apply_text_diagram(&mut self, diagram: Diagram) {
        self.end_move();
        self.history.checkpoint("Edit code", &self.diagram);
        self.diagram = diagram;
        self.dirty = true;
        self.prune_selection();
    }

    fn flush_text(&mut self) {
        if let SyncAction::Apply(diagram) = self.sync.flush(&self.diagram) {
            self.apply_text_diagram(diagram);
        }
    }

    fn prune_selection(&mut self) {
        let nodes = &self.diagram.nodes;
        self.selection.nodes.retain(|id| nodes.contains_key(id));
        if let Some(id) = self.selection.connection {
            if self.diagram.connection(id).is_none() {
                self.selection.connection = None;
            }
        }
    }

    // Nodes

    /// Creates a node at `position` and selects it.
    pub fn create_node(&mut self, shape: NodeShape, position: (f32, f32)) -> NodeId {
        // Creating a node can't fail
        let id = self
            .mutate("Create node", |d| Ok(d.create_node(shape, position)))
            .unwrap_or_default();
        self.select_node(&id);
        id
    }

    /// Deletes the selected connection and nodes, with the connections touching them.
    ///
    /// Returns false when nothing was selected.
    pub fn delete_selection(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        let nodes = self.selection.nodes.clone();
        let connection = self.selection.connection;
        let result = self.mutate("Delete", |d| {
            if let Some(id) = connection {
                d.remove_connection(id);
            }
            for id in &nodes {
                d.remove_node(id);
            }
            Ok(())
        });
        self.selection = Selection::default();
        result.is_ok()
    }

    /// Starts a drag. Moves until [`end_move`](Self::end_move) form a single undo step.
    pub fn begin_move(&mut self) {
        self.flush_text();
        self.move_origin = Some(self.diagram.clone());
    }

    /// Shifts every selected node.
    ///
    /// Inside a drag this only updates positions and code; outside one it is
    /// its own undo step.
    pub fn move_selection_by(&mut self, dx: f32, dy: f32) {
        if self.selection.nodes.is_empty() || (dx == 0.0 && dy == 0.0) {
            return;
        }
        let ids = self.selection.nodes.clone();
        if self.move_origin.is_some() {
            self.diagram.translate_nodes(&ids, dx, dy);
            self.sync.diagram_changed(&self.diagram);
        } else {
            let _ = self.mutate("Move nodes", |d| {
                d.translate_nodes(&ids, dx, dy);
                Ok(())
            });
        }
    }

    /// Ends a drag, recording one checkpoint if anything moved.
    ///
    /// Any other edit or history step ends an open drag first.
    pub fn end_move(&mut self) {
        let Some(origin) = self.move_origin.take() else {
            return;
        };
        if origin != self.diagram {
            self.history.checkpoint("Move nodes", &origin);
            self.dirty = true;
        }
    }

    /// Whether a drag started by [`begin_move`](Self::begin_move) is open.
    pub fn is_moving(&self) -> bool {
        self.move_origin.is_some()
    }

    /// Replaces a node label as one undo step.
    pub fn set_label(&mut self, node_id: &str, label: &str) -> Result<(), EditorError> {
        self.mutate("Edit label", |d| d.set_node_label(node_id, label))
    }

    /// Changes a node shape as one undo step.
    pub fn set_shape(&mut self, node_id: &str, shape: NodeShape) -> Result<(), EditorError> {
        self.mutate("Change shape", |d| d.set_node_shape(node_id, shape))
    }

    /// Renames a node, keeping it selected under its new id.
    pub fn rename_node(&mut self, old_id: &str, new_id: &str) -> Result<(), EditorError> {
        let new_id = new_id.trim();
        // The selection must name the new id before pruning runs
        let previous = self.selection.nodes.clone();
        for id in &mut self.selection.nodes {
            if id == old_id {
                *id = new_id.to_string();
            }
        }
        let result = self.mutate("Rename node", |d| d.rename_node(old_id, new_id));
        if result.is_err() {
            self.selection.nodes = previous;
        }
        result
    }

    /// Copies the selected nodes (and the links between them) and selects the copies.
    pub fn duplicate_selection(&mut self) -> Vec<NodeId> {
        if self.selection.nodes.is_empty() {
            return Vec::new();
        }
        let ids = self.selection.nodes.clone();
        let copies = self
            .mutate("Duplicate", |d| Ok(d.duplicate_nodes(&ids, DUPLICATE_OFFSET)))
            .unwrap_or_default();
        self.select_nodes(copies.clone());
        copies
    }

    // Connections

    /// Connects two nodes and selects the new connection.
    pub fn connect(&mut self, from: &str, to: &str, kind: LinkKind) -> Result<ConnectionId, EditorError> {
        let id = self.mutate("Connect nodes", |d| d.add_connection(from, to, kind))?;
        self.select_connection(id);
        Ok(id)
    }

    /// `None` or an empty label removes it.
    pub fn set_connection_label(&mut self, id: ConnectionId, label: Option<&str>) -> Result<(), EditorError> {
        self.mutate("Edit link label", |d| d.set_connection_label(id, label))
    }

    /// Changes the link style: arrow, open, dotted or thick.
    pub fn set_connection_kind(&mut self, id: ConnectionId, kind: LinkKind) -> Result<(), EditorError> {
        self.mutate("Change link style", |d| d.set_connection_kind(id, kind))
    }

    /// Swaps the endpoints of a link.
    pub fn reverse_connection(&mut self, id: ConnectionId) -> Result<(), EditorError> {
        self.mutate("Reverse link", |d| d.reverse_connection(id))
    }

    // Diagram

    /// Changes the flow direction. Node positions are kept.
    pub fn set_direction(&mut self, direction: Direction) {
        let _ = self.mutate("Change direction", |d| {
            d.direction = direction;
            Ok(())
        });
    }

    /// Re-arranges every node in ranks along the flow direction.
    pub fn auto_layout(&mut self) {
        let _ = self.mutate("Auto layout", |d| {
            layout::apply_layered_layout(d);
            Ok(())
        });
    }

    // History

    /// Reverts the last operation, returning its label.
    pub fn undo(&mut self) -> Option<String> {
        self.end_move();
        self.flush_text();
        let label = self.history.undo(&mut self.diagram)?;
        self.after_history_step();
        Some(label)
    }

    /// Re-applies the last undone operation, returning its label.
    pub fn redo(&mut self) -> Option<String> {
        self.end_move();
        self.flush_text();
        let label = self.history.redo(&mut self.diagram)?;
        self.after_history_step();
        Some(label)
    }

    fn after_history_step(&mut self) {
        self.dirty = true;
        self.sync.diagram_changed(&self.diagram);
        self.prune_selection();
    }

    // Code panel

    /// Records an edit of the Mermaid code made at time `now` (seconds).
    pub fn text_edited(&mut self, text: String, now: f64) {
        self.sync.text_edited(text, now);
    }

    /// Applies a debounced code edit if one is due. Returns true if the diagram changed.
    pub fn tick(&mut self, now: f64) -> bool {
        match self.sync.poll(now, &self.diagram) {
            SyncAction::Apply(diagram) => {
                self.apply_text_diagram(diagram);
                true
            }
            SyncAction::None | SyncAction::Invalid => false,
        }
    }

    // Selection

    /// Selects a single node, replacing the selection.
    pub fn select_node(&mut self, id: &str) {
        if !self.diagram.nodes.contains_key(id) {
            return;
        }
        self.selection = Selection {
            nodes: vec![id.to_string()],
            connection: None,
        };
    }

    /// Adds or removes a node from the selection.
    pub fn toggle_node(&mut self, id: &str) {
        self.selection.connection = None;
        if let Some(pos) = self.selection.nodes.iter().position(|n| n == id) {
            self.selection.nodes.remove(pos);
        } else if self.diagram.nodes.contains_key(id) {
            self.selection.nodes.push(id.to_string());
        }
    }

    /// Selects a single link, clearing any node selection.
    pub fn select_connection(&mut self, id: ConnectionId) {
        if self.diagram.connection(id).is_none() {
            return;
        }
        self.selection = Selection {
            nodes: Vec::new(),
            connection: Some(id),
        };
    }

    /// Replaces the node selection. Unknown and repeated ids are dropped.
    pub fn select_nodes(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let mut nodes: Vec<NodeId> = Vec::new();
        for id in ids {
            if self.diagram.nodes.contains_key(&id) && !nodes.contains(&id) {
                nodes.push(id);
            }
        }
        self.selection = Selection {
            nodes,
            connection: None,
        };
    }

    /// Adds nodes to the selection, e.g. from a Shift-marquee.
    pub fn extend_selection(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let current = self.selection.nodes.clone();
        self.select_nodes(current.into_iter().chain(ids));
    }

    /// Selects every node.
    pub fn select_all(&mut self) {
        let ids: Vec<NodeId> = self.diagram.nodes.keys().cloned().collect();
        self.select_nodes(ids);
    }

    /// Deselects everything.
    pub fn clear_selection(&mut self) {
        self.selection = Selection::default();
    }

    /// Shorthand for `selection().nodes()`.
    pub fn selected_nodes(&self) -> &[NodeId] {
        self.selection.nodes()
    }

    /// Shorthand for `selection().connection()`.
    pub fn selected_connection(&self) -> Option<ConnectionId> {
        self.selection.connection()
    }

    // Documents

    /// Starts an empty document, discarding history.
    pub fn new_diagram(&mut self) {
        self.load_diagram(Diagram::new());
    }

    /// Replaces the document, discarding history and any pending code edit.
    pub fn load_diagram(&mut self, diagram: Diagram) {
        self.diagram = diagram;
        self.history.clear();
        self.sync.reset(&self.diagram);
        self.selection = Selection::default();
        self.move_origin = None;
        self.dirty = false;
    }

    /// Loads Mermaid text as a new document, keeping the text as written.
    pub fn load_mermaid(&mut self, text: &str) -> Result<(), ParseError> {
        let diagram = parse_mermaid(text)?.into_diagram(None);
        self.load_diagram(diagram);
        self.sync.adopt(text.to_string(), &self.diagram);
        Ok(())
    }
}
