//! Node management: creating, removing, moving, relabelling and renaming nodes.
//!
//! All operations keep two invariants: node ids are unique valid Mermaid
//! identifiers, and every connection references nodes that exist.

use crate::error::EditorError;
use crate::types::*;
use std::collections::HashMap;

impl Diagram {
    /// Returns the smallest `nodeN` id (N >= 1) not yet used in the diagram.
    pub fn next_node_id(&self) -> NodeId {
        (1..)
            .map(|n| format!("node{n}"))
            .find(|id| !self.nodes.contains_key(id))
            .unwrap_or_default()
    }

    /// Creates a node with a fresh id at the given position.
    ///
    /// # Returns
    ///
    /// The id of the new node. Its label is initially equal to the id.
    pub fn create_node(&mut self, shape: NodeShape, position: (f32, f32)) -> NodeId {
        let id = self.next_node_id();
        self.nodes
            .insert(id.clone(), DiagramNode::new(id.clone(), shape, position));
        id
    }

    /// Inserts a fully specified node.
    ///
    /// Fails if the id is not a valid Mermaid identifier or is already taken.
    pub fn insert_node(&mut self, node: DiagramNode) -> Result<(), EditorError> {
        if !is_valid_node_id(&node.id) {
            return Err(EditorError::InvalidNodeId(node.id));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(EditorError::DuplicateNodeId(node.id));
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Removes a node and every connection touching it.
    ///
    /// # Returns
    ///
    /// The removed node and connections, or `None` if the node didn't exist.
    pub fn remove_node(&mut self, node_id: &str) -> Option<(DiagramNode, Vec<Connection>)> {
        let node = self.nodes.shift_remove(node_id)?;
        let mut removed = Vec::new();
        self.connections.retain(|conn| {
            if conn.touches(node_id) {
                removed.push(conn.clone());
                false
            } else {
                true
            }
        });
        Some((node, removed))
    }

    /// Moves a node's centre to `position`. Returns false for unknown nodes.
    pub fn move_node(&mut self, node_id: &str, position: (f32, f32)) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Shifts every listed node by (dx, dy). Unknown ids are ignored.
    pub fn translate_nodes(&mut self, ids: &[NodeId], dx: f32, dy: f32) {
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id) {
                node.position.0 += dx;
                node.position.1 += dy;
            }
        }
    }

    /// Replaces the label of a node.
    pub fn set_node_label(&mut self, node_id: &str, label: &str) -> Result<(), EditorError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| EditorError::UnknownNode(node_id.to_string()))?;
        node.label = label.to_string();
        Ok(())
    }

    /// Replaces the shape of a node.
    pub fn set_node_shape(&mut self, node_id: &str, shape: NodeShape) -> Result<(), EditorError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| EditorError::UnknownNode(node_id.to_string()))?;
        node.shape = shape;
        Ok(())
    }

    /// Changes the Mermaid id of a node, rewriting connection endpoints.
    ///
    /// The node keeps its position in the declaration order.
    pub fn rename_node(&mut self, old_id: &str, new_id: &str) -> Result<(), EditorError> {
        if old_id == new_id {
            return Ok(());
        }
        if !is_valid_node_id(new_id) {
            return Err(EditorError::InvalidNodeId(new_id.to_string()));
        }
        if self.nodes.contains_key(new_id) {
            return Err(EditorError::DuplicateNodeId(new_id.to_string()));
        }
        let index = self
            .nodes
            .get_index_of(old_id)
            .ok_or_else(|| EditorError::UnknownNode(old_id.to_string()))?;
        let Some(mut node) = self.nodes.shift_remove(old_id) else {
            return Err(EditorError::UnknownNode(old_id.to_string()));
        };

        // Labels that merely mirrored the old id follow the rename
        if node.label == old_id {
            node.label = new_id.to_string();
        }
        node.id = new_id.to_string();
        self.nodes.shift_insert(index, new_id.to_string(), node);

        for conn in &mut self.connections {
            if conn.from == old_id {
                conn.from = new_id.to_string();
            }
            if conn.to == old_id {
                conn.to = new_id.to_string();
            }
        }
        Ok(())
    }

    /// Copies the listed nodes, and the connections running between them.
    ///
    /// # Returns
    ///
    /// The ids of the copies, in the same order as `ids`.
    pub fn duplicate_nodes(&mut self, ids: &[NodeId], offset: (f32, f32)) -> Vec<NodeId> {
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        let mut created = Vec::new();

        for id in ids {
            let Some(original) = self.nodes.get(id).cloned() else {
                continue;
            };
            if mapping.contains_key(id) {
                continue;
            }
            let new_id = self.next_node_id();
            let label = if original.label == original.id {
                new_id.clone()
            } else {
                original.label.clone()
            };
            let copy = DiagramNode {
                id: new_id.clone(),
                label,
                shape: original.shape,
                position: (
                    original.position.0 + offset.0,
                    original.position.1 + offset.1,
                ),
            };
            self.nodes.insert(new_id.clone(), copy);
            mapping.insert(id.clone(), new_id.clone());
            created.push(new_id);
        }

        let copies: Vec<Connection> = self
            .connections
            .iter()
            .filter_map(|conn| {
                let from = mapping.get(&conn.from)?;
                let to = mapping.get(&conn.to)?;
                let mut copy = Connection::new(from.clone(), to.clone(), conn.kind);
                copy.label = conn.label.clone();
                Some(copy)
            })
            .collect();
        self.connections.extend(copies);

        created
    }
}
