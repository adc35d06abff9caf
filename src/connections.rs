//! Connection management: linking nodes and editing the links between them.

use crate::error::EditorError;
use crate::types::*;

impl Diagram {
    /// Adds a connection between two existing nodes.
    ///
    /// # Returns
    ///
    /// The id of the new connection, or an error if either node doesn't exist,
    /// the nodes are the same, or an identical connection is already present.
    pub fn add_connection(
        &mut self,
        from: &str,
        to: &str,
        kind: LinkKind,
    ) -> Result<ConnectionId, EditorError> {
        if !self.nodes.contains_key(from) {
            return Err(EditorError::UnknownNode(from.to_string()));
        }
        if !self.nodes.contains_key(to) {
            return Err(EditorError::UnknownNode(to.to_string()));
        }
        if from == to {
            return Err(EditorError::SelfConnection(from.to_string()));
        }
        let exists = self
            .connections
            .iter()
            .any(|c| c.from == from && c.to == to && c.kind == kind);
        if exists {
            return Err(EditorError::DuplicateConnection {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let connection = Connection::new(from, to, kind);
        let id = connection.id;
        self.connections.push(connection);
        Ok(id)
    }

    /// Removes a connection.
    ///
    /// # Returns
    ///
    /// The index the connection occupied and the connection itself.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<(usize, Connection)> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        Some((index, self.connections.remove(index)))
    }

    /// Looks up a connection by id.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut Connection, EditorError> {
        self.connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(EditorError::UnknownConnection(id))
    }

    /// Sets or clears the text on a connection. Blank labels clear it.
    pub fn set_connection_label(
        &mut self,
        id: ConnectionId,
        label: Option<&str>,
    ) -> Result<(), EditorError> {
        let connection = self.connection_mut(id)?;
        connection.label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);
        Ok(())
    }

    /// Changes the line style of a connection.
    pub fn set_connection_kind(&mut self, id: ConnectionId, kind: LinkKind) -> Result<(), EditorError> {
        self.connection_mut(id)?.kind = kind;
        Ok(())
    }

    /// Swaps the source and target of a connection.
    pub fn reverse_connection(&mut self, id: ConnectionId) -> Result<(), EditorError> {
        let connection = self.connection_mut(id)?;
        std::mem::swap(&mut connection.from, &mut connection.to);
        Ok(())
    }

    /// All connections that start or end at `node_id`.
    pub fn connections_of<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.touches(node_id))
    }
}
