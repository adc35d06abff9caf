//! Error types for diagram editing, Mermaid parsing and the preference store.

use crate::types::{ConnectionId, NodeId};

/// Errors returned by node and connection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    /// No node with this id
    #[error("Node '{0}' does not exist")]
    UnknownNode(NodeId),
    /// Not usable as a Mermaid node id
    #[error("'{0}' is not a valid Mermaid node id")]
    InvalidNodeId(String),
    /// The id is taken by another node
    #[error("A node with id '{0}' already exists")]
    DuplicateNodeId(NodeId),
    /// A link from a node to itself
    #[error("Node '{0}' cannot connect to itself")]
    SelfConnection(NodeId),
    /// Same endpoints and link kind as an existing connection
    #[error("Connection from '{from}' to '{to}' already exists")]
    DuplicateConnection {
        /// Source node
        from: NodeId,
        /// Target node
        to: NodeId,
    },
    /// No connection with this id
    #[error("Connection {0} does not exist")]
    UnknownConnection(ConnectionId),
}

/// A syntax error in Mermaid text, with the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// What was wrong
    pub message: String,
}

impl ParseError {
    /// Error on `line` (1-based).
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Errors returned by [`crate::store::StateStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A path with an empty segment, such as `"a..b"`
    #[error("empty state path")]
    EmptyPath,
    /// A non-object value at the first path blocks writing the second
    #[error("'{0}' is not an object and cannot hold '{1}'")]
    NotAnObject(String, String),
    /// The value could not be converted to JSON
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while rasterising an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The generated SVG failed to load
    #[cfg(not(target_arch = "wasm32"))]
    #[error("invalid SVG: {0}")]
    Svg(#[from] usvg::Error),
    /// Width and height of an image too large or empty to allocate
    #[error("cannot allocate a {0}x{1} image")]
    Pixmap(u32, u32),
    /// PNG encoder message
    #[error("PNG encoding failed: {0}")]
    Encode(String),
    /// Writing the file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EditorError::UnknownNode("a".into()).to_string(),
            "Node 'a' does not exist"
        );
        assert_eq!(
            EditorError::DuplicateConnection {
                from: "a".into(),
                to: "b".into()
            }
            .to_string(),
            "Connection from 'a' to 'b' already exists"
        );
        assert_eq!(
            ParseError::new(3, "unexpected token").to_string(),
            "line 3: unexpected token"
        );
    }
}
