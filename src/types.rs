//! Core data types for Mermaid diagrams edited on the canvas.
//!
//! This module defines the diagram model shared by the canvas, the Mermaid
//! code generator and parser, and the undo history: nodes, connections, shapes,
//! link kinds and the flow direction of the chart.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a node. This is the Mermaid node id written in the code panel.
pub type NodeId = String;

/// Unique identifier for connections. Mermaid text has no edge ids, so these only
/// live as long as the in-memory diagram.
pub type ConnectionId = Uuid;

/// Words Mermaid treats as keywords and that therefore cannot be node ids.
const RESERVED_IDS: &[&str] = &[
    "end",
    "subgraph",
    "graph",
    "flowchart",
    "style",
    "classdef",
    "class",
    "click",
    "linkstyle",
    "direction",
];

/// Returns true if `id` can be used as a Mermaid node identifier.
pub fn is_valid_node_id(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return false;
    }
    // A trailing or doubled hyphen reads as the start of a link
    if id.ends_with('-') || id.contains("--") {
        return false;
    }
    !RESERVED_IDS.contains(&id.to_ascii_lowercase().as_str())
}

/// Flow direction of a flowchart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Direction {
    /// Top to bottom (`TD` or `TB`)
    #[default]
    TopDown,
    /// Bottom to top (`BT`)
    BottomTop,
    /// Left to right (`LR`)
    LeftRight,
    /// Right to left (`RL`)
    RightLeft,
}

impl Direction {
    /// All directions, in the order they are offered in the UI.
    pub const ALL: [Direction; 4] = [
        Direction::TopDown,
        Direction::BottomTop,
        Direction::LeftRight,
        Direction::RightLeft,
    ];

    /// The Mermaid token for this direction.
    pub fn token(self) -> &'static str {
        match self {
            Direction::TopDown => "TD",
            Direction::BottomTop => "BT",
            Direction::LeftRight => "LR",
            Direction::RightLeft => "RL",
        }
    }

    /// Parses a Mermaid direction token (case-insensitive).
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "TD" | "TB" => Some(Direction::TopDown),
            "BT" => Some(Direction::BottomTop),
            "LR" => Some(Direction::LeftRight),
            "RL" => Some(Direction::RightLeft),
            _ => None,
        }
    }

    /// Whether ranks advance along the y axis.
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::TopDown | Direction::BottomTop)
    }

    /// Whether ranks advance toward negative coordinates.
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::BottomTop | Direction::RightLeft)
    }
}

/// Visual shape of a node, matching the Mermaid node syntaxes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum NodeShape {
    /// `id[label]`
    #[default]
    Rectangle,
    /// `id(label)`
    Rounded,
    /// `id([label])`
    Stadium,
    /// `id[[label]]`
    Subroutine,
    /// `id[(label)]`
    Cylinder,
    /// `id((label))`
    Circle,
    /// `id(((label)))`
    DoubleCircle,
    /// `id{label}`
    Diamond,
    /// `id{{label}}`
    Hexagon,
    /// `id[/label/]`
    Parallelogram,
    /// `id[\label\]`
    ParallelogramAlt,
    /// `id[/label\]`
    Trapezoid,
    /// `id[\label/]`
    TrapezoidAlt,
    /// `id>label]`
    Asymmetric,
}

impl NodeShape {
    /// Every shape, in palette order.
    pub const ALL: [NodeShape; 14] = [
        NodeShape::Rectangle,
        NodeShape::Rounded,
        NodeShape::Stadium,
        NodeShape::Subroutine,
        NodeShape::Cylinder,
        NodeShape::Circle,
        NodeShape::DoubleCircle,
        NodeShape::Diamond,
        NodeShape::Hexagon,
        NodeShape::Parallelogram,
        NodeShape::ParallelogramAlt,
        NodeShape::Trapezoid,
        NodeShape::TrapezoidAlt,
        NodeShape::Asymmetric,
    ];

    /// Human-readable name used in menus.
    pub fn display_name(self) -> &'static str {
        match self {
            NodeShape::Rectangle => "Rectangle",
            NodeShape::Rounded => "Rounded",
            NodeShape::Stadium => "Stadium",
            NodeShape::Subroutine => "Subroutine",
            NodeShape::Cylinder => "Database",
            NodeShape::Circle => "Circle",
            NodeShape::DoubleCircle => "Double Circle",
            NodeShape::Diamond => "Decision",
            NodeShape::Hexagon => "Hexagon",
            NodeShape::Parallelogram => "Input / Output",
            NodeShape::ParallelogramAlt => "Output / Input",
            NodeShape::Trapezoid => "Trapezoid",
            NodeShape::TrapezoidAlt => "Manual Operation",
            NodeShape::Asymmetric => "Flag",
        }
    }

    /// Opening and closing delimiters of the Mermaid syntax for this shape.
    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            NodeShape::Rectangle => ("[", "]"),
            NodeShape::Rounded => ("(", ")"),
            NodeShape::Stadium => ("([", "])"),
            NodeShape::Subroutine => ("[[", "]]"),
            NodeShape::Cylinder => ("[(", ")]"),
            NodeShape::Circle => ("((", "))"),
            NodeShape::DoubleCircle => ("(((", ")))"),
            NodeShape::Diamond => ("{", "}"),
            NodeShape::Hexagon => ("{{", "}}"),
            NodeShape::Parallelogram => ("[/", "/]"),
            NodeShape::ParallelogramAlt => ("[\\", "\\]"),
            NodeShape::Trapezoid => ("[/", "\\]"),
            NodeShape::TrapezoidAlt => ("[\\", "/]"),
            NodeShape::Asymmetric => (">", "]"),
        }
    }

    /// Formats a node declaration, e.g. `a{Is it?}`.
    ///
    /// The label is written as-is; quoting of special characters is the caller's
    /// responsibility.
    pub fn wrap(self, id: &str, label: &str) -> String {
        let (open, close) = self.delimiters();
        format!("{id}{open}{label}{close}")
    }

    /// Size of the shape on the canvas in world units.
    pub fn size(self) -> (f32, f32) {
        use crate::constants::{NODE_HEIGHT, NODE_WIDTH};
        match self {
            NodeShape::Circle | NodeShape::DoubleCircle => (NODE_HEIGHT + 20.0, NODE_HEIGHT + 20.0),
            NodeShape::Diamond => (NODE_WIDTH + 20.0, NODE_HEIGHT + 30.0),
            _ => (NODE_WIDTH, NODE_HEIGHT),
        }
    }
}

/// Kind of link between two nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum LinkKind {
    /// `-->`
    #[default]
    Arrow,
    /// `---`
    Open,
    /// `-.->`
    Dotted,
    /// `==>`
    Thick,
}

impl LinkKind {
    /// All link kinds, in the order they are offered in the UI.
    pub const ALL: [LinkKind; 4] = [
        LinkKind::Arrow,
        LinkKind::Open,
        LinkKind::Dotted,
        LinkKind::Thick,
    ];

    /// The Mermaid token for this link.
    pub fn token(self) -> &'static str {
        match self {
            LinkKind::Arrow => "-->",
            LinkKind::Open => "---",
            LinkKind::Dotted => "-.->",
            LinkKind::Thick => "==>",
        }
    }

    /// Human-readable name used in menus.
    pub fn display_name(self) -> &'static str {
        match self {
            LinkKind::Arrow => "Arrow",
            LinkKind::Open => "Open line",
            LinkKind::Dotted => "Dotted arrow",
            LinkKind::Thick => "Thick arrow",
        }
    }

    /// Whether the link is drawn with an arrowhead at its target.
    pub fn has_arrowhead(self) -> bool {
        !matches!(self, LinkKind::Open)
    }
}

/// A single node on the canvas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagramNode {
    /// Mermaid identifier, unique within the diagram
    pub id: NodeId,
    /// Text shown inside the shape
    pub label: String,
    /// Shape of the node
    pub shape: NodeShape,
    /// Centre of the node on the canvas as (x, y) world coordinates
    pub position: (f32, f32),
}

impl DiagramNode {
    /// Creates a node whose label equals its id.
    pub fn new(id: impl Into<NodeId>, shape: NodeShape, position: (f32, f32)) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            shape,
            position,
        }
    }

    /// Builder-style label override.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// A directed link between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Source node
    pub from: NodeId,
    /// Target node
    pub to: NodeId,
    /// Optional text written on the link
    #[serde(default)]
    pub label: Option<String>,
    /// Line style of the link
    #[serde(default)]
    pub kind: LinkKind,
}

impl Connection {
    /// Creates an unlabelled connection with a fresh id.
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, kind: LinkKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            to: to.into(),
            label: None,
            kind,
        }
    }

    /// Whether this connection starts or ends at `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }
}

/// A complete flowchart: the unit that is snapshotted, synced and saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Diagram {
    /// Flow direction written in the Mermaid header
    #[serde(default)]
    pub direction: Direction,
    /// Nodes in insertion order; later nodes are drawn on top
    pub nodes: IndexMap<NodeId, DiagramNode>,
    /// Connections in declaration order
    pub connections: Vec<Connection>,
}

impl Diagram {
    /// Creates an empty top-down diagram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the diagram to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a diagram from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns true if the diagram has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.get(id)
    }
}
