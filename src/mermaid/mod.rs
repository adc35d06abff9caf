//! Mermaid flowchart text: generation from a [`Diagram`](crate::types::Diagram),
//! parsing back into one, and automatic placement of nodes without positions.
//!
//! Node positions have no Mermaid syntax. They travel in a trailing comment line
//! (`%% mermaid-canvas-layout {...}`) that Mermaid itself ignores.

mod generate;
pub mod layout;
mod parse;

pub use generate::{format_label, to_mermaid};
pub use parse::{parse_mermaid, ParsedDiagram};
