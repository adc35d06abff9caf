//! # Mermaid Canvas
//!
//! A visual editor for Mermaid flowcharts. Nodes are created, moved, connected
//! and restyled on a zoomable canvas while a code panel shows the equivalent
//! Mermaid `flowchart` text. Both views stay in sync:
//! - **Canvas to text**: every committed canvas change regenerates the code
//! - **Text to canvas**: code edits are parsed after a short typing pause and
//!   applied to the canvas, keeping the positions of nodes that survive
//!
//! ## Features
//! - Fourteen Mermaid node shapes and four link styles
//! - Snapshot undo/redo of every operation, including code edits
//! - Layered auto-layout in any flow direction
//! - Open and save `.mmd` files with node positions kept in a layout comment
//! - SVG export everywhere, PNG export on native builds
//! - Preferences and the working diagram persisted between runs

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connections;
pub mod constants;
pub mod editor_core;
pub mod error;
pub mod examples;
pub mod export;
pub mod geometry;
pub mod history;
pub mod mermaid;
pub mod nodes;
pub mod store;
pub mod sync;
pub mod types;
mod ui;

pub use config::EditorConfig;
pub use editor_core::{EditorCore, Selection};
pub use error::{EditorError, ExportError, ParseError, StoreError};
pub use mermaid::{parse_mermaid, to_mermaid};
pub use sync::{SyncEngine, SyncStatus};
pub use types::*;
pub use ui::EditorApp;

/// Runs the editor with default window settings.
///
/// The previous session (diagram, preferences, panel sizes) is restored from
/// eframe's storage when available.
///
/// # Returns
///
/// Returns `Ok(())` if the application runs successfully, or an `eframe::Error` if
/// initialization fails.
///
/// # Example
///
/// ```no_run
/// fn main() -> Result<(), eframe::Error> {
///     mermaid_canvas::run_app()
/// }
/// ```
#[cfg(not(target_arch = "wasm32"))]
pub fn run_app() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Mermaid Canvas",
        options,
        Box::new(|cc| Ok(Box::new(EditorApp::new(cc)))),
    )
}
