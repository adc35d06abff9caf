//! Shared application-wide constants.
//! Centralizes tweakable values used across the model, rendering and interactions.

// Node dimensions
/// Default node width in world units.
pub const NODE_WIDTH: f32 = 120.0;
/// Default node height in world units.
pub const NODE_HEIGHT: f32 = 56.0;
/// Corner radius for rounded node shapes (in world units).
pub const NODE_CORNER_RADIUS: f32 = 10.0;

// Layout
/// Distance between consecutive ranks along the flow axis.
pub const RANK_SPACING: f32 = 140.0;
/// Distance between neighbouring nodes within a rank.
pub const NODE_SPACING: f32 = 170.0;
/// Offset applied to duplicated nodes.
pub const DUPLICATE_OFFSET: (f32, f32) = (30.0, 30.0);

// Connections
/// Minimum distance the Bezier control points are pushed out from their anchors.
pub const MIN_CONTROL_DISTANCE: f32 = 40.0;
/// Fraction of the axis distance used for the Bezier control points.
pub const CONTROL_DISTANCE_RATIO: f32 = 0.4;
/// Number of segments used when flattening a Bezier path.
pub const BEZIER_SAMPLES: usize = 24;

// Grid/drawing
/// Grid cell size in world units.
pub const GRID_SIZE: f32 = 20.0;

// Canvas interactions
/// Click threshold in world units used for distinguishing click vs drag and for connection hits.
pub const CLICK_THRESHOLD: f32 = 8.0;
/// Minimum canvas zoom factor.
pub const MIN_ZOOM: f32 = 0.25;
/// Maximum canvas zoom factor.
pub const MAX_ZOOM: f32 = 5.0;

// Undo/redo
/// Maximum number of undo snapshots to retain.
pub const MAX_UNDO_HISTORY: usize = 50;

// Code sync
/// Seconds of inactivity after a code edit before it is applied to the canvas.
pub const SYNC_DEBOUNCE_SECS: f64 = 0.4;
/// Prefix of the comment line that stores node positions in Mermaid text.
pub const LAYOUT_COMMENT_PREFIX: &str = "%% mermaid-canvas-layout";

// Persistence
/// Key under which the app state is stored by eframe.
pub const APP_STATE_KEY: &str = "app_state";
