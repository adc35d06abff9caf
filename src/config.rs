//! Editor preferences read from the persisted [`StateStore`].

use crate::constants::{GRID_SIZE, MAX_UNDO_HISTORY, SYNC_DEBOUNCE_SECS};
use crate::error::StoreError;
use crate::store::StateStore;

/// Store path of [`EditorConfig::debounce_secs`].
pub const DEBOUNCE_PATH: &str = "sync.debounce_secs";
/// Store path of [`EditorConfig::grid_size`].
pub const GRID_SIZE_PATH: &str = "canvas.grid_size";
/// Store path of [`EditorConfig::snap_to_grid`].
pub const SNAP_PATH: &str = "canvas.snap_to_grid";
/// Store path of [`EditorConfig::show_grid`].
pub const SHOW_GRID_PATH: &str = "canvas.show_grid";
/// Store path of [`EditorConfig::undo_limit`].
pub const UNDO_LIMIT_PATH: &str = "history.limit";
/// Store path of [`EditorConfig::dark_mode`].
pub const DARK_MODE_PATH: &str = "ui.dark_mode";
/// Store path of [`EditorConfig::show_code_panel`].
pub const CODE_PANEL_PATH: &str = "ui.show_code_panel";

/// User-tunable settings. Missing or malformed keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Seconds of typing inactivity before the code panel is applied
    pub debounce_secs: f64,
    /// Grid spacing in world units
    pub grid_size: f32,
    /// Whether dragged nodes snap to the grid without holding Shift
    pub snap_to_grid: bool,
    /// Draw the background grid
    pub show_grid: bool,
    /// Maximum number of undo snapshots kept
    pub undo_limit: usize,
    /// Use the dark egui theme
    pub dark_mode: bool,
    /// Show the Mermaid code panel beside the canvas
    pub show_code_panel: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_secs: SYNC_DEBOUNCE_SECS,
            grid_size: GRID_SIZE,
            snap_to_grid: false,
            show_grid: true,
            undo_limit: MAX_UNDO_HISTORY,
            dark_mode: true,
            show_code_panel: true,
        }
    }
}

impl EditorConfig {
    /// Reads every setting, falling back to its default.
    pub fn from_store(store: &StateStore) -> Self {
        let defaults = Self::default();
        Self {
            debounce_secs: store
                .get_as::<f64>(DEBOUNCE_PATH)
                .filter(|s| s.is_finite() && *s >= 0.0)
                .unwrap_or(defaults.debounce_secs),
            grid_size: store
                .get_as::<f32>(GRID_SIZE_PATH)
                .filter(|g| g.is_finite() && *g > 0.0)
                .unwrap_or(defaults.grid_size),
            snap_to_grid: store.get_as(SNAP_PATH).unwrap_or(defaults.snap_to_grid),
            show_grid: store.get_as(SHOW_GRID_PATH).unwrap_or(defaults.show_grid),
            undo_limit: store
                .get_as::<usize>(UNDO_LIMIT_PATH)
                .filter(|l| *l > 0)
                .unwrap_or(defaults.undo_limit),
            dark_mode: store.get_as(DARK_MODE_PATH).unwrap_or(defaults.dark_mode),
            show_code_panel: store
                .get_as(CODE_PANEL_PATH)
                .unwrap_or(defaults.show_code_panel),
        }
    }

    /// Writes every setting back into the store.
    pub fn write_to(&self, store: &mut StateStore) -> Result<(), StoreError> {
        store.set(DEBOUNCE_PATH, self.debounce_secs)?;
        store.set(GRID_SIZE_PATH, self.grid_size)?;
        store.set(SNAP_PATH, self.snap_to_grid)?;
        store.set(SHOW_GRID_PATH, self.show_grid)?;
        store.set(UNDO_LIMIT_PATH, self.undo_limit)?;
        store.set(DARK_MODE_PATH, self.dark_mode)?;
        store.set(CODE_PANEL_PATH, self.show_code_panel)?;
        Ok(())
    }
}
