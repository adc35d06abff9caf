//! Application state management structures.
//!
//! This module contains all the state structures that track the editor's
//! current UI state, including canvas navigation, user interactions, context menus,
//! and file operations. The diagram itself lives in [`EditorCore`].

use crate::config::EditorConfig;
use crate::editor_core::EditorCore;
use crate::export::ExportOptions;
use crate::store::StateStore;
use crate::types::*;
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};

/// State related to canvas navigation.
///
/// Tracks the current pan offset and zoom level of the canvas.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasState {
    /// Current canvas pan offset for navigation (in screen space)
    #[serde(skip)]
    pub offset: egui::Vec2,
    /// Current zoom level (1.0 = normal, 2.0 = 2x zoom, 0.5 = 50% zoom)
    pub zoom_factor: f32,
    /// Whether the view has been centred on the diagram this session
    #[serde(skip)]
    pub centered: bool,
    /// Screen rectangle the canvas occupied last frame
    #[serde(skip)]
    pub viewport: egui::Rect,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            offset: egui::Vec2::ZERO,
            zoom_factor: 1.0,
            centered: false,
            viewport: egui::Rect::NOTHING,
        }
    }
}

/// State related to user interactions with nodes and canvas.
///
/// Tracks dragging, marquee selection, connection drawing and the temporary
/// buffers behind text fields. Selection itself is owned by the editor core.
#[derive(Default)]
pub struct InteractionState {
    /// Node the pointer grabbed to start the current drag
    pub dragging_node: Option<NodeId>,
    /// Initial mouse position when drag started
    pub drag_start_pos: Option<egui::Pos2>,
    /// Offset from mouse to node center during dragging
    pub node_drag_offset: egui::Vec2,
    /// Whether the user is currently panning the canvas
    pub is_panning: bool,
    /// Last mouse position during panning operation
    pub last_pan_pos: Option<egui::Pos2>,
    /// Marquee selection state: start and current end positions in screen space
    pub marquee_start: Option<egui::Pos2>,
    /// Current marquee corner
    pub marquee_end: Option<egui::Pos2>,
    /// Whether the current marquee adds to the existing selection (Shift held)
    pub marquee_additive: bool,
    /// Node from which a connection is being drawn (Shift-drag)
    pub drawing_connection_from: Option<NodeId>,
    /// Current mouse position while drawing connection
    pub connection_draw_pos: Option<egui::Pos2>,
    /// Pending Shift-press on a node that becomes a connection if dragged beyond threshold
    pub pending_shift_connection_from: Option<NodeId>,
    /// Start screen position for pending shift-connection gesture
    pub pending_shift_start_screen_pos: Option<egui::Pos2>,
    /// Node whose label is being edited in place on the canvas
    pub editing_label: Option<NodeId>,
    /// Temporary storage for the label while editing
    pub temp_label: String,
    /// Node the properties panel buffers below were filled from
    pub props_node: Option<NodeId>,
    /// Temporary storage for the node id field
    pub temp_node_id: String,
    /// Temporary storage for the properties panel label field
    pub temp_props_label: String,
    /// Connection the link label buffer was filled from
    pub props_connection: Option<ConnectionId>,
    /// Temporary storage for the link label field
    pub temp_connection_label: String,
    /// Whether the node buffers hold edits not yet applied
    pub props_node_dirty: bool,
    /// Whether the link label buffer holds an edit not yet applied
    pub props_connection_dirty: bool,
    /// Flag indicating text should be selected in the label field
    pub should_select_text: bool,
    /// Flag to track if focus was already requested for the current edit session
    pub focus_requested_for_edit: bool,
}

/// State related to context menu display and interaction.
///
/// Manages the right-click context menu for creating new nodes.
#[derive(Default)]
pub struct ContextMenuState {
    /// Whether the context menu is currently visible
    pub show: bool,
    /// Screen position where the context menu should appear
    pub screen_pos: (f32, f32),
    /// World position where nodes should be created from context menu
    pub world_pos: (f32, f32),
    /// Flag to prevent context menu from closing immediately after opening
    pub just_opened: bool,
}

/// State related to file operations.
///
/// Manages file paths and async file operations. Unsaved changes are tracked by
/// the editor core's dirty flag.
pub struct FileState {
    /// Current file path for save/load operations
    pub current_path: Option<String>,
    /// Pending file operations for WASM compatibility
    pub pending_save_operation: Option<PendingSaveOperation>,
    /// Load waiting on a dialog
    pub pending_load_operation: Option<PendingLoadOperation>,
    /// Channel for receiving file operation results from async contexts
    pub file_operation_sender: Option<Sender<FileOperationResult>>,
    /// Receiving end of `file_operation_sender`
    pub file_operation_receiver: Option<Receiver<FileOperationResult>>,
    /// Whether to show an unsaved-changes confirmation dialog
    pub show_unsaved_dialog: bool,
    /// The action the user attempted that requires confirmation (e.g., New or Quit)
    pub pending_confirm_action: Option<PendingConfirmAction>,
    /// One-shot flag to allow the next close request to proceed after user confirmation (native only)
    pub allow_close_on_next_request: bool,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            current_path: None,
            pending_save_operation: None,
            pending_load_operation: None,
            file_operation_sender: Some(sender),
            file_operation_receiver: Some(receiver),
            show_unsaved_dialog: false,
            pending_confirm_action: None,
            allow_close_on_next_request: false,
        }
    }
}

/// Represents a pending save operation type.
#[derive(Debug)]
pub enum PendingSaveOperation {
    /// Save with a new file path (show file picker)
    SaveAs,
    /// Save to the existing file path
    Save,
}

/// Represents a pending load operation type.
#[derive(Debug)]
pub enum PendingLoadOperation {
    /// Load from a file (show file picker)
    Load,
}

/// Messages sent from async file operations back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// Save operation completed successfully with the given path
    SaveCompleted(String),
    /// Load operation completed successfully with path and content
    LoadCompleted(String, String),
    /// An export was written to the given path
    ExportCompleted(String),
    /// Operation failed with an error message
    OperationFailed(String),
}

/// Pending confirmation actions that may require user approval due to unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirmAction {
    /// User is attempting to create a new file
    New,
    /// User is attempting to open a file
    Open,
    /// User is attempting to load a built-in sample
    Sample(crate::examples::ExampleKind),
    /// User is attempting to quit the application
    Quit,
}

/// The main application structure: UI state around the editor core.
///
/// This struct implements the `eframe::App` trait. Only the diagram snapshot,
/// the preference store and layout sizes are persisted.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct EditorApp {
    /// Diagram, history, code sync and selection
    #[serde(skip)]
    pub core: EditorCore,
    /// Working diagram as of the last save, restored on start
    pub diagram: Diagram,
    /// Persisted preferences, read into `config`
    pub prefs: StateStore,
    /// Preferences in effect, read from `prefs`
    #[serde(skip)]
    pub config: EditorConfig,
    /// Canvas navigation state
    pub canvas: CanvasState,
    /// User interaction state
    #[serde(skip)]
    pub interaction: InteractionState,
    /// Context menu state
    #[serde(skip)]
    pub context_menu: ContextMenuState,
    /// File operations state
    #[serde(skip)]
    pub file: FileState,
    /// Link style used for connections drawn on the canvas
    pub new_link_kind: LinkKind,
    /// Options used by the export buttons
    #[serde(skip)]
    pub export_options: ExportOptions,
    /// Last user-facing message, e.g. a rejected connection
    #[serde(skip)]
    pub status: Option<String>,
    /// Remembered width of the properties panel across sessions
    pub properties_panel_width: f32,
    /// Remembered width of the code panel across sessions
    pub code_panel_width: f32,
    /// Persisted last known window inner size in logical points (desktop only)
    pub window_inner_size: Option<(f32, f32)>,
    /// Whether we've already applied the stored window geometry this session
    #[serde(skip)]
    pub applied_viewport_restore: bool,
}

impl Default for EditorApp {
    fn default() -> Self {
        Self {
            core: EditorCore::default(),
            diagram: Diagram::default(),
            prefs: StateStore::new(),
            config: EditorConfig::default(),
            canvas: CanvasState::default(),
            interaction: InteractionState::default(),
            context_menu: ContextMenuState::default(),
            file: FileState::default(),
            new_link_kind: LinkKind::Arrow,
            export_options: ExportOptions::default(),
            status: None,
            properties_panel_width: 260.0,
            code_panel_width: 340.0,
            window_inner_size: None,
            applied_viewport_restore: false,
        }
    }
}

impl EditorApp {
    /// Creates the app, restoring the previous session from eframe storage.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let restored = cc
            .storage
            .and_then(|storage| storage.get_string(crate::constants::APP_STATE_KEY))
            .and_then(|json| match Self::from_json(&json) {
                Ok(app) => Some(app),
                Err(e) => {
                    log::warn!("Discarding unreadable saved state: {e}");
                    None
                }
            });
        let mut app = restored.unwrap_or_default();
        app.restore_session();
        app
    }

    /// Rebuilds the non-persisted parts after deserialization: the config is
    /// read from the preference store and the core reopens the saved diagram.
    pub fn restore_session(&mut self) {
        self.config = EditorConfig::from_store(&self.prefs);
        self.core = EditorCore::new(self.diagram.clone());
        self.apply_config();
        log::info!(
            "Restored session with {} nodes and {} connections",
            self.diagram.nodes.len(),
            self.diagram.connections.len()
        );
    }

    /// Pushes config values into the core and the preference store.
    pub fn apply_config(&mut self) {
        self.core.set_undo_limit(self.config.undo_limit);
        self.core.set_debounce_secs(self.config.debounce_secs);
        if let Err(e) = self.config.write_to(&mut self.prefs) {
            log::warn!("Failed to store preferences: {e}");
        }
    }

    /// Serializes the application state to JSON.
    ///
    /// # Returns
    ///
    /// A JSON string representation of the app state, or an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes application state from JSON.
    ///
    /// Call [`restore_session`](Self::restore_session) afterwards to reopen the diagram.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Drops transient editing state after the document changed underneath it.
    pub fn reset_interaction(&mut self) {
        self.interaction = InteractionState::default();
        self.context_menu.show = false;
    }
}
