//! User interface components and rendering logic for the diagram editor.
//!
//! This module contains the eframe application, the panels around the canvas,
//! context menus, dialogs and keyboard handling. Editing itself goes through
//! [`EditorCore`](crate::editor_core::EditorCore); the UI only translates input.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main EditorApp
//! - `canvas` - Canvas navigation, zooming, panning, and interaction
//! - `rendering` - Drawing nodes, connections, grid, and overlays
//! - `highlighters` - Syntax highlighting for the Mermaid code panel
//! - `editor` - Indentation and comment keys for the code panel
//! - `file_ops` - File save/load operations for native and WASM
//! - `export` - SVG and PNG export actions

mod canvas;
mod editor;
mod export;
mod file_ops;
mod highlighters;
mod rendering;
mod state;

#[cfg(test)]
mod tests;

fn is_macos_platform() -> bool {
    #[cfg(target_arch = "wasm32")]
    {
        if let Some(win) = web_sys::window() {
            let nav = win.navigator();
            if let Ok(platform) = nav.platform() {
                if platform.contains("Mac") {
                    return true;
                }
            }
            if let Ok(ua) = nav.user_agent() {
                if ua.contains("Mac OS X") || ua.contains("Macintosh") {
                    return true;
                }
            }
        }
        false
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        cfg!(target_os = "macos")
    }
}

pub use state::EditorApp;

use self::editor::{handle_code_textedit_keys, take_code_keys, CodeEditOptions};
use self::state::PendingConfirmAction;
use crate::constants::APP_STATE_KEY;
use crate::examples;
use crate::export::ExportScope;
use crate::sync::SyncStatus;
use crate::types::*;
use eframe::egui;
#[cfg(target_arch = "wasm32")]
use eframe::wasm_bindgen::JsCast;

/// Widget ids of the properties panel text fields.
const NODE_ID_FIELD: &str = "props_node_id";
const NODE_LABEL_FIELD: &str = "props_node_label";
const LINK_LABEL_FIELD: &str = "props_link_label";
const CANVAS_LABEL_FIELD: &str = "canvas_label_editor";

impl eframe::App for EditorApp {
    /// Persist the diagram, preferences and layout between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        self.diagram = self.core.diagram().clone();
        self.apply_config();
        let changed = self.prefs.take_changes();
        if !changed.is_empty() {
            log::debug!("Preferences changed: {}", changed.join(", "));
        }
        match self.to_json() {
            Ok(json) => storage.set_string(APP_STATE_KEY, json),
            Err(err) => log::error!("Failed to serialize app state: {err}"),
        }
    }

    /// Main update function called by egui for each frame.
    ///
    /// Handles keyboard shortcuts, the debounced code sync and the panel layout:
    /// toolbar on top, shape palette on the left, code and properties on the
    /// right, canvas in the middle.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply theme visuals
        let visuals = if self.config.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        ctx.set_visuals(visuals);

        // Handle pending file operations
        self.handle_pending_operations(ctx);

        // Apply code edits once typing has paused
        let now = ctx.input(|i| i.time);
        if self.core.tick(now) {
            log::debug!("Applied code edit to the canvas");
        }
        if self.core.sync().is_pending() {
            let delay = self.core.sync().debounce_secs();
            ctx.request_repaint_after(std::time::Duration::from_secs_f64(delay));
        }

        self.handle_undo_redo_keys(ctx);
        self.handle_delete_key(ctx);
        self.handle_edit_shortcuts(ctx);
        self.handle_file_shortcuts(ctx);

        // Intercept native window close requests (titlebar X)
        #[cfg(not(target_arch = "wasm32"))]
        {
            if ctx.input(|i| i.viewport().close_requested()) {
                if self.core.is_dirty() && !self.file.allow_close_on_next_request {
                    // Abort close and show confirmation dialog
                    ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                    if !self.file.show_unsaved_dialog {
                        self.file.show_unsaved_dialog = true;
                        self.file.pending_confirm_action = Some(PendingConfirmAction::Quit);
                    }
                } else {
                    self.file.allow_close_on_next_request = false;
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            // Update browser beforeunload prompt based on unsaved state
            Self::update_beforeunload(self.core.is_dirty());
        }

        // Restore native window size once per session (desktop only)
        #[cfg(not(target_arch = "wasm32"))]
        {
            if !self.applied_viewport_restore {
                if let Some((w, h)) = self.window_inner_size {
                    ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(w, h)));
                }
                self.applied_viewport_restore = true;
            }
            let size = ctx.input(|i| i.screen_rect().size());
            self.window_inner_size = Some((size.x, size.y));
        }

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.draw_status_bar(ui);
        });

        egui::SidePanel::left("shape_palette")
            .resizable(false)
            .default_width(140.0)
            .show(ctx, |ui| {
                self.draw_palette(ui);
            });

        let viewport_width = ctx.input(|i| i.screen_rect().width());
        let max_allowed = (viewport_width * 0.9).max(180.0);

        if self.config.show_code_panel {
            egui::SidePanel::right("code_panel")
                .resizable(true)
                .default_width(self.code_panel_width.clamp(180.0, max_allowed))
                .show(ctx, |ui| {
                    self.code_panel_width = ui.available_width().clamp(180.0, max_allowed);
                    self.draw_code_panel(ui);
                });
        }

        egui::SidePanel::right("properties_panel")
            .resizable(true)
            .default_width(self.properties_panel_width.clamp(180.0, max_allowed))
            .show(ctx, |ui| {
                self.properties_panel_width = ui.available_width().clamp(180.0, max_allowed);
                self.draw_properties_panel(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_canvas(ui);
        });

        if self.file.show_unsaved_dialog {
            self.draw_unsaved_dialog(ctx);
        }
    }
}

impl EditorApp {
    #[cfg(target_arch = "wasm32")]
    fn update_beforeunload(has_unsaved_changes: bool) {
        if let Some(window) = web_sys::window() {
            if has_unsaved_changes {
                let closure = eframe::wasm_bindgen::closure::Closure::wrap(Box::new(
                    move |event: web_sys::Event| {
                        event.prevent_default();
                        // Some browsers only prompt when returnValue is set
                        let _ = js_sys::Reflect::set(
                            event.as_ref(),
                            &eframe::wasm_bindgen::JsValue::from_str("returnValue"),
                            &eframe::wasm_bindgen::JsValue::from_str("unsaved"),
                        );
                    },
                )
                    as Box<dyn FnMut(_)>);
                window.set_onbeforeunload(Some(closure.as_ref().unchecked_ref()));
                closure.forget();
            } else {
                window.set_onbeforeunload(None);
            }
        }
    }

    /// Handles file-related keyboard shortcuts: New, Open, Save, Save As, and Quit.
    /// Uses the platform-standard Command (macOS) or Control (Windows/Linux) modifier.
    fn handle_file_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (save_as, save, open, new, quit) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            let shift = i.modifiers.shift;
            let s = i.key_pressed(egui::Key::S) && cmd;
            (
                s && shift,
                s && !shift,
                i.key_pressed(egui::Key::O) && cmd,
                i.key_pressed(egui::Key::N) && cmd,
                i.key_pressed(egui::Key::Q) && cmd,
            )
        });
        if save_as {
            self.save_as_diagram();
        } else if save {
            self.save_diagram();
        }
        if open {
            self.request_action(ctx, PendingConfirmAction::Open);
        }
        if new {
            self.request_action(ctx, PendingConfirmAction::New);
        }
        // Quit: Cmd/Ctrl+Q (native only)
        if quit && cfg!(not(target_arch = "wasm32")) {
            self.request_action(ctx, PendingConfirmAction::Quit);
        }
    }

    /// Handles undo/redo keyboard shortcuts.
    ///
    /// Text fields keep their own undo, so nothing happens while one has focus.
    fn handle_undo_redo_keys(&mut self, ctx: &egui::Context) {
        // A drag in progress is one undo step; history waits for it to end
        if ctx.wants_keyboard_input() || self.core.is_moving() {
            return;
        }
        // Ctrl+Z for undo
        if ctx.input(|i| i.key_pressed(egui::Key::Z) && i.modifiers.command && !i.modifiers.shift) {
            self.perform_undo();
        }
        // Ctrl+Shift+Z or Ctrl+Y for redo
        else if ctx.input(|i| {
            (i.key_pressed(egui::Key::Z) && i.modifiers.command && i.modifiers.shift)
                || (i.key_pressed(egui::Key::Y) && i.modifiers.command)
        }) {
            self.perform_redo();
        }
    }

    /// Handles Delete/Backspace to remove the selected nodes or connection.
    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input()
            || self.interaction.editing_label.is_some()
            || self.core.is_moving()
        {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace))
            && self.core.delete_selection()
        {
            self.interaction.props_node = None;
            self.interaction.props_connection = None;
        }
    }

    /// Select all, duplicate and Escape.
    fn handle_edit_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() || self.core.is_moving() {
            return;
        }
        let (select_all, duplicate, escape) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::A) && i.modifiers.command,
                i.key_pressed(egui::Key::D) && i.modifiers.command,
                i.key_pressed(egui::Key::Escape),
            )
        });
        if select_all {
            self.core.select_all();
        }
        if duplicate {
            self.core.duplicate_selection();
        }
        if escape {
            self.context_menu.show = false;
            self.interaction.drawing_connection_from = None;
            self.interaction.connection_draw_pos = None;
            self.core.clear_selection();
        }
    }

    fn perform_undo(&mut self) {
        self.interaction.editing_label = None;
        match self.core.undo() {
            Some(label) => self.status = Some(format!("Undid {label}")),
            None => log::debug!("Nothing to undo"),
        }
    }

    fn perform_redo(&mut self) {
        self.interaction.editing_label = None;
        match self.core.redo() {
            Some(label) => self.status = Some(format!("Redid {label}")),
            None => log::debug!("Nothing to redo"),
        }
    }

    /// Renders the toolbar with file operations, editing and view options.
    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        ui.horizontal_wrapped(|ui| {
            // File operations
            if ui.button("New").clicked() {
                self.request_action(&ctx, PendingConfirmAction::New);
            }
            if ui.button("Open").clicked() {
                self.request_action(&ctx, PendingConfirmAction::Open);
            }
            if ui.button("Save").clicked() {
                self.save_diagram();
            }
            if ui.button("Save As").clicked() {
                self.save_as_diagram();
            }
            ui.menu_button("Samples", |ui| {
                for info in examples::all_examples() {
                    if ui.button(info.name).clicked() {
                        self.request_action(&ctx, PendingConfirmAction::Sample(info.kind));
                        ui.close();
                    }
                }
            });
            self.draw_export_menu(ui, &ctx);

            ui.separator();

            // Undo/Redo operations
            let history = self.core.history();
            let undo_hint = history.undo_label().map(|l| format!("Undo {l}"));
            let redo_hint = history.redo_label().map(|l| format!("Redo {l}"));
            let (can_undo, can_redo) = (history.can_undo(), history.can_redo());
            let undo = ui.add_enabled(can_undo, egui::Button::new("⟲ Undo"));
            let undo = match undo_hint {
                Some(hint) => undo.on_hover_text(hint),
                None => undo,
            };
            if undo.clicked() {
                self.perform_undo();
            }
            let redo = ui.add_enabled(can_redo, egui::Button::new("⟳ Redo"));
            let redo = match redo_hint {
                Some(hint) => redo.on_hover_text(hint),
                None => redo,
            };
            if redo.clicked() {
                self.perform_redo();
            }

            ui.separator();

            if ui.button("Auto Layout").clicked() {
                self.core.auto_layout();
                self.fit_view();
            }
            if ui.button("Fit View").clicked() {
                self.fit_view();
            }
            let mut direction = self.core.diagram().direction;
            egui::ComboBox::from_id_salt("direction_combo")
                .selected_text(direction_name(direction))
                .show_ui(ui, |ui| {
                    for d in Direction::ALL {
                        ui.selectable_value(&mut direction, d, direction_name(d));
                    }
                });
            if direction != self.core.diagram().direction {
                self.core.set_direction(direction);
            }

            ui.separator();

            // View options
            let mut changed = false;
            changed |= ui.checkbox(&mut self.config.show_grid, "Grid").changed();
            changed |= ui.checkbox(&mut self.config.snap_to_grid, "Snap").changed();
            changed |= ui.checkbox(&mut self.config.show_code_panel, "Code").changed();
            changed |= ui.checkbox(&mut self.config.dark_mode, "Dark Mode").changed();
            ui.menu_button("Settings", |ui| {
                changed |= ui
                    .add(egui::Slider::new(&mut self.config.grid_size, 5.0..=100.0).text("Grid size"))
                    .changed();
                changed |= ui
                    .add(egui::Slider::new(&mut self.config.undo_limit, 1..=500).text("Undo steps"))
                    .changed();
                changed |= ui
                    .add(
                        egui::Slider::new(&mut self.config.debounce_secs, 0.0..=3.0)
                            .text("Code sync delay (s)"),
                    )
                    .changed();
            });
            if changed {
                self.apply_config();
            }
        });
    }

    fn draw_export_menu(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.menu_button("Export", |ui| {
            ui.label("Scope:");
            ui.radio_value(&mut self.export_options.scope, ExportScope::WholeGraph, "Whole diagram");
            ui.radio_value(&mut self.export_options.scope, ExportScope::SelectionOnly, "Selection only");
            ui.checkbox(&mut self.export_options.include_background, "Background");
            ui.checkbox(&mut self.export_options.include_grid, "Grid");
            ui.add(egui::Slider::new(&mut self.export_options.margin_px, 0.0..=200.0).text("Margin"));
            ui.separator();
            if ui.button("Export SVG…").clicked() {
                self.export_svg(ctx);
                ui.close();
            }
            let png_supported = cfg!(not(target_arch = "wasm32"));
            ui.add_enabled_ui(png_supported, |ui| {
                ui.add(egui::Slider::new(&mut self.export_options.png_scale, 0.5..=4.0).text("PNG scale"));
                if ui.button("Export PNG…").clicked() {
                    self.export_png(ctx);
                    ui.close();
                }
            });
        });
    }

    fn draw_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if let Some(status) = &self.status {
                ui.label(status);
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let dirty = if self.core.is_dirty() { "*" } else { "" };
                let name = self.file.current_path.as_deref().unwrap_or("Untitled");
                ui.label(format!("{name}{dirty}"));
                ui.separator();
                ui.label(format!("Zoom: {:.0}%", self.canvas.zoom_factor * 100.0));
                ui.separator();
                let diagram = self.core.diagram();
                ui.label(format!(
                    "{} nodes, {} links",
                    diagram.nodes.len(),
                    diagram.connections.len()
                ));
            });
        });
    }

    /// Shape buttons that add a node at the centre of the view.
    fn draw_palette(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
            ui.heading("Shapes");
            ui.separator();
            for shape in NodeShape::ALL {
                let button = egui::Button::new(shape.display_name()).min_size(egui::vec2(ui.available_width(), 0.0));
                if ui.add(button).on_hover_text("Add at the centre of the view").clicked() {
                    let center = self.viewport_center_world();
                    self.create_node_at(shape, center);
                }
            }
            ui.add_space(8.0);
            ui.heading("Links");
            ui.separator();
            for kind in LinkKind::ALL {
                ui.selectable_value(&mut self.new_link_kind, kind, kind.display_name());
            }
            ui.add_space(4.0);
            ui.colored_label(egui::Color32::GRAY, "Shift-drag between nodes to connect");
        });
    }

    /// Renders the properties panel for the current selection.
    ///
    /// Text fields edit buffers; edits are applied once the field loses focus,
    /// to whichever node or link the buffer was filled from.
    fn draw_properties_panel(&mut self, ui: &mut egui::Ui) {
        let focused = ui.memory(|m| {
            [NODE_ID_FIELD, NODE_LABEL_FIELD, LINK_LABEL_FIELD]
                .iter()
                .any(|f| m.has_focus(egui::Id::new(*f)))
        });
        if !focused {
            self.flush_property_edits();
        }

        let connection = self.core.selected_connection();
        let single = self.core.selection().single_node().cloned();
        let count = self.core.selected_nodes().len();

        egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
            ui.heading("Properties");
            ui.separator();

            if let Some(conn_id) = connection {
                self.draw_connection_properties(ui, conn_id, focused);
            } else if let Some(node_id) = single {
                self.draw_node_properties(ui, &node_id, focused);
            } else if count > 1 {
                ui.label(format!("{count} nodes selected"));
                ui.separator();
                if ui.button("Duplicate").clicked() {
                    self.core.duplicate_selection();
                }
                if ui.button("Delete").clicked() {
                    self.core.delete_selection();
                }
            } else {
                self.draw_no_selection_info(ui);
            }
        });
    }

    /// Applies buffered text field edits.
    fn flush_property_edits(&mut self) {
        if std::mem::take(&mut self.interaction.props_node_dirty) {
            if let Some(node_id) = self.interaction.props_node.clone() {
                self.apply_node_buffers(&node_id);
            }
        }
        if std::mem::take(&mut self.interaction.props_connection_dirty) {
            if let Some(conn_id) = self.interaction.props_connection {
                self.apply_connection_buffer(conn_id);
            }
        }
    }

    fn apply_node_buffers(&mut self, node_id: &str) {
        let Some(node) = self.core.diagram().node(node_id) else {
            return;
        };
        if node.label != self.interaction.temp_props_label {
            let label = self.interaction.temp_props_label.clone();
            if let Err(e) = self.core.set_label(node_id, &label) {
                self.status = Some(e.to_string());
            }
        }
        let new_id = self.interaction.temp_node_id.trim().to_string();
        if new_id != node_id {
            match self.core.rename_node(node_id, &new_id) {
                Ok(()) => self.interaction.props_node = Some(new_id),
                Err(e) => {
                    log::debug!("Rename rejected: {e}");
                    self.status = Some(e.to_string());
                }
            }
        }
    }

    fn apply_connection_buffer(&mut self, conn_id: ConnectionId) {
        let Some(connection) = self.core.diagram().connection(conn_id) else {
            return;
        };
        let text = self.interaction.temp_connection_label.trim();
        let label = (!text.is_empty()).then_some(text);
        if connection.label.as_deref() != label {
            let label = label.map(str::to_string);
            if let Err(e) = self.core.set_connection_label(conn_id, label.as_deref()) {
                self.status = Some(e.to_string());
            }
        }
    }

    fn draw_node_properties(&mut self, ui: &mut egui::Ui, node_id: &str, focused: bool) {
        let Some(node) = self.core.diagram().node(node_id).cloned() else {
            return;
        };
        if !focused {
            self.interaction.props_node = Some(node.id.clone());
            self.interaction.temp_node_id = node.id.clone();
            self.interaction.temp_props_label = node.label.clone();
        }

        ui.label("Type: Node");
        ui.separator();

        ui.label("Id:");
        let response = ui.add(
            egui::TextEdit::singleline(&mut self.interaction.temp_node_id).id(egui::Id::new(NODE_ID_FIELD)),
        );
        if response.changed() {
            self.interaction.props_node_dirty = true;
        }
        ui.colored_label(egui::Color32::GRAY, "Letters, digits, _ and -");

        ui.label("Label:");
        let response = ui.add(
            egui::TextEdit::singleline(&mut self.interaction.temp_props_label)
                .id(egui::Id::new(NODE_LABEL_FIELD)),
        );
        if response.changed() {
            self.interaction.props_node_dirty = true;
        }

        ui.label("Shape:");
        let mut shape = node.shape;
        egui::ComboBox::from_id_salt("node_shape_combo")
            .selected_text(shape.display_name())
            .show_ui(ui, |ui| {
                for s in NodeShape::ALL {
                    ui.selectable_value(&mut shape, s, s.display_name());
                }
            });
        if shape != node.shape {
            if let Err(e) = self.core.set_shape(&node.id, shape) {
                self.status = Some(e.to_string());
            }
        }

        ui.separator();
        ui.label(format!("Position: ({:.0}, {:.0})", node.position.0, node.position.1));
        let links = self.core.diagram().connections_of(&node.id).count();
        ui.label(format!("Links: {links}"));

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Edit on canvas").clicked() {
                self.start_editing_label(&node.id);
            }
            if ui.button("Delete").clicked() {
                self.core.delete_selection();
            }
        });
    }

    fn draw_connection_properties(&mut self, ui: &mut egui::Ui, conn_id: ConnectionId, focused: bool) {
        let Some(connection) = self.core.diagram().connection(conn_id).cloned() else {
            return;
        };
        if !focused {
            self.interaction.props_connection = Some(conn_id);
            self.interaction.temp_connection_label = connection.label.clone().unwrap_or_default();
        }

        ui.label("Type: Link");
        ui.separator();
        ui.label(format!("From: {}", connection.from));
        ui.label(format!("To: {}", connection.to));
        ui.separator();

        ui.label("Label:");
        let response = ui.add(
            egui::TextEdit::singleline(&mut self.interaction.temp_connection_label)
                .id(egui::Id::new(LINK_LABEL_FIELD))
                .hint_text("none"),
        );
        if response.changed() {
            self.interaction.props_connection_dirty = true;
        }

        ui.label("Style:");
        let mut kind = connection.kind;
        egui::ComboBox::from_id_salt("link_kind_combo")
            .selected_text(kind.display_name())
            .show_ui(ui, |ui| {
                for k in LinkKind::ALL {
                    ui.selectable_value(&mut kind, k, k.display_name());
                }
            });
        if kind != connection.kind {
            if let Err(e) = self.core.set_connection_kind(conn_id, kind) {
                self.status = Some(e.to_string());
            }
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Reverse").clicked() {
                if let Err(e) = self.core.reverse_connection(conn_id) {
                    self.status = Some(e.to_string());
                }
            }
            if ui.button("Delete").clicked() {
                self.core.delete_selection();
            }
        });
    }

    fn draw_no_selection_info(&mut self, ui: &mut egui::Ui) {
        ui.label("Nothing selected");
        ui.separator();
        let diagram = self.core.diagram();
        ui.label(format!("Direction: {}", direction_name(diagram.direction)));
        ui.label(format!("Nodes: {}", diagram.nodes.len()));
        ui.label(format!("Links: {}", diagram.connections.len()));
        ui.separator();
        ui.label("Left-click a node to select it");
        ui.label("Shift-click to add to the selection");
        ui.label("Drag on empty space to select an area");
        ui.label("Double-click a node to edit its label");
        ui.label("Right-click on canvas to create nodes");
        ui.label("Middle-click and drag to pan");
    }

    /// Mermaid source with syntax highlighting. Edits reach the canvas after
    /// the sync delay.
    fn draw_code_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Mermaid");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                match self.core.sync().status() {
                    SyncStatus::Synced => ui.colored_label(egui::Color32::from_rgb(80, 170, 80), "synced"),
                    SyncStatus::Pending => ui.colored_label(egui::Color32::GRAY, "editing…"),
                    SyncStatus::Invalid => ui.colored_label(egui::Color32::from_rgb(220, 80, 80), "error"),
                };
            });
        });

        if let Some(error) = self.core.sync().error() {
            ui.colored_label(egui::Color32::from_rgb(220, 80, 80), error.to_string());
        }
        let hint = if is_macos_platform() {
            "Cmd+/ toggles comments. Tab indents."
        } else {
            "Ctrl+/ toggles comments. Tab indents."
        };
        ui.add(egui::Label::new(egui::RichText::new(hint).small().italics()).wrap());
        ui.separator();

        let mut text = self.core.sync().text().to_string();
        let mut layouter = rendering::create_mermaid_layouter(self.config.dark_mode);
        let code_id = egui::Id::new("mermaid_code");
        egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
            let keys = take_code_keys(ui, code_id);
            let response = ui.add(
                egui::TextEdit::multiline(&mut text)
                    .id(code_id)
                    .code_editor()
                    .desired_width(f32::INFINITY)
                    .desired_rows(30)
                    .lock_focus(true)
                    .layouter(&mut layouter),
            );
            let keys_changed = handle_code_textedit_keys(ui, &response, &mut text, keys, &CodeEditOptions::default());
            if keys_changed || response.changed() {
                let now = ui.input(|i| i.time);
                self.core.text_edited(text, now);
            }
        });
    }

    /// Renders the main canvas area with nodes, connections, and handles user interactions.
    fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;
        self.canvas.viewport = canvas_rect;

        // Centre the diagram the first time it is shown
        if !self.canvas.centered {
            self.center_view(canvas_rect);
        }

        // Handle canvas panning with middle mouse button or Ctrl+drag
        self.handle_canvas_panning(ui, &response);

        // Handle scroll wheel zooming
        self.handle_canvas_zoom(ui, &response);

        // Run this before node dragging so marquee gets priority over node drag
        self.handle_canvas_interactions(ui, &response);

        // Handle node dragging with left mouse button (respects marquee priority)
        self.handle_node_dragging(ui, &response);

        self.render_diagram(&painter, canvas_rect);

        if self.interaction.editing_label.is_some() {
            self.draw_label_editor(ui);
        }

        if self.context_menu.show {
            self.draw_context_menu(ui);
        }
    }

    /// Text field over the node whose label is being edited.
    ///
    /// Enter or clicking elsewhere applies the label; Escape cancels.
    fn draw_label_editor(&mut self, ui: &mut egui::Ui) {
        let Some(node_id) = self.interaction.editing_label.clone() else {
            return;
        };
        let Some(node) = self.core.diagram().node(&node_id) else {
            self.interaction.editing_label = None;
            return;
        };
        let world_rect = crate::geometry::node_rect(node);
        let min = self.world_to_screen(world_rect.min);
        let max = self.world_to_screen(world_rect.max);
        let screen_rect = egui::Rect::from_min_max(min, max);
        let field_id = egui::Id::new(CANVAS_LABEL_FIELD);

        let width = screen_rect.width().max(80.0);
        let pos = egui::pos2(screen_rect.center().x - width / 2.0, screen_rect.center().y - 12.0);
        let area = egui::Area::new(egui::Id::new("canvas_label_area"))
            .fixed_pos(pos)
            .order(egui::Order::Foreground)
            .show(ui.ctx(), |ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut self.interaction.temp_label)
                        .id(field_id)
                        .desired_width(width)
                        .horizontal_align(egui::Align::Center),
                )
            });
        let response = area.inner;

        // Only request focus on the first frame of editing
        if !self.interaction.focus_requested_for_edit {
            response.request_focus();
            self.interaction.focus_requested_for_edit = true;
        }

        // Select all text when flag is set and field has focus
        if self.interaction.should_select_text && response.has_focus() {
            self.interaction.should_select_text = false;
            let len = self.interaction.temp_label.chars().count();
            select_all_text_in_field(ui, field_id, len);
        }

        if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.interaction.editing_label = None;
            self.interaction.temp_label.clear();
        } else if response.lost_focus() {
            self.commit_label_edit();
        }
    }

    /// Renders the right-click context menu for creating and editing nodes.
    fn draw_context_menu(&mut self, ui: &mut egui::Ui) {
        let screen_pos = egui::pos2(self.context_menu.screen_pos.0, self.context_menu.screen_pos.1);
        let world_pos = egui::pos2(self.context_menu.world_pos.0, self.context_menu.world_pos.1);
        let node_under = crate::geometry::node_at(self.core.diagram(), world_pos);

        let area_response = egui::Area::new(egui::Id::new("context_menu"))
            .fixed_pos(screen_pos)
            .order(egui::Order::Foreground)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical(|ui| {
                        if let Some(node_id) = &node_under {
                            ui.label(format!("Node {node_id}"));
                            ui.separator();
                            if ui.button("Edit label").clicked() {
                                self.start_editing_label(node_id);
                                self.context_menu.show = false;
                            }
                            if ui.button("Duplicate").clicked() {
                                self.core.select_node(node_id);
                                self.core.duplicate_selection();
                                self.context_menu.show = false;
                            }
                            if ui.button("Delete").clicked() {
                                self.core.select_node(node_id);
                                self.core.delete_selection();
                                self.context_menu.show = false;
                            }
                        } else {
                            ui.label("Create Node:");
                            ui.separator();
                            for shape in NodeShape::ALL {
                                if ui.button(shape.display_name()).clicked() {
                                    self.create_node_at(shape, world_pos);
                                    self.context_menu.show = false;
                                }
                            }
                        }

                        ui.separator();
                        if ui.button("Cancel").clicked() {
                            self.context_menu.show = false;
                        }
                    });
                })
            });

        // Handle click-outside-to-close after the first frame
        if !self.context_menu.just_opened && ui.input(|i| i.pointer.primary_clicked()) {
            if let Some(click_pos) = ui.input(|i| i.pointer.interact_pos()) {
                if !area_response.response.rect.contains(click_pos) {
                    self.context_menu.show = false;
                }
            }
        }

        self.context_menu.just_opened = false;
    }

    fn draw_unsaved_dialog(&mut self, ctx: &egui::Context) {
        let (title, confirm_label) = match self.file.pending_confirm_action {
            Some(PendingConfirmAction::Quit) => ("Unsaved changes: Quit?", "Discard and Quit"),
            Some(PendingConfirmAction::New) => ("Unsaved changes: Create New?", "Discard and Create New"),
            Some(PendingConfirmAction::Open) => ("Unsaved changes: Open File?", "Discard and Open"),
            Some(PendingConfirmAction::Sample(_)) => ("Unsaved changes: Load Sample?", "Discard and Load"),
            None => ("Unsaved changes", "Discard"),
        };
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("You have unsaved changes. Are you sure you want to continue?");
                ui.horizontal(|ui| {
                    if ui.button(confirm_label).clicked() {
                        if let Some(action) = self.file.pending_confirm_action.take() {
                            self.perform_action(ctx, action);
                        }
                        self.file.show_unsaved_dialog = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.file.show_unsaved_dialog = false;
                        self.file.pending_confirm_action = None;
                    }
                });
            });
    }
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::TopDown => "Top → Down",
        Direction::BottomTop => "Bottom → Top",
        Direction::LeftRight => "Left → Right",
        Direction::RightLeft => "Right → Left",
    }
}

/// Selects all text in a text edit field using egui's internal state.
fn select_all_text_in_field(ui: &mut egui::Ui, field_id: egui::Id, len: usize) {
    ui.memory_mut(|mem| {
        let state = mem
            .data
            .get_temp_mut_or_default::<egui::text_edit::TextEditState>(field_id);
        state.cursor.set_char_range(Some(egui::text::CCursorRange::two(
            egui::text::CCursor::new(0),
            egui::text::CCursor::new(len),
        )));
    });
}
