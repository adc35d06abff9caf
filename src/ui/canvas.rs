//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning, zooming, node dragging, connection drawing,
//! marquee selection and coordinate transformations between screen and world space.

use super::state::EditorApp;
use crate::constants::{CLICK_THRESHOLD, MAX_ZOOM, MIN_ZOOM};
use crate::geometry;
use crate::types::*;
use eframe::egui;

/// Zoom change per scroll step.
const ZOOM_STEP: f32 = 0.025;

impl EditorApp {
    /// Converts screen coordinates to world coordinates accounting for zoom and pan.
    pub fn screen_to_world(&self, screen_pos: egui::Pos2) -> egui::Pos2 {
        (screen_pos - self.canvas.offset) / self.canvas.zoom_factor
    }

    /// Converts world coordinates to screen coordinates accounting for zoom and pan.
    pub fn world_to_screen(&self, world_pos: egui::Pos2) -> egui::Pos2 {
        world_pos * self.canvas.zoom_factor + self.canvas.offset
    }

    /// World position at the centre of the visible canvas.
    pub fn viewport_center_world(&self) -> egui::Pos2 {
        if self.canvas.viewport.is_positive() {
            self.screen_to_world(self.canvas.viewport.center())
        } else {
            egui::Pos2::ZERO
        }
    }

    /// Centres the view on the diagram, or on the origin when it is empty.
    pub fn center_view(&mut self, canvas_rect: egui::Rect) {
        let target = geometry::diagram_bounds(self.core.diagram())
            .map(|b| b.center())
            .unwrap_or(egui::Pos2::ZERO);
        self.canvas.offset = canvas_rect.center() - target * self.canvas.zoom_factor;
        self.canvas.centered = true;
    }

    /// Zooms and pans so every node is visible, within the zoom limits.
    pub fn fit_view(&mut self) {
        let canvas_rect = self.canvas.viewport;
        let Some(bounds) = geometry::diagram_bounds(self.core.diagram()) else {
            self.canvas.zoom_factor = 1.0;
            self.center_view(canvas_rect);
            return;
        };
        if canvas_rect.is_positive() {
            let margin = 40.0;
            let zoom_x = (canvas_rect.width() - 2.0 * margin) / bounds.width().max(1.0);
            let zoom_y = (canvas_rect.height() - 2.0 * margin) / bounds.height().max(1.0);
            self.canvas.zoom_factor = zoom_x.min(zoom_y).clamp(MIN_ZOOM, MAX_ZOOM.min(1.5));
        }
        self.center_view(canvas_rect);
    }

    /// Snaps a world position to the configured grid.
    pub fn snap_to_grid(&self, pos: egui::Pos2) -> egui::Pos2 {
        geometry::snap_to_grid(pos, self.config.grid_size)
    }

    /// Handles middle-click or Cmd/Ctrl+left-click canvas panning functionality.
    ///
    /// Uses Cmd on macOS and Ctrl on other platforms for modifier-based panning.
    pub fn handle_canvas_panning(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        // modifiers.command is Cmd on macOS and Ctrl elsewhere
        let should_pan = ui.input(|i| {
            i.pointer.middle_down() || (i.pointer.primary_down() && i.modifiers.command)
        });

        if should_pan {
            if let Some(current_pos) = response.interact_pointer_pos() {
                if !self.interaction.is_panning {
                    self.interaction.is_panning = true;
                    self.interaction.last_pan_pos = Some(current_pos);
                } else if let Some(last_pos) = self.interaction.last_pan_pos {
                    self.canvas.offset += current_pos - last_pos;
                    self.interaction.last_pan_pos = Some(current_pos);
                }
            }
        } else {
            self.interaction.is_panning = false;
            self.interaction.last_pan_pos = None;
        }
    }

    /// Handles scroll wheel zooming functionality.
    ///
    /// Zooms in/out while keeping the world point under the cursor fixed.
    /// Only zooms if the cursor is over the canvas.
    pub fn handle_canvas_zoom(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta == 0.0 {
            return;
        }

        let mouse_pos = ui
            .input(|i| i.pointer.hover_pos())
            .or_else(|| response.interact_pointer_pos());
        let Some(mouse_pos) = mouse_pos else {
            return;
        };
        if !response.rect.contains(mouse_pos) {
            return;
        }

        let step = if scroll_delta > 0.0 { ZOOM_STEP } else { -ZOOM_STEP };
        self.zoom_around(mouse_pos, self.canvas.zoom_factor + step);
    }

    /// Sets the zoom level, keeping `anchor` (screen space) over the same world point.
    pub fn zoom_around(&mut self, anchor: egui::Pos2, zoom: f32) {
        let world_before = self.screen_to_world(anchor);
        let old_zoom = self.canvas.zoom_factor;
        self.canvas.zoom_factor = zoom.clamp(MIN_ZOOM, MAX_ZOOM);

        if (self.canvas.zoom_factor - old_zoom).abs() > f32::EPSILON {
            let world_after = self.world_to_screen(world_before);
            self.canvas.offset += anchor - world_after;
        }
    }

    /// Handles node dragging with the left mouse button.
    ///
    /// Plain drags move the selection (snapping to the grid with Shift or when
    /// snapping is on); Shift-drags from a node draw a connection.
    pub fn handle_node_dragging(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        // An active marquee takes priority over node drags and connections
        if self.interaction.marquee_start.is_some() {
            return;
        }
        if ui.input(|i| i.pointer.primary_down()) && !self.interaction.is_panning {
            let Some(current_pos) = response.interact_pointer_pos() else {
                return;
            };
            let world_pos = self.screen_to_world(current_pos);
            let shift_held = ui.input(|i| i.modifiers.shift);

            if self.interaction.dragging_node.is_none()
                && self.interaction.drawing_connection_from.is_none()
                && self.interaction.pending_shift_connection_from.is_none()
            {
                if self.interaction.editing_label.is_some() {
                    return;
                }
                if let Some(node_id) = geometry::node_at(self.core.diagram(), world_pos) {
                    if shift_held {
                        // Becomes a connection once dragged past the threshold,
                        // otherwise a selection toggle on release
                        self.interaction.pending_shift_connection_from = Some(node_id);
                        self.interaction.pending_shift_start_screen_pos = Some(current_pos);
                    } else {
                        self.start_node_drag(node_id, current_pos, world_pos);
                    }
                }
            } else if let Some(dragging_id) = self.interaction.dragging_node.clone() {
                let snap = shift_held || self.config.snap_to_grid;
                self.update_dragged_node_position(&dragging_id, world_pos, snap);
            } else if self.interaction.drawing_connection_from.is_some() {
                self.interaction.connection_draw_pos = Some(current_pos);
            } else if let (Some(from_id), Some(start_pos)) = (
                self.interaction.pending_shift_connection_from.clone(),
                self.interaction.pending_shift_start_screen_pos,
            ) {
                let dist_world = (world_pos - self.screen_to_world(start_pos)).length();
                if dist_world >= CLICK_THRESHOLD {
                    self.interaction.drawing_connection_from = Some(from_id);
                    self.interaction.connection_draw_pos = Some(current_pos);
                    self.interaction.pending_shift_connection_from = None;
                    self.interaction.pending_shift_start_screen_pos = None;
                }
            }
        } else {
            if self.interaction.drawing_connection_from.is_some() {
                let release_pos = response
                    .interact_pointer_pos()
                    .or(self.interaction.connection_draw_pos);
                if let Some(current_pos) = release_pos {
                    let world_pos = self.screen_to_world(current_pos);
                    self.finalize_connection(world_pos);
                }
            }

            // A Shift-press that never turned into a connection toggles selection
            if let Some(node_id) = self.interaction.pending_shift_connection_from.take() {
                self.core.toggle_node(&node_id);
            }
            self.interaction.pending_shift_start_screen_pos = None;

            if self.interaction.dragging_node.is_some() {
                self.core.end_move();
            }

            self.interaction.dragging_node = None;
            self.interaction.drag_start_pos = None;
            self.interaction.drawing_connection_from = None;
            self.interaction.connection_draw_pos = None;
        }
    }

    /// Starts dragging the specified node together with the rest of the selection.
    ///
    /// Pressing on an unselected node selects only that node first.
    fn start_node_drag(&mut self, node_id: NodeId, current_pos: egui::Pos2, world_pos: egui::Pos2) {
        if !self.core.selection().contains_node(&node_id) {
            self.core.select_node(&node_id);
        }
        if let Some(node) = self.core.diagram().node(&node_id) {
            let node_center = egui::pos2(node.position.0, node.position.1);
            self.interaction.node_drag_offset = node_center - world_pos;
        }
        self.interaction.dragging_node = Some(node_id);
        self.interaction.drag_start_pos = Some(current_pos);
        self.core.begin_move();
    }

    /// Moves the selection so the grabbed node follows the pointer.
    fn update_dragged_node_position(&mut self, node_id: &str, world_pos: egui::Pos2, snap: bool) {
        let mut target = world_pos + self.interaction.node_drag_offset;
        if snap {
            target = self.snap_to_grid(target);
        }
        let Some(node) = self.core.diagram().node(node_id) else {
            return;
        };
        let dx = target.x - node.position.0;
        let dy = target.y - node.position.1;
        self.core.move_selection_by(dx, dy);
    }

    /// Whether a connection from `from` to the node under `world_pos` would be accepted.
    pub fn connection_target_valid(&self, from: &str, world_pos: egui::Pos2) -> bool {
        match geometry::node_at(self.core.diagram(), world_pos) {
            Some(to) => {
                to != from
                    && !self
                        .core
                        .diagram()
                        .connections
                        .iter()
                        .any(|c| c.from == from && c.to == to && c.kind == self.new_link_kind)
            }
            None => true,
        }
    }

    /// Creates the connection being drawn if it was released over another node.
    ///
    /// Rejected connections (self-links, duplicates) are reported in the status line.
    fn finalize_connection(&mut self, world_pos: egui::Pos2) {
        let Some(from) = self.interaction.drawing_connection_from.clone() else {
            return;
        };
        let Some(to) = geometry::node_at(self.core.diagram(), world_pos) else {
            return;
        };
        match self.core.connect(&from, &to, self.new_link_kind) {
            Ok(_) => self.status = None,
            Err(e) => {
                log::debug!("Connection rejected: {e}");
                self.status = Some(e.to_string());
            }
        }
    }

    /// Handles canvas click interactions for selection, label editing and the context menu.
    ///
    /// Runs before node dragging so a marquee started on empty space wins.
    pub fn handle_canvas_interactions(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let primary_down = ui.input(|i| i.pointer.primary_down());
        if primary_down
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
            && self.interaction.drawing_connection_from.is_none()
            && self.interaction.pending_shift_connection_from.is_none()
        {
            if let Some(pos) = response.interact_pointer_pos() {
                if self.interaction.marquee_start.is_some() {
                    self.interaction.marquee_end = Some(pos);
                } else if !ui.input(|i| i.modifiers.command) {
                    let world_pos = self.screen_to_world(pos);
                    let diagram = self.core.diagram();
                    let over_node = geometry::node_at(diagram, world_pos).is_some();
                    let over_conn =
                        geometry::connection_at(diagram, world_pos, CLICK_THRESHOLD).is_some();
                    if !over_node && !over_conn {
                        self.interaction.marquee_start = Some(pos);
                        self.interaction.marquee_end = Some(pos);
                        self.interaction.marquee_additive = ui.input(|i| i.modifiers.shift);
                        if !self.interaction.marquee_additive {
                            self.core.clear_selection();
                        }
                    }
                }
            }
        } else if !primary_down {
            if let (Some(start), Some(end)) =
                (self.interaction.marquee_start, self.interaction.marquee_end)
            {
                let world_rect = egui::Rect::from_two_pos(
                    self.screen_to_world(start),
                    self.screen_to_world(end),
                );
                let hits = geometry::nodes_in_rect(self.core.diagram(), world_rect);
                if self.interaction.marquee_additive {
                    self.core.extend_selection(hits);
                } else {
                    self.core.select_nodes(hits);
                }
            }
            self.interaction.marquee_start = None;
            self.interaction.marquee_end = None;
            self.interaction.marquee_additive = false;
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(pos);
                if let Some(node_id) = geometry::node_at(self.core.diagram(), world_pos) {
                    self.start_editing_label(&node_id);
                    return;
                }
            }
        }

        // Plain clicks select connections or clear; node presses are handled by dragging
        if response.clicked()
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
            && self.interaction.pending_shift_connection_from.is_none()
        {
            if let Some(pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(pos);
                let diagram = self.core.diagram();
                if geometry::node_at(diagram, world_pos).is_none() {
                    match geometry::connection_at(diagram, world_pos, CLICK_THRESHOLD) {
                        Some(conn_id) => self.core.select_connection(conn_id),
                        None if !ui.input(|i| i.modifiers.shift) => self.core.clear_selection(),
                        None => {}
                    }
                }
            }
        }

        if response.secondary_clicked()
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
        {
            if let Some(screen_pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(screen_pos);
                self.context_menu.screen_pos = (screen_pos.x, screen_pos.y);
                self.context_menu.world_pos = (world_pos.x, world_pos.y);
                self.context_menu.show = true;
                self.context_menu.just_opened = true;
            }
        }
    }

    /// Opens the in-place label editor for a node.
    pub fn start_editing_label(&mut self, node_id: &str) {
        let Some(node) = self.core.diagram().node(node_id) else {
            return;
        };
        self.interaction.temp_label = node.label.clone();
        self.interaction.editing_label = Some(node_id.to_string());
        self.interaction.should_select_text = true;
        self.interaction.focus_requested_for_edit = false;
        self.core.select_node(node_id);
    }

    /// Commits the in-place label edit, if one is open.
    pub fn commit_label_edit(&mut self) {
        let Some(node_id) = self.interaction.editing_label.take() else {
            return;
        };
        let label = std::mem::take(&mut self.interaction.temp_label);
        if let Err(e) = self.core.set_label(&node_id, &label) {
            log::warn!("Failed to update label: {e}");
            self.status = Some(e.to_string());
        }
        // Force the properties panel to reload its buffers
        self.interaction.props_node = None;
    }

    /// Creates a node at the given world position and opens its label editor.
    pub fn create_node_at(&mut self, shape: NodeShape, world_pos: egui::Pos2) -> NodeId {
        let mut pos = world_pos;
        if self.config.snap_to_grid {
            pos = self.snap_to_grid(pos);
        }
        let id = self.core.create_node(shape, (pos.x, pos.y));
        self.start_editing_label(&id);
        id
    }
}
