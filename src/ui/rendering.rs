//! Canvas rendering functionality for nodes, connections, and grid.
//!
//! This module handles all drawing operations: the grid background, Bezier
//! connections with arrowheads and labels, node shapes, and the transient
//! overlays (connection preview, marquee).

use super::highlighters;
use super::state::EditorApp;
use crate::constants::BEZIER_SAMPLES;
use crate::geometry::{self, ShapeOutline};
use crate::types::*;
use eframe::egui;
use eframe::epaint::StrokeKind;

const SELECTION_COLOR: egui::Color32 = egui::Color32::from_rgb(100, 150, 255);
const NODE_FILL: egui::Color32 = egui::Color32::from_rgb(0xec, 0xec, 0xff);
const NODE_STROKE: egui::Color32 = egui::Color32::from_rgb(0x93, 0x70, 0xdb);
const INVALID_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 80, 80);

impl EditorApp {
    /// Renders all diagram elements on the canvas.
    ///
    /// Elements are drawn in layers: grid first (background), then connections,
    /// then nodes, then link labels and overlays on top.
    pub fn render_diagram(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        if self.config.show_grid {
            self.draw_grid(painter, canvas_rect);
        }

        let diagram = self.core.diagram();
        let selected_connection = self.core.selected_connection();
        for connection in &diagram.connections {
            self.draw_connection(painter, connection, selected_connection == Some(connection.id));
        }

        if let (Some(from_node_id), Some(draw_pos)) = (
            &self.interaction.drawing_connection_from,
            self.interaction.connection_draw_pos,
        ) {
            self.draw_connection_preview(painter, from_node_id, draw_pos);
        }

        for node in diagram.nodes.values() {
            self.draw_node(painter, node);
        }

        // Labels go last so nodes never hide them
        for connection in &diagram.connections {
            self.draw_connection_label(painter, connection);
        }

        if let (Some(start), Some(end)) =
            (self.interaction.marquee_start, self.interaction.marquee_end)
        {
            let rect = egui::Rect::from_two_pos(start, end);
            let fill = egui::Color32::from_rgba_unmultiplied(100, 150, 255, 40);
            painter.rect_filled(rect, 0.0, fill);
            painter.rect_stroke(rect, 0.0, egui::Stroke::new(1.5, SELECTION_COLOR), StrokeKind::Inside);
        }
    }

    /// Draws a zoom-aware grid on the canvas for visual reference.
    ///
    /// Lines are skipped entirely once the on-screen spacing drops below two
    /// pixels. The axes are drawn more prominently when zoomed in.
    pub fn draw_grid(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let grid_size = self.config.grid_size;
        let screen_grid_size = grid_size * self.canvas.zoom_factor;
        if screen_grid_size < 2.0 {
            return;
        }

        let stroke = egui::Stroke::new(1.0, egui::Color32::from_rgba_unmultiplied(128, 128, 128, 32));
        let top_left = self.screen_to_world(canvas_rect.min);
        let bottom_right = self.screen_to_world(canvas_rect.max);

        let mut x = (top_left.x / grid_size).floor() * grid_size;
        while x <= bottom_right.x {
            let screen_x = self.world_to_screen(egui::pos2(x, 0.0)).x;
            painter.vline(screen_x, canvas_rect.y_range(), stroke);
            x += grid_size;
        }

        let mut y = (top_left.y / grid_size).floor() * grid_size;
        while y <= bottom_right.y {
            let screen_y = self.world_to_screen(egui::pos2(0.0, y)).y;
            painter.hline(canvas_rect.x_range(), screen_y, stroke);
            y += grid_size;
        }

        if screen_grid_size > 10.0 {
            let axis_stroke =
                egui::Stroke::new(1.5, egui::Color32::from_rgba_unmultiplied(128, 128, 128, 80));
            let origin = self.world_to_screen(egui::Pos2::ZERO);
            if canvas_rect.y_range().contains(origin.y) {
                painter.hline(canvas_rect.x_range(), origin.y, axis_stroke);
            }
            if canvas_rect.x_range().contains(origin.x) {
                painter.vline(origin.x, canvas_rect.y_range(), axis_stroke);
            }
        }
    }

    fn link_color(&self) -> egui::Color32 {
        if self.config.dark_mode {
            egui::Color32::from_gray(200)
        } else {
            egui::Color32::from_gray(60)
        }
    }

    /// Renders a connection as a Bezier curve in its link style.
    ///
    /// Dotted links are dashed, thick links wider, and open links have no arrowhead.
    pub fn draw_connection(&self, painter: &egui::Painter, connection: &Connection, is_selected: bool) {
        let Some(path) = geometry::connection_path_for(self.core.diagram(), connection) else {
            return;
        };
        let path = path.map(|p| self.world_to_screen(p));
        let zoom = self.canvas.zoom_factor;

        let color = if is_selected { SELECTION_COLOR } else { self.link_color() };
        let base_width = if is_selected { 2.5 } else { 1.5 };
        let width = match connection.kind {
            LinkKind::Thick => base_width * 2.5,
            _ => base_width,
        } * zoom.max(0.5);
        let stroke = egui::Stroke::new(width, color);

        let points = path.sample(BEZIER_SAMPLES);
        if connection.kind == LinkKind::Dotted {
            painter.extend(egui::Shape::dashed_line(&points, stroke, 6.0 * zoom, 4.0 * zoom));
        } else {
            painter.add(egui::Shape::line(points, stroke));
        }

        if connection.kind.has_arrowhead() {
            let tip = geometry::arrowhead(path.end(), path.end_direction(), 10.0 * zoom);
            painter.add(egui::Shape::convex_polygon(tip.to_vec(), color, egui::Stroke::NONE));
        }
    }

    /// Draws a connection's label on a small plate at the curve midpoint.
    fn draw_connection_label(&self, painter: &egui::Painter, connection: &Connection) {
        let Some(label) = connection.label.as_deref().filter(|l| !l.is_empty()) else {
            return;
        };
        let Some(path) = geometry::connection_path_for(self.core.diagram(), connection) else {
            return;
        };
        let mid = self.world_to_screen(path.midpoint());
        let font_id = egui::FontId::proportional((11.0 * self.canvas.zoom_factor).clamp(7.0, 40.0));
        let text_color = if self.config.dark_mode {
            egui::Color32::from_gray(230)
        } else {
            egui::Color32::from_gray(30)
        };
        let plate_color = if self.config.dark_mode {
            egui::Color32::from_gray(45)
        } else {
            egui::Color32::from_gray(245)
        };

        let galley = painter.layout_no_wrap(label.to_string(), font_id, text_color);
        let rect = egui::Align2::CENTER_CENTER.anchor_size(mid, galley.size());
        painter.rect_filled(rect.expand(3.0), 3.0, plate_color);
        painter.galley(rect.min, galley, text_color);
    }

    /// Renders a preview of the connection being drawn during a Shift-drag.
    ///
    /// The line is blue while the target is acceptable and red over the source
    /// node or a node that is already linked the same way.
    pub fn draw_connection_preview(&self, painter: &egui::Painter, from_node_id: &str, to_screen_pos: egui::Pos2) {
        let Some(from_node) = self.core.diagram().node(from_node_id) else {
            return;
        };
        let from_rect = geometry::node_rect(from_node);
        let to_world = self.screen_to_world(to_screen_pos);
        let start = self.world_to_screen(geometry::anchor_point(from_rect, to_world));

        let color = if self.connection_target_valid(from_node_id, to_world) {
            SELECTION_COLOR
        } else {
            INVALID_COLOR
        };
        painter.line_segment([start, to_screen_pos], egui::Stroke::new(2.0, color));
        painter.circle_filled(to_screen_pos, 4.0, color);
    }

    /// Renders a single node in its Mermaid shape with its wrapped label.
    ///
    /// Selected nodes get a blue outline, the node being dragged an orange one.
    pub fn draw_node(&self, painter: &egui::Painter, node: &DiagramNode) {
        let world_rect = geometry::node_rect(node);
        let rect = egui::Rect::from_min_max(
            self.world_to_screen(world_rect.min),
            self.world_to_screen(world_rect.max),
        );
        if !painter.clip_rect().intersects(rect.expand(4.0)) {
            return;
        }

        let is_dragging = self.interaction.dragging_node.as_deref() == Some(node.id.as_str())
            && self.core.is_moving();
        let stroke = if is_dragging {
            egui::Stroke::new(3.0, egui::Color32::from_rgb(255, 165, 0))
        } else if self.core.selection().contains_node(&node.id) {
            egui::Stroke::new(3.0, SELECTION_COLOR)
        } else {
            egui::Stroke::new(1.5 * self.canvas.zoom_factor.max(0.5), NODE_STROKE)
        };

        self.draw_shape(painter, node.shape, rect, NODE_FILL, stroke);

        if self.interaction.editing_label.as_deref() != Some(node.id.as_str()) {
            self.draw_node_text(painter, &node.label, rect);
        }
    }

    /// Paints a shape outline fitted to `rect` (screen space).
    fn draw_shape(
        &self,
        painter: &egui::Painter,
        shape: NodeShape,
        rect: egui::Rect,
        fill: egui::Color32,
        stroke: egui::Stroke,
    ) {
        let center = rect.center();
        match geometry::shape_outline(shape, rect) {
            ShapeOutline::Rounded(radius) => {
                painter.rect(rect, radius, fill, stroke, StrokeKind::Inside);
            }
            ShapeOutline::Ellipse { double } => {
                let radius = rect.size() / 2.0;
                painter.add(egui::Shape::ellipse_filled(center, radius, fill));
                painter.add(egui::Shape::ellipse_stroke(center, radius, stroke));
                if double {
                    let gap = 5.0 * self.canvas.zoom_factor;
                    let inner = egui::vec2((radius.x - gap).max(radius.x * 0.7), (radius.y - gap).max(radius.y * 0.7));
                    painter.add(egui::Shape::ellipse_stroke(center, inner, stroke));
                }
            }
            ShapeOutline::Polygon(points) => {
                painter.add(egui::Shape::convex_polygon(points, fill, stroke));
            }
            ShapeOutline::Cylinder { cap } => {
                let radius = egui::vec2(rect.width() / 2.0, cap);
                let top = egui::pos2(center.x, rect.min.y + cap);
                let bottom = egui::pos2(center.x, rect.max.y - cap);
                let body = egui::Rect::from_min_max(
                    egui::pos2(rect.min.x, top.y),
                    egui::pos2(rect.max.x, bottom.y),
                );
                painter.add(egui::Shape::ellipse_filled(bottom, radius, fill));
                painter.add(egui::Shape::ellipse_stroke(bottom, radius, stroke));
                painter.rect_filled(body, 0.0, fill);
                painter.vline(rect.min.x, body.y_range(), stroke);
                painter.vline(rect.max.x, body.y_range(), stroke);
                painter.add(egui::Shape::ellipse_filled(top, radius, fill));
                painter.add(egui::Shape::ellipse_stroke(top, radius, stroke));
            }
            ShapeOutline::Subroutine { inset } => {
                painter.rect(rect, 0.0, fill, stroke, StrokeKind::Inside);
                painter.vline(rect.min.x + inset, rect.y_range(), stroke);
                painter.vline(rect.max.x - inset, rect.y_range(), stroke);
            }
        }
    }

    /// Renders a node label wrapped to the node width and vertically centred.
    fn draw_node_text(&self, painter: &egui::Painter, label: &str, rect: egui::Rect) {
        let zoom = self.canvas.zoom_factor;
        let font_id = egui::FontId::proportional((13.0 * zoom).clamp(6.0, 48.0));
        let max_width = (rect.width() - 16.0 * zoom).max(8.0);
        let lines = wrap_text(label, max_width, |line| {
            painter
                .layout_no_wrap(line.to_string(), font_id.clone(), egui::Color32::BLACK)
                .size()
                .x
        });

        let line_height = painter
            .layout_no_wrap("Ag".to_string(), font_id.clone(), egui::Color32::BLACK)
            .size()
            .y;
        let total_height = line_height * lines.len() as f32;
        let start_y = rect.center().y - total_height / 2.0 + line_height / 2.0;

        for (i, line) in lines.iter().enumerate() {
            painter.text(
                egui::pos2(rect.center().x, start_y + i as f32 * line_height),
                egui::Align2::CENTER_CENTER,
                line,
                font_id.clone(),
                egui::Color32::BLACK,
            );
        }
    }
}

/// Wraps text at word boundaries so each line measures at most `max_width`.
///
/// Explicit newlines are kept. A single word wider than the limit gets a line
/// of its own.
pub fn wrap_text(text: &str, max_width: f32, mut measure: impl FnMut(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current_line.is_empty() {
                word.to_string()
            } else {
                format!("{current_line} {word}")
            };
            if measure(&candidate) <= max_width || current_line.is_empty() {
                current_line = candidate;
            } else {
                lines.push(std::mem::replace(&mut current_line, word.to_string()));
            }
        }
        lines.push(current_line);
    }
    lines
}

/// Creates a Mermaid syntax highlighting layouter for the code panel.
pub fn create_mermaid_layouter(
    dark_mode: bool,
) -> impl FnMut(&egui::Ui, &dyn egui::TextBuffer, f32) -> std::sync::Arc<egui::Galley> {
    move |ui: &egui::Ui, text: &dyn egui::TextBuffer, wrap_width: f32| {
        let font_id = egui::TextStyle::Monospace.resolve(ui.style());
        let mut layout_job = highlighters::highlight_mermaid(text.as_str(), font_id, dark_mode);
        layout_job.wrap.max_width = wrap_width;
        ui.painter().layout_job(layout_job)
    }
}
