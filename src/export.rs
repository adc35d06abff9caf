//! Export utilities: render a diagram to SVG and PNG.
//!
//! Notes:
//! - SVG export is supported on all targets (native + wasm).
//! - PNG export rasterises the SVG and is available on native targets only.

use crate::constants::GRID_SIZE;
use crate::geometry::{self, ShapeOutline};
use crate::types::*;
use eframe::egui::{pos2, Color32, Pos2, Rect};
use std::collections::HashSet;
use std::fmt::Write as _;

/// Which part of the diagram to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportScope {
    /// Every node and link
    #[default]
    WholeGraph,
    /// Selected nodes and the links between them
    SelectionOnly,
}

/// Options controlling the exported image.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Whole graph or selection only
    pub scope: ExportScope,
    /// Empty space around the drawing, in pixels
    pub margin_px: f32,
    /// Fill the image with `background_color`; otherwise transparent
    pub include_background: bool,
    /// Used when `include_background` is set
    pub background_color: Color32,
    /// Draw the canvas grid behind the nodes
    pub include_grid: bool,
    /// Fill colour of node shapes
    pub node_fill: Color32,
    /// Node outlines, links and text
    pub stroke_color: Color32,
    /// Outline and link width in pixels
    pub stroke_width: f32,
    /// Label size in pixels
    pub font_size: f32,
    /// Scale factor applied when rasterising to PNG
    pub png_scale: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scope: ExportScope::WholeGraph,
            margin_px: 24.0,
            include_background: true,
            background_color: Color32::WHITE,
            include_grid: false,
            node_fill: Color32::from_rgb(0xec, 0xec, 0xff),
            stroke_color: Color32::from_rgb(0x33, 0x33, 0x33),
            stroke_width: 1.5,
            font_size: 13.0,
            png_scale: 2.0,
        }
    }
}

/// An SVG document with its pixel size.
#[derive(Debug, Clone)]
pub struct SvgDocument {
    /// The SVG markup
    pub svg: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

fn hex(c: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r(), c.g(), c.b())
}

pub(crate) fn escape_xml(input: &str) -> String {
    let mut s = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            '\'' => s.push_str("&apos;"),
            _ => s.push(ch),
        }
    }
    s
}

/// Greedy word wrap using an average glyph width of 0.6 em.
fn wrap_label(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let max_chars = ((max_width / (font_size * 0.6)).floor() as usize).max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(text.to_string());
    }
    lines
}

fn points_attr(points: &[Pos2]) -> String {
    points
        .iter()
        .map(|p| format!("{:.1},{:.1}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_shape(out: &mut String, shape: NodeShape, rect: Rect, fill: &str, stroke: &str, width: f32) {
    let style = format!("fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"{width:.1}\"");
    let c = rect.center();
    let _ = match geometry::shape_outline(shape, rect) {
        ShapeOutline::Rounded(radius) => writeln!(
            out,
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"{radius:.1}\" ry=\"{radius:.1}\" {style} />",
            rect.min.x,
            rect.min.y,
            rect.width(),
            rect.height()
        ),
        ShapeOutline::Ellipse { double } => {
            let (rx, ry) = (rect.width() / 2.0, rect.height() / 2.0);
            let _ = writeln!(
                out,
                "  <ellipse cx=\"{:.1}\" cy=\"{:.1}\" rx=\"{rx:.1}\" ry=\"{ry:.1}\" {style} />",
                c.x, c.y
            );
            if double {
                writeln!(
                    out,
                    "  <ellipse cx=\"{:.1}\" cy=\"{:.1}\" rx=\"{:.1}\" ry=\"{:.1}\" fill=\"none\" stroke=\"{stroke}\" stroke-width=\"{width:.1}\" />",
                    c.x,
                    c.y,
                    (rx - 5.0).max(rx * 0.7),
                    (ry - 5.0).max(ry * 0.7)
                )
            } else {
                Ok(())
            }
        }
        ShapeOutline::Polygon(points) => writeln!(
            out,
            "  <polygon points=\"{}\" {style} />",
            points_attr(&points)
        ),
        ShapeOutline::Cylinder { cap } => {
            let (l, r) = (rect.min.x, rect.max.x);
            let (top, bottom) = (rect.min.y + cap, rect.max.y - cap);
            let rx = rect.width() / 2.0;
            let _ = writeln!(
                out,
                "  <path d=\"M{l:.1},{top:.1} A{rx:.1},{cap:.1} 0 0 1 {r:.1},{top:.1} L{r:.1},{bottom:.1} A{rx:.1},{cap:.1} 0 0 1 {l:.1},{bottom:.1} Z\" {style} />"
            );
            writeln!(
                out,
                "  <path d=\"M{l:.1},{top:.1} A{rx:.1},{cap:.1} 0 0 0 {r:.1},{top:.1}\" fill=\"none\" stroke=\"{stroke}\" stroke-width=\"{width:.1}\" />"
            )
        }
        ShapeOutline::Subroutine { inset } => {
            let _ = writeln!(
                out,
                "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" {style} />",
                rect.min.x,
                rect.min.y,
                rect.width(),
                rect.height()
            );
            for x in [rect.min.x + inset, rect.max.x - inset] {
                let _ = writeln!(
                    out,
                    "  <line x1=\"{x:.1}\" y1=\"{:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"{stroke}\" stroke-width=\"{width:.1}\" />",
                    rect.min.y,
                    rect.max.y
                );
            }
            Ok(())
        }
    };
}

fn write_text(out: &mut String, center: Pos2, text: &str, max_width: f32, font_size: f32, fill: &str) {
    let lines = wrap_label(text, max_width, font_size);
    let line_height = font_size * 1.25;
    let first_y = center.y - line_height * (lines.len() as f32 - 1.0) / 2.0;
    let _ = writeln!(
        out,
        "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"{font_size}\" fill=\"{fill}\" text-anchor=\"middle\" dominant-baseline=\"central\">",
        center.x, first_y
    );
    for (i, line) in lines.iter().enumerate() {
        let dy = if i == 0 { 0.0 } else { line_height };
        let _ = writeln!(
            out,
            "    <tspan x=\"{:.1}\" dy=\"{dy:.1}\">{}</tspan>",
            center.x,
            escape_xml(line)
        );
    }
    let _ = writeln!(out, "  </text>");
}

/// Builds an SVG for the diagram.
///
/// `selection` is only consulted for [`ExportScope::SelectionOnly`]; an empty
/// selection exports the whole graph.
pub fn render_svg(diagram: &Diagram, selection: &[NodeId], options: &ExportOptions) -> SvgDocument {
    let included: HashSet<&str> = match options.scope {
        ExportScope::SelectionOnly if !selection.is_empty() => {
            selection.iter().map(String::as_str).collect()
        }
        _ => diagram.nodes.keys().map(String::as_str).collect(),
    };
    let nodes: Vec<&DiagramNode> = diagram
        .nodes
        .values()
        .filter(|n| included.contains(n.id.as_str()))
        .collect();
    let connections: Vec<&Connection> = diagram
        .connections
        .iter()
        .filter(|c| included.contains(c.from.as_str()) && included.contains(c.to.as_str()))
        .collect();

    let bounds = nodes
        .iter()
        .map(|n| geometry::node_rect(n))
        .reduce(|a, b| a.union(b))
        .unwrap_or_else(|| Rect::from_min_size(pos2(0.0, 0.0), eframe::egui::vec2(1.0, 1.0)));
    let margin = options.margin_px.max(0.0);
    let width = (bounds.width() + 2.0 * margin).ceil().max(1.0) as u32;
    let height = (bounds.height() + 2.0 * margin).ceil().max(1.0) as u32;
    let shift = eframe::egui::vec2(margin - bounds.min.x, margin - bounds.min.y);
    let to_svg = |p: Pos2| p + shift;

    let stroke = hex(options.stroke_color);
    let fill = hex(options.node_fill);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" font-family=\"sans-serif\">"
    );

    if options.include_background {
        let c = options.background_color;
        let _ = writeln!(
            out,
            "<rect x=\"0\" y=\"0\" width=\"{width}\" height=\"{height}\" fill=\"{}\" fill-opacity=\"{}\" />",
            hex(c),
            c.a() as f32 / 255.0
        );
    }

    if options.include_grid {
        let grid = GRID_SIZE;
        let _ = writeln!(out, "<g stroke=\"#cccccc\" stroke-opacity=\"0.3\" stroke-width=\"1\">");
        let mut x = (margin % grid + grid) % grid;
        while x <= width as f32 {
            let _ = writeln!(out, "  <line x1=\"{x:.1}\" y1=\"0\" x2=\"{x:.1}\" y2=\"{height}\" />");
            x += grid;
        }
        let mut y = (margin % grid + grid) % grid;
        while y <= height as f32 {
            let _ = writeln!(out, "  <line x1=\"0\" y1=\"{y:.1}\" x2=\"{width}\" y2=\"{y:.1}\" />");
            y += grid;
        }
        let _ = writeln!(out, "</g>");
    }

    // Links below nodes, arrowheads and labels above them
    let mut overlays = String::new();
    let _ = writeln!(out, "<g fill=\"none\" stroke=\"{stroke}\">");
    for conn in &connections {
        let Some(path) = geometry::connection_path_for(diagram, conn) else {
            continue;
        };
        let [p0, p1, p2, p3] = path.map(to_svg).points;
        let line_width = match conn.kind {
            LinkKind::Thick => options.stroke_width * 2.5,
            _ => options.stroke_width,
        };
        let dash = if conn.kind == LinkKind::Dotted {
            " stroke-dasharray=\"5 4\""
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  <path d=\"M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\" stroke-width=\"{line_width:.1}\"{dash} />",
            p0.x, p0.y, p1.x, p1.y, p2.x, p2.y, p3.x, p3.y
        );
        if conn.kind.has_arrowhead() {
            let tri = geometry::arrowhead(p3, path.end_direction(), 6.0 + line_width * 2.0);
            let _ = writeln!(
                overlays,
                "  <polygon points=\"{}\" fill=\"{stroke}\" />",
                points_attr(&tri)
            );
        }
        if let Some(label) = &conn.label {
            let mid = to_svg(path.midpoint());
            let w = label.chars().count() as f32 * options.font_size * 0.6 + 8.0;
            let h = options.font_size * 1.4;
            let _ = writeln!(
                overlays,
                "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{w:.1}\" height=\"{h:.1}\" fill=\"#f5f5f5\" />",
                mid.x - w / 2.0,
                mid.y - h / 2.0
            );
            write_text(&mut overlays, mid, label, f32::INFINITY, options.font_size, &stroke);
        }
    }
    let _ = writeln!(out, "</g>");

    for node in &nodes {
        let rect = geometry::node_rect(node).translate(shift);
        write_shape(&mut out, node.shape, rect, &fill, &stroke, options.stroke_width);
        write_text(
            &mut out,
            rect.center(),
            &node.label,
            rect.width() - 16.0,
            options.font_size,
            &stroke,
        );
    }

    out.push_str(&overlays);
    let _ = writeln!(out, "</svg>");

    SvgDocument { svg: out, width, height }
}

/// Rasterises an SVG document (native builds only).
#[cfg(not(target_arch = "wasm32"))]
pub fn render_png(doc: &SvgDocument, options: &ExportOptions) -> Result<Vec<u8>, crate::error::ExportError> {
    use crate::error::ExportError;
    use std::sync::Arc;
    use tiny_skia::Pixmap;

    let mut opt = usvg::Options::default();
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    opt.fontdb = Arc::new(db);

    let tree = usvg::Tree::from_data(doc.svg.as_bytes(), &opt)?;

    let scale = options.png_scale.clamp(0.25, 8.0);
    let out_w = ((doc.width as f32) * scale).round().max(1.0) as u32;
    let out_h = ((doc.height as f32) * scale).round().max(1.0) as u32;
    let mut pixmap = Pixmap::new(out_w, out_h).ok_or(ExportError::Pixmap(out_w, out_h))?;

    let transform = tiny_skia::Transform::from_scale(scale, scale);
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| ExportError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Diagram {
        let mut diagram = Diagram::new();
        diagram
            .insert_node(DiagramNode::new("a", NodeShape::Rectangle, (0.0, 0.0)).with_label("Fish & Chips"))
            .unwrap();
        diagram
            .insert_node(DiagramNode::new("b", NodeShape::Diamond, (0.0, 200.0)))
            .unwrap();
        diagram
            .insert_node(DiagramNode::new("c", NodeShape::Circle, (300.0, 200.0)))
            .unwrap();
        let ab = diagram.add_connection("a", "b", LinkKind::Dotted).unwrap();
        diagram.set_connection_label(ab, Some("<go>")).unwrap();
        diagram.add_connection("b", "c", LinkKind::Open).unwrap();
        diagram
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_svg_contains_escaped_labels_and_styles() {
        let doc = render_svg(&sample(), &[], &ExportOptions::default());
        assert!(doc.svg.starts_with("<svg"));
        assert!(doc.svg.trim_end().ends_with("</svg>"));
        assert!(doc.svg.contains("Fish &amp; Chips"));
        assert!(doc.svg.contains("&lt;go&gt;"));
        assert!(doc.svg.contains("stroke-dasharray"));
        assert!(doc.svg.contains("<ellipse"));
        // The diamond and one arrowhead; the open link has none
        assert_eq!(doc.svg.matches("<polygon points=").count(), 2);
    }

    #[test]
    fn test_svg_size_covers_nodes_and_margin() {
        let options = ExportOptions::default();
        let doc = render_svg(&sample(), &[], &options);
        let bounds = geometry::diagram_bounds(&sample()).unwrap();
        assert_eq!(doc.width, (bounds.width() + 2.0 * options.margin_px).ceil() as u32);
        assert_eq!(doc.height, (bounds.height() + 2.0 * options.margin_px).ceil() as u32);
    }

    #[test]
    fn test_selection_scope_filters_nodes_and_links() {
        let options = ExportOptions {
            scope: ExportScope::SelectionOnly,
            ..Default::default()
        };
        let doc = render_svg(&sample(), &["b".to_string(), "c".to_string()], &options);
        assert!(!doc.svg.contains("Fish"));
        assert_eq!(doc.svg.matches("<path d=\"M").count(), 1);
    }

    #[test]
    fn test_empty_diagram_exports() {
        let doc = render_svg(&Diagram::new(), &[], &ExportOptions::default());
        assert!(doc.width > 0 && doc.height > 0);
    }

    #[test]
    fn test_wrap_label() {
        assert_eq!(wrap_label("one two three", 60.0, 10.0), vec!["one two", "three"]);
        assert_eq!(wrap_label("", 60.0, 10.0), vec![String::new()]);
    }
}
