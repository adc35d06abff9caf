//! Geometry helpers: node rectangles, hit-testing and Bezier connection paths.
//!
//! Everything here works in world coordinates. The canvas converts to and from
//! screen space before calling in.

use crate::constants::{BEZIER_SAMPLES, CONTROL_DISTANCE_RATIO, MIN_CONTROL_DISTANCE};
use crate::types::*;
use eframe::egui::{pos2, vec2, Pos2, Rect, Vec2};

/// World-space rectangle occupied by a node.
pub fn node_rect(node: &DiagramNode) -> Rect {
    let (w, h) = node.shape.size();
    Rect::from_center_size(pos2(node.position.0, node.position.1), vec2(w, h))
}

/// Finds the topmost node containing `point`.
///
/// Nodes declared later are drawn on top, so the search runs back to front.
pub fn node_at(diagram: &Diagram, point: Pos2) -> Option<NodeId> {
    diagram
        .nodes
        .values()
        .rev()
        .find(|node| node_rect(node).contains(point))
        .map(|node| node.id.clone())
}

/// Ids of all nodes whose centre lies inside `rect`, in declaration order.
pub fn nodes_in_rect(diagram: &Diagram, rect: Rect) -> Vec<NodeId> {
    diagram
        .nodes
        .values()
        .filter(|node| rect.contains(pos2(node.position.0, node.position.1)))
        .map(|node| node.id.clone())
        .collect()
}

/// Bounding box of every node in the diagram, or `None` when it is empty.
pub fn diagram_bounds(diagram: &Diagram) -> Option<Rect> {
    diagram
        .nodes
        .values()
        .map(node_rect)
        .reduce(|acc, rect| acc.union(rect))
}

/// Point where a ray from the centre of `rect` toward `toward` leaves the rectangle.
pub fn anchor_point(rect: Rect, toward: Pos2) -> Pos2 {
    let center = rect.center();
    let dir = toward - center;
    if dir.length_sq() < f32::EPSILON {
        return center;
    }
    let half = rect.size() * 0.5;
    let scale_x = if dir.x.abs() > f32::EPSILON {
        half.x / dir.x.abs()
    } else {
        f32::INFINITY
    };
    let scale_y = if dir.y.abs() > f32::EPSILON {
        half.y / dir.y.abs()
    } else {
        f32::INFINITY
    };
    center + dir * scale_x.min(scale_y).min(1.0)
}

/// Snaps a position to the nearest grid point.
pub fn snap_to_grid(pos: Pos2, grid: f32) -> Pos2 {
    if grid <= 0.0 {
        return pos;
    }
    pos2((pos.x / grid).round() * grid, (pos.y / grid).round() * grid)
}

/// Distance from a point to a line segment.
///
/// Uses vector projection to find the closest point on the segment.
pub fn point_to_segment_distance(point: Pos2, start: Pos2, end: Pos2) -> f32 {
    let line_vec = end - start;
    let point_vec = point - start;
    let line_len_sq = line_vec.length_sq();

    if line_len_sq < 0.0001 {
        return point_vec.length();
    }

    let t = (point_vec.dot(line_vec) / line_len_sq).clamp(0.0, 1.0);
    let projection = start + line_vec * t;
    (point - projection).length()
}

/// A cubic Bezier curve: start, two control points, end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicPath {
    /// Start, first control, second control, end
    pub points: [Pos2; 4],
}

impl CubicPath {
    /// Point on the source node.
    pub fn start(&self) -> Pos2 {
        self.points[0]
    }

    /// Point on the target node, where the arrowhead goes.
    pub fn end(&self) -> Pos2 {
        self.points[3]
    }

    /// Evaluates the curve at `t` in [0, 1].
    pub fn point_at(&self, t: f32) -> Pos2 {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        let [p0, p1, p2, p3] = self.points;
        let v = p0.to_vec2() * (u * u * u)
            + p1.to_vec2() * (3.0 * u * u * t)
            + p2.to_vec2() * (3.0 * u * t * t)
            + p3.to_vec2() * (t * t * t);
        v.to_pos2()
    }

    /// Flattens the curve into `segments + 1` points.
    pub fn sample(&self, segments: usize) -> Vec<Pos2> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f32 / segments as f32))
            .collect()
    }

    /// Where a link label is drawn.
    pub fn midpoint(&self) -> Pos2 {
        self.point_at(0.5)
    }

    /// Unit direction of travel at the end of the curve, used to orient arrowheads.
    pub fn end_direction(&self) -> Vec2 {
        let [_, _, p2, p3] = self.points;
        let dir = p3 - p2;
        if dir.length_sq() > f32::EPSILON {
            dir.normalized()
        } else {
            (p3 - self.points[0]).normalized()
        }
    }

    /// Approximate distance from `point` to the curve.
    pub fn distance_to(&self, point: Pos2) -> f32 {
        self.sample(BEZIER_SAMPLES)
            .windows(2)
            .map(|seg| point_to_segment_distance(point, seg[0], seg[1]))
            .fold(f32::INFINITY, f32::min)
    }

    /// Applies a transform to every control point (e.g. world to screen).
    pub fn map(&self, f: impl Fn(Pos2) -> Pos2) -> Self {
        Self {
            points: self.points.map(f),
        }
    }
}

/// Builds the Bezier path between two node rectangles.
///
/// The path runs between the points where the centre-to-centre line leaves
/// each rectangle. Control points are pushed out along the flow axis of the
/// diagram (y for TD/BT, x for LR/RL) by `max(40, 0.4 * axis distance)`.
pub fn connection_path(from: Rect, to: Rect, direction: Direction) -> CubicPath {
    let start = anchor_point(from, to.center());
    let end = anchor_point(to, from.center());
    let axis = if direction.is_vertical() {
        vec2(0.0, 1.0)
    } else {
        vec2(1.0, 0.0)
    };
    let along = (end - start).dot(axis);
    // Level nodes bend the way the chart flows
    let sign = if along.abs() > f32::EPSILON {
        along.signum()
    } else if direction.is_reversed() {
        -1.0
    } else {
        1.0
    };
    let push = axis * (sign * (CONTROL_DISTANCE_RATIO * along.abs()).max(MIN_CONTROL_DISTANCE));
    CubicPath {
        points: [start, start + push, end - push, end],
    }
}

/// Path of an existing connection, or `None` if an endpoint is missing.
pub fn connection_path_for(diagram: &Diagram, connection: &Connection) -> Option<CubicPath> {
    let from = diagram.nodes.get(&connection.from)?;
    let to = diagram.nodes.get(&connection.to)?;
    Some(connection_path(node_rect(from), node_rect(to), diagram.direction))
}

/// Finds the first connection whose path passes within `threshold` of `point`.
pub fn connection_at(diagram: &Diagram, point: Pos2, threshold: f32) -> Option<ConnectionId> {
    diagram
        .connections
        .iter()
        .find(|conn| {
            connection_path_for(diagram, conn)
                .is_some_and(|path| path.distance_to(point) < threshold)
        })
        .map(|conn| conn.id)
}

/// Triangle of an arrowhead whose tip sits at `tip`, pointing along `dir`.
pub fn arrowhead(tip: Pos2, dir: Vec2, length: f32) -> [Pos2; 3] {
    let dir = if dir.length_sq() < f32::EPSILON {
        vec2(0.0, 1.0)
    } else {
        dir.normalized()
    };
    let perp = vec2(-dir.y, dir.x);
    let base = tip - dir * length;
    let half_width = length * 0.6;
    [tip, base + perp * half_width, base - perp * half_width]
}

/// How a node shape is drawn inside its rectangle.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeOutline {
    /// Rectangle with the given corner radius
    Rounded(f32),
    /// Ellipse filling the rect; `double` adds an inner ring
    Ellipse {
        /// Draw an inner ring as well
        double: bool,
    },
    /// Closed convex polygon
    Polygon(Vec<Pos2>),
    /// Body with elliptic caps of height `cap`
    Cylinder {
        /// Height of each cap
        cap: f32,
    },
    /// Rectangle with vertical bars `inset` from each side
    Subroutine {
        /// Distance of each bar from its side
        inset: f32,
    },
}

/// Outline of `shape` fitted to `rect`. Proportions scale with the rect, so
/// this works the same in world and screen space.
pub fn shape_outline(shape: NodeShape, rect: Rect) -> ShapeOutline {
    let (l, r, t, b) = (rect.min.x, rect.max.x, rect.min.y, rect.max.y);
    let (w, h) = (rect.width(), rect.height());
    let c = rect.center();
    match shape {
        NodeShape::Rectangle => ShapeOutline::Rounded(h * 0.08),
        NodeShape::Rounded => ShapeOutline::Rounded(h * 0.25),
        NodeShape::Stadium => ShapeOutline::Rounded(h * 0.5),
        NodeShape::Subroutine => ShapeOutline::Subroutine { inset: w * 0.08 },
        NodeShape::Cylinder => ShapeOutline::Cylinder { cap: h / 6.0 },
        NodeShape::Circle => ShapeOutline::Ellipse { double: false },
        NodeShape::DoubleCircle => ShapeOutline::Ellipse { double: true },
        NodeShape::Diamond => ShapeOutline::Polygon(vec![
            pos2(c.x, t),
            pos2(r, c.y),
            pos2(c.x, b),
            pos2(l, c.y),
        ]),
        NodeShape::Hexagon => {
            let offset = w * 0.2;
            ShapeOutline::Polygon(vec![
                pos2(l + offset, t),
                pos2(r - offset, t),
                pos2(r, c.y),
                pos2(r - offset, b),
                pos2(l + offset, b),
                pos2(l, c.y),
            ])
        }
        NodeShape::Parallelogram => {
            let skew = h * 0.35;
            ShapeOutline::Polygon(vec![pos2(l + skew, t), pos2(r, t), pos2(r - skew, b), pos2(l, b)])
        }
        NodeShape::ParallelogramAlt => {
            let skew = h * 0.35;
            ShapeOutline::Polygon(vec![pos2(l, t), pos2(r - skew, t), pos2(r, b), pos2(l + skew, b)])
        }
        NodeShape::Trapezoid => {
            let inset = w * 0.15;
            ShapeOutline::Polygon(vec![pos2(l + inset, t), pos2(r - inset, t), pos2(r, b), pos2(l, b)])
        }
        NodeShape::TrapezoidAlt => {
            let inset = w * 0.15;
            ShapeOutline::Polygon(vec![pos2(l, t), pos2(r, t), pos2(r - inset, b), pos2(l + inset, b)])
        }
        NodeShape::Asymmetric => {
            let skew = h * 0.45;
            ShapeOutline::Polygon(vec![
                pos2(l, t),
                pos2(r - skew, t),
                pos2(r, c.y),
                pos2(r - skew, b),
                pos2(l, b),
            ])
        }
    }
}
