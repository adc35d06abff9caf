//! Automatic placement of nodes.
//!
//! [`layered_positions`] arranges a whole diagram in ranks along its flow axis.
//! [`place_nodes`] only positions nodes that are new to an otherwise laid-out
//! diagram, next to a connected neighbour where possible.

use crate::constants::{NODE_HEIGHT, NODE_SPACING, NODE_WIDTH, RANK_SPACING};
use crate::types::*;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Distance between ranks along the flow axis.
///
/// Horizontal charts need room for the node width rather than its height.
fn rank_step(direction: Direction) -> f32 {
    if direction.is_vertical() {
        RANK_SPACING
    } else {
        RANK_SPACING + NODE_WIDTH - NODE_HEIGHT
    }
}

/// Converts (along, across) flow coordinates into canvas (x, y).
fn to_canvas(direction: Direction, along: f32, across: f32) -> (f32, f32) {
    let along = if direction.is_reversed() { -along } else { along };
    if direction.is_vertical() {
        (across, along)
    } else {
        (along, across)
    }
}

/// Rank of every node: the longest path from a root.
///
/// Cycles are broken by ignoring edges back into the current depth-first path,
/// visiting roots (nodes without incoming edges) first in declaration order.
pub fn compute_ranks(diagram: &Diagram) -> Vec<usize> {
    let count = diagram.nodes.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut indegree = vec![0_usize; count];
    for conn in &diagram.connections {
        let (Some(from), Some(to)) = (
            diagram.nodes.get_index_of(&conn.from),
            diagram.nodes.get_index_of(&conn.to),
        ) else {
            continue;
        };
        adjacency[from].push(to);
        indegree[to] += 1;
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Visit {
        New,
        Active,
        Done,
    }

    fn visit(
        node: usize,
        adjacency: &[Vec<usize>],
        state: &mut [Visit],
        forward: &mut Vec<(usize, usize)>,
        post_order: &mut Vec<usize>,
    ) {
        state[node] = Visit::Active;
        for &next in &adjacency[node] {
            match state[next] {
                Visit::New => {
                    forward.push((node, next));
                    visit(next, adjacency, state, forward, post_order);
                }
                Visit::Active => {}
                Visit::Done => forward.push((node, next)),
            }
        }
        state[node] = Visit::Done;
        post_order.push(node);
    }

    let mut state = vec![Visit::New; count];
    let mut forward = Vec::new();
    let mut post_order = Vec::with_capacity(count);
    let roots = (0..count).filter(|&i| indegree[i] == 0);
    let rest = 0..count;
    for start in roots.chain(rest) {
        if state[start] == Visit::New {
            visit(start, &adjacency, &mut state, &mut forward, &mut post_order);
        }
    }

    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (from, to) in forward {
        outgoing[from].push(to);
    }
    let mut ranks = vec![0_usize; count];
    for &node in post_order.iter().rev() {
        for &next in &outgoing[node] {
            ranks[next] = ranks[next].max(ranks[node] + 1);
        }
    }
    ranks
}

/// Lays out every node in ranks along the flow axis, each rank centred on the axis.
pub fn layered_positions(diagram: &Diagram) -> IndexMap<NodeId, (f32, f32)> {
    let ranks = compute_ranks(diagram);
    let mut layers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, rank) in ranks.iter().enumerate() {
        layers.entry(*rank).or_default().push(index);
    }

    let step = rank_step(diagram.direction);
    let mut coords = vec![(0.0, 0.0); ranks.len()];
    for (rank, members) in &layers {
        let centre = (members.len() as f32 - 1.0) / 2.0;
        for (slot, index) in members.iter().enumerate() {
            let along = *rank as f32 * step;
            let across = (slot as f32 - centre) * NODE_SPACING;
            coords[*index] = to_canvas(diagram.direction, along, across);
        }
    }
    diagram.nodes.keys().cloned().zip(coords).collect()
}

/// Moves every node to its layered position.
pub fn apply_layered_layout(diagram: &mut Diagram) {
    for (id, position) in layered_positions(diagram) {
        diagram.move_node(&id, position);
    }
}

fn overlaps(a: (f32, f32), b: (f32, f32)) -> bool {
    (a.0 - b.0).abs() < NODE_WIDTH && (a.1 - b.1).abs() < NODE_HEIGHT
}

/// First slot at or beside `candidate` that doesn't overlap an occupied position.
fn free_slot(candidate: (f32, f32), across: (f32, f32), occupied: &[(f32, f32)]) -> (f32, f32) {
    for i in 0..64 {
        // 0, +1, -1, +2, -2, ...
        let k = if i % 2 == 1 { (i / 2 + 1) as f32 } else { -((i / 2) as f32) };
        let pos = (candidate.0 + across.0 * k, candidate.1 + across.1 * k);
        if !occupied.iter().any(|o| overlaps(*o, pos)) {
            return pos;
        }
    }
    candidate
}

/// Gives positions to the listed nodes, leaving every other node in place.
///
/// When nothing in the diagram is placed yet the whole diagram gets a layered
/// layout. Otherwise each new node goes one rank after a placed predecessor (or
/// one rank before a placed successor), or beside the existing drawing.
pub fn place_nodes(diagram: &mut Diagram, unplaced: &[NodeId]) {
    if unplaced.is_empty() {
        return;
    }
    let pending: HashSet<&NodeId> = unplaced.iter().collect();
    if diagram.nodes.keys().all(|id| pending.contains(id)) {
        apply_layered_layout(diagram);
        return;
    }

    let direction = diagram.direction;
    let step = to_canvas(direction, rank_step(direction), 0.0);
    let across = if direction.is_vertical() {
        (NODE_SPACING, 0.0)
    } else {
        (0.0, NODE_SPACING)
    };

    let mut placed: HashMap<NodeId, (f32, f32)> = diagram
        .nodes
        .values()
        .filter(|node| !pending.contains(&node.id))
        .map(|node| (node.id.clone(), node.position))
        .collect();

    for id in unplaced {
        let neighbour = diagram.connections.iter().find_map(|conn| {
            if conn.to == *id {
                placed.get(&conn.from).map(|p| (*p, 1.0))
            } else if conn.from == *id {
                placed.get(&conn.to).map(|p| (*p, -1.0))
            } else {
                None
            }
        });
        let candidate = match neighbour {
            Some((base, sign)) => (base.0 + step.0 * sign, base.1 + step.1 * sign),
            None => {
                // Start a new column (or row) beside everything placed so far
                let (max_x, min_y) = placed
                    .values()
                    .fold((f32::MIN, f32::MAX), |(mx, my), p| (mx.max(p.0), my.min(p.1)));
                if direction.is_vertical() {
                    (max_x + NODE_SPACING, min_y)
                } else {
                    let (min_x, max_y) = placed
                        .values()
                        .fold((f32::MAX, f32::MIN), |(mx, my), p| (mx.min(p.0), my.max(p.1)));
                    (min_x, max_y + NODE_SPACING)
                }
            }
        };
        let occupied: Vec<(f32, f32)> = placed.values().copied().collect();
        let position = free_slot(candidate, across, &occupied);
        diagram.move_node(id, position);
        placed.insert(id.clone(), position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(direction: Direction, edges: &[(&str, &str)]) -> Diagram {
        let mut diagram = Diagram::new();
        diagram.direction = direction;
        for (from, to) in edges {
            for id in [from, to] {
                if !diagram.nodes.contains_key(*id) {
                    diagram
                        .insert_node(DiagramNode::new(*id, NodeShape::Rectangle, (0.0, 0.0)))
                        .unwrap();
                }
            }
            diagram.add_connection(from, to, LinkKind::Arrow).unwrap();
        }
        diagram
    }

    #[test]
    fn test_ranks_use_longest_path() {
        // a -> b -> c and a -> c: c sits below b, not beside it
        let diagram = chain(Direction::TopDown, &[("a", "b"), ("b", "c"), ("a", "c")]);
        assert_eq!(compute_ranks(&diagram), vec![0, 1, 2]);
    }

    #[test]
    fn test_cycles_are_broken() {
        let diagram = chain(Direction::TopDown, &[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(compute_ranks(&diagram), vec![0, 1, 2]);
    }

    #[test]
    fn test_root_found_after_cycle_member() {
        // "x" is declared first but has an incoming edge from the root "r"
        let diagram = chain(Direction::TopDown, &[("x", "y"), ("r", "x")]);
        assert_eq!(compute_ranks(&diagram), vec![1, 2, 0]);
    }

    #[test]
    fn test_layered_positions_top_down_centred() {
        let diagram = chain(Direction::TopDown, &[("a", "b"), ("a", "c")]);
        let positions = layered_positions(&diagram);
        assert_eq!(positions["a"], (0.0, 0.0));
        assert_eq!(positions["b"], (-NODE_SPACING / 2.0, RANK_SPACING));
        assert_eq!(positions["c"], (NODE_SPACING / 2.0, RANK_SPACING));
        let order: Vec<&str> = positions.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_layered_positions_right_left() {
        let diagram = chain(Direction::RightLeft, &[("a", "b")]);
        let positions = layered_positions(&diagram);
        assert_eq!(positions["a"], (0.0, 0.0));
        assert_eq!(positions["b"].1, 0.0);
        assert!(positions["b"].0 < -NODE_WIDTH);
    }

    #[test]
    fn test_place_nodes_next_to_predecessor() {
        let mut diagram = chain(Direction::TopDown, &[("a", "b")]);
        diagram.move_node("a", (100.0, 100.0));
        diagram.move_node("b", (500.0, 500.0));
        diagram
            .insert_node(DiagramNode::new("c", NodeShape::Rectangle, (0.0, 0.0)))
            .unwrap();
        diagram.add_connection("a", "c", LinkKind::Arrow).unwrap();

        place_nodes(&mut diagram, &["c".to_string()]);
        assert_eq!(diagram.nodes["a"].position, (100.0, 100.0));
        assert_eq!(diagram.nodes["c"].position, (100.0, 100.0 + RANK_SPACING));
    }

    #[test]
    fn test_place_nodes_avoids_overlap() {
        let mut diagram = chain(Direction::TopDown, &[("a", "b")]);
        diagram.move_node("a", (0.0, 0.0));
        diagram.move_node("b", (0.0, RANK_SPACING));
        diagram
            .insert_node(DiagramNode::new("c", NodeShape::Rectangle, (0.0, 0.0)))
            .unwrap();
        diagram.add_connection("a", "c", LinkKind::Arrow).unwrap();

        place_nodes(&mut diagram, &["c".to_string()]);
        assert_eq!(diagram.nodes["c"].position, (NODE_SPACING, RANK_SPACING));
    }

    #[test]
    fn test_free_slot_tries_after_before_alternately() {
        let across = (NODE_SPACING, 0.0);
        assert_eq!(free_slot((0.0, 0.0), across, &[]), (0.0, 0.0));
        assert_eq!(free_slot((0.0, 0.0), across, &[(0.0, 0.0)]), (NODE_SPACING, 0.0));
        let taken = [(0.0, 0.0), (NODE_SPACING, 0.0)];
        assert_eq!(free_slot((0.0, 0.0), across, &taken), (-NODE_SPACING, 0.0));
    }

    #[test]
    fn test_place_unconnected_node_beside_drawing() {
        let mut diagram = chain(Direction::TopDown, &[("a", "b")]);
        diagram.move_node("a", (0.0, 0.0));
        diagram.move_node("b", (0.0, RANK_SPACING));
        diagram
            .insert_node(DiagramNode::new("lonely", NodeShape::Rectangle, (0.0, 0.0)))
            .unwrap();

        place_nodes(&mut diagram, &["lonely".to_string()]);
        assert_eq!(diagram.nodes["lonely"].position, (NODE_SPACING, 0.0));
    }

    #[test]
    fn test_place_all_nodes_uses_layered_layout() {
        let mut diagram = chain(Direction::LeftRight, &[("a", "b")]);
        let ids: Vec<NodeId> = diagram.nodes.keys().cloned().collect();
        place_nodes(&mut diagram, &ids);
        assert_eq!(diagram.nodes["a"].position, (0.0, 0.0));
        assert_eq!(diagram.nodes["b"].position, (rank_step(Direction::LeftRight), 0.0));
    }
}
