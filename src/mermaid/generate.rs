use crate::constants::LAYOUT_COMMENT_PREFIX;
use crate::types::*;
use indexmap::IndexMap;

const INDENT: &str = "    ";

/// Characters that end or confuse an unquoted Mermaid label.
const SPECIAL_CHARS: &[char] = &['[', ']', '{', '}', '(', ')', '|', '<', '>', '"'];

/// Formats a label for use inside node delimiters or between `|` pipes.
///
/// Labels containing Mermaid-significant characters, or starting or ending
/// with a slash that would read as a parallelogram or trapezoid delimiter,
/// are wrapped in double quotes, with inner quotes written as `#quot;`.
pub fn format_label(label: &str) -> String {
    let slash_edge = |c: char| c == '/' || c == '\\';
    if label.contains(SPECIAL_CHARS) || label.starts_with(slash_edge) || label.ends_with(slash_edge) {
        format!("\"{}\"", label.replace('"', "#quot;"))
    } else {
        label.to_string()
    }
}

fn format_node_line(node: &DiagramNode) -> String {
    if node.shape == NodeShape::Rectangle && node.label == node.id {
        return node.id.clone();
    }
    node.shape.wrap(&node.id, &format_label(&node.label))
}

fn format_edge_line(connection: &Connection) -> String {
    match &connection.label {
        Some(label) => format!(
            "{} {}|{}| {}",
            connection.from,
            connection.kind.token(),
            format_label(label),
            connection.to
        ),
        None => format!(
            "{} {} {}",
            connection.from,
            connection.kind.token(),
            connection.to
        ),
    }
}

/// Positions rounded to one decimal so the comment stays readable.
fn format_layout_comment(diagram: &Diagram) -> Option<String> {
    let positions: IndexMap<&str, [f32; 2]> = diagram
        .nodes
        .values()
        .map(|node| {
            let (x, y) = node.position;
            (
                node.id.as_str(),
                [(x * 10.0).round() / 10.0, (y * 10.0).round() / 10.0],
            )
        })
        .collect();
    match serde_json::to_string(&positions) {
        Ok(json) => Some(format!("{LAYOUT_COMMENT_PREFIX} {json}")),
        Err(e) => {
            log::warn!("Failed to serialize node layout: {e}");
            None
        }
    }
}

/// Generates Mermaid flowchart text for a diagram.
///
/// Nodes are declared in insertion order, followed by one line per connection
/// and the layout comment.
pub fn to_mermaid(diagram: &Diagram) -> String {
    let mut lines = vec![format!("flowchart {}", diagram.direction.token())];

    for node in diagram.nodes.values() {
        lines.push(format!("{INDENT}{}", format_node_line(node)));
    }
    for connection in &diagram.connections {
        lines.push(format!("{INDENT}{}", format_edge_line(connection)));
    }
    if !diagram.is_empty() {
        if let Some(comment) = format_layout_comment(diagram) {
            lines.push(comment);
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Diagram {
        let mut diagram = Diagram::new();
        diagram
            .insert_node(DiagramNode::new("node1", NodeShape::Rectangle, (0.0, 0.0)).with_label("Start"))
            .unwrap();
        diagram
            .insert_node(DiagramNode::new("node2", NodeShape::Diamond, (0.0, 140.0)).with_label("Decision"))
            .unwrap();
        let id = diagram.add_connection("node1", "node2", LinkKind::Arrow).unwrap();
        diagram.set_connection_label(id, Some("yes")).unwrap();
        diagram
    }

    #[test]
    fn test_generate_sample() {
        let expected = "flowchart TD\n    node1[Start]\n    node2{Decision}\n    node1 -->|yes| node2\n%% mermaid-canvas-layout {\"node1\":[0.0,0.0],\"node2\":[0.0,140.0]}\n";
        assert_eq!(to_mermaid(&sample()), expected);
    }

    #[test]
    fn test_empty_diagram_has_only_header() {
        let mut diagram = Diagram::new();
        diagram.direction = Direction::LeftRight;
        assert_eq!(to_mermaid(&diagram), "flowchart LR\n");
    }

    #[test]
    fn test_bare_node_when_label_matches_id() {
        let mut diagram = Diagram::new();
        diagram.create_node(NodeShape::Rectangle, (0.0, 0.0));
        diagram.create_node(NodeShape::Circle, (0.0, 0.0));
        let text = to_mermaid(&diagram);
        assert!(text.contains("\n    node1\n"));
        assert!(text.contains("\n    node2((node2))\n"));
    }

    #[test]
    fn test_label_quoting() {
        assert_eq!(format_label("plain text"), "plain text");
        assert_eq!(format_label("f(x)"), "\"f(x)\"");
        assert_eq!(format_label("say \"hi\""), "\"say #quot;hi#quot;\"");
        assert_eq!(format_label("a | b"), "\"a | b\"");
    }

    #[test]
    fn test_link_tokens_and_layout_rounding() {
        let mut diagram = sample();
        diagram.move_node("node2", (10.04, -3.26));
        let id = diagram.connections[0].id;
        diagram.set_connection_kind(id, LinkKind::Dotted).unwrap();
        diagram.set_connection_label(id, None).unwrap();

        let text = to_mermaid(&diagram);
        assert!(text.contains("    node1 -.-> node2\n"));
        assert!(text.contains("\"node2\":[10.0,-3.3]"));
    }

    #[test]
    fn test_slash_labels_survive_reparse() {
        let mut diagram = Diagram::new();
        let cases = [
            ("a", NodeShape::Rectangle, "/api/users"),
            ("b", NodeShape::Rectangle, "\\root"),
            ("c", NodeShape::Parallelogram, "in/"),
            ("d", NodeShape::ParallelogramAlt, "out/"),
            ("e", NodeShape::Rounded, "path\\"),
        ];
        for (id, shape, label) in cases {
            diagram
                .insert_node(DiagramNode::new(id, shape, (0.0, 0.0)).with_label(label))
                .unwrap();
        }
        let text = to_mermaid(&diagram);
        assert!(text.contains("a[\"/api/users\"]"));

        let reparsed = crate::mermaid::parse_mermaid(&text).unwrap().into_diagram(None);
        for (id, shape, label) in cases {
            let node = reparsed.node(id).unwrap();
            assert_eq!((node.shape, node.label.as_str()), (shape, label));
        }
    }

    #[test]
    fn test_hyphenated_ids_survive_reparse() {
        let mut diagram = Diagram::new();
        diagram.create_node(NodeShape::Rectangle, (0.0, 0.0));
        diagram.create_node(NodeShape::Rectangle, (0.0, 140.0));
        diagram.rename_node("node1", "step-1-a").unwrap();
        assert!(diagram.rename_node("node2", "b-").is_err());
        assert!(diagram.rename_node("node2", "b--c").is_err());
        diagram.add_connection("step-1-a", "node2", LinkKind::Arrow).unwrap();

        let reparsed = crate::mermaid::parse_mermaid(&to_mermaid(&diagram))
            .unwrap()
            .into_diagram(None);
        assert!(reparsed.node("step-1-a").is_some());
        assert_eq!(reparsed.connections.len(), 1);
        assert_eq!(reparsed.connections[0].from, "step-1-a");
    }
}
