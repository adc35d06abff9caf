//! Parser for the subset of Mermaid flowchart syntax the canvas can represent.

use super::layout;
use crate::constants::LAYOUT_COMMENT_PREFIX;
use crate::error::ParseError;
use crate::types::*;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Statements that only style or annotate the chart.
const IGNORED_KEYWORDS: &[&str] = &["style", "classdef", "class", "click", "linkstyle"];

/// Result of parsing Mermaid text, before positions are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDiagram {
    /// From the `flowchart`/`graph` header
    pub direction: Direction,
    /// Declared nodes in first-mention order. Positions are not yet meaningful.
    pub nodes: IndexMap<NodeId, DiagramNode>,
    /// Links in declaration order
    pub connections: Vec<Connection>,
    /// Positions recovered from the layout comment
    pub layout: HashMap<NodeId, (f32, f32)>,
}

impl ParsedDiagram {
    /// Resolves node positions and produces an editable diagram.
    ///
    /// Each node takes its position from the layout comment, else from the node
    /// with the same id in `previous`, else from automatic placement.
    /// Connections that still link the same nodes keep their ids from
    /// `previous`, so selections survive a text edit.
    pub fn into_diagram(self, previous: Option<&Diagram>) -> Diagram {
        let mut diagram = Diagram {
            direction: self.direction,
            nodes: IndexMap::with_capacity(self.nodes.len()),
            connections: Vec::with_capacity(self.connections.len()),
        };

        let mut unplaced = Vec::new();
        for (id, mut node) in self.nodes {
            if let Some(position) = self.layout.get(&id) {
                node.position = *position;
            } else if let Some(old) = previous.and_then(|p| p.nodes.get(&id)) {
                node.position = old.position;
            } else {
                unplaced.push(id.clone());
            }
            diagram.nodes.insert(id, node);
        }

        let mut reused = HashSet::new();
        for mut connection in self.connections {
            let old = previous.and_then(|p| {
                p.connections.iter().find(|c| {
                    c.from == connection.from && c.to == connection.to && !reused.contains(&c.id)
                })
            });
            if let Some(old) = old {
                connection.id = old.id;
            }
            reused.insert(connection.id);
            diagram.connections.push(connection);
        }

        layout::place_nodes(&mut diagram, &unplaced);
        diagram
    }
}

/// Parses Mermaid flowchart text.
///
/// Accepts `flowchart`/`graph` headers, every node shape and link style the
/// canvas supports, edge labels, chains, `&` groups and `;` separators.
/// Subgraphs are flattened; styling statements are skipped.
pub fn parse_mermaid(text: &str) -> Result<ParsedDiagram, ParseError> {
    let mut parser = Parser::default();
    let mut header_seen = false;
    let mut subgraph_depth = 0_usize;
    let mut last_line = 1;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        last_line = line_no;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("%%") {
            if let Some(json) = trimmed.strip_prefix(LAYOUT_COMMENT_PREFIX) {
                parser.read_layout(json);
            }
            continue;
        }

        let mut statements = split_statements(trimmed).into_iter();
        if !header_seen {
            let header = statements.next().unwrap_or_default();
            parser.direction = parse_header(header, line_no)?;
            header_seen = true;
        }

        for statement in statements {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            let keyword = statement
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            match keyword.as_str() {
                "subgraph" => subgraph_depth += 1,
                "end" => {
                    if subgraph_depth == 0 {
                        return Err(ParseError::new(
                            line_no,
                            "'end' without matching 'subgraph'",
                        ));
                    }
                    subgraph_depth -= 1;
                }
                "direction" if is_direction_statement(statement) => {}
                k if IGNORED_KEYWORDS.contains(&k) => {
                    log::debug!("Skipping '{k}' statement on line {line_no}");
                }
                _ => parser.parse_statement(statement, line_no)?,
            }
        }
    }

    if !header_seen {
        return Err(ParseError::new(1, "empty diagram: expected a 'flowchart' header"));
    }
    if subgraph_depth > 0 {
        return Err(ParseError::new(last_line, "subgraph missing closing 'end'"));
    }

    Ok(ParsedDiagram {
        direction: parser.direction,
        nodes: parser.nodes,
        connections: parser.connections,
        layout: parser.layout,
    })
}

fn parse_header(header: &str, line: usize) -> Result<Direction, ParseError> {
    let mut parts = header.split_whitespace();
    let keyword = parts.next().unwrap_or_default().to_ascii_lowercase();
    if keyword != "flowchart" && keyword != "graph" {
        return Err(ParseError::new(
            line,
            format!("expected a 'flowchart' or 'graph' header, found '{header}'"),
        ));
    }
    match parts.next() {
        None => Ok(Direction::TopDown),
        Some(token) => Direction::parse(token).ok_or_else(|| {
            ParseError::new(
                line,
                format!("unsupported direction '{token}'; supported values are TD, TB, BT, LR, RL"),
            )
        }),
    }
}

/// Splits a line on `;` outside of quotes, brackets and edge-label pipes.
fn split_statements(line: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut depth = 0_i32;
    let mut in_quotes = false;
    let mut in_pipes = false;
    let mut start = 0;
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '[' | '(' | '{' if !in_quotes => depth += 1,
            ']' | ')' | '}' if !in_quotes => depth -= 1,
            '|' if !in_quotes && depth <= 0 => in_pipes = !in_pipes,
            ';' if !in_quotes && !in_pipes && depth <= 0 => {
                statements.push(&line[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&line[start..]);
    statements
}

/// Strips surrounding quotes and decodes `#quot;`.
fn clean_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    inner.replace("#quot;", "\"")
}

/// Byte cursor over one statement. Every delimiter the parser looks for is
/// ASCII, so offsets found with `str::find` are always char boundaries.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn is_done(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.src.len());
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.advance(rest.len() - rest.trim_start().len());
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.rest().starts_with(ch) {
            self.advance(ch.len_utf8());
            true
        } else {
            false
        }
    }

    /// Takes a node identifier. A `-` is part of the id unless it starts a link.
    fn take_id(&mut self) -> &'a str {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = 0;
        while end < bytes.len() {
            let b = bytes[end];
            let is_id_char = b.is_ascii_alphanumeric()
                || b == b'_'
                || (b == b'-' && matches!(bytes.get(end + 1), Some(c) if c.is_ascii_alphanumeric() || *c == b'_'));
            if !is_id_char {
                break;
            }
            end += 1;
        }
        self.advance(end);
        &rest[..end]
    }
}

/// `direction TB` inside a subgraph. Flattened subgraphs keep the chart direction.
fn is_direction_statement(statement: &str) -> bool {
    let mut words = statement.split_whitespace().skip(1);
    matches!((words.next(), words.next()), (Some(dir), None) if Direction::parse(dir).is_some())
}

/// Openers and the closers that may end them, longest openers first.
const SHAPE_SYNTAX: &[(&str, &[(&str, NodeShape)])] = &[
    ("(((", &[(")))", NodeShape::DoubleCircle)]),
    ("((", &[("))", NodeShape::Circle)]),
    ("([", &[("])", NodeShape::Stadium)]),
    ("[[", &[("]]", NodeShape::Subroutine)]),
    ("[(", &[(")]", NodeShape::Cylinder)]),
    ("{{", &[("}}", NodeShape::Hexagon)]),
    ("[/", &[("/]", NodeShape::Parallelogram), ("\\]", NodeShape::Trapezoid)]),
    ("[\\", &[("\\]", NodeShape::ParallelogramAlt), ("/]", NodeShape::TrapezoidAlt)]),
    ("(", &[(")", NodeShape::Rounded)]),
    ("[", &[("]", NodeShape::Rectangle)]),
    ("{", &[("}", NodeShape::Diamond)]),
    (">", &[("]", NodeShape::Asymmetric)]),
];

#[derive(Default)]
struct Parser {
    direction: Direction,
    nodes: IndexMap<NodeId, DiagramNode>,
    connections: Vec<Connection>,
    layout: HashMap<NodeId, (f32, f32)>,
}

impl Parser {
    fn read_layout(&mut self, json: &str) {
        match serde_json::from_str::<HashMap<NodeId, (f32, f32)>>(json.trim()) {
            Ok(positions) => self.layout.extend(positions),
            Err(e) => log::warn!("Ignoring malformed layout comment: {e}"),
        }
    }

    /// Parses `group (link group)*` where a group is `node (& node)*`.
    fn parse_statement(&mut self, statement: &str, line: usize) -> Result<(), ParseError> {
        let mut cursor = Cursor::new(statement);
        let mut sources = self.parse_node_group(&mut cursor, line)?;

        loop {
            cursor.skip_ws();
            if cursor.is_done() {
                return Ok(());
            }
            let Some((kind, text_label)) = parse_link(&mut cursor, line)? else {
                return Err(ParseError::new(
                    line,
                    format!("unexpected '{}'", cursor.rest()),
                ));
            };
            cursor.skip_ws();
            let label = match text_label {
                Some(label) => Some(label),
                None => parse_pipe_label(&mut cursor, line)?,
            };
            cursor.skip_ws();
            if cursor.is_done() {
                return Err(ParseError::new(line, "expected a node after the link"));
            }
            let targets = self.parse_node_group(&mut cursor, line)?;
            for from in &sources {
                for to in &targets {
                    self.add_edge(from, to, kind, label.clone(), line);
                }
            }
            sources = targets;
        }
    }

    fn parse_node_group(
        &mut self,
        cursor: &mut Cursor<'_>,
        line: usize,
    ) -> Result<Vec<NodeId>, ParseError> {
        let mut group = vec![self.parse_node_ref(cursor, line)?];
        loop {
            cursor.skip_ws();
            if !cursor.eat('&') {
                return Ok(group);
            }
            group.push(self.parse_node_ref(cursor, line)?);
        }
    }

    fn parse_node_ref(&mut self, cursor: &mut Cursor<'_>, line: usize) -> Result<NodeId, ParseError> {
        cursor.skip_ws();
        let id = cursor.take_id();
        if id.is_empty() {
            return Err(ParseError::new(
                line,
                format!("expected a node id, found '{}'", cursor.rest()),
            ));
        }
        if !is_valid_node_id(id) {
            return Err(ParseError::new(line, format!("'{id}' is not a valid node id")));
        }

        let shape = parse_shape(cursor, line)?;
        // Class shorthand `id:::className` has no canvas representation
        if cursor.rest().starts_with(":::") {
            cursor.advance(3);
            cursor.take_id();
        }

        match shape {
            Some((label, shape)) => {
                let label = if label.is_empty() { id.to_string() } else { label };
                let node = self
                    .nodes
                    .entry(id.to_string())
                    .or_insert_with(|| DiagramNode::new(id, shape, (0.0, 0.0)));
                node.label = label;
                node.shape = shape;
            }
            None => {
                self.nodes
                    .entry(id.to_string())
                    .or_insert_with(|| DiagramNode::new(id, NodeShape::Rectangle, (0.0, 0.0)));
            }
        }
        Ok(id.to_string())
    }

    fn add_edge(&mut self, from: &str, to: &str, kind: LinkKind, label: Option<String>, line: usize) {
        if from == to {
            log::debug!("Skipping self-link on '{from}' (line {line})");
            return;
        }
        if self
            .connections
            .iter()
            .any(|c| c.from == from && c.to == to && c.kind == kind)
        {
            log::debug!("Skipping duplicate link {from} -> {to} (line {line})");
            return;
        }
        let mut connection = Connection::new(from, to, kind);
        connection.label = label;
        self.connections.push(connection);
    }
}

/// Parses an optional shape suffix such as `[label]` or `{{label}}`.
fn parse_shape(cursor: &mut Cursor<'_>, line: usize) -> Result<Option<(String, NodeShape)>, ParseError> {
    let rest = cursor.rest();
    let Some((open, closers)) = SHAPE_SYNTAX.iter().find(|(open, _)| rest.starts_with(open)) else {
        return Ok(None);
    };
    let body = &rest[open.len()..];
    let body_start = body.len() - body.trim_start().len();

    // Quoted labels may contain any closer
    let search_from = if body[body_start..].starts_with('"') {
        match body[body_start + 1..].find('"') {
            Some(end) => body_start + 1 + end + 1,
            None => return Err(ParseError::new(line, "unterminated quoted label")),
        }
    } else {
        0
    };

    let found = closers
        .iter()
        .filter_map(|(close, shape)| {
            body[search_from..]
                .find(close)
                .map(|at| (search_from + at, *close, *shape))
        })
        .min_by_key(|(at, _, _)| *at);
    let Some((at, close, shape)) = found else {
        let expected = closers.first().map(|(c, _)| *c).unwrap_or_default();
        return Err(ParseError::new(line, format!("missing closing '{expected}'")));
    };

    let label = clean_label(&body[..at]);
    cursor.advance(open.len() + at + close.len());
    Ok(Some((label, shape)))
}

/// Parses an optional `|label|` after a link.
fn parse_pipe_label(cursor: &mut Cursor<'_>, line: usize) -> Result<Option<String>, ParseError> {
    if !cursor.eat('|') {
        return Ok(None);
    }
    let rest = cursor.rest();
    let body_start = rest.len() - rest.trim_start().len();
    let search_from = if rest[body_start..].starts_with('"') {
        match rest[body_start + 1..].find('"') {
            Some(end) => body_start + 1 + end + 1,
            None => return Err(ParseError::new(line, "unterminated quoted edge label")),
        }
    } else {
        0
    };
    let Some(end) = rest[search_from..].find('|').map(|at| search_from + at) else {
        return Err(ParseError::new(line, "edge label missing closing '|'"));
    };
    let label = clean_label(&rest[..end]);
    cursor.advance(end + 1);
    Ok((!label.is_empty()).then_some(label))
}

fn count_leading(s: &str, ch: u8) -> usize {
    s.bytes().take_while(|b| *b == ch).count()
}

/// Parses a link token at the cursor, including the inline `-- text -->` form.
///
/// Longer variants (`--->`, `-..->`, `===>`) map to the same kinds. Open dotted
/// and open thick lines are read as their arrow forms.
fn parse_link(
    cursor: &mut Cursor<'_>,
    line: usize,
) -> Result<Option<(LinkKind, Option<String>)>, ParseError> {
    let rest = cursor.rest();

    if rest.starts_with("-.") {
        let dots = count_leading(&rest[1..], b'.');
        let tail = &rest[1 + dots..];
        if tail.starts_with("->") {
            cursor.advance(1 + dots + 2);
            return Ok(Some((LinkKind::Dotted, None)));
        }
        if tail.starts_with('-') {
            cursor.advance(1 + dots + 1);
            return Ok(Some((LinkKind::Dotted, None)));
        }
        let text_start = 1 + dots;
        let Some(end) = rest[text_start..].find(".-") else {
            return Err(ParseError::new(line, "unterminated dotted link text"));
        };
        let label = clean_label(&rest[text_start..text_start + end]);
        let mut consumed = text_start + end + 2;
        if rest[consumed..].starts_with('>') {
            consumed += 1;
        }
        cursor.advance(consumed);
        return Ok(Some((LinkKind::Dotted, Some(label).filter(|l| !l.is_empty()))));
    }

    for (ch, arrow, open) in [
        (b'-', LinkKind::Arrow, LinkKind::Open),
        (b'=', LinkKind::Thick, LinkKind::Thick),
    ] {
        let run = count_leading(rest, ch);
        if run < 2 {
            continue;
        }
        if rest[run..].starts_with('>') {
            cursor.advance(run + 1);
            return Ok(Some((arrow, None)));
        }
        if run >= 3 {
            cursor.advance(run);
            return Ok(Some((open, None)));
        }

        // Inline text: `-- text -->` or `== text ==>`
        let marker = if ch == b'-' { "--" } else { "==" };
        let Some(end) = rest[2..].find(marker) else {
            return Err(ParseError::new(line, "unterminated link text"));
        };
        let label = clean_label(&rest[2..2 + end]);
        let closing = &rest[2 + end..];
        let closing_run = count_leading(closing, ch);
        let (kind, consumed) = if closing[closing_run..].starts_with('>') {
            (arrow, closing_run + 1)
        } else if closing_run >= 3 {
            (open, closing_run)
        } else {
            return Err(ParseError::new(line, "link text must be followed by a link"));
        };
        cursor.advance(2 + end + consumed);
        return Ok(Some((kind, Some(label).filter(|l| !l.is_empty()))));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedDiagram {
        parse_mermaid(text).unwrap()
    }

    fn edges(parsed: &ParsedDiagram) -> Vec<(String, String, LinkKind, Option<String>)> {
        parsed
            .connections
            .iter()
            .map(|c| (c.from.clone(), c.to.clone(), c.kind, c.label.clone()))
            .collect()
    }

    fn edge(from: &str, to: &str, kind: LinkKind, label: Option<&str>) -> (String, String, LinkKind, Option<String>) {
        (from.into(), to.into(), kind, label.map(String::from))
    }

    #[test]
    fn test_header_variants() {
        assert_eq!(parse("flowchart LR").direction, Direction::LeftRight);
        assert_eq!(parse("graph").direction, Direction::TopDown);
        assert_eq!(parse("GRAPH bt\n").direction, Direction::BottomTop);
        assert_eq!(parse("%% leading comment\n\ngraph TB").direction, Direction::TopDown);
    }

    #[test]
    fn test_header_errors() {
        let err = parse_mermaid("").unwrap_err();
        assert_eq!(err.line, 1);

        let err = parse_mermaid("\n\nsequenceDiagram\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("sequenceDiagram"));

        let err = parse_mermaid("flowchart XY").unwrap_err();
        assert!(err.message.contains("unsupported direction"));
    }

    #[test]
    fn test_all_shapes() {
        let text = "flowchart TD
    a[Rect]
    b(Round)
    c([Stadium])
    d[[Sub]]
    e[(Db)]
    f((Circle))
    g(((Double)))
    h{Choice}
    i{{Hex}}
    j[/In/]
    k[\\Out\\]
    l[/Trap\\]
    m[\\Manual/]
    n>Flag]";
        let parsed = parse(text);
        let shapes: Vec<NodeShape> = parsed.nodes.values().map(|n| n.shape).collect();
        assert_eq!(shapes, NodeShape::ALL.to_vec());
        assert_eq!(parsed.nodes["g"].label, "Double");
        assert_eq!(parsed.nodes["l"].label, "Trap");
        assert_eq!(parsed.nodes["n"].label, "Flag");
    }

    #[test]
    fn test_quoted_labels() {
        let parsed = parse("flowchart TD\n    a[\"f(x) = [1]\"]\n    b{\"say #quot;hi#quot;\"}");
        assert_eq!(parsed.nodes["a"].label, "f(x) = [1]");
        assert_eq!(parsed.nodes["b"].label, "say \"hi\"");
    }

    #[test]
    fn test_link_kinds_and_labels() {
        let parsed = parse(
            "graph TD
    a --> b
    b --- c
    c -.-> d
    d ==> e
    a -->|yes| c
    b -- maybe --> d
    c -. later .-> e
    a == big ==> e
    e --->|long| a",
        );
        assert_eq!(
            edges(&parsed),
            vec![
                edge("a", "b", LinkKind::Arrow, None),
                edge("b", "c", LinkKind::Open, None),
                edge("c", "d", LinkKind::Dotted, None),
                edge("d", "e", LinkKind::Thick, None),
                edge("a", "c", LinkKind::Arrow, Some("yes")),
                edge("b", "d", LinkKind::Arrow, Some("maybe")),
                edge("c", "e", LinkKind::Dotted, Some("later")),
                edge("a", "e", LinkKind::Thick, Some("big")),
                edge("e", "a", LinkKind::Arrow, Some("long")),
            ]
        );
    }

    #[test]
    fn test_links_without_spaces() {
        let parsed = parse("graph LR\nstart-->stop\nstep-2-.->stop");
        assert_eq!(
            edges(&parsed),
            vec![
                edge("start", "stop", LinkKind::Arrow, None),
                edge("step-2", "stop", LinkKind::Dotted, None),
            ]
        );
    }

    #[test]
    fn test_chains_groups_and_semicolons() {
        let parsed = parse("graph TD;a --> b --> c;x & y --> z & w;");
        assert_eq!(
            edges(&parsed),
            vec![
                edge("a", "b", LinkKind::Arrow, None),
                edge("b", "c", LinkKind::Arrow, None),
                edge("x", "z", LinkKind::Arrow, None),
                edge("x", "w", LinkKind::Arrow, None),
                edge("y", "z", LinkKind::Arrow, None),
                edge("y", "w", LinkKind::Arrow, None),
            ]
        );
        let order: Vec<&str> = parsed.nodes.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["a", "b", "c", "x", "y", "z", "w"]);
    }

    #[test]
    fn test_inline_declarations_in_edges() {
        let parsed = parse("flowchart TD\n  start([Begin]) --> check{OK?}\n  check -->|no| start");
        assert_eq!(parsed.nodes["start"].shape, NodeShape::Stadium);
        assert_eq!(parsed.nodes["check"].label, "OK?");
        // A later bare reference doesn't reset the declaration
        assert_eq!(parsed.nodes["start"].label, "Begin");
        assert_eq!(parsed.connections.len(), 2);
    }

    #[test]
    fn test_subgraphs_flattened_and_styles_skipped() {
        let parsed = parse(
            "flowchart TD
    subgraph one [First]
        direction LR
        a --> b
    end
    b --> c
    style a fill:#f9f
    classDef hot fill:#f00
    class a hot
    click a callback
    linkStyle 0 stroke:#ff3
    c:::hot --> d",
        );
        let order: Vec<&str> = parsed.nodes.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
        assert_eq!(parsed.connections.len(), 3);
    }

    #[test]
    fn test_direction_statement_vs_node_named_direction() {
        let parsed = parse("flowchart LR\nsubgraph s\n  direction TB\n  a --> b\nend\n");
        assert_eq!(parsed.direction, Direction::LeftRight);
        assert_eq!(parsed.nodes.len(), 2);

        let err = parse_mermaid("flowchart TD\n  direction --> b\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("direction"));
    }

    #[test]
    fn test_subgraph_errors() {
        let err = parse_mermaid("flowchart TD\n  a\nend").unwrap_err();
        assert_eq!(err.line, 3);
        let err = parse_mermaid("flowchart TD\nsubgraph s\n  a\n").unwrap_err();
        assert!(err.message.contains("end"));
    }

    #[test]
    fn test_statement_errors_have_line_numbers() {
        let err = parse_mermaid("flowchart TD\n  a --> b\n  a -->\n").unwrap_err();
        assert_eq!(err.line, 3);

        let err = parse_mermaid("flowchart TD\n  a[unclosed\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("]"));

        let err = parse_mermaid("flowchart TD\n  a -->|oops b\n").unwrap_err();
        assert!(err.message.contains("|"));

        let err = parse_mermaid("flowchart TD\n  a ?? b\n").unwrap_err();
        assert!(err.message.contains("unexpected"));
    }

    #[test]
    fn test_self_and_duplicate_links_skipped() {
        let parsed = parse("flowchart TD\n a --> a\n a --> b\n a --> b\n a -.-> b");
        assert_eq!(
            edges(&parsed),
            vec![
                edge("a", "b", LinkKind::Arrow, None),
                edge("a", "b", LinkKind::Dotted, None),
            ]
        );
    }

    #[test]
    fn test_layout_comment_restores_positions() {
        let parsed = parse(
            "flowchart TD\n a --> b\n%% mermaid-canvas-layout {\"a\":[10.0,20.0],\"b\":[30.5,-4.0]}",
        );
        let diagram = parsed.into_diagram(None);
        assert_eq!(diagram.nodes["a"].position, (10.0, 20.0));
        assert_eq!(diagram.nodes["b"].position, (30.5, -4.0));
    }

    #[test]
    fn test_malformed_layout_comment_is_ignored() {
        let parsed = parse("flowchart TD\n a\n%% mermaid-canvas-layout {not json");
        assert!(parsed.layout.is_empty());
    }

    #[test]
    fn test_into_diagram_keeps_previous_positions_and_ids() {
        let mut previous = parse("flowchart TD\n a --> b").into_diagram(None);
        previous.move_node("a", (300.0, 300.0));
        let old_id = previous.connections[0].id;

        let diagram = parse("flowchart TD\n a --> b\n b --> c").into_diagram(Some(&previous));
        assert_eq!(diagram.nodes["a"].position, (300.0, 300.0));
        assert_eq!(diagram.nodes["b"].position, previous.nodes["b"].position);
        assert_eq!(diagram.connections[0].id, old_id);
        assert_ne!(diagram.connections[1].id, old_id);
        // c is placed one rank below b
        let b = diagram.nodes["b"].position;
        assert_eq!(diagram.nodes["c"].position, (b.0, b.1 + crate::constants::RANK_SPACING));
    }

    #[test]
    fn test_generated_text_parses_back() {
        let mut diagram = Diagram::new();
        diagram.direction = Direction::LeftRight;
        let a = diagram.create_node(NodeShape::Diamond, (0.0, 0.0));
        let b = diagram.create_node(NodeShape::Cylinder, (200.0, 50.0));
        diagram.set_node_label(&a, "Is it (really) \"done\"?").unwrap();
        let id = diagram.add_connection(&a, &b, LinkKind::Thick).unwrap();
        diagram.set_connection_label(id, Some("a|b")).unwrap();

        let text = crate::mermaid::to_mermaid(&diagram);
        let restored = parse(&text).into_diagram(Some(&diagram));
        assert_eq!(restored, diagram);
    }
}
