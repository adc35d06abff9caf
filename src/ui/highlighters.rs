//! Syntax highlighting for the Mermaid code panel.
//!
//! The highlighter is a line-oriented scanner, not a parser: it colours what it
//! recognises and leaves the rest in the default colour, so half-typed code
//! still renders sensibly.

use eframe::egui::{self, Color32};
use eframe::epaint::text::{LayoutJob, TextFormat};

const KEYWORDS: &[&str] = &[
    "flowchart",
    "graph",
    "subgraph",
    "end",
    "direction",
    "classDef",
    "class",
    "style",
    "linkStyle",
    "click",
];

const DIRECTIONS: &[&str] = &["TD", "TB", "BT", "LR", "RL"];

/// Characters that make up link operators such as `-->`, `-.->` and `==>`.
const LINK_CHARS: &[char] = &['-', '=', '.', '<', '>', '~', '&'];

struct Palette {
    keyword: Color32,
    direction: Color32,
    link: Color32,
    bracket: Color32,
    label: Color32,
    string: Color32,
    comment: Color32,
    default: Color32,
}

impl Palette {
    fn new(dark_mode: bool) -> Self {
        if dark_mode {
            Self {
                keyword: Color32::from_rgb(86, 156, 214),
                direction: Color32::from_rgb(181, 206, 168),
                link: Color32::from_rgb(197, 134, 192),
                bracket: Color32::from_rgb(220, 220, 170),
                label: Color32::from_rgb(206, 145, 120),
                string: Color32::from_rgb(206, 145, 120),
                comment: Color32::from_rgb(106, 153, 85),
                default: Color32::from_rgb(212, 212, 212),
            }
        } else {
            Self {
                keyword: Color32::from_rgb(0, 0, 170),
                direction: Color32::from_rgb(100, 0, 150),
                link: Color32::from_rgb(175, 0, 219),
                bracket: Color32::from_rgb(120, 90, 0),
                label: Color32::from_rgb(163, 21, 21),
                string: Color32::from_rgb(163, 21, 21),
                comment: Color32::from_rgb(0, 128, 0),
                default: Color32::BLACK,
            }
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte length of the identifier at the start of `rest`. Hyphens count when
/// followed by another identifier character, so `step-2` is one token but
/// `a-->b` is not.
fn ident_len(rest: &str) -> usize {
    let mut len = 0;
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let next_is_ident = chars.peek().is_some_and(|&(_, n)| is_ident_char(n));
        if is_ident_char(c) || (c == '-' && i > 0 && next_is_ident) {
            len = i + c.len_utf8();
        } else {
            break;
        }
    }
    len
}

/// Length of a delimited run starting at `rest[0]`, closed by `close` but never
/// crossing a newline.
fn delimited_len(rest: &str, close: char) -> usize {
    let body = &rest[1..];
    match body.find([close, '\n']) {
        Some(j) if body[j..].starts_with(close) => 1 + j + close.len_utf8(),
        Some(j) => 1 + j,
        None => rest.len(),
    }
}

/// Highlights Mermaid flowchart code with syntax coloring.
///
/// # Arguments
///
/// * `text` - The Mermaid source to highlight
/// * `font_id` - The font to use for rendering
/// * `dark_mode` - Whether to pick colours for a dark background
pub fn highlight_mermaid(text: &str, font_id: egui::FontId, dark_mode: bool) -> LayoutJob {
    let palette = Palette::new(dark_mode);
    let mut job = LayoutJob::default();
    // Nesting of shape delimiters; text inside them is a node label
    let mut depth = 0usize;
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let Some(c) = rest.chars().next() else {
            break;
        };

        let (len, color) = if c == '\n' {
            depth = 0;
            (1, palette.default)
        } else if rest.starts_with("%%") {
            (rest.find('\n').unwrap_or(rest.len()), palette.comment)
        } else if c == '"' {
            (delimited_len(rest, '"'), palette.string)
        } else if c == '|' && depth == 0 {
            (delimited_len(rest, '|'), palette.string)
        } else if matches!(c, '[' | '(' | '{') {
            depth += 1;
            (1, palette.bracket)
        } else if matches!(c, ']' | ')' | '}') {
            depth = depth.saturating_sub(1);
            (1, palette.bracket)
        } else if depth > 0 {
            let len = rest
                .find(['[', ']', '(', ')', '{', '}', '"', '\n'])
                .unwrap_or(rest.len());
            (len.max(c.len_utf8()), palette.label)
        } else if is_ident_char(c) {
            let len = ident_len(rest);
            let word = &rest[..len];
            let color = if KEYWORDS.contains(&word) {
                palette.keyword
            } else if DIRECTIONS.contains(&word) {
                palette.direction
            } else {
                palette.default
            };
            (len, color)
        } else if LINK_CHARS.contains(&c) {
            let len = rest
                .find(|ch: char| !LINK_CHARS.contains(&ch))
                .unwrap_or(rest.len());
            (len, palette.link)
        } else {
            (c.len_utf8(), palette.default)
        };

        job.append(&rest[..len], 0.0, TextFormat::simple(font_id.clone(), color));
        pos += len;
    }

    job
}
