//! Keyboard handling for the Mermaid code panel.
//!
//! Editing keys run in two passes around the `TextEdit`:
//! - [`take_code_keys`] consumes Tab, Shift+Tab and Cmd/Ctrl+/ before the
//!   widget sees them, so egui never replaces a selection with a literal tab
//! - [`handle_code_textedit_keys`] applies those keys as line edits afterwards,
//!   and indents the line egui just opened on Enter

use eframe::egui;
use std::ops::Range;

/// Lines that open a block whose body is indented one level deeper.
const BLOCK_OPENERS: &[&str] = &["flowchart", "graph", "subgraph"];

/// Mermaid comment marker.
const COMMENT_MARKER: &str = "%%";

/// Settings for the code panel key handlers.
#[derive(Clone, Debug)]
pub struct CodeEditOptions<'a> {
    /// Indent unit to insert (e.g., "    " or "\t")
    pub indent: &'a str,
}

impl Default for CodeEditOptions<'_> {
    fn default() -> Self {
        Self { indent: "    " }
    }
}

/// Editing keys taken from the input queue for the focused code editor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeKeys {
    /// Tab
    pub indent: bool,
    /// Shift+Tab
    pub unindent: bool,
    /// Cmd/Ctrl+/
    pub toggle_comment: bool,
}

/// Caret or selection in char offsets, with `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CharSpan {
    start: usize,
    end: usize,
}

impl CharSpan {
    fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }

    fn is_caret(&self) -> bool {
        self.start == self.end
    }
}

/// Consumes the editor's own keys while the field with `id` has focus.
///
/// Must run before the `TextEdit` is added.
pub fn take_code_keys(ui: &mut egui::Ui, id: egui::Id) -> CodeKeys {
    if !ui.memory(|m| m.has_focus(id)) {
        return CodeKeys::default();
    }
    // Plain Tab also matches Shift+Tab, so the shifted key goes first
    ui.input_mut(|i| {
        let unindent = i.consume_key(egui::Modifiers::SHIFT, egui::Key::Tab);
        let indent = i.consume_key(egui::Modifiers::NONE, egui::Key::Tab);
        let toggle_comment = i.consume_key(egui::Modifiers::COMMAND, egui::Key::Slash);
        CodeKeys {
            indent,
            unindent,
            toggle_comment,
        }
    })
}

/// Applies `keys` and Enter auto-indent to `text`.
///
/// Returns true if the text was modified.
pub fn handle_code_textedit_keys(
    ui: &mut egui::Ui,
    response: &egui::Response,
    text: &mut String,
    keys: CodeKeys,
    options: &CodeEditOptions,
) -> bool {
    if !response.has_focus() {
        return false;
    }
    let span = selection_span(ui, response.id, text);
    let enter_pressed = ui.input(|i| i.key_pressed(egui::Key::Enter));

    let edited = if keys.unindent {
        unindent_lines(text, span, options.indent)
    } else if keys.indent && span.is_caret() {
        Some(insert_at_caret(text, span.start, options.indent))
    } else if keys.indent {
        indent_lines(text, span, options.indent)
    } else if keys.toggle_comment {
        toggle_comment_lines(text, span)
    } else if enter_pressed {
        continue_indentation(text, span.start, options.indent)
    } else {
        None
    };

    match edited {
        Some(new_span) => {
            set_selection_span(ui, response.id, new_span);
            true
        }
        None => false,
    }
}

/// Whether a new line after `line` starts a more deeply indented block.
fn opens_block(line: &str) -> bool {
    let first_word = line.split_whitespace().next().unwrap_or_default();
    BLOCK_OPENERS.contains(&first_word)
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

fn selection_span(ui: &egui::Ui, id: egui::Id, text: &str) -> CharSpan {
    let range = ui.memory(|mem| {
        mem.data
            .get_temp::<egui::text_edit::TextEditState>(id)
            .and_then(|s| s.cursor.char_range())
    });
    match range {
        Some(r) => {
            let (a, b) = (r.primary.index, r.secondary.index);
            CharSpan {
                start: a.min(b),
                end: a.max(b),
            }
        }
        None => CharSpan::caret(text.chars().count()),
    }
}

fn set_selection_span(ui: &mut egui::Ui, id: egui::Id, span: CharSpan) {
    use egui::text::{CCursor, CCursorRange};
    ui.memory_mut(|mem| {
        let state = mem
            .data
            .get_temp_mut_or_default::<egui::text_edit::TextEditState>(id);
        state.cursor.set_char_range(Some(CCursorRange::two(
            CCursor::new(span.start),
            CCursor::new(span.end),
        )));
    });
}

fn byte_of_char(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map_or(s.len(), |(b, _)| b)
}

fn char_of_byte(s: &str, byte_idx: usize) -> usize {
    s[..byte_idx].chars().count()
}

/// Byte range from the start of the first selected line to the end of the
/// last. A selection ending at the very start of a line does not cover it.
fn covered_lines(s: &str, span: CharSpan) -> Range<usize> {
    let start_b = byte_of_char(s, span.start);
    let mut end_b = byte_of_char(s, span.end);
    if !span.is_caret() && end_b > start_b && s[..end_b].ends_with('\n') {
        end_b -= 1;
    }
    let line_start = s[..start_b].rfind('\n').map_or(0, |i| i + 1);
    let line_end = s[end_b..].find('\n').map_or(s.len(), |i| end_b + i);
    line_start..line_end
}

/// Rewrites each covered line with `edit` (None keeps a line as is) and
/// selects the rewritten lines. Returns None when nothing changed.
fn edit_lines(
    s: &mut String,
    span: CharSpan,
    mut edit: impl FnMut(&str) -> Option<String>,
) -> Option<CharSpan> {
    let range = covered_lines(s, span);
    let mut changed = false;
    let rewritten: Vec<String> = s[range.clone()]
        .split('\n')
        .map(|line| match edit(line) {
            Some(new_line) => {
                changed |= new_line != line;
                new_line
            }
            None => line.to_string(),
        })
        .collect();
    if !changed {
        return None;
    }
    let replacement = rewritten.join("\n");
    let start = char_of_byte(s, range.start);
    let end = start + replacement.chars().count();
    s.replace_range(range, &replacement);
    Some(CharSpan { start, end })
}

fn insert_at_caret(s: &mut String, caret: usize, insert: &str) -> CharSpan {
    s.insert_str(byte_of_char(s, caret), insert);
    CharSpan::caret(caret + insert.chars().count())
}

fn indent_lines(s: &mut String, span: CharSpan, indent: &str) -> Option<CharSpan> {
    edit_lines(s, span, |line| Some(format!("{indent}{line}")))
}

/// Removes one indent unit, or up to that many leading spaces, per line.
fn unindent_lines(s: &mut String, span: CharSpan, indent: &str) -> Option<CharSpan> {
    edit_lines(s, span, |line| {
        if let Some(rest) = line.strip_prefix(indent) {
            return Some(rest.to_string());
        }
        let spaces = line
            .chars()
            .take(indent.chars().count())
            .take_while(|c| *c == ' ')
            .count();
        (spaces > 0).then(|| line[spaces..].to_string())
    })
}

/// Adds `%% ` after the indentation of every non-blank covered line, or
/// removes the marker when all of them already carry it.
fn toggle_comment_lines(s: &mut String, span: CharSpan) -> Option<CharSpan> {
    let range = covered_lines(s, span);
    let uncomment = s[range]
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .all(|line| line.trim_start().starts_with(COMMENT_MARKER));

    edit_lines(s, span, |line| {
        if line.trim().is_empty() {
            return None;
        }
        let ws = leading_whitespace(line);
        let body = &line[ws.len()..];
        if uncomment {
            let body = body.strip_prefix(COMMENT_MARKER).unwrap_or(body);
            let body = body.strip_prefix(' ').unwrap_or(body);
            Some(format!("{ws}{body}"))
        } else {
            Some(format!("{ws}{COMMENT_MARKER} {body}"))
        }
    })
}

/// After egui inserted a newline at `caret`, indents the new line like the
/// previous one, one level deeper below a block opener.
fn continue_indentation(s: &mut String, caret: usize, indent: &str) -> Option<CharSpan> {
    let caret_b = byte_of_char(s, caret);
    if !s[..caret_b].ends_with('\n') {
        return None;
    }
    let newline_b = caret_b - 1;
    let prev_start = s[..newline_b].rfind('\n').map_or(0, |i| i + 1);
    let prev_line = &s[prev_start..newline_b];

    let mut insert = leading_whitespace(prev_line).to_string();
    if opens_block(prev_line) {
        insert.push_str(indent);
    }
    if insert.is_empty() {
        return None;
    }
    Some(insert_at_caret(s, caret, &insert))
}
