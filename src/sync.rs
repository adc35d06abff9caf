//! Two-way synchronisation between the canvas and the Mermaid code panel.
//!
//! Canvas changes regenerate the text straight away. Text edits are debounced:
//! nothing happens until the user has stopped typing for `debounce_secs`, then
//! the text is parsed and, if valid, handed back as a new diagram.
//!
//! Time is passed in as seconds (egui's `input.time`), which keeps the engine
//! deterministic under test and usable on wasm.

use crate::constants::SYNC_DEBOUNCE_SECS;
use crate::error::ParseError;
use crate::mermaid::{parse_mermaid, to_mermaid};
use crate::types::Diagram;

/// What the editor should do after a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Nothing to apply
    None,
    /// The text parsed into a diagram that differs from the canvas
    Apply(Diagram),
    /// The text failed to parse; see [`SyncEngine::error`]
    Invalid,
}

/// Summary of the code panel state, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Text and canvas agree
    Synced,
    /// An edit is waiting for the typing pause
    Pending,
    /// The last edit failed to parse
    Invalid,
}

/// Keeps the code panel text and the diagram in step.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    text: String,
    /// Text that corresponds to `synced`, either generated or applied
    last_applied: String,
    /// The diagram `last_applied` describes
    synced: Diagram,
    /// Time of the most recent unapplied edit
    pending_since: Option<f64>,
    error: Option<ParseError>,
    debounce_secs: f64,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(&Diagram::default())
    }
}

impl SyncEngine {
    /// Starts in sync with `diagram`, showing its generated text.
    pub fn new(diagram: &Diagram) -> Self {
        let text = to_mermaid(diagram);
        Self {
            last_applied: text.clone(),
            text,
            synced: diagram.clone(),
            pending_since: None,
            error: None,
            debounce_secs: SYNC_DEBOUNCE_SECS,
        }
    }

    /// The code panel contents.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Error from the most recent failed parse.
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Whether an edit is waiting to be parsed.
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Synced, pending or invalid, for the status bar.
    pub fn status(&self) -> SyncStatus {
        if self.is_pending() {
            SyncStatus::Pending
        } else if self.error.is_some() {
            SyncStatus::Invalid
        } else {
            SyncStatus::Synced
        }
    }

    /// Typing pause before an edit is parsed.
    pub fn debounce_secs(&self) -> f64 {
        self.debounce_secs
    }

    /// Sets the typing pause. Negative values count as zero.
    pub fn set_debounce_secs(&mut self, secs: f64) {
        self.debounce_secs = secs.max(0.0);
    }

    /// Canvas to text. Regenerates the buffer for a changed diagram.
    ///
    /// While a text edit is pending the buffer is left alone; the pending text
    /// wins once it is applied.
    pub fn diagram_changed(&mut self, diagram: &Diagram) {
        if self.is_pending() {
            log::debug!("Deferring code regeneration while an edit is pending");
            return;
        }
        if *diagram == self.synced && self.error.is_none() {
            return;
        }
        self.regenerate(diagram);
    }

    /// Records a text edit made at time `now`, restarting the debounce timer.
    pub fn text_edited(&mut self, text: String, now: f64) {
        if text == self.text {
            return;
        }
        self.text = text;
        self.pending_since = Some(now);
    }

    /// Applies the pending edit once the debounce delay has elapsed.
    pub fn poll(&mut self, now: f64, current: &Diagram) -> SyncAction {
        match self.pending_since {
            Some(since) if now - since >= self.debounce_secs => self.evaluate(current),
            _ => SyncAction::None,
        }
    }

    /// Applies the pending edit immediately, if there is one.
    pub fn flush(&mut self, current: &Diagram) -> SyncAction {
        if self.is_pending() {
            self.evaluate(current)
        } else {
            SyncAction::None
        }
    }

    /// Discards pending edits and errors and regenerates the text.
    pub fn reset(&mut self, diagram: &Diagram) {
        self.pending_since = None;
        self.regenerate(diagram);
    }

    /// Takes `text` as the representation of `diagram`, e.g. a file just opened.
    pub fn adopt(&mut self, text: String, diagram: &Diagram) {
        self.last_applied = text.clone();
        self.text = text;
        self.synced = diagram.clone();
        self.pending_since = None;
        self.error = None;
    }

    fn regenerate(&mut self, diagram: &Diagram) {
        self.text = to_mermaid(diagram);
        self.last_applied = self.text.clone();
        self.synced = diagram.clone();
        self.error = None;
    }

    fn evaluate(&mut self, current: &Diagram) -> SyncAction {
        self.pending_since = None;
        if self.text == self.last_applied {
            self.error = None;
            return SyncAction::None;
        }

        match parse_mermaid(&self.text) {
            Ok(parsed) => {
                let diagram = parsed.into_diagram(Some(current));
                self.error = None;
                self.last_applied = self.text.clone();
                self.synced = diagram.clone();
                if diagram == *current {
                    SyncAction::None
                } else {
                    SyncAction::Apply(diagram)
                }
            }
            Err(e) => {
                log::debug!("Mermaid code not applied: {e}");
                self.error = Some(e);
                SyncAction::Invalid
            }
        }
    }
}
