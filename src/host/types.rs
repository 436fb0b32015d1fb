//! Host editor event types and the raw observations derived from them.
//!
//! The host editor is an external collaborator: it serializes its
//! document-change, selection-change and active-editor-change notifications
//! into [`HostEvent`]s. Nothing here is retained past the extractor buffers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single content change inside the active document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChange {
    /// Text inserted by the change (empty for a pure deletion)
    #[serde(default)]
    pub inserted_text: String,
    /// Length of the range the change replaced
    #[serde(default)]
    pub replaced_length: u32,
    /// Zero-based line where the change starts
    pub start_line: u32,
    /// Zero-based column where the change starts
    #[serde(default)]
    pub start_column: u32,
}

impl TextChange {
    pub fn new(
        inserted_text: impl Into<String>,
        replaced_length: u32,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            inserted_text: inserted_text.into(),
            replaced_length,
            start_line: line,
            start_column: column,
        }
    }

    /// Number of characters this change added, saturating at `u32::MAX`.
    pub fn chars_added(&self) -> u32 {
        saturate_count(self.inserted_text.chars().count())
    }

    pub fn is_insertion(&self) -> bool {
        !self.inserted_text.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        self.replaced_length > 0
    }
}

/// Primary selection state after a cursor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionChange {
    pub active_line: u32,
    pub active_column: u32,
    pub selection_start_column: u32,
    pub selection_end_column: u32,
    pub is_empty: bool,
}

impl SelectionChange {
    /// A collapsed selection (plain caret) at the given position.
    pub fn caret(line: u32, column: u32) -> Self {
        Self {
            active_line: line,
            active_column: column,
            selection_start_column: column,
            selection_end_column: column,
            is_empty: true,
        }
    }

    /// Column span of the selection on the active line.
    pub fn selection_length(&self) -> u32 {
        self.selection_end_column.abs_diff(self.selection_start_column)
    }
}

/// Everything the host can push into a session.
///
/// Preset cycling arrives on the same stream as the editor notifications
/// since it shares the outbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// Content changes in the active document
    TextChange { changes: Vec<TextChange> },
    /// Cursor or selection moved
    SelectionChange(SelectionChange),
    /// The active editor switched to another document
    ActiveEditorChange,
    /// Advance to the next visual preset
    NextPreset,
    /// Go back to the previous visual preset
    PrevPreset,
}

impl HostEvent {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            HostEvent::TextChange { .. } => "text_change",
            HostEvent::SelectionChange(_) => "selection_change",
            HostEvent::ActiveEditorChange => "active_editor_change",
            HostEvent::NextPreset => "next_preset",
            HostEvent::PrevPreset => "prev_preset",
        }
    }
}

/// One raw observation handed to a signal extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum RawObservation {
    KeystrokeBurst {
        char_count: u32,
        elapsed_ms: u64,
        lines_touched: BTreeSet<u32>,
    },
    CursorSample {
        x: f64,
        y: f64,
        timestamp: DateTime<Utc>,
    },
    EditConcurrency {
        simultaneous_edits: u32,
        rapid_change: bool,
    },
    CoverageSample {
        lines_modified: u32,
        total_lines: u32,
    },
    FocusSample {
        dwell_ms: u64,
        editor_switch_count: u32,
    },
}

impl RawObservation {
    /// Build a keystroke burst from a batch of text changes.
    pub fn keystroke_burst(changes: &[TextChange], elapsed_ms: u64) -> Self {
        RawObservation::KeystrokeBurst {
            char_count: total_chars(changes.iter().map(TextChange::chars_added)),
            elapsed_ms,
            lines_touched: changes.iter().map(|c| c.start_line).collect(),
        }
    }

    /// Distinct lines a keystroke burst touched; 0 for other observations.
    pub fn distinct_lines(&self) -> usize {
        match self {
            RawObservation::KeystrokeBurst { lines_touched, .. } => lines_touched.len(),
            _ => 0,
        }
    }
}

fn saturate_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn total_chars(counts: impl IntoIterator<Item = u32>) -> u32 {
    counts.into_iter().fold(0, u32::saturating_add)
}
