//! Signal extractors.
//!
//! Each extractor turns one raw observation into a normalized `[0, 1]`
//! scalar. The keystroke and cursor extractors keep a bounded short-term
//! history; the rest are stateless.

use crate::host::types::RawObservation;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Number of chars-per-second samples kept for intensity smoothing.
pub const KEYSTROKE_HISTORY: usize = 10;

/// Typing rate (chars/sec) at which intensity saturates.
const KEYSTROKE_SATURATION_CPS: f64 = 15.0;

/// Cursor samples older than this (relative to the newest) are dropped.
pub const CURSOR_WINDOW_MS: i64 = 2000;

/// Cursor speed (units/sec) at which flow saturates.
const CURSOR_SPEED_CEILING: f64 = 100.0;

/// Chaos contributed by each simultaneous edit.
const CHAOS_PER_EDIT: f64 = 0.2;

/// Chaos added when the change was flagged as rapid.
const CHAOS_RAPID_BONUS: f64 = 0.3;

/// Amplification applied to the modified-lines ratio.
const HEAT_AMPLIFICATION: f64 = 5.0;

/// Dwell time after which focus saturates.
const FOCUS_SATURATION_MS: f64 = 60_000.0;

/// Focus lost per editor switch, and the cap on that penalty.
const FOCUS_SWITCH_PENALTY: f64 = 0.1;
const FOCUS_MAX_PENALTY: f64 = 0.5;

/// Clamp into `[0, 1]`, mapping NaN to 0 so it never enters decaying state.
pub(crate) fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Recency-weighted typing intensity over the last few bursts.
#[derive(Debug, Clone, Default)]
pub struct KeystrokeTracker {
    samples: VecDeque<f64>,
}

impl KeystrokeTracker {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(KEYSTROKE_HISTORY),
        }
    }

    /// Record a burst of `chars` typed over `elapsed_ms` and return the
    /// smoothed intensity.
    ///
    /// Sample `i` (oldest first) is weighted `(i + 1) / n`. A zero elapsed
    /// time has no defined rate and yields 0 without touching the history.
    pub fn analyze(&mut self, chars: u32, elapsed_ms: u64) -> f64 {
        if elapsed_ms == 0 {
            return 0.0;
        }

        let chars_per_second = chars as f64 / (elapsed_ms as f64 / 1000.0);
        self.samples.push_back(chars_per_second);
        while self.samples.len() > KEYSTROKE_HISTORY {
            self.samples.pop_front();
        }

        let n = self.samples.len() as f64;
        let (weighted_sum, weight_total) = self.samples.iter().enumerate().fold(
            (0.0, 0.0),
            |(sum, total), (i, &rate)| {
                let weight = (i as f64 + 1.0) / n;
                (sum + rate * weight, total + weight)
            },
        );

        let weighted_average = weighted_sum / weight_total;
        unit(weighted_average / KEYSTROKE_SATURATION_CPS)
    }

    /// Samples currently held, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A cursor position with the instant it was observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorSample {
    pub x: f64,
    pub y: f64,
    pub timestamp: DateTime<Utc>,
}

/// Average cursor speed over a sliding two-second window.
#[derive(Debug, Clone, Default)]
pub struct CursorTracker {
    samples: VecDeque<CursorSample>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cursor position observed now.
    pub fn analyze(&mut self, x: f64, y: f64) -> f64 {
        self.analyze_at(x, y, Utc::now())
    }

    /// Record a cursor position observed at `now` and return the normalized
    /// average speed across the window.
    pub fn analyze_at(&mut self, x: f64, y: f64, now: DateTime<Utc>) -> f64 {
        if !x.is_finite() || !y.is_finite() {
            return 0.0;
        }

        self.samples.push_back(CursorSample {
            x,
            y,
            timestamp: now,
        });

        let window = Duration::milliseconds(CURSOR_WINDOW_MS);
        self.samples.retain(|s| now - s.timestamp <= window);

        if self.samples.len() < 2 {
            return 0.0;
        }

        let mut total_distance = 0.0;
        let mut total_time_ms: i64 = 0;
        for (a, b) in self.samples.iter().zip(self.samples.iter().skip(1)) {
            total_distance += ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
            total_time_ms += (b.timestamp - a.timestamp).num_milliseconds();
        }

        if total_time_ms <= 0 {
            return 0.0;
        }

        let speed = total_distance / (total_time_ms as f64 / 1000.0);
        unit(speed / CURSOR_SPEED_CEILING)
    }

    /// Samples currently inside the window, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &CursorSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Disorder of an edit burst from how many edits landed at once.
pub fn analyze_chaos(simultaneous_edits: u32, rapid_change: bool) -> f64 {
    let bonus = if rapid_change { CHAOS_RAPID_BONUS } else { 0.0 };
    unit(simultaneous_edits as f64 * CHAOS_PER_EDIT + bonus)
}

/// Share of the document that was modified, amplified so small hot-spots show.
pub fn analyze_heat(lines_modified: u32, total_lines: u32) -> f64 {
    if total_lines == 0 {
        return 0.0;
    }
    let ratio = lines_modified as f64 / total_lines.max(1) as f64;
    unit(ratio * HEAT_AMPLIFICATION)
}

/// Focus from dwell time in one editor, penalized by editor switches.
pub fn analyze_focus(time_in_editor_ms: u64, editor_switches: u32) -> f64 {
    let dwell = (time_in_editor_ms as f64 / FOCUS_SATURATION_MS).min(1.0);
    let penalty = (editor_switches as f64 * FOCUS_SWITCH_PENALTY).min(FOCUS_MAX_PENALTY);
    unit((dwell - penalty).max(0.0))
}

/// The full extractor set, dispatching raw observations by kind.
#[derive(Debug, Clone, Default)]
pub struct SignalExtractors {
    pub keystrokes: KeystrokeTracker,
    pub cursor: CursorTracker,
}

impl SignalExtractors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observation to its extractor and return the normalized value.
    pub fn observe(&mut self, observation: RawObservation) -> f64 {
        match observation {
            RawObservation::KeystrokeBurst {
                char_count,
                elapsed_ms,
                ..
            } => self.keystrokes.analyze(char_count, elapsed_ms),
            RawObservation::CursorSample { x, y, timestamp } => {
                self.cursor.analyze_at(x, y, timestamp)
            }
            RawObservation::EditConcurrency {
                simultaneous_edits,
                rapid_change,
            } => analyze_chaos(simultaneous_edits, rapid_change),
            RawObservation::CoverageSample {
                lines_modified,
                total_lines,
            } => analyze_heat(lines_modified, total_lines),
            RawObservation::FocusSample {
                dwell_ms,
                editor_switch_count,
            } => analyze_focus(dwell_ms, editor_switch_count),
        }
    }
}
