//! Activity aggregation and decay.
//!
//! The [`ActivityAggregator`] owns the five published parameters. Editor
//! events push them up, and a fixed-rate tick decays them back toward zero
//! while the user is idle, so the published vector keeps evolving even
//! when no input arrives.

use crate::core::extractors::{unit, SignalExtractors};
use crate::host::types::{RawObservation, TextChange};
use crate::publish::{MessageSink, RendererMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chaos added per change event in a text-change batch.
const CHAOS_PER_CHANGE: f64 = 0.1;

/// Heat added per distinct line touched by a text-change batch.
const HEAT_PER_LINE: f64 = 0.05;

/// Share of the cursor extractor's speed accumulated into cursor flow.
const CURSOR_FLOW_GAIN: f64 = 0.01;

/// Focus gained on each active-editor change.
const FOCUS_SWITCH_BOOST: f64 = 0.2;

/// Idle time after which the activity parameters start decaying.
const DECAY_AFTER_MS: i64 = 1000;

/// Idle time below which focus keeps building on every tick.
const FOCUS_BUILD_WINDOW_MS: i64 = 5000;

/// Focus gained per tick while recently active.
const FOCUS_BUILD_STEP: f64 = 0.01;

// Per-tick decay factors: intensity fades fastest, heat slowest.
const INTENSITY_DECAY: f64 = 0.95;
const CHAOS_DECAY: f64 = 0.98;
const HEAT_DECAY: f64 = 0.99;
const CURSOR_FLOW_DECAY: f64 = 0.97;
const FOCUS_DECAY: f64 = 0.995;

/// The published activity parameters.
///
/// Every scalar stays in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityVector {
    pub intensity: f64,
    pub focus: f64,
    pub chaos: f64,
    pub heat: f64,
    pub cursor_flow: f64,
    /// Instant of the last text change (serialized as epoch milliseconds)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity_timestamp: DateTime<Utc>,
}

impl ActivityVector {
    /// All scalars at zero, last activity at `now`.
    pub fn idle_at(now: DateTime<Utc>) -> Self {
        Self {
            intensity: 0.0,
            focus: 0.0,
            chaos: 0.0,
            heat: 0.0,
            cursor_flow: 0.0,
            last_activity_timestamp: now,
        }
    }

    /// The five scalars in publication order.
    pub fn scalars(&self) -> [f64; 5] {
        [
            self.intensity,
            self.focus,
            self.chaos,
            self.heat,
            self.cursor_flow,
        ]
    }

    /// Milliseconds since the last text change, never negative.
    pub fn idle_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity_timestamp).num_milliseconds().max(0)
    }
}

/// Merges extractor output and event deltas into the [`ActivityVector`].
///
/// Each handler has an `_at` form taking the event instant explicitly; the
/// plain form uses the wall clock.
#[derive(Debug, Clone)]
pub struct ActivityAggregator {
    vector: ActivityVector,
    extractors: SignalExtractors,
}

impl ActivityAggregator {
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            vector: ActivityVector::idle_at(now),
            extractors: SignalExtractors::new(),
        }
    }

    /// Current parameter values.
    pub fn vector(&self) -> &ActivityVector {
        &self.vector
    }

    /// Extractor state, exposed for inspection.
    pub fn extractors(&self) -> &SignalExtractors {
        &self.extractors
    }

    pub fn on_text_change<S: MessageSink + ?Sized>(
        &mut self,
        changes: &[TextChange],
        sink: &mut S,
    ) {
        self.on_text_change_at(changes, Utc::now(), sink);
    }

    /// Handle one batch of content changes.
    ///
    /// The whole batch is one keystroke burst: its total characters over the
    /// time since the previous batch set `intensity`, while `chaos` and `heat`
    /// grow with the number of changes and distinct lines touched.
    pub fn on_text_change_at<S: MessageSink + ?Sized>(
        &mut self,
        changes: &[TextChange],
        now: DateTime<Utc>,
        sink: &mut S,
    ) {
        if changes.is_empty() {
            return;
        }

        let elapsed_ms = self.vector.idle_ms(now) as u64;
        self.vector.last_activity_timestamp = now;

        let burst = RawObservation::keystroke_burst(changes, elapsed_ms);
        let distinct_lines = burst.distinct_lines();

        self.vector.intensity = unit(self.extractors.observe(burst));
        self.vector.chaos = unit(self.vector.chaos + CHAOS_PER_CHANGE * changes.len() as f64);
        self.vector.heat = unit(self.vector.heat + HEAT_PER_LINE * distinct_lines as f64);

        tracing::debug!(
            changes = changes.len(),
            elapsed_ms,
            intensity = self.vector.intensity,
            "text change merged"
        );

        self.publish(sink);
    }

    pub fn on_cursor_move<S: MessageSink + ?Sized>(&mut self, x: f64, y: f64, sink: &mut S) {
        self.on_cursor_move_at(x, y, Utc::now(), sink);
    }

    /// Handle a cursor move.
    ///
    /// The extractor's normalized speed is accumulated into `cursor_flow`
    /// rather than assigned, so flow builds with sustained motion and then
    /// fades on the tick. Non-finite coordinates are rejected.
    pub fn on_cursor_move_at<S: MessageSink + ?Sized>(
        &mut self,
        x: f64,
        y: f64,
        now: DateTime<Utc>,
        sink: &mut S,
    ) {
        if !x.is_finite() || !y.is_finite() {
            tracing::debug!(x, y, "ignoring non-finite cursor position");
            return;
        }

        let speed = self.extractors.observe(RawObservation::CursorSample {
            x,
            y,
            timestamp: now,
        });
        self.vector.cursor_flow = unit(self.vector.cursor_flow + speed * CURSOR_FLOW_GAIN);

        self.publish(sink);
    }

    /// Handle a switch to another editor.
    pub fn on_editor_focus_change(&mut self) {
        self.vector.focus = unit(self.vector.focus + FOCUS_SWITCH_BOOST);
    }

    pub fn on_tick<S: MessageSink + ?Sized>(&mut self, sink: &mut S) {
        self.on_tick_at(Utc::now(), sink);
    }

    /// Periodic decay step, then publish.
    pub fn on_tick_at<S: MessageSink + ?Sized>(&mut self, now: DateTime<Utc>, sink: &mut S) {
        let idle_ms = self.vector.idle_ms(now);
        let v = &mut self.vector;

        if idle_ms > DECAY_AFTER_MS {
            v.intensity = unit(v.intensity * INTENSITY_DECAY);
            v.chaos = unit(v.chaos * CHAOS_DECAY);
            v.heat = unit(v.heat * HEAT_DECAY);
            v.cursor_flow = unit(v.cursor_flow * CURSOR_FLOW_DECAY);
        }

        if idle_ms < FOCUS_BUILD_WINDOW_MS {
            v.focus = unit(v.focus + FOCUS_BUILD_STEP);
        } else {
            v.focus = unit(v.focus * FOCUS_DECAY);
        }

        self.publish(sink);
    }

    /// Emit the current vector. Delivery is best-effort.
    pub fn publish<S: MessageSink + ?Sized>(&self, sink: &mut S) {
        sink.publish(RendererMessage::Activity(self.vector));
    }
}

impl Default for ActivityAggregator {
    fn default() -> Self {
        Self::new()
    }
}
