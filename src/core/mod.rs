//! Core activity analysis.
//!
//! This module contains:
//! - Signal extractors turning raw observations into normalized scalars
//! - The activity aggregator owning the published, decaying parameters
//! - Preset cycling for the renderer

pub mod activity;
pub mod extractors;
pub mod preset;

// Re-export commonly used types
pub use activity::{ActivityAggregator, ActivityVector};
pub use extractors::{
    analyze_chaos, analyze_focus, analyze_heat, CursorSample, CursorTracker, KeystrokeTracker,
    SignalExtractors, CURSOR_WINDOW_MS, KEYSTROKE_HISTORY,
};
pub use preset::{PresetCycler, DEFAULT_PRESET_COUNT};
