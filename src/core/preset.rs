//! Visual preset selection.
//!
//! Presets are the renderer's business; the core only tracks which index is
//! active and announces changes on the shared message channel.

use crate::publish::{MessageSink, PresetChange, RendererMessage};

/// Number of presets when none is configured.
pub const DEFAULT_PRESET_COUNT: usize = 4;

/// A modular index over a fixed number of presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetCycler {
    index: usize,
    count: usize,
}

impl PresetCycler {
    /// Create a cycler over `count` presets starting at `initial`.
    ///
    /// A zero count is treated as a single preset; `initial` wraps.
    pub fn new(count: usize, initial: usize) -> Self {
        let count = count.max(1);
        Self {
            index: initial % count,
            count,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Advance to the next preset and announce it.
    pub fn next_preset<S: MessageSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        self.index = (self.index + 1) % self.count;
        self.announce(sink);
        self.index
    }

    /// Go back one preset and announce it.
    pub fn prev_preset<S: MessageSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        self.index = (self.index + self.count - 1) % self.count;
        self.announce(sink);
        self.index
    }

    fn announce<S: MessageSink + ?Sized>(&self, sink: &mut S) {
        tracing::info!(preset = self.index, "preset changed");
        sink.publish(RendererMessage::PresetChange(PresetChange {
            preset_index: self.index,
        }));
    }
}

impl Default for PresetCycler {
    fn default() -> Self {
        Self::new(DEFAULT_PRESET_COUNT, 0)
    }
}
