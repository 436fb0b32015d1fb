//! Per-session activity counters.
//!
//! Counts what a session handled so the CLI can print a summary on exit.
//! Nothing here is written to disk; the counters die with the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    text_changes: AtomicU64,
    cursor_moves: AtomicU64,
    focus_changes: AtomicU64,
    preset_changes: AtomicU64,
    ticks: AtomicU64,
    messages_published: AtomicU64,
    /// Deliveries skipped because a subscriber's channel was full
    messages_dropped: AtomicU64,
    session_start: DateTime<Utc>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            text_changes: AtomicU64::new(0),
            cursor_moves: AtomicU64::new(0),
            focus_changes: AtomicU64::new(0),
            preset_changes: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_text_change(&self) {
        self.text_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cursor_move(&self) {
        self.cursor_moves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_focus_change(&self) {
        self.focus_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_preset_change(&self) {
        self.preset_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            text_changes: self.text_changes.load(Ordering::Relaxed),
            cursor_moves: self.cursor_moves.load(Ordering::Relaxed),
            focus_changes: self.focus_changes.load(Ordering::Relaxed),
            preset_changes: self.preset_changes.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Text changes handled: {}\n\
             - Cursor moves handled: {}\n\
             - Editor switches: {}\n\
             - Preset changes: {}\n\
             - Decay ticks: {}\n\
             - Messages published: {}\n\
             - Messages dropped: {}\n\
             - Session duration: {} seconds",
            stats.text_changes,
            stats.cursor_moves,
            stats.focus_changes,
            stats.preset_changes,
            stats.ticks,
            stats.messages_published,
            stats.messages_dropped,
            stats.session_duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub text_changes: u64,
    pub cursor_moves: u64,
    pub focus_changes: u64,
    pub preset_changes: u64,
    pub ticks: u64,
    pub messages_published: u64,
    pub messages_dropped: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared session stats.
pub type SharedStats = Arc<SessionStats>;

/// Create new shared session stats.
pub fn create_shared_stats() -> SharedStats {
    Arc::new(SessionStats::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = SessionStats::new();

        stats.record_text_change();
        stats.record_text_change();
        stats.record_cursor_move();
        stats.record_tick();
        stats.record_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.text_changes, 2);
        assert_eq!(snapshot.cursor_moves, 1);
        assert_eq!(snapshot.ticks, 1);
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.messages_published, 0);
    }

    #[test]
    fn test_shared_across_threads() {
        let stats = create_shared_stats();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_published();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().messages_published, 400);
    }

    #[test]
    fn test_summary_format() {
        let stats = SessionStats::new();
        let summary = stats.summary();

        assert!(summary.contains("Text changes handled"));
        assert!(summary.contains("Decay ticks"));
        assert!(summary.contains("Messages dropped"));
    }
}
