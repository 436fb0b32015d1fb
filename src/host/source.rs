//! JSON-lines host event source.
//!
//! An editor plugin pipes one [`HostEvent`] per line into the process. The
//! source parses them on a background thread and hands them over through a
//! bounded channel. Malformed lines are logged and skipped.

use crate::host::types::HostEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Default channel capacity between the reader thread and the session.
pub const DEFAULT_SOURCE_CAPACITY: usize = 10_000;

/// Errors that can occur while reading host events.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Event source is already running")]
    AlreadyRunning,

    #[error("Failed to spawn reader thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Reads host events from a line-oriented reader.
pub struct EventSource {
    sender: Sender<HostEvent>,
    receiver: Receiver<HostEvent>,
    running: Arc<AtomicBool>,
    rejected: Arc<AtomicU64>,
    thread_handle: Option<JoinHandle<()>>,
}

impl EventSource {
    /// Create a new source with a bounded hand-over channel.
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            rejected: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
        }
    }

    /// Start reading `reader` on a background thread.
    ///
    /// The thread stops at end of input, on a read error, or once
    /// [`EventSource::stop`] has been called and the next line arrives.
    pub fn start<R>(&mut self, reader: R) -> Result<(), SourceError>
    where
        R: BufRead + Send + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let rejected = self.rejected.clone();

        let spawned = thread::Builder::new()
            .name("host-event-reader".to_string())
            .spawn(move || {
                read_lines(reader, &sender, &running, &rejected);
                running.store(false, Ordering::SeqCst);
                tracing::debug!("host event reader finished");
            });

        match spawned {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(SourceError::Spawn(e))
            }
        }
    }

    /// Stop reading.
    ///
    /// A reader blocked on input cannot be interrupted, so the thread is only
    /// joined when it has already finished; otherwise it is left to exit on
    /// its next line or end of input.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }

    /// Whether the reader thread is still consuming input.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True once input has ended and every parsed event has been taken.
    pub fn is_exhausted(&self) -> bool {
        !self.is_running() && self.receiver.is_empty()
    }

    /// Number of lines that could not be parsed.
    pub fn rejected_lines(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Get the receiver for host events.
    pub fn receiver(&self) -> &Receiver<HostEvent> {
        &self.receiver
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_lines<R: BufRead>(
    reader: R,
    sender: &Sender<HostEvent>,
    running: &AtomicBool,
    rejected: &AtomicU64,
) {
    for (index, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("host input read failed: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<HostEvent>(trimmed) {
            Ok(event) => {
                // Blocks while the session catches up; input is never dropped.
                if sender.send(event).is_err() {
                    break;
                }
            }
            Err(e) => {
                rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(line = index + 1, "skipping malformed host event: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn collect_all(source: &EventSource) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(event) = source.receiver().recv_timeout(Duration::from_secs(2)) {
            events.push(event);
            if source.is_exhausted() {
                break;
            }
        }
        events
    }

    #[test]
    fn test_reads_events_and_skips_garbage() {
        let input = concat!(
            "{\"type\":\"activeEditorChange\"}\n",
            "not json\n",
            "\n",
            "{\"type\":\"nextPreset\"}\n",
        );

        let mut source = EventSource::new(16);
        source.start(Cursor::new(input.as_bytes().to_vec())).unwrap();

        let events = collect_all(&source);
        assert_eq!(
            events,
            vec![HostEvent::ActiveEditorChange, HostEvent::NextPreset]
        );
        assert_eq!(source.rejected_lines(), 1);
    }

    #[test]
    fn test_start_twice_fails_while_running() {
        let mut source = EventSource::new(1);
        // Enough lines to keep the reader blocked on the full channel.
        let input = "{\"type\":\"nextPreset\"}\n".repeat(8);
        source.start(Cursor::new(input.into_bytes())).unwrap();

        let second = source.start(Cursor::new(Vec::new()));
        assert!(matches!(second, Err(SourceError::AlreadyRunning)));
    }

    #[test]
    fn test_exhausted_after_end_of_input() {
        let mut source = EventSource::new(4);
        source.start(Cursor::new(Vec::new())).unwrap();

        for _ in 0..200 {
            if source.is_exhausted() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(source.is_exhausted());
    }
}
