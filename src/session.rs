//! Session lifecycle.
//!
//! A [`Session`] is opened when the visualization starts and closed when it
//! goes away. While open it owns the activity state on a single worker
//! thread: host events, subscriptions and decay ticks all reach that thread
//! as [`SessionCommand`]s, so every mutation is serialized and subscribers
//! only ever see copies.
//!
//! Hosts that already dispatch everything on one thread can drive a
//! [`SessionCore`] directly instead.

use crate::config::{Config, ConfigError};
use crate::core::activity::ActivityAggregator;
use crate::core::preset::PresetCycler;
use crate::host::types::HostEvent;
use crate::publish::{CursorMessage, KeystrokeMessage, MessageSink, Publisher, RendererMessage};
use crate::stats::{create_shared_stats, SharedStats};
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Pending commands a session worker will buffer.
const COMMAND_CAPACITY: usize = 1024;

/// Errors that can occur while driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,

    #[error("Failed to spawn session thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Work items processed by the session worker, in arrival order.
#[derive(Debug)]
pub enum SessionCommand {
    Host(HostEvent),
    Subscribe(Sender<RendererMessage>),
    Tick,
}

/// The activity state and everything that reacts to host events.
pub struct SessionCore {
    aggregator: ActivityAggregator,
    presets: PresetCycler,
    publisher: Publisher,
    stats: SharedStats,
}

impl SessionCore {
    pub fn new(config: &Config, stats: SharedStats) -> Self {
        Self {
            aggregator: ActivityAggregator::new(),
            presets: PresetCycler::new(config.preset_count, config.initial_preset),
            publisher: Publisher::with_stats(stats.clone()),
            stats,
        }
    }

    pub fn aggregator(&self) -> &ActivityAggregator {
        &self.aggregator
    }

    pub fn presets(&self) -> &PresetCycler {
        &self.presets
    }

    /// Open a renderer subscription directly on this core.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<RendererMessage> {
        self.publisher.subscribe(capacity)
    }

    pub fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Host(event) => self.handle_event(event),
            SessionCommand::Subscribe(sender) => self.publisher.attach(sender),
            SessionCommand::Tick => self.tick(),
        }
    }

    /// Translate one host event into renderer messages and state updates.
    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::TextChange { changes } => {
                if changes.is_empty() {
                    return;
                }
                self.stats.record_text_change();
                for change in &changes {
                    self.publisher
                        .publish(RendererMessage::Keystroke(KeystrokeMessage::from(change)));
                }
                self.aggregator.on_text_change(&changes, &mut self.publisher);
            }
            HostEvent::SelectionChange(selection) => {
                self.stats.record_cursor_move();
                self.publisher
                    .publish(RendererMessage::Cursor(CursorMessage::from(&selection)));
                self.aggregator.on_cursor_move(
                    selection.active_column as f64,
                    selection.active_line as f64,
                    &mut self.publisher,
                );
            }
            HostEvent::ActiveEditorChange => {
                self.stats.record_focus_change();
                self.aggregator.on_editor_focus_change();
            }
            HostEvent::NextPreset => {
                self.stats.record_preset_change();
                self.presets.next_preset(&mut self.publisher);
            }
            HostEvent::PrevPreset => {
                self.stats.record_preset_change();
                self.presets.prev_preset(&mut self.publisher);
            }
        }
    }

    /// One decay step.
    pub fn tick(&mut self) {
        self.stats.record_tick();
        self.aggregator.on_tick(&mut self.publisher);
    }
}

/// Cooperative cancellation flag that can also wake a waiting thread.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Request cancellation. Repeated calls are no-ops.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            let _ = self.wake_tx.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Receives once when the token is cancelled.
    pub fn cancelled(&self) -> &Receiver<()> {
        &self.wake_rx
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic task feeding `Tick` commands into a session worker.
pub struct TickTask {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TickTask {
    /// Start ticking every `interval` until cancelled or the worker is gone.
    ///
    /// A tick is skipped rather than queued when the worker is backed up.
    pub fn spawn(interval: Duration, commands: Sender<SessionCommand>) -> std::io::Result<Self> {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = thread::Builder::new()
            .name("activity-tick".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if task_token.is_cancelled() {
                                break;
                            }
                            match commands.try_send(SessionCommand::Tick) {
                                Ok(()) | Err(TrySendError::Full(_)) => {}
                                Err(TrySendError::Disconnected(_)) => break,
                            }
                        }
                        recv(task_token.cancelled()) -> _ => break,
                    }
                }
                tracing::debug!("tick task stopped");
            })?;

        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    /// Cancel and wait for the task to exit.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TickTask {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An open visualization session.
pub struct Session {
    id: Uuid,
    commands: Option<Sender<SessionCommand>>,
    ticker: Option<TickTask>,
    worker: Option<JoinHandle<()>>,
    stats: SharedStats,
    subscriber_capacity: usize,
}

impl Session {
    /// Open a session: start the worker and its decay tick.
    pub fn open(config: &Config) -> Result<Self, SessionError> {
        config.validate()?;

        let id = Uuid::new_v4();
        let stats = create_shared_stats();
        let (commands, receiver) = bounded(COMMAND_CAPACITY);

        let mut core = SessionCore::new(config, stats.clone());
        let worker = thread::Builder::new()
            .name("activity-session".to_string())
            .spawn(move || {
                for command in receiver.iter() {
                    core.handle(command);
                }
            })?;

        let ticker = match TickTask::spawn(config.tick_interval, commands.clone()) {
            Ok(ticker) => ticker,
            Err(e) => {
                drop(commands);
                let _ = worker.join();
                return Err(SessionError::Spawn(e));
            }
        };

        tracing::info!(
            session = %id,
            tick_ms = config.tick_interval.as_millis() as u64,
            presets = config.preset_count,
            "session opened"
        );

        Ok(Self {
            id,
            commands: Some(commands),
            ticker: Some(ticker),
            worker: Some(worker),
            stats,
            subscriber_capacity: config.subscriber_capacity,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn is_open(&self) -> bool {
        self.commands.is_some()
    }

    /// Open a renderer subscription.
    ///
    /// Every message published after this call is offered to the returned
    /// receiver. The channel disconnects when the session closes.
    pub fn subscribe(&self) -> Result<Receiver<RendererMessage>, SessionError> {
        let (sender, receiver) = bounded(self.subscriber_capacity);
        self.send(SessionCommand::Subscribe(sender))?;
        Ok(receiver)
    }

    /// Open a renderer subscription that receives every message.
    ///
    /// Unlike [`Session::subscribe`] nothing is dropped when the reader falls
    /// behind, so the reader must drain it continuously. Messages published
    /// while the session closes are still delivered before it disconnects.
    pub fn subscribe_unbounded(&self) -> Result<Receiver<RendererMessage>, SessionError> {
        let (sender, receiver) = unbounded();
        self.send(SessionCommand::Subscribe(sender))?;
        Ok(receiver)
    }

    /// Queue a host event for the worker.
    pub fn handle_event(&self, event: HostEvent) -> Result<(), SessionError> {
        self.send(SessionCommand::Host(event))
    }

    pub fn next_preset(&self) -> Result<(), SessionError> {
        self.handle_event(HostEvent::NextPreset)
    }

    pub fn prev_preset(&self) -> Result<(), SessionError> {
        self.handle_event(HostEvent::PrevPreset)
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        let commands = self.commands.as_ref().ok_or(SessionError::Closed)?;
        commands.send(command).map_err(|_| SessionError::Closed)
    }

    /// Stop the tick, drain queued commands, and shut the worker down.
    ///
    /// Nothing is published once this returns.
    pub fn close(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }

        // Dropping the last sender ends the worker loop after it drains.
        if self.commands.take().is_none() {
            return;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(session = %self.id, "session worker panicked");
            }
        }

        tracing::info!(session = %self.id, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::types::{SelectionChange, TextChange};
    use crate::publish::PresetChange;

    fn core() -> SessionCore {
        SessionCore::new(&Config::default(), create_shared_stats())
    }

    fn drain(receiver: &Receiver<RendererMessage>) -> Vec<RendererMessage> {
        receiver.try_iter().collect()
    }

    #[test]
    fn test_text_change_emits_keystrokes_then_activity() {
        let mut core = core();
        let receiver = core.subscribe(16);

        core.handle_event(HostEvent::TextChange {
            changes: vec![TextChange::new("fn", 0, 1, 0), TextChange::new("", 1, 2, 0)],
        });

        let messages = drain(&receiver);
        assert_eq!(messages.len(), 3);
        assert!(matches!(&messages[0], RendererMessage::Keystroke(k) if k.text == "fn" && k.is_insertion));
        assert!(matches!(&messages[1], RendererMessage::Keystroke(k) if k.is_deletion && !k.is_insertion));
        assert!(matches!(&messages[2], RendererMessage::Activity(v) if v.chaos > 0.0));
    }

    #[test]
    fn test_empty_text_batch_is_not_counted() {
        let stats = create_shared_stats();
        let mut core = SessionCore::new(&Config::default(), stats.clone());
        let receiver = core.subscribe(16);

        core.handle_event(HostEvent::TextChange { changes: vec![] });
        assert!(drain(&receiver).is_empty());
        assert_eq!(stats.snapshot().text_changes, 0);

        core.handle_event(HostEvent::TextChange {
            changes: vec![TextChange::new("x", 0, 0, 0)],
        });
        assert_eq!(stats.snapshot().text_changes, 1);
    }

    #[test]
    fn test_selection_change_emits_cursor_then_activity() {
        let mut core = core();
        let receiver = core.subscribe(16);

        core.handle_event(HostEvent::SelectionChange(SelectionChange::caret(4, 7)));

        let messages = drain(&receiver);
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            RendererMessage::Cursor(CursorMessage {
                line: 4,
                character: 7,
                selection_length: 0,
                has_selection: false,
            })
        );
        assert!(matches!(messages[1], RendererMessage::Activity(_)));
    }

    #[test]
    fn test_editor_change_raises_focus_without_publishing() {
        let mut core = core();
        let receiver = core.subscribe(16);

        core.handle_event(HostEvent::ActiveEditorChange);
        assert!(drain(&receiver).is_empty());
        assert!(core.aggregator().vector().focus > 0.0);
    }

    #[test]
    fn test_preset_commands_share_the_channel() {
        let mut core = core();
        let receiver = core.subscribe(16);

        core.handle_event(HostEvent::PrevPreset);
        core.handle(SessionCommand::Host(HostEvent::NextPreset));

        assert_eq!(
            drain(&receiver),
            vec![
                RendererMessage::PresetChange(PresetChange { preset_index: 3 }),
                RendererMessage::PresetChange(PresetChange { preset_index: 0 }),
            ]
        );
        assert_eq!(core.presets().index(), 0);
    }

    #[test]
    fn test_tick_always_publishes() {
        let stats = create_shared_stats();
        let mut core = SessionCore::new(&Config::default(), stats.clone());
        let receiver = core.subscribe(16);

        core.handle(SessionCommand::Tick);
        core.tick();

        assert_eq!(drain(&receiver).len(), 2);
        assert_eq!(stats.snapshot().ticks, 2);
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.cancelled().try_recv().is_ok());
        assert!(clone.cancelled().try_recv().is_err());
    }

    #[test]
    fn test_tick_task_sends_until_stopped() {
        let (sender, receiver) = bounded(64);
        let mut task = TickTask::spawn(Duration::from_millis(5), sender).unwrap();

        let first = receiver.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(first, SessionCommand::Tick));

        task.stop();
        assert!(!task.is_running());
        while receiver.try_recv().is_ok() {}
        // The task dropped its sender on exit.
        assert!(receiver.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_closed_session_rejects_events() {
        let mut session = Session::open(&Config::default()).unwrap();
        assert!(session.is_open());
        session.close();
        assert!(!session.is_open());
        assert!(matches!(
            session.handle_event(HostEvent::ActiveEditorChange),
            Err(SessionError::Closed)
        ));
        assert!(session.subscribe().is_err());
        // Closing twice is harmless.
        session.close();
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = Config {
            preset_count: 0,
            ..Config::default()
        };
        assert!(matches!(
            Session::open(&config),
            Err(SessionError::Config(ConfigError::Invalid(_)))
        ));
    }
}
