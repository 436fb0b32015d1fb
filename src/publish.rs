//! Outbound messages for the renderer.
//!
//! The renderer is an external consumer. It receives a one-way stream of
//! [`RendererMessage`]s over channels and never writes back.

use crate::core::activity::ActivityVector;
use crate::host::types::{SelectionChange, TextChange};
use crate::stats::SharedStats;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// A content change as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystrokeMessage {
    pub text: String,
    pub range_length: u32,
    pub line: u32,
    pub character: u32,
    pub is_insertion: bool,
    pub is_deletion: bool,
}

impl From<&TextChange> for KeystrokeMessage {
    fn from(change: &TextChange) -> Self {
        Self {
            text: change.inserted_text.clone(),
            range_length: change.replaced_length,
            line: change.start_line,
            character: change.start_column,
            is_insertion: change.is_insertion(),
            is_deletion: change.is_deletion(),
        }
    }
}

/// Caret position and selection extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMessage {
    pub line: u32,
    pub character: u32,
    pub selection_length: u32,
    pub has_selection: bool,
}

impl From<&SelectionChange> for CursorMessage {
    fn from(selection: &SelectionChange) -> Self {
        Self {
            line: selection.active_line,
            character: selection.active_column,
            selection_length: selection.selection_length(),
            has_selection: !selection.is_empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetChange {
    pub preset_index: usize,
}

/// Every message kind the renderer can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RendererMessage {
    Keystroke(KeystrokeMessage),
    Cursor(CursorMessage),
    Activity(ActivityVector),
    PresetChange(PresetChange),
}

/// Somewhere messages can be published to.
///
/// Publishing never blocks and never fails; a sink that cannot deliver a
/// message drops it.
pub trait MessageSink {
    fn publish(&mut self, message: RendererMessage);
}

impl MessageSink for Vec<RendererMessage> {
    fn publish(&mut self, message: RendererMessage) {
        self.push(message);
    }
}

/// Fans messages out to any number of subscriber channels.
///
/// A full subscriber misses the message; a disconnected one is removed.
#[derive(Debug, Default)]
pub struct Publisher {
    subscribers: Vec<Sender<RendererMessage>>,
    stats: Option<SharedStats>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count published and dropped messages into `stats`.
    pub fn with_stats(stats: SharedStats) -> Self {
        Self {
            subscribers: Vec::new(),
            stats: Some(stats),
        }
    }

    /// Open a new subscription holding at most `capacity` undelivered messages.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<RendererMessage> {
        let (sender, receiver) = bounded(capacity.max(1));
        self.attach(sender);
        receiver
    }

    /// Open a subscription that never misses a message.
    ///
    /// The reader must keep up; undelivered messages queue without limit.
    pub fn subscribe_unbounded(&mut self) -> Receiver<RendererMessage> {
        let (sender, receiver) = unbounded();
        self.attach(sender);
        receiver
    }

    /// Attach an existing channel as a subscriber.
    pub fn attach(&mut self, sender: Sender<RendererMessage>) {
        self.subscribers.push(sender);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl MessageSink for Publisher {
    fn publish(&mut self, message: RendererMessage) {
        let stats = self.stats.as_ref();
        self.subscribers
            .retain(|subscriber| match subscriber.try_send(message.clone()) {
                Ok(()) => {
                    if let Some(stats) = stats {
                        stats.record_published();
                    }
                    true
                }
                Err(TrySendError::Full(_)) => {
                    if let Some(stats) = stats {
                        stats.record_dropped();
                    }
                    true
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::debug!("renderer subscriber disconnected");
                    false
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::create_shared_stats;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keystroke_message_from_change() {
        let change = TextChange::new("", 3, 12, 4);
        let message = KeystrokeMessage::from(&change);
        assert_eq!(
            message,
            KeystrokeMessage {
                text: String::new(),
                range_length: 3,
                line: 12,
                character: 4,
                is_insertion: false,
                is_deletion: true,
            }
        );
    }

    #[test]
    fn test_message_json_is_kind_tagged() {
        let cursor = RendererMessage::Cursor(CursorMessage::from(&SelectionChange {
            active_line: 9,
            active_column: 3,
            selection_start_column: 3,
            selection_end_column: 8,
            is_empty: false,
        }));
        assert_eq!(
            serde_json::to_value(&cursor).unwrap(),
            serde_json::json!({
                "kind": "cursor",
                "line": 9,
                "character": 3,
                "selectionLength": 5,
                "hasSelection": true
            })
        );

        let preset = RendererMessage::PresetChange(PresetChange { preset_index: 2 });
        assert_eq!(
            serde_json::to_value(&preset).unwrap(),
            serde_json::json!({ "kind": "presetChange", "presetIndex": 2 })
        );

        let now = DateTime::from_timestamp_millis(42).unwrap();
        let activity = RendererMessage::Activity(ActivityVector::idle_at(now));
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["kind"], "activity");
        assert_eq!(json["lastActivityTimestamp"], 42);
        assert_eq!(json["intensity"], 0.0);
    }

    #[test]
    fn test_publisher_without_subscribers_is_silent() {
        let mut publisher = Publisher::new();
        publisher.publish(RendererMessage::PresetChange(PresetChange { preset_index: 0 }));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[test]
    fn test_publisher_fans_out() {
        let mut publisher = Publisher::new();
        let first = publisher.subscribe(4);
        let second = publisher.subscribe(4);

        let message = RendererMessage::PresetChange(PresetChange { preset_index: 1 });
        publisher.publish(message.clone());

        assert_eq!(first.try_recv().unwrap(), message);
        assert_eq!(second.try_recv().unwrap(), message);
    }

    #[test]
    fn test_full_subscriber_drops_without_blocking() {
        let stats = create_shared_stats();
        let mut publisher = Publisher::with_stats(stats.clone());
        let receiver = publisher.subscribe(1);

        for index in 0..3 {
            publisher.publish(RendererMessage::PresetChange(PresetChange { preset_index: index }));
        }

        assert_eq!(publisher.subscriber_count(), 1);
        assert_eq!(
            receiver.try_recv().unwrap(),
            RendererMessage::PresetChange(PresetChange { preset_index: 0 })
        );
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_published, 1);
        assert_eq!(snapshot.messages_dropped, 2);
    }

    #[test]
    fn test_unbounded_subscriber_never_drops() {
        let stats = create_shared_stats();
        let mut publisher = Publisher::with_stats(stats.clone());
        let receiver = publisher.subscribe_unbounded();

        for index in 0..5000 {
            publisher.publish(RendererMessage::PresetChange(PresetChange { preset_index: index }));
        }

        assert_eq!(receiver.len(), 5000);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_published, 5000);
        assert_eq!(snapshot.messages_dropped, 0);
    }

    #[test]
    fn test_disconnected_subscriber_is_removed() {
        let mut publisher = Publisher::new();
        let receiver = publisher.subscribe(4);
        let _kept = publisher.subscribe(4);
        drop(receiver);

        publisher.publish(RendererMessage::PresetChange(PresetChange { preset_index: 0 }));
        assert_eq!(publisher.subscriber_count(), 1);
    }
}
