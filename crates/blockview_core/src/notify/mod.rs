//! View refresh notifications.
//!
//! # Responsibility
//! - Describe events raised after attribute view mutations.
//! - Hand them to whatever transport drains the receiving end.
//!
//! # Invariants
//! - Publishing never fails the caller. A dropped receiver is logged and
//!   the event is discarded.

use log::warn;
use serde_json::json;
use std::sync::mpsc::{self, Receiver, Sender};

/// Event raised after a committed attribute view change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Open renderings of the attribute view must be reloaded.
    RefreshAttributeView { av_id: String },
}

impl ViewEvent {
    pub fn refresh(av_id: impl Into<String>) -> Self {
        Self::RefreshAttributeView {
            av_id: av_id.into(),
        }
    }

    /// Broadcast channel the event belongs to.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::RefreshAttributeView { .. } => "protyle",
        }
    }

    /// Command name understood by clients.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshAttributeView { .. } => "refreshAttributeView",
        }
    }

    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::RefreshAttributeView { av_id } => json!({ "id": av_id }),
        }
    }
}

/// Fire-and-forget sender side of the event channel.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    sender: Option<Sender<ViewEvent>>,
}

impl EventBus {
    /// Creates a bus and the receiver that drains it.
    pub fn channel() -> (Self, Receiver<ViewEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Creates a bus that discards every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: ViewEvent) {
        let Some(sender) = self.sender.as_ref() else {
            return;
        };
        if let Err(err) = sender.send(event) {
            warn!(
                "event=view_event_publish module=notify status=error name={} reason=receiver_dropped",
                err.0.name()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, ViewEvent};
    use serde_json::json;

    #[test]
    fn refresh_event_targets_protyle_channel() {
        let event = ViewEvent::refresh("av1");
        assert_eq!(event.channel(), "protyle");
        assert_eq!(event.name(), "refreshAttributeView");
        assert_eq!(event.data(), json!({"id": "av1"}));
    }

    #[test]
    fn publish_survives_dropped_receiver() {
        let (bus, receiver) = EventBus::channel();
        bus.publish(ViewEvent::refresh("av1"));
        assert_eq!(receiver.try_recv().ok(), Some(ViewEvent::refresh("av1")));

        drop(receiver);
        bus.publish(ViewEvent::refresh("av2"));
        EventBus::disabled().publish(ViewEvent::refresh("av3"));
    }
}
