//! Tray/notification side channel.
//!
//! The core only *emits* status: an icon state, a status-bar text, and
//! one-shot alerts. Rendering (tray icon, balloon notifications) is an
//! external responsibility; whatever front end is attached drains the
//! receiver.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Status indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    Normal,
    Alarm,
}

/// One emission on the side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Persistent indicator state.
    Icon(IconState),
    /// Status-bar text (empty string clears it).
    Text(String),
    /// One-shot user-visible alert.
    Alert { title: String, body: String },
}

/// Sender half held by the dispatcher; clone freely.
#[derive(Clone)]
pub struct StatusChannel {
    sender: Sender<StatusEvent>,
}

impl StatusChannel {
    /// Create a channel pair: the [`StatusChannel`] for the core, the
    /// receiver for whatever renders status.
    pub fn new() -> (Self, Receiver<StatusEvent>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    pub fn set_icon(&self, state: IconState) {
        let _ = self.sender.send(StatusEvent::Icon(state));
    }

    pub fn set_text(&self, text: impl Into<String>) {
        let _ = self.sender.send(StatusEvent::Text(text.into()));
    }

    pub fn alert(&self, title: impl Into<String>, body: impl Into<String>) {
        let _ = self.sender.send(StatusEvent::Alert {
            title: title.into(),
            body: body.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (channel, receiver) = StatusChannel::new();
        channel.set_icon(IconState::Alarm);
        channel.set_text("2 hrs 10 mins");
        channel.alert("waka-agent", "something happened");

        assert_eq!(receiver.recv().unwrap(), StatusEvent::Icon(IconState::Alarm));
        assert_eq!(
            receiver.recv().unwrap(),
            StatusEvent::Text("2 hrs 10 mins".to_string())
        );
        assert!(matches!(receiver.recv().unwrap(), StatusEvent::Alert { .. }));
    }

    #[test]
    fn test_send_without_receiver_does_not_panic() {
        let (channel, receiver) = StatusChannel::new();
        drop(receiver);
        channel.set_icon(IconState::Normal);
        channel.set_text("");
    }
}
