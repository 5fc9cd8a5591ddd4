//! Notifications from background recommendation refreshes
//!
//! A front end that wants to redraw when fresh recommendations land creates
//! a channel with [`RefreshEvents::channel`] and hands the sender to the
//! cache. Events are best-effort: a full or closed channel drops them rather
//! than holding up the refresh.

use tokio::sync::mpsc;
use tracing::trace;

/// Messages sent from background refreshes
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    /// A refresh was started for a user
    Started { user_id: String },
    /// New recommendations were stored for a user
    Completed { user_id: String, books: usize },
    /// A refresh failed; the stored recommendations are unchanged
    Failed { user_id: String, reason: String },
}

impl RefreshEvent {
    /// User the event concerns
    pub fn user_id(&self) -> &str {
        match self {
            RefreshEvent::Started { user_id }
            | RefreshEvent::Completed { user_id, .. }
            | RefreshEvent::Failed { user_id, .. } => user_id,
        }
    }

    /// Whether this event ends a refresh
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RefreshEvent::Started { .. })
    }
}

/// Sending half handed to the cache
#[derive(Debug, Clone)]
pub struct RefreshEvents {
    sender: mpsc::Sender<RefreshEvent>,
}

impl RefreshEvents {
    /// Creates a bounded event channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RefreshEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Sends an event without waiting for room in the channel
    pub fn emit(&self, event: RefreshEvent) {
        if let Err(e) = self.sender.try_send(event) {
            trace!(error = %e, "refresh event dropped");
        }
    }
}

/// Checks for a pending refresh event without blocking
pub fn try_recv(receiver: &mut mpsc::Receiver<RefreshEvent>) -> Option<RefreshEvent> {
    receiver.try_recv().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_then_try_recv() {
        let (events, mut receiver) = RefreshEvents::channel(4);

        events.emit(RefreshEvent::Started {
            user_id: "u1".to_string(),
        });

        let event = try_recv(&mut receiver).expect("event should be queued");
        assert_eq!(event.user_id(), "u1");
        assert!(!event.is_terminal());
        assert!(try_recv(&mut receiver).is_none());
    }

    #[test]
    fn test_full_channel_drops_events() {
        let (events, mut receiver) = RefreshEvents::channel(1);

        events.emit(RefreshEvent::Started {
            user_id: "u1".to_string(),
        });
        events.emit(RefreshEvent::Completed {
            user_id: "u1".to_string(),
            books: 3,
        });

        assert!(matches!(
            try_recv(&mut receiver),
            Some(RefreshEvent::Started { .. })
        ));
        assert!(try_recv(&mut receiver).is_none());
    }

    #[test]
    fn test_closed_channel_is_ignored() {
        let (events, receiver) = RefreshEvents::channel(1);
        drop(receiver);

        events.emit(RefreshEvent::Failed {
            user_id: "u1".to_string(),
            reason: "offline".to_string(),
        });
    }
}
