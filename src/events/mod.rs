//! Notification bus (C5, §6 "Published notifications").
//!
//! Modeled on `rvoip-session-core::manager::events::SessionEvent`, which
//! uses `tokio::sync::broadcast` for the same fan-out shape; variant names
//! and payloads instead follow spec.md's contractual notification list
//! (itself a straight port of `sipsimple.session`'s
//! `SCSession*`-prefixed notifications).

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::session::state::SessionId;

/// Who originated a hold/unhold/stream-proposal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Originator {
    Local,
    Remote,
}

/// The session-level facts `SessionManager` publishes. Every notification
/// is additionally timestamped by the `Notification` envelope it's
/// wrapped in.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    NewIncoming { has_audio: bool },
    NewOutgoing { audio_proposed: bool },
    GotRingIndication,
    WillStart,
    DidStart,
    ChangedState { prev: crate::session::state::SessionState, new: crate::session::state::SessionState },
    GotStreamProposal { originator: Originator, has_audio: bool },
    AcceptedStreamProposal { originator: Originator },
    RejectedStreamProposal { originator: Originator },
    GotHoldRequest { originator: Originator },
    GotUnholdRequest { originator: Originator },
    GotDtmf { digit: char },
    WillEnd,
    DidFail,
    DidEnd,
}

/// A notification plus the session it concerns and the moment it was
/// emitted (§6: "Every notification carries a timestamp").
#[derive(Debug, Clone)]
pub struct Notification {
    pub session_id: SessionId,
    pub event: SessionNotification,
    pub timestamp: DateTime<Utc>,
}

/// Typed multicast of session notifications (C5). `Session::emit` publishes
/// synchronously, from inside `Session` methods that `SessionManager` calls
/// while still holding `session.lock()` — not after unlock. That's safe here
/// because `broadcast::Sender::send` never awaits or blocks on slow
/// subscribers (it copies the value into each receiver's ring buffer and
/// returns), so publishing under the lock can't deadlock or stall other
/// sessions. Subscribers are still required to be non-blocking in how they
/// *react* to a notification, since a slow receiver only risks lagging
/// behind and missing older values, never blocking the sender.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish a notification. Errors (no subscribers) are not a failure
    /// for the publisher — the bus is fire-and-forget.
    pub fn publish(&self, session_id: SessionId, event: SessionNotification) {
        let notification = Notification {
            session_id,
            event,
            timestamp: Utc::now(),
        };
        let _ = self.sender.send(notification);
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(256)
    }
}
