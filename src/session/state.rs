//! Session identity, state enum and the pending-intent queue (§3, §4.1).

use std::collections::VecDeque;

/// Unique session identifier (primary key in `SessionManager`'s maps).
pub type SessionId = uuid::Uuid;

/// Core lifecycle position of a `Session` (§3). `on_hold_by_local` and
/// `on_hold_by_remote` are orthogonal flags layered over `Established`
/// rather than distinct states — mirroring
/// `sipsimple.session.Session._process_queue`, which never calls
/// `_change_state` for hold/unhold, only for the states below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Null,
    Calling,
    Ringing,
    Incoming,
    Accepting,
    Established,
    Proposed,
    Reinviting,
    Terminating,
    Terminated,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Terminated)
    }

    /// States in which `terminate()` (§4.1) is a no-op rather than an
    /// error: before a dialog exists, already tearing down, or already
    /// torn down. Broader than `is_terminal` — `Terminating` is not a
    /// terminal state but repeat `terminate()` calls against it must still
    /// be harmless (§5 "idempotent from any non-terminal state").
    pub fn terminate_is_noop(self) -> bool {
        matches!(self, SessionState::Null | SessionState::Terminating | SessionState::Terminated)
    }

    /// Valid direct transitions, per the state diagram implied by §3/§4.
    /// Used by `Session::change_state` (debug-only) and by the invariant-1
    /// property test.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Null, Calling)
                | (Null, Incoming)
                | (Calling, Ringing)
                | (Calling, Established)
                | (Ringing, Established)
                | (Incoming, Accepting)
                | (Accepting, Established)
                | (Established, Reinviting)
                | (Reinviting, Established)
                | (Established, Proposed)
                | (Proposed, Established)
                | (Null, Terminating)
                | (Calling, Terminating)
                | (Ringing, Terminating)
                | (Incoming, Terminating)
                | (Accepting, Terminating)
                | (Established, Terminating)
                | (Proposed, Terminating)
                | (Reinviting, Terminating)
                | (Terminating, Terminated)
        )
    }
}

/// Whether a stream proposal/hold action was initiated locally or by the
/// remote party. Re-exported at the crate root alongside notifications.
pub use crate::events::Originator;

/// A user intent that could not be processed immediately because a
/// reinvite was already outstanding (§3 `intent_queue`, invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Hold,
    Unhold,
    AddAudio,
}

/// FIFO of pending intents, drained one-at-a-time by `Session::process_queue`.
#[derive(Debug, Clone, Default)]
pub struct IntentQueue(VecDeque<Intent>);

impl IntentQueue {
    pub fn new() -> Self {
        Self(VecDeque::new())
    }

    pub fn push(&mut self, intent: Intent) {
        self.0.push_back(intent);
    }

    pub fn pop(&mut self) -> Option<Intent> {
        self.0.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop all pending intents (§5 "Pending intents are dropped on
    /// TERMINATING").
    pub fn clear(&mut self) {
        self.0.clear();
    }
}
