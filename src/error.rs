//! Error types for the session core.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by user-facing `Session` operations.
///
/// Protocol-level failures (bad reinvite version/origin) are handled
/// locally with a SIP error response and never reach this type; see
/// `sdp::negotiator`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A user API was called while the session was in the wrong state.
    #[error("operation not valid in state {state:?}")]
    InvalidState {
        /// The state the session was actually in.
        state: crate::session::state::SessionState,
    },

    /// `new`/`accept` was called with no media stream selected.
    #[error("no media stream requested")]
    NoStreamRequested,

    /// `accept(use_audio = true)` but the offer had no audio, or the
    /// incoming offer carried no supported media at all.
    #[error("audio requested but not offered by the remote party")]
    UnsupportedMedia,

    /// `accept` would reject every m-line the remote party proposed.
    #[error("none of the streams proposed by the remote party were accepted")]
    AllStreamsRejected,

    /// `add_audio` was called but an audio stream is already present.
    #[error("an audio stream is already active within this session")]
    StreamAlreadyActive,

    /// `send_dtmf` was called without an active audio stream.
    #[error("session has no active audio stream to send DTMF over")]
    StreamNotReady,

    /// A reinvite failed the SDP version/origin rules of
    /// `sdp::negotiator`. Handled locally (488 sent) — never returned from
    /// a user-facing operation, constructed only in `Session::on_reinvited`
    /// so the rejection reason is logged through a named variant instead of
    /// a bare string.
    #[error("reinvite rejected: {reason}")]
    ProtocolViolation {
        /// Human-readable reason, e.g. "version gap" or "origin changed".
        reason: String,
    },
}
