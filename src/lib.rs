//! # SIP Session Core
//!
//! `sip-session-core` owns the session state machine, SDP offer/answer
//! negotiation, and hold/reinvite handling for a SIP audio dialog. It sits
//! above the SIP transaction/dialog engine and the RTP media engine,
//! neither of which this crate implements — both are external
//! collaborators reached through the [`dialog::Invitation`] and
//! [`media::MediaStreamOps`] traits.
//!
//! ## Core components
//!
//! - [`session::Session`]: one instance per dialog, driving the state
//!   machine and SDP negotiation for its own invitation and streams.
//! - [`manager::SessionManager`]: registry of live sessions, dispatching
//!   dialog/media events to the right one and routing DTMF by stream
//!   handle.
//! - [`sdp`]: typed SDP session/media model, offer/answer construction,
//!   and reinvite validation.
//! - [`events`]: the notification bus subscribers use to observe session
//!   lifecycle and media changes.
//! - [`config`]: account/RTP/ringtone configuration consumed at session
//!   construction.
//!
//! ## Concurrency
//!
//! Every `Session` is reached through its own `parking_lot::Mutex`
//! (never held across an `.await`); `SessionManager`'s indices are
//! `dashmap::DashMap`s so looking up a session never blocks on another.

pub mod config;
pub mod dialog;
pub mod error;
pub mod events;
pub mod manager;
pub mod media;
pub mod sdp;
pub mod session;

pub use error::{Result, SessionError};
pub use events::{Notification, NotificationBus, Originator, SessionNotification};
pub use manager::SessionManager;
pub use session::{Session, SessionId, SessionState};
