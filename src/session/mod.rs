//! Session state machine (§3, §4.1).

pub mod session;
pub mod state;

pub use session::Session;
pub use state::{Intent, IntentQueue, Originator, SessionId, SessionState};
