//! SDP offer/answer construction and reinvite validation (§4.1, §4.4).

pub mod builder;
pub mod negotiator;
pub mod types;

pub use builder::SdpBuilder;
pub use negotiator::{validate_reinvite, ReinviteOutcome};
pub use types::{Direction, SdpConnection, SdpMedia, SdpOrigin, SdpSession};
