//! The `Invitation` contract (§6): the underlying SIP transaction engine
//! this crate drives but does not implement. SIP transport itself is a
//! Non-goal (§1); this module only defines the narrow interface.

#[cfg(test)]
pub mod mock;

use crate::sdp::SdpSession;

/// Invitation dialog state, as observed by `SessionManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvitationState {
    #[default]
    Null,
    Calling,
    Early,
    Connecting,
    Confirmed,
    Reinvited,
    Disconnecting,
    Disconnected,
}

/// Opaque identity for an `Invitation`, used as the `inv_map` key.
pub type InvitationId = uuid::Uuid;

/// Headers relevant to session bookkeeping, carried on state-change
/// events (`Server`/`User-Agent` capture, §4.3 CONNECTING/DISCONNECTED).
#[derive(Debug, Clone, Default)]
pub struct InvitationHeaders {
    pub server: Option<String>,
    pub user_agent: Option<String>,
}

/// `InvitationChangedState` event payload (§6).
#[derive(Debug, Clone)]
pub struct InvitationChangedState {
    pub prev_state: InvitationState,
    pub state: InvitationState,
    pub code: Option<u16>,
    pub headers: InvitationHeaders,
}

/// `InvitationGotSDPUpdate` event payload (§6).
#[derive(Debug, Clone)]
pub struct InvitationGotSdpUpdate {
    pub succeeded: bool,
    pub local_sdp: Option<SdpSession>,
    pub remote_sdp: Option<SdpSession>,
}

/// The dialog handle a `Session` exclusively owns (§3 invariant: "A
/// Session owns its streams"; the invitation is owned the same way).
///
/// Every method is assumed non-blocking: implementations enqueue work on
/// the underlying SIP transaction engine rather than waiting on the wire
/// (§5 "Suspension points: none").
pub trait Invitation: std::fmt::Debug + Send + Sync {
    fn id(&self) -> InvitationId;
    fn state(&self) -> InvitationState;
    fn is_outgoing(&self) -> bool;
    fn caller_uri(&self) -> &str;

    fn send_invite(&self);
    fn accept_invite(&self);
    fn respond_to_invite_provisionally(&self, code: u16);
    fn respond_to_reinvite(&self, code: u16);
    fn set_offered_local_sdp(&self, sdp: SdpSession);
    fn send_reinvite(&self);
    fn disconnect(&self, code: Option<u16>);

    fn get_offered_remote_sdp(&self) -> Option<SdpSession>;
    fn get_active_local_sdp(&self) -> Option<SdpSession>;
    fn get_active_remote_sdp(&self) -> Option<SdpSession>;
}
