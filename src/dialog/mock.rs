//! Test double for `Invitation`, used by the scenario and property tests
//! in `session::session::tests` and `manager::manager::tests`.

use parking_lot::Mutex;
use std::sync::Arc;

use super::{Invitation, InvitationId, InvitationState};
use crate::sdp::SdpSession;

#[derive(Debug, Default)]
struct Inner {
    state: InvitationState,
    is_outgoing: bool,
    offered_local_sdp: Option<SdpSession>,
    offered_remote_sdp: Option<SdpSession>,
    active_local_sdp: Option<SdpSession>,
    active_remote_sdp: Option<SdpSession>,
    invites_sent: u32,
    reinvites_sent: u32,
    disconnected_with: Option<Option<u16>>,
    last_provisional_code: Option<u16>,
    last_reinvite_response_code: Option<u16>,
}

/// An in-memory `Invitation` double. Tests drive state transitions
/// directly via `set_state`/`set_offered_remote_sdp` to simulate what the
/// real SIP transaction engine would report.
#[derive(Debug, Clone)]
pub struct MockInvitation {
    id: InvitationId,
    caller_uri: String,
    inner: Arc<Mutex<Inner>>,
}

impl MockInvitation {
    pub fn new(is_outgoing: bool, caller_uri: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            caller_uri: caller_uri.into(),
            inner: Arc::new(Mutex::new(Inner {
                is_outgoing,
                ..Default::default()
            })),
        }
    }

    pub fn set_state(&self, state: InvitationState) {
        self.inner.lock().state = state;
    }

    pub fn set_offered_remote_sdp(&self, sdp: SdpSession) {
        self.inner.lock().offered_remote_sdp = Some(sdp);
    }

    pub fn activate_current_exchange(&self) {
        let mut inner = self.inner.lock();
        inner.active_local_sdp = inner.offered_local_sdp.clone();
        inner.active_remote_sdp = inner.offered_remote_sdp.clone();
    }

    pub fn invites_sent(&self) -> u32 {
        self.inner.lock().invites_sent
    }

    pub fn reinvites_sent(&self) -> u32 {
        self.inner.lock().reinvites_sent
    }

    pub fn disconnected_with(&self) -> Option<Option<u16>> {
        self.inner.lock().disconnected_with
    }

    pub fn last_provisional_code(&self) -> Option<u16> {
        self.inner.lock().last_provisional_code
    }

    pub fn last_reinvite_response_code(&self) -> Option<u16> {
        self.inner.lock().last_reinvite_response_code
    }

    pub fn offered_local_sdp(&self) -> Option<SdpSession> {
        self.inner.lock().offered_local_sdp.clone()
    }
}

impl Invitation for MockInvitation {
    fn id(&self) -> InvitationId {
        self.id
    }

    fn state(&self) -> InvitationState {
        self.inner.lock().state
    }

    fn is_outgoing(&self) -> bool {
        self.inner.lock().is_outgoing
    }

    fn caller_uri(&self) -> &str {
        &self.caller_uri
    }

    fn send_invite(&self) {
        let mut inner = self.inner.lock();
        inner.invites_sent += 1;
        inner.state = InvitationState::Calling;
    }

    fn accept_invite(&self) {
        self.inner.lock().state = InvitationState::Connecting;
    }

    fn respond_to_invite_provisionally(&self, code: u16) {
        self.inner.lock().last_provisional_code = Some(code);
    }

    fn respond_to_reinvite(&self, code: u16) {
        self.inner.lock().last_reinvite_response_code = Some(code);
    }

    fn set_offered_local_sdp(&self, sdp: SdpSession) {
        self.inner.lock().offered_local_sdp = Some(sdp);
    }

    fn send_reinvite(&self) {
        self.inner.lock().reinvites_sent += 1;
    }

    fn disconnect(&self, code: Option<u16>) {
        let mut inner = self.inner.lock();
        inner.disconnected_with = Some(code);
        inner.state = InvitationState::Disconnecting;
    }

    fn get_offered_remote_sdp(&self) -> Option<SdpSession> {
        self.inner.lock().offered_remote_sdp.clone()
    }

    fn get_active_local_sdp(&self) -> Option<SdpSession> {
        self.inner.lock().active_local_sdp.clone()
    }

    fn get_active_remote_sdp(&self) -> Option<SdpSession> {
        self.inner.lock().active_remote_sdp.clone()
    }
}
