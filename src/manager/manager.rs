//! `SessionManager`: owns every live `Session`, dispatches dialog/media
//! events to the right one, and indexes streams for DTMF routing (§4.3,
//! §5 "Concurrency & resource model").

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::{Ringtone, RingtoneConfiguration, RtpConfiguration};
use crate::dialog::{Invitation, InvitationChangedState, InvitationGotSdpUpdate, InvitationId, InvitationState};
use crate::error::{Result, SessionError};
use crate::events::NotificationBus;
use crate::media::StreamHandle;
use crate::sdp::SdpSession;
use crate::session::{Session, SessionId, SessionState};

/// Central registry for live sessions (§4.3, §5). `sessions` is the single
/// owning map; `inv_map`/`stream_map` are lookup indices kept in sync with
/// it so a `Session` is only ever reachable through its own lock.
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Mutex<Session>>>,
    inv_map: DashMap<InvitationId, SessionId>,
    stream_map: DashMap<StreamHandle, SessionId>,
    rtp_config: RtpConfiguration,
    ringtone_config: RingtoneConfiguration,
    notifications: NotificationBus,
}

impl SessionManager {
    pub fn new(rtp_config: RtpConfiguration, ringtone_config: RingtoneConfiguration) -> Self {
        Self {
            sessions: DashMap::new(),
            inv_map: DashMap::new(),
            stream_map: DashMap::new(),
            rtp_config,
            ringtone_config,
            notifications: NotificationBus::default(),
        }
    }

    /// Subscribe to every notification this manager's sessions publish
    /// (C5).
    pub fn notifications(&self) -> tokio::sync::broadcast::Receiver<crate::events::Notification> {
        self.notifications.subscribe()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Dial a new outgoing session with a single audio stream (§4.1 "new",
    /// §4.3 NewOutgoing).
    pub fn start_outgoing(
        &self,
        invitation: Arc<dyn Invitation>,
        local_address: std::net::IpAddr,
        audio_formats: Vec<String>,
    ) -> Result<SessionId> {
        let inv_id = invitation.id();
        let session = Session::start_outgoing(
            invitation,
            local_address,
            self.rtp_config.clone(),
            self.notifications.clone(),
            audio_formats,
        )?;
        let id = session.id();
        self.insert(inv_id, id, session);
        Ok(id)
    }

    /// Register a session for an INVITE that already arrived on the wire
    /// (§4.1 "new", §4.3 NewIncoming). The ringtone, if any, is resolved
    /// from `ringtone_config` by `(user, host)`.
    ///
    /// If none of the offered m-lines carry a kind this crate supports
    /// (today, only audio) with a nonzero port, the INVITE is rejected
    /// with 415 and no session is created (§4.3 INCOMING), mirroring
    /// `sipsimple.session.SessionManager._handle_SCInvitationChangedState`'s
    /// `"INCOMING"` branch. Otherwise the dialog is provisionally answered
    /// 180 before the `Session` is constructed.
    pub fn handle_incoming(
        &self,
        invitation: Arc<dyn Invitation>,
        local_address: std::net::IpAddr,
        caller_user: &str,
        caller_host: &str,
        remote_sdp: SdpSession,
        user_agent: Option<String>,
    ) -> Option<SessionId> {
        let has_supported_media = remote_sdp
            .media
            .iter()
            .any(|m| m.media == "audio" && m.is_active());
        if !has_supported_media {
            tracing::info!(caller = %invitation.caller_uri(), "no supported media offered, rejecting 415");
            invitation.disconnect(Some(415));
            return None;
        }

        invitation.respond_to_invite_provisionally(180);
        let inv_id = invitation.id();
        let ringtone: Option<Arc<dyn Ringtone>> = self.ringtone_config.resolve(caller_user, caller_host);
        let session = Session::mark_incoming(
            invitation,
            local_address,
            self.rtp_config.clone(),
            self.notifications.clone(),
            ringtone,
            remote_sdp,
            user_agent,
        );
        let id = session.id();
        self.insert(inv_id, id, session);
        Some(id)
    }

    fn insert(&self, inv_id: InvitationId, id: SessionId, session: Session) {
        self.inv_map.insert(inv_id, id);
        self.sync_stream_map(id, &session);
        self.sessions.insert(id, Arc::new(Mutex::new(session)));
    }

    fn sync_stream_map(&self, id: SessionId, session: &Session) {
        for handle in session.stream_handles() {
            self.stream_map.insert(handle, id);
        }
    }

    fn get(&self, id: SessionId) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(SessionError::InvalidState { state: SessionState::Terminated })
    }

    fn by_invitation(&self, inv_id: InvitationId) -> Option<Arc<Mutex<Session>>> {
        let id = *self.inv_map.get(&inv_id)?;
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    // ---- user-facing dispatch (one lock acquisition each, §5) ----

    pub fn accept(&self, id: SessionId, use_audio: bool) -> Result<()> {
        let session = self.get(id)?;
        let mut session = session.lock();
        session.accept(use_audio)?;
        self.sync_stream_map(id, &session);
        Ok(())
    }

    pub fn reject(&self, id: SessionId, code: u16) -> Result<()> {
        self.get(id)?.lock().reject(code)
    }

    pub fn add_audio(&self, id: SessionId) -> Result<()> {
        let session = self.get(id)?;
        let mut session = session.lock();
        session.add_audio()?;
        self.sync_stream_map(id, &session);
        Ok(())
    }

    pub fn accept_proposal(&self, id: SessionId) -> Result<()> {
        let session = self.get(id)?;
        let mut session = session.lock();
        session.accept_proposal()?;
        self.sync_stream_map(id, &session);
        Ok(())
    }

    pub fn reject_proposal(&self, id: SessionId, code: u16) -> Result<()> {
        self.get(id)?.lock().reject_proposal(code)
    }

    pub fn hold(&self, id: SessionId) -> Result<()> {
        self.get(id)?.lock().hold()
    }

    pub fn unhold(&self, id: SessionId) -> Result<()> {
        self.get(id)?.lock().unhold()
    }

    pub fn terminate(&self, id: SessionId) -> Result<()> {
        self.get(id)?.lock().terminate()
    }

    /// Route a DTMF digit to whichever session owns `stream`, looked up via
    /// `stream_map` (§4.3 "route by stream_map").
    pub fn send_dtmf(&self, stream: StreamHandle, digit: char) -> Result<()> {
        let id = *self.stream_map.get(&stream).ok_or(SessionError::StreamNotReady)?;
        self.get(id)?.lock().send_dtmf(digit)
    }

    /// A remote party sent DTMF (`AudioTransportGotDTMF`, §6). Routed by
    /// `stream_map` the same way as `send_dtmf`; dropped without error if
    /// the stream is unknown, mirroring the benign-race handling every
    /// other event dispatch here follows (§5 "If a Session is not found
    /// ... the event is discarded").
    pub fn on_dtmf_received(&self, stream: StreamHandle, digit: char) {
        let Some(id) = self.stream_map.get(&stream).map(|entry| *entry) else {
            tracing::warn!(?stream, "dtmf received for unknown stream");
            return;
        };
        if let Some(session) = self.sessions.get(&id) {
            session.lock().on_dtmf_received(digit);
        }
    }

    // ---- dialog/SDP event dispatch (§4.3) ----

    /// Dispatch an `InvitationChangedState` event to the owning session.
    /// `remote_sdp` carries the offer/answer attached to this particular
    /// state change, when the underlying engine supplies one.
    pub fn on_invitation_changed_state(
        &self,
        inv_id: InvitationId,
        event: InvitationChangedState,
        remote_sdp: Option<SdpSession>,
    ) {
        let Some(session) = self.by_invitation(inv_id) else {
            tracing::warn!(?inv_id, "state change for unknown invitation");
            return;
        };
        let mut session = session.lock();
        match event.state {
            InvitationState::Early => session.on_early(event.code),
            InvitationState::Connecting => session.on_connecting(event.headers),
            InvitationState::Confirmed => session.on_confirmed(remote_sdp),
            InvitationState::Reinvited => {
                if let Some(remote_sdp) = remote_sdp {
                    session.on_reinvited(remote_sdp);
                }
            }
            InvitationState::Disconnected => {
                session.on_disconnected(event.code, event.prev_state == InvitationState::Confirmed, event.headers);
            }
            InvitationState::Disconnecting | InvitationState::Null | InvitationState::Calling => {}
        }
        let id = session.id();
        drop(session);
        if let Some(session) = self.sessions.get(&id) {
            self.sync_stream_map(id, &session.lock());
        }
        if matches!(event.state, InvitationState::Disconnected) {
            self.remove(id, inv_id);
        }
    }

    /// Dispatch an `InvitationGotSDPUpdate` event (§4.3 "SDP negotiation
    /// result"): the outcome of a reinvite *this* session initiated.
    pub fn on_sdp_update(&self, inv_id: InvitationId, update: InvitationGotSdpUpdate) {
        let Some(session) = self.by_invitation(inv_id) else {
            tracing::warn!(?inv_id, "sdp update for unknown invitation");
            return;
        };
        let mut session = session.lock();
        session.update_media(update.succeeded, update.remote_sdp);
        let id = session.id();
        drop(session);
        if let Some(session) = self.sessions.get(&id) {
            self.sync_stream_map(id, &session.lock());
        }
    }

    fn remove(&self, id: SessionId, inv_id: InvitationId) {
        self.sessions.remove(&id);
        self.inv_map.remove(&inv_id);
        self.stream_map.retain(|_, owner| *owner != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::mock::MockInvitation;
    use crate::dialog::{InvitationChangedState, InvitationGotSdpUpdate, InvitationHeaders};
    use crate::sdp::{SdpConnection, SdpMedia, SdpOrigin};
    use pretty_assertions::assert_eq;
    use std::net::IpAddr;

    fn local_address() -> IpAddr {
        IpAddr::from([127, 0, 0, 1])
    }

    fn audio_media(port: u16) -> SdpMedia {
        SdpMedia {
            media: "audio".into(),
            port,
            transport: "RTP/AVP".into(),
            formats: vec!["0".into()],
            attributes: vec![],
        }
    }

    fn remote_offer(version: u64) -> SdpSession {
        SdpSession {
            version,
            origin: SdpOrigin {
                user: "bob".into(),
                id: "42".into(),
                net_type: "IN".into(),
                address_type: "IP4".into(),
                address: "10.0.0.2".into(),
            },
            connection: SdpConnection::new(IpAddr::from([10, 0, 0, 2])),
            start_time: 0,
            stop_time: 0,
            media: vec![audio_media(5006)],
        }
    }

    fn changed_state(state: InvitationState, code: Option<u16>) -> InvitationChangedState {
        changed_state_with_prev(InvitationState::Null, state, code)
    }

    fn changed_state_with_prev(prev_state: InvitationState, state: InvitationState, code: Option<u16>) -> InvitationChangedState {
        InvitationChangedState {
            prev_state,
            state,
            code,
            headers: InvitationHeaders::default(),
        }
    }

    /// Scenario: outgoing call accepted, both sides exchange DTMF routed by
    /// `stream_map`.
    #[test]
    fn outgoing_call_lifecycle_and_dtmf_routing() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let inv = Arc::new(MockInvitation::new(true, "sip:bob@example.com"));
        let id = manager
            .start_outgoing(inv.clone(), local_address(), vec!["0".into()])
            .unwrap();
        assert_eq!(manager.session_count(), 1);

        manager.on_invitation_changed_state(inv.id(), changed_state(InvitationState::Early, None), None);
        manager.on_invitation_changed_state(
            inv.id(),
            changed_state(InvitationState::Confirmed, None),
            Some(remote_offer(0)),
        );

        let session = manager.get(id).unwrap();
        let handle = session.lock().stream_handles()[0];
        drop(session);

        manager.send_dtmf(handle, '5').unwrap();
    }

    /// §4.3 "On DTMF received": inbound DTMF is routed via `stream_map` and
    /// surfaces as `SessionGotDTMF`, independent of the outbound
    /// `send_dtmf` path.
    #[test]
    fn inbound_dtmf_is_routed_and_emits_notification() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let mut notifications = manager.notifications();
        let inv = Arc::new(MockInvitation::new(true, "sip:bob@example.com"));
        manager
            .start_outgoing(inv.clone(), local_address(), vec!["0".into()])
            .unwrap();
        manager.on_invitation_changed_state(
            inv.id(),
            changed_state(InvitationState::Confirmed, None),
            Some(remote_offer(0)),
        );

        let id = *manager.inv_map.get(&inv.id()).unwrap();
        let handle = manager.get(id).unwrap().lock().stream_handles()[0];
        manager.on_dtmf_received(handle, '7');

        let mut saw_it = false;
        while let Ok(n) = notifications.try_recv() {
            if let crate::events::SessionNotification::GotDtmf { digit } = n.event {
                assert_eq!(digit, '7');
                saw_it = true;
            }
        }
        assert!(saw_it, "expected SessionGotDTMF notification");
    }

    /// An unknown stream handle is a benign race with teardown: dropped,
    /// not a panic.
    #[test]
    fn inbound_dtmf_for_unknown_stream_is_dropped() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        manager.on_dtmf_received(uuid::Uuid::new_v4(), '1');
    }

    /// Scenario: a mid-dialog reinvite proposing a new stream kind is
    /// accepted by the user.
    #[test]
    fn reinvite_proposal_accept_via_manager() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let inv = Arc::new(MockInvitation::new(true, "sip:bob@example.com"));
        let id = manager
            .start_outgoing(inv.clone(), local_address(), vec!["0".into()])
            .unwrap();
        manager.on_invitation_changed_state(
            inv.id(),
            changed_state(InvitationState::Confirmed, None),
            Some(remote_offer(0)),
        );

        let mut proposal = remote_offer(0);
        proposal.media.push(SdpMedia {
            media: "chat".into(),
            port: 6000,
            transport: "TCP/MSRP".into(),
            formats: vec!["*".into()],
            attributes: vec![],
        });
        manager.on_invitation_changed_state(inv.id(), changed_state(InvitationState::Reinvited, None), Some(proposal));

        assert_eq!(manager.get(id).unwrap().lock().state(), SessionState::Proposed);
        manager.accept_proposal(id).unwrap();
        assert_eq!(manager.get(id).unwrap().lock().state(), SessionState::Established);
    }

    /// Scenario: the dialog disconnects; the session is fully removed from
    /// every index (§5 resource model).
    #[test]
    fn disconnect_tears_down_all_indices() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let inv = Arc::new(MockInvitation::new(true, "sip:bob@example.com"));
        let id = manager
            .start_outgoing(inv.clone(), local_address(), vec!["0".into()])
            .unwrap();
        manager.on_invitation_changed_state(
            inv.id(),
            changed_state(InvitationState::Confirmed, None),
            Some(remote_offer(0)),
        );
        manager.on_invitation_changed_state(
            inv.id(),
            changed_state_with_prev(InvitationState::Confirmed, InvitationState::Disconnected, Some(200)),
            None,
        );

        assert_eq!(manager.session_count(), 0);
        assert!(manager.get(id).is_err());
        assert!(manager.inv_map.is_empty());
        assert!(manager.stream_map.is_empty());
    }

    #[test]
    fn failed_reinvite_rolls_back_hold_flag() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let inv = Arc::new(MockInvitation::new(true, "sip:bob@example.com"));
        let id = manager
            .start_outgoing(inv.clone(), local_address(), vec!["0".into()])
            .unwrap();
        manager.on_invitation_changed_state(
            inv.id(),
            changed_state(InvitationState::Confirmed, None),
            Some(remote_offer(0)),
        );

        manager.hold(id).unwrap();
        manager.on_sdp_update(inv.id(), InvitationGotSdpUpdate { succeeded: false, local_sdp: None, remote_sdp: None });

        let session = manager.get(id).unwrap();
        let session = session.lock();
        assert_eq!(session.state(), SessionState::Established);
        assert!(!session.on_hold_by_local());
    }

    /// §4.3 INCOMING: an offer with no supported media (here, video only)
    /// is rejected with 415 and never becomes a `Session`.
    #[test]
    fn incoming_with_no_supported_media_is_rejected_with_415() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let inv = Arc::new(MockInvitation::new(false, "sip:alice@example.com"));
        let video_only = SdpSession {
            version: 0,
            origin: SdpOrigin {
                user: "alice".into(),
                id: "1".into(),
                net_type: "IN".into(),
                address_type: "IP4".into(),
                address: "10.0.0.3".into(),
            },
            connection: SdpConnection::new(IpAddr::from([10, 0, 0, 3])),
            start_time: 0,
            stop_time: 0,
            media: vec![SdpMedia {
                media: "video".into(),
                port: 5010,
                transport: "RTP/AVP".into(),
                formats: vec!["96".into()],
                attributes: vec![],
            }],
        };

        let id = manager.handle_incoming(inv.clone(), local_address(), "alice", "example.com", video_only, None);

        assert!(id.is_none());
        assert_eq!(manager.session_count(), 0);
        assert_eq!(inv.disconnected_with(), Some(Some(415)));
        assert_eq!(inv.last_provisional_code(), None, "no 180 should be sent for a rejected offer");
    }

    /// §4.3 INCOMING happy path: a supported offer gets a 180 before the
    /// `Session` is even constructed.
    #[test]
    fn incoming_with_supported_media_gets_provisional_180() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let inv = Arc::new(MockInvitation::new(false, "sip:alice@example.com"));
        let id = manager.handle_incoming(
            inv.clone(),
            local_address(),
            "alice",
            "example.com",
            remote_offer(0),
            Some("ExamplePhone/1.0".to_string()),
        );

        assert!(id.is_some());
        assert_eq!(inv.last_provisional_code(), Some(180));
        let session = manager.get(id.unwrap()).unwrap();
        assert_eq!(session.lock().remote_user_agent(), Some("ExamplePhone/1.0"));
    }

    /// §8 invariant 2 / §4.3 DISCONNECTED: a call that never reached
    /// CONFIRMED and was never locally terminated surfaces `SessionDidFail`
    /// ahead of the always-emitted `SessionDidEnd`.
    #[test]
    fn remote_failure_before_established_emits_did_fail() {
        let manager = SessionManager::new(RtpConfiguration::default(), RingtoneConfiguration::default());
        let mut notifications = manager.notifications();
        let inv = Arc::new(MockInvitation::new(true, "sip:bob@example.com"));
        manager
            .start_outgoing(inv.clone(), local_address(), vec!["0".into()])
            .unwrap();

        manager.on_invitation_changed_state(
            inv.id(),
            changed_state_with_prev(InvitationState::Calling, InvitationState::Disconnected, Some(603)),
            None,
        );

        let mut saw_fail = false;
        let mut saw_end = false;
        let mut end_was_last = false;
        while let Ok(n) = notifications.try_recv() {
            match n.event {
                crate::events::SessionNotification::DidFail => saw_fail = true,
                crate::events::SessionNotification::DidEnd => {
                    saw_end = true;
                    end_was_last = true;
                }
                _ => end_was_last = false,
            }
        }
        assert!(saw_fail, "expected SessionDidFail for an unestablished, non-local disconnect");
        assert!(saw_end && end_was_last, "SessionDidEnd must always be emitted, and last");
    }
}
