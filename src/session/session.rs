//! The `Session` state machine (§3, §4.1). One instance per SIP dialog;
//! owns exactly one `Invitation` and zero-or-more `Stream`s, and is always
//! accessed through `SessionManager`'s per-session `parking_lot::Mutex`
//! (§5).

use std::net::IpAddr;
use std::sync::Arc;

use crate::config::{Ringtone, RtpConfiguration};
use crate::dialog::Invitation;
use crate::error::{Result, SessionError};
use crate::events::{NotificationBus, Originator, SessionNotification};
use crate::media::{AudioStream, MediaStreamOps, Stream, StreamHandle};
use crate::sdp::{validate_reinvite, Direction, ReinviteOutcome, SdpBuilder, SdpMedia, SdpSession};

use super::state::{Intent, IntentQueue, SessionId, SessionState};

/// A SIP audio session: negotiates SDP, tracks hold state, and serializes
/// reinvites through `intent_queue` (invariant 3, §4.1).
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
    invitation: Arc<dyn Invitation>,
    sdp_builder: SdpBuilder,
    notifications: NotificationBus,
    rtp_options: RtpConfiguration,
    ringtone: Option<Arc<dyn Ringtone>>,

    /// One slot per m-line of the currently active local SDP; `None` means
    /// that m-line is rejected/inactive. Only the audio slot is ever
    /// populated today (§9).
    streams: Vec<Option<Stream>>,
    audio_index: Option<usize>,

    local_sdp: Option<SdpSession>,
    remote_sdp: Option<SdpSession>,

    on_hold_by_local: bool,
    on_hold_by_remote: bool,

    /// Set while a reinvite this `Session` initiated has not yet been
    /// answered (outgoing) or while a remote reinvite is awaiting a user
    /// decision via `accept_proposal`/`reject_proposal` (incoming
    /// proposal). Only one of these can be true at a time (invariant 3).
    reinvite_outstanding: bool,
    /// The proposed remote SDP of an in-progress `Propose` reinvite,
    /// retained so `accept_proposal`/`reject_proposal` know what to answer.
    pending_proposal: Option<SdpSession>,

    intent_queue: IntentQueue,
    remote_user_agent: Option<String>,

    /// Set once `terminate`/`reject` has moved this session to `Terminating`
    /// locally, so the DISCONNECTED handler can tell a user-initiated end
    /// apart from one the remote party or the transport initiated (§4.3
    /// DISCONNECTED, `SessionDidFail` suppression).
    locally_terminated: bool,
}

impl Session {
    fn new(
        invitation: Arc<dyn Invitation>,
        local_address: IpAddr,
        rtp_options: RtpConfiguration,
        notifications: NotificationBus,
        ringtone: Option<Arc<dyn Ringtone>>,
    ) -> Self {
        let id = uuid::Uuid::new_v4();
        let sdp_builder = SdpBuilder::new(local_address, "session-core", id.to_string());
        Self {
            id,
            state: SessionState::Null,
            invitation,
            sdp_builder,
            notifications,
            rtp_options,
            ringtone,
            streams: Vec::new(),
            audio_index: None,
            local_sdp: None,
            remote_sdp: None,
            on_hold_by_local: false,
            on_hold_by_remote: false,
            reinvite_outstanding: false,
            pending_proposal: None,
            intent_queue: IntentQueue::new(),
            remote_user_agent: None,
            locally_terminated: false,
        }
    }

    /// Build and immediately dial an outgoing session with a single audio
    /// stream (§4.1 "new" — this crate supports audio-only, per the Non-goal
    /// on chat/file/desktop streams).
    pub fn start_outgoing(
        invitation: Arc<dyn Invitation>,
        local_address: IpAddr,
        rtp_options: RtpConfiguration,
        notifications: NotificationBus,
        audio_formats: Vec<String>,
    ) -> Result<Self> {
        if audio_formats.is_empty() {
            return Err(SessionError::NoStreamRequested);
        }
        let mut session = Self::new(invitation, local_address, rtp_options, notifications, None);

        let audio = AudioStream::new(audio_formats);
        let media = audio.get_local_media(true, None);
        session.audio_index = Some(0);
        session.streams = vec![Some(Stream::Audio(audio))];
        session.local_sdp = Some(session.sdp_builder.initial_offer(vec![media]));

        session.change_state(SessionState::Calling);
        session.invitation.send_invite();
        session.emit(SessionNotification::NewOutgoing { audio_proposed: true });
        Ok(session)
    }

    /// Build a session for an already-arrived incoming INVITE (§4.1 "new",
    /// incoming branch). `remote_sdp` is the offer carried by that INVITE;
    /// `user_agent` is the `User-Agent` header captured off that same
    /// request (§4.3 INCOMING "capture the User-Agent header"). The caller
    /// (`SessionManager::handle_incoming`) is responsible for the
    /// unsupported-media 415 check and the provisional 180 response before
    /// constructing this session at all.
    pub fn mark_incoming(
        invitation: Arc<dyn Invitation>,
        local_address: IpAddr,
        rtp_options: RtpConfiguration,
        notifications: NotificationBus,
        ringtone: Option<Arc<dyn Ringtone>>,
        remote_sdp: SdpSession,
        user_agent: Option<String>,
    ) -> Self {
        let mut session = Self::new(invitation, local_address, rtp_options, notifications, ringtone);
        let has_audio = remote_sdp.media.iter().any(|m| m.media == "audio" && m.is_active());
        session.remote_sdp = Some(remote_sdp);
        session.remote_user_agent = user_agent;
        session.change_state(SessionState::Incoming);
        if let Some(ringtone) = &session.ringtone {
            ringtone.start();
        }
        session.emit(SessionNotification::NewIncoming { has_audio });
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn invitation_id(&self) -> crate::dialog::InvitationId {
        self.invitation.id()
    }

    pub fn is_on_hold(&self) -> bool {
        self.on_hold_by_local || self.on_hold_by_remote
    }

    pub fn on_hold_by_local(&self) -> bool {
        self.on_hold_by_local
    }

    pub fn on_hold_by_remote(&self) -> bool {
        self.on_hold_by_remote
    }

    pub fn has_audio(&self) -> bool {
        self.audio_index.map(|i| self.streams.get(i).map(|s| s.is_some()).unwrap_or(false)).unwrap_or(false)
    }

    pub fn remote_user_agent(&self) -> Option<&str> {
        self.remote_user_agent.as_deref()
    }

    /// Stream handles currently registered, for `SessionManager::stream_map`
    /// bookkeeping.
    pub fn stream_handles(&self) -> Vec<StreamHandle> {
        self.streams.iter().flatten().map(|s| s.handle()).collect()
    }

    // ---- user-facing operations (§4.1) ----

    /// Answer an incoming session. `use_audio = false` rejects every m-line
    /// (port 0), per §4.1 "accept".
    pub fn accept(&mut self, use_audio: bool) -> Result<()> {
        if self.state != SessionState::Incoming {
            return Err(SessionError::InvalidState { state: self.state });
        }
        let remote = self.remote_sdp.clone().ok_or(SessionError::UnsupportedMedia)?;

        if !use_audio {
            return Err(SessionError::NoStreamRequested);
        }

        let mut any_accepted = false;
        let mut media = Vec::with_capacity(remote.media.len());
        let mut streams: Vec<Option<Stream>> = Vec::with_capacity(remote.media.len());
        let mut audio_index = None;

        for (idx, remote_media) in remote.media.iter().enumerate() {
            if remote_media.media == "audio" && remote_media.is_active() && use_audio {
                let audio = AudioStream::new(remote_media.formats.clone());
                let direction = remote_media.direction().reciprocal();
                let local_media = audio.get_local_media(false, Some(direction));
                audio_index = Some(idx);
                streams.push(Some(Stream::Audio(audio)));
                media.push(local_media);
                any_accepted = true;
            } else {
                streams.push(None);
                media.push(SdpMedia::rejected_like(remote_media));
            }
        }

        if !any_accepted {
            return Err(SessionError::AllStreamsRejected);
        }

        self.audio_index = audio_index;
        self.streams = streams;
        self.local_sdp = Some(self.sdp_builder.initial_answer(&remote, media));

        self.change_state(SessionState::Accepting);
        self.invitation.set_offered_local_sdp(self.local_sdp.clone().expect("just set"));
        self.invitation.accept_invite();
        if let Some(ringtone) = &self.ringtone {
            ringtone.stop();
        }
        Ok(())
    }

    /// Decline an incoming session with the given SIP status code (§4.1
    /// "reject").
    pub fn reject(&mut self, code: u16) -> Result<()> {
        if self.state != SessionState::Incoming {
            return Err(SessionError::InvalidState { state: self.state });
        }
        if let Some(ringtone) = &self.ringtone {
            ringtone.stop();
        }
        self.invitation.disconnect(Some(code));
        self.locally_terminated = true;
        self.change_state(SessionState::Terminating);
        self.emit(SessionNotification::WillEnd);
        Ok(())
    }

    /// Propose adding an audio stream to an audio-less session (§4.1
    /// "add_audio"; Open Question resolved in SPEC_FULL.md: queued via
    /// `intent_queue` when a reinvite is already outstanding, same as
    /// hold/unhold). Valid from ESTABLISHED or, to let it enqueue, from
    /// REINVITING — an outstanding reinvite is exactly the case this
    /// queue exists for (invariant 3).
    pub fn add_audio(&mut self) -> Result<()> {
        if !matches!(self.state, SessionState::Established | SessionState::Reinviting) {
            return Err(SessionError::InvalidState { state: self.state });
        }
        if self.has_audio() {
            return Err(SessionError::StreamAlreadyActive);
        }
        if self.reinvite_outstanding {
            self.intent_queue.push(Intent::AddAudio);
            return Ok(());
        }
        self.start_add_audio();
        Ok(())
    }

    fn start_add_audio(&mut self) {
        let audio = AudioStream::new(vec!["0".to_string(), "8".to_string()]);
        let media = audio.get_local_media(true, Some(Direction::SendRecv));
        let mut next = self.local_sdp.clone().expect("established session has local sdp");
        next.version += 1;
        next.media.push(media);

        let index = next.media.len() - 1;
        while self.streams.len() < index {
            self.streams.push(None);
        }
        self.streams.push(Some(Stream::Audio(audio)));
        self.audio_index = Some(index);

        self.local_sdp = Some(next.clone());
        self.invitation.set_offered_local_sdp(next);
        self.invitation.send_reinvite();
        self.reinvite_outstanding = true;
        self.change_state(SessionState::Reinviting);
    }

    /// Accept a stream proposal surfaced via `SessionNotification::GotStreamProposal`
    /// (§4.1 "accept_proposal"; Open Question resolved: the outcome mirrors
    /// `add_audio`'s negotiation path, answering the remote's proposed SDP
    /// rather than generating a fresh offer).
    pub fn accept_proposal(&mut self) -> Result<()> {
        if self.state != SessionState::Proposed {
            return Err(SessionError::InvalidState { state: self.state });
        }
        let proposal = self.pending_proposal.take().ok_or(SessionError::InvalidState { state: self.state })?;

        let mut media = Vec::with_capacity(proposal.media.len());
        let mut streams: Vec<Option<Stream>> = Vec::with_capacity(proposal.media.len());
        let mut audio_index = self.audio_index;

        for (idx, remote_media) in proposal.media.iter().enumerate() {
            if let Some(existing) = self.streams.get_mut(idx).and_then(|s| s.take()) {
                let local_media = existing.as_ops().get_local_media(false, Some(remote_media.direction().reciprocal()));
                streams.push(Some(existing));
                media.push(local_media);
            } else if remote_media.media == "audio" && remote_media.is_active() {
                let audio = AudioStream::new(remote_media.formats.clone());
                let direction = remote_media.direction().reciprocal();
                let local_media = audio.get_local_media(false, Some(direction));
                audio_index = Some(idx);
                streams.push(Some(Stream::Audio(audio)));
                media.push(local_media);
            } else {
                streams.push(None);
                media.push(SdpMedia::rejected_like(remote_media));
            }
        }

        for (idx, (local_m, remote_m)) in media.iter().zip(proposal.media.iter()).enumerate() {
            if let Some(Some(stream)) = streams.get_mut(idx) {
                if !stream.as_ops().is_active() {
                    let _ = stream.as_ops_mut().start(local_m, remote_m, idx);
                }
            }
        }

        self.streams = streams;
        self.audio_index = audio_index;
        self.remote_sdp = Some(proposal);
        let next_local = self.local_sdp.clone().expect("proposed session has local sdp");
        let answer = SdpSession { media, ..next_local };
        self.local_sdp = Some(answer.clone());
        self.invitation.set_offered_local_sdp(answer);
        self.invitation.respond_to_reinvite(200);
        self.change_state(SessionState::Established);
        self.emit(SessionNotification::AcceptedStreamProposal { originator: Originator::Local });
        self.process_queue();
        Ok(())
    }

    /// Decline a stream proposal with the given SIP status code (§4.1
    /// "reject_proposal").
    pub fn reject_proposal(&mut self, code: u16) -> Result<()> {
        if self.state != SessionState::Proposed {
            return Err(SessionError::InvalidState { state: self.state });
        }
        self.pending_proposal = None;
        self.invitation.respond_to_reinvite(code);
        self.change_state(SessionState::Established);
        self.emit(SessionNotification::RejectedStreamProposal { originator: Originator::Local });
        self.process_queue();
        Ok(())
    }

    /// Put the session on hold locally (§4.1 "hold"). Queued if a reinvite
    /// is already outstanding (invariant 3).
    pub fn hold(&mut self) -> Result<()> {
        self.request_hold_change(true)
    }

    /// Take the session off hold locally (§4.1 "unhold").
    pub fn unhold(&mut self) -> Result<()> {
        self.request_hold_change(false)
    }

    /// Valid from ESTABLISHED or REINVITING — the latter so a hold/unhold
    /// issued while another reinvite is already in flight can enqueue
    /// instead of being rejected, which is the entire reason
    /// `intent_queue` exists (invariant 3, §4.1).
    fn request_hold_change(&mut self, hold: bool) -> Result<()> {
        if !matches!(self.state, SessionState::Established | SessionState::Reinviting) {
            return Err(SessionError::InvalidState { state: self.state });
        }
        if self.on_hold_by_local == hold {
            return Ok(());
        }
        if self.reinvite_outstanding {
            self.intent_queue.push(if hold { Intent::Hold } else { Intent::Unhold });
            return Ok(());
        }
        self.start_hold_change(hold);
        Ok(())
    }

    fn start_hold_change(&mut self, hold: bool) {
        self.on_hold_by_local = hold;
        if let Some(next) = self.make_next_sdp_offer() {
            self.local_sdp = Some(next.clone());
            self.invitation.set_offered_local_sdp(next);
            self.invitation.send_reinvite();
            self.reinvite_outstanding = true;
            self.change_state(SessionState::Reinviting);
        }
        let event = if hold {
            SessionNotification::GotHoldRequest { originator: Originator::Local }
        } else {
            SessionNotification::GotUnholdRequest { originator: Originator::Local }
        };
        self.emit(event);
    }

    /// End the session from any non-terminal state (§4.1 "terminate"). A
    /// no-op, never an error, for NULL/TERMINATING/TERMINATED (§7
    /// "terminate() never errors"; §5 "idempotent from any non-terminal
    /// state" — repeat calls while already TERMINATING must be harmless).
    pub fn terminate(&mut self) -> Result<()> {
        if self.state.terminate_is_noop() {
            return Ok(());
        }
        self.intent_queue.clear();
        if let Some(ringtone) = &self.ringtone {
            ringtone.stop();
        }
        self.invitation.disconnect(None);
        self.locally_terminated = true;
        self.change_state(SessionState::Terminating);
        self.emit(SessionNotification::WillEnd);
        Ok(())
    }

    /// Send a DTMF digit over the active audio stream (§4.1 "send_dtmf").
    pub fn send_dtmf(&mut self, digit: char) -> Result<()> {
        if self.state != SessionState::Established {
            return Err(SessionError::InvalidState { state: self.state });
        }
        let index = self.audio_index.ok_or(SessionError::StreamNotReady)?;
        let stream = self.streams.get(index).and_then(|s| s.as_ref()).ok_or(SessionError::StreamNotReady)?;
        stream.as_ops().send_dtmf(digit)
    }

    /// A remote DTMF digit arrived on one of this session's streams (§4.3
    /// "On DTMF received"; `AudioTransportGotDTMF`, §6). Pure notification,
    /// no state to mutate — the engine already decoded the digit.
    pub fn on_dtmf_received(&self, digit: char) {
        self.emit(SessionNotification::GotDtmf { digit });
    }

    // ---- manager-invoked transitions (§4.3) ----

    /// The dialog reported `Early` (§4.3 "EARLY + outgoing + code 180").
    /// Only a 180 Ringing on an outgoing dialog counts; other provisional
    /// codes (e.g. 183 Session Progress) are silently ignored, matching
    /// `sipsimple.session.SessionManager`'s `inv.is_outgoing and data.code
    /// == 180` guard.
    pub fn on_early(&mut self, code: Option<u16>) {
        if !self.invitation.is_outgoing() || code != Some(180) {
            return;
        }
        if self.state == SessionState::Calling {
            self.change_state(SessionState::Ringing);
        }
        self.emit(SessionNotification::GotRingIndication);
    }

    /// The dialog reported `Connecting` (§4.3 CONNECTING). Captures the
    /// `Server` header (falling back to `User-Agent`) the first time it's
    /// seen, but only for outgoing dialogs — an incoming dialog already
    /// captured its peer's `User-Agent` at INCOMING (§3 "set once upon
    /// first Server/User-Agent header seen").
    pub fn on_connecting(&mut self, headers: crate::dialog::InvitationHeaders) {
        if self.invitation.is_outgoing() && self.remote_user_agent.is_none() {
            self.remote_user_agent = headers.server.or(headers.user_agent);
        }
        self.emit(SessionNotification::WillStart);
    }

    /// The dialog reached `Confirmed` (§4.3 CONNECTING/CONFIRMED). Starts
    /// every negotiated stream and marks the session Established.
    pub fn on_confirmed(&mut self, remote_sdp: Option<SdpSession>) {
        if let Some(remote) = remote_sdp {
            self.negotiate_and_start(remote);
        }
        self.change_state(SessionState::Established);
        self.emit(SessionNotification::DidStart);
    }

    /// Start the audio stream on first negotiation (CONFIRMED), or refresh
    /// its direction when this completes a reinvite it was already active
    /// through (hold/unhold/add-audio confirmation via `update_media`) —
    /// without this, the stream's own `direction` stays frozen at whatever
    /// `start()` first saw, which `make_next_sdp_offer` then reads back as
    /// stale `currently_sends` on the *next* hold/unhold.
    fn negotiate_and_start(&mut self, remote: SdpSession) {
        let local = self.local_sdp.clone();
        if let (Some(local), Some(index)) = (local.as_ref(), self.audio_index) {
            if let (Some(local_m), Some(remote_m)) = (local.media.get(index), remote.media.get(index)) {
                if let Some(Some(stream)) = self.streams.get_mut(index) {
                    if stream.as_ops().is_active() {
                        stream.as_ops_mut().update_direction(local_m.direction());
                    } else {
                        let _ = stream.as_ops_mut().start(local_m, remote_m, index);
                    }
                }
            }
        }
        self.remote_sdp = Some(remote);
    }

    /// A reinvite arrived carrying a new offer from the remote party (§4.3
    /// REINVITED, §4.4). Drives `sdp::negotiator::validate_reinvite` and
    /// reacts per its outcome.
    pub fn on_reinvited(&mut self, proposed_remote: SdpSession) {
        let current_remote = match &self.remote_sdp {
            Some(r) => r.clone(),
            None => {
                self.invitation.respond_to_reinvite(488);
                return;
            }
        };

        match validate_reinvite(&current_remote, &proposed_remote) {
            ReinviteOutcome::ReassertCurrent => {
                if let Some(local) = &self.local_sdp {
                    self.invitation.set_offered_local_sdp(local.clone());
                }
                self.invitation.respond_to_reinvite(200);
            }
            ReinviteOutcome::Reject { reason } => {
                let violation = SessionError::ProtocolViolation { reason };
                tracing::warn!(session = %self.id, error = %violation, "rejecting reinvite");
                self.invitation.respond_to_reinvite(488);
            }
            ReinviteOutcome::AutoAnswer => {
                if let Some(next) = self.make_next_sdp_answer(&proposed_remote) {
                    if let Some(index) = self.audio_index {
                        if let (Some(local_m), Some(remote_m)) = (next.media.get(index), proposed_remote.media.get(index)) {
                            let local_m = local_m.clone();
                            let remote_m = remote_m.clone();
                            self.update_audio_on_reinvite(&local_m, &remote_m, index);
                        }
                    }
                    self.invitation.set_offered_local_sdp(next.clone());
                    self.local_sdp = Some(next);
                } else if let Some(local) = &self.local_sdp {
                    self.invitation.set_offered_local_sdp(local.clone());
                }
                self.remote_sdp = Some(proposed_remote);
                self.invitation.respond_to_reinvite(200);
            }
            ReinviteOutcome::Propose { new_kinds } => {
                self.pending_proposal = Some(proposed_remote);
                let has_audio = new_kinds.iter().any(|k| k == "audio");
                self.change_state(SessionState::Proposed);
                self.invitation.respond_to_invite_provisionally(180);
                self.emit(SessionNotification::GotStreamProposal { originator: Originator::Remote, has_audio });
            }
        }
    }

    /// §4.5 "update_audio": react to the local answer's direction for a
    /// remote-initiated reinvite that didn't change the active stream set.
    /// `local_media` is *our own* answer at this m-line (already
    /// reciprocated from the remote's offer by `make_next_sdp_answer`), not
    /// the remote's — mirroring the original's "compute `new_direction`
    /// from the local m-line attributes". If the stream is already active,
    /// its direction is refreshed and a hold/unhold transition is surfaced;
    /// otherwise it is started against this negotiated pair.
    fn update_audio_on_reinvite(&mut self, local_media: &SdpMedia, remote_media: &SdpMedia, index: usize) {
        let Some(Some(stream)) = self.streams.get_mut(index) else {
            return;
        };
        if stream.as_ops().is_active() {
            let new_direction = local_media.direction();
            let was_on_hold = self.on_hold_by_remote;
            self.on_hold_by_remote = !new_direction.sends();
            stream.as_ops_mut().update_direction(new_direction);
            if self.on_hold_by_remote != was_on_hold {
                let event = if self.on_hold_by_remote {
                    SessionNotification::GotHoldRequest { originator: Originator::Remote }
                } else {
                    SessionNotification::GotUnholdRequest { originator: Originator::Remote }
                };
                self.emit(event);
            }
        } else {
            let _ = stream.as_ops_mut().start(local_media, remote_media, index);
        }
    }

    /// The response to a reinvite *this session* sent has arrived (§4.3 "SDP
    /// negotiation result"). `succeeded = false` rolls the SDP/hold state
    /// back to what was active before the attempt.
    pub fn update_media(&mut self, succeeded: bool, remote_sdp: Option<SdpSession>) {
        self.reinvite_outstanding = false;
        if succeeded {
            if let Some(remote) = remote_sdp {
                self.negotiate_and_start(remote);
            }
        } else {
            self.on_hold_by_local = !self.on_hold_by_local;
        }
        self.change_state(SessionState::Established);
        self.process_queue();
    }

    /// The reinvite attempt was abandoned before a final response arrived
    /// (§4.3, e.g. the dialog disconnected mid-reinvite).
    pub fn cancel_media(&mut self) {
        self.reinvite_outstanding = false;
        self.pending_proposal = None;
        if self.state == SessionState::Reinviting {
            self.change_state(SessionState::Established);
        }
    }

    /// The dialog disconnected, locally or remotely (§4.3 DISCONNECTED).
    ///
    /// `prev_was_confirmed` is whether the invitation's state immediately
    /// before this event was `Confirmed` — i.e. the dialog had already
    /// negotiated media and is now ending through the ordinary
    /// `Confirmed -> Disconnecting -> Disconnected` path rather than dying
    /// mid-setup. `headers` carries `Server`/`User-Agent` the way
    /// CONNECTING does, for the case where neither was ever captured.
    ///
    /// Grounded on `sipsimple.session.SessionManager`'s DISCONNECTED
    /// branch: `SessionDidFail` fires only when the session had not
    /// already moved to TERMINATING locally *and* the dialog never reached
    /// CONFIRMED beforehand (`original_source/sipsimple/session.py`).
    pub fn on_disconnected(&mut self, _code: Option<u16>, prev_was_confirmed: bool, headers: crate::dialog::InvitationHeaders) {
        let was_locally_terminating = self.locally_terminated || self.state == SessionState::Terminating;
        if self.remote_user_agent.is_none() {
            self.remote_user_agent = headers.server.or(headers.user_agent);
        }
        if self.reinvite_outstanding {
            self.cancel_media();
        }
        self.intent_queue.clear();
        for stream in self.streams.iter_mut().flatten() {
            stream.as_ops_mut().stop();
        }
        if let Some(ringtone) = &self.ringtone {
            ringtone.stop();
        }
        if self.state != SessionState::Terminating {
            self.change_state(SessionState::Terminating);
        }
        self.change_state(SessionState::Terminated);
        if !was_locally_terminating && !prev_was_confirmed {
            self.emit(SessionNotification::DidFail);
        }
        self.emit(SessionNotification::DidEnd);
    }

    /// Drain one queued intent once a reinvite completes (invariant 3,
    /// §3 `intent_queue`).
    fn process_queue(&mut self) {
        if self.reinvite_outstanding || self.state != SessionState::Established {
            return;
        }
        match self.intent_queue.pop() {
            Some(Intent::Hold) if !self.on_hold_by_local => self.start_hold_change(true),
            Some(Intent::Unhold) if self.on_hold_by_local => self.start_hold_change(false),
            Some(Intent::AddAudio) if !self.has_audio() => self.start_add_audio(),
            Some(_) => self.process_queue(),
            None => {}
        }
    }

    fn make_next_sdp_offer(&self) -> Option<SdpSession> {
        let current = self.local_sdp.as_ref()?;
        let index = self.audio_index?;
        let currently_sends = self.streams.get(index)?.as_ref()?.as_ops().direction().sends();
        Some(self.sdp_builder.make_next_sdp(current, true, Some(index), currently_sends, self.on_hold_by_local, None))
    }

    /// Build the answer to a remote-initiated reinvite that didn't change
    /// the active stream set (§4.4 `AutoAnswer`, §4.1 "If this is an
    /// answer ... derive direction from the remote offer"): direction is
    /// the reciprocal of what `remote_offer` proposed at the audio m-line,
    /// not a function of our own hold flag.
    fn make_next_sdp_answer(&self, remote_offer: &SdpSession) -> Option<SdpSession> {
        let current = self.local_sdp.as_ref()?;
        let index = self.audio_index?;
        let remote_media = remote_offer.media.get(index)?;
        let answer_direction = remote_media.direction().reciprocal();
        Some(self.sdp_builder.make_next_sdp(current, false, Some(index), false, false, Some(answer_direction)))
    }

    fn change_state(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        let prev = self.state;
        self.state = next;
        self.emit(SessionNotification::ChangedState { prev, new: next });
    }

    fn emit(&self, event: SessionNotification) {
        self.notifications.publish(self.id, event);
    }
}

impl Direction {
    /// The direction the far end should use when this crate answers with
    /// the given remote-offered direction — e.g. a `SendOnly` remote offer
    /// is answered `RecvOnly` (§4.1 "SDP construction rules").
    pub fn reciprocal(self) -> Direction {
        match self {
            Direction::SendRecv => Direction::SendRecv,
            Direction::SendOnly => Direction::RecvOnly,
            Direction::RecvOnly => Direction::SendOnly,
            Direction::Inactive => Direction::Inactive,
        }
    }
}
