//! Local SDP construction (`SdpBuilder`, §4.1 "SDP construction rules").

use std::net::IpAddr;

use super::types::{Direction, SdpConnection, SdpMedia, SdpOrigin, SdpSession};

/// Builds local offers/answers and increments an existing session
/// description across the dialog, keeping the origin stable
/// (invariant 5, §8).
#[derive(Debug, Clone)]
pub struct SdpBuilder {
    local_address: IpAddr,
    origin: SdpOrigin,
}

impl SdpBuilder {
    /// A fresh origin for a new dialog: `user`/`id` are caller-supplied so
    /// tests can assert on them; in production they'd come from the SIP
    /// account and a random session id.
    pub fn new(local_address: IpAddr, user: impl Into<String>, id: impl Into<String>) -> Self {
        let address_type = if local_address.is_ipv6() { "IP6" } else { "IP4" }.to_string();
        Self {
            local_address,
            origin: SdpOrigin {
                user: user.into(),
                id: id.into(),
                net_type: "IN".to_string(),
                address_type,
                address: local_address.to_string(),
            },
        }
    }

    /// The initial local offer for an outgoing session: one m-line per
    /// enabled stream, version 0.
    pub fn initial_offer(&self, media: Vec<SdpMedia>) -> SdpSession {
        SdpSession {
            version: 0,
            origin: self.origin.clone(),
            connection: SdpConnection::new(self.local_address),
            start_time: 0,
            stop_time: 0,
            media,
        }
    }

    /// The local answer to an incoming offer: same m-line count/order as
    /// the remote offer, with version 0 (first local SDP of this dialog).
    pub fn initial_answer(&self, remote_offer: &SdpSession, media: Vec<SdpMedia>) -> SdpSession {
        debug_assert_eq!(media.len(), remote_offer.media.len());
        SdpSession {
            version: 0,
            origin: self.origin.clone(),
            connection: SdpConnection::new(self.local_address),
            start_time: remote_offer.start_time,
            stop_time: remote_offer.stop_time,
            media,
        }
    }

    /// Build the next local SDP version from the currently active one.
    ///
    /// Keeps all origin fields stable and bumps `version` by exactly one
    /// (invariant 5). `audio_index`/`audio_direction` are `None` when no
    /// audio stream is present. When `is_offer` is true and the audio
    /// stream currently sends, hold maps to `sendonly`/active maps to
    /// `sendrecv`; otherwise hold maps to `inactive`/active maps to
    /// `recvonly`. When `is_offer` is false, the caller supplies the
    /// direction derived from the remote offer instead (see
    /// `Session::make_next_sdp`).
    pub fn make_next_sdp(
        &self,
        current: &SdpSession,
        is_offer: bool,
        audio_index: Option<usize>,
        currently_sends: bool,
        on_hold: bool,
        answer_direction: Option<Direction>,
    ) -> SdpSession {
        let mut next = current.clone();
        next.version += 1;
        next.origin = self.origin.clone();

        if let Some(index) = audio_index {
            if let Some(m) = next.media.get_mut(index) {
                let direction = if is_offer {
                    match (currently_sends, on_hold) {
                        (true, true) => Direction::SendOnly,
                        (true, false) => Direction::SendRecv,
                        (false, true) => Direction::Inactive,
                        (false, false) => Direction::RecvOnly,
                    }
                } else {
                    answer_direction.unwrap_or(Direction::SendRecv)
                };
                m.set_direction(direction);
            }
        }

        next
    }
}
