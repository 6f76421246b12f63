//! SDP value types (§6). Mirrors the textual SDP model `sipsimple.core`
//! wraps over PJSIP and that `ezk-sdp-types` expresses with typed structs;
//! field names follow spec.md's vocabulary exactly (`user`, `id`,
//! `net_type`, `address_type`, `address`) rather than RFC 4566 names, since
//! those are the names the reinvite validator (`sdp::negotiator`) and
//! `make_next_sdp` compare against.

use std::net::IpAddr;

/// Origin (`o=`) line fields that must stay stable across a dialog
/// (invariant checked by the reinvite validator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpOrigin {
    pub user: String,
    pub id: String,
    pub net_type: String,
    pub address_type: String,
    pub address: String,
}

/// Connection (`c=`) line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpConnection {
    pub net_type: String,
    pub address_type: String,
    pub address: IpAddr,
}

impl SdpConnection {
    pub fn new(address: IpAddr) -> Self {
        Self {
            net_type: "IN".to_string(),
            address_type: if address.is_ipv6() { "IP6" } else { "IP4" }.to_string(),
            address,
        }
    }
}

/// Media direction attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn as_attr(self) -> &'static str {
        match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        }
    }

    pub fn sends(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::SendOnly)
    }

    pub fn receives(self) -> bool {
        matches!(self, Direction::SendRecv | Direction::RecvOnly)
    }
}

/// One SDP media description (an "m-line").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpMedia {
    /// Media type, e.g. "audio", "video", "chat".
    pub media: String,
    /// RTP port; 0 means the m-line is rejected/disabled.
    pub port: u16,
    pub transport: String,
    pub formats: Vec<String>,
    pub attributes: Vec<(String, Option<String>)>,
}

impl SdpMedia {
    pub fn direction(&self) -> Direction {
        for (name, _) in &self.attributes {
            match name.as_str() {
                "sendrecv" => return Direction::SendRecv,
                "sendonly" => return Direction::SendOnly,
                "recvonly" => return Direction::RecvOnly,
                "inactive" => return Direction::Inactive,
                _ => {}
            }
        }
        Direction::SendRecv
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.attributes
            .retain(|(name, _)| !matches!(name.as_str(), "sendrecv" | "sendonly" | "recvonly" | "inactive"));
        self.attributes.push((direction.as_attr().to_string(), None));
    }

    /// A port-zero m-line re-offering the peer's own formats — the
    /// "reject by port zero" answer shape from §4.1 `accept`.
    pub fn rejected_like(other: &SdpMedia) -> Self {
        Self {
            media: other.media.clone(),
            port: 0,
            transport: other.transport.clone(),
            formats: other.formats.clone(),
            attributes: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.port != 0
    }
}

/// A full session description: one offer or answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpSession {
    pub version: u64,
    pub origin: SdpOrigin,
    pub connection: SdpConnection,
    pub start_time: u64,
    pub stop_time: u64,
    pub media: Vec<SdpMedia>,
}

impl SdpSession {
    /// Active (non-rejected) media kinds, in m-line order — used by the
    /// reinvite validator to detect newly proposed stream kinds.
    pub fn active_media_kinds(&self) -> Vec<&str> {
        self.media
            .iter()
            .filter(|m| m.is_active())
            .map(|m| m.media.as_str())
            .collect()
    }

    pub fn origin_matches(&self, other: &SdpSession) -> bool {
        self.origin == other.origin
    }
}
