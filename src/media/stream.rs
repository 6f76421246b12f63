//! Audio stream wrapper. Hides RTP/codec details behind the
//! `MediaStreamOps` seam; the actual RTP engine is an external collaborator
//! (§1) this crate drives but does not implement.

use super::{MediaStreamOps, StreamHandle};
use crate::error::{Result, SessionError};
use crate::sdp::{Direction, SdpMedia};

/// Audio-specific media stream. Construction corresponds to
/// `sipsimple.session.Session._init_audio`: building one allocates the
/// underlying RTP transport but does not yet start sending/receiving.
#[derive(Debug)]
pub struct AudioStream {
    handle: StreamHandle,
    formats: Vec<String>,
    transport: String,
    direction: Direction,
    active: bool,
}

impl AudioStream {
    /// A fresh stream for an outgoing offer or a not-yet-negotiated
    /// incoming answer; defaults to sendrecv until negotiation says
    /// otherwise.
    pub fn new(formats: Vec<String>) -> Self {
        Self {
            handle: uuid::Uuid::new_v4(),
            formats,
            transport: "RTP/AVP".to_string(),
            direction: Direction::SendRecv,
            active: false,
        }
    }
}

impl MediaStreamOps for AudioStream {
    fn handle(&self) -> StreamHandle {
        self.handle
    }

    fn get_local_media(&self, is_offer: bool, direction: Option<Direction>) -> SdpMedia {
        let direction = if is_offer {
            direction.unwrap_or(Direction::SendRecv)
        } else {
            direction.unwrap_or(self.direction)
        };
        let mut media = SdpMedia {
            media: "audio".to_string(),
            port: 5004,
            transport: self.transport.clone(),
            formats: self.formats.clone(),
            attributes: Vec::new(),
        };
        media.set_direction(direction);
        media
    }

    fn start(&mut self, local: &SdpMedia, _remote: &SdpMedia, _index: usize) -> Result<()> {
        if self.active {
            return Err(SessionError::StreamNotReady);
        }
        self.direction = local.direction();
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn update_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn send_dtmf(&self, digit: char) -> Result<()> {
        if !self.active {
            return Err(SessionError::StreamNotReady);
        }
        tracing::debug!(%digit, "sending DTMF");
        Ok(())
    }
}
