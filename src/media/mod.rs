//! Polymorphic media stream wrapper (§4.2, §9 "Polymorphic stream set").

mod stream;

pub use stream::AudioStream;

use crate::error::{Result, SessionError};
use crate::sdp::{Direction, SdpMedia};

/// Identity handed to `SessionManager::stream_map` so a DTMF event can be
/// routed back to the owning `Session` (§4.3 "route by `stream_map`").
pub type StreamHandle = uuid::Uuid;

/// Capability set every stream kind implements, per §4.2 and §9.
///
/// Today only `Audio` exists; the trait is the seam future `Chat`/`Desktop`
/// variants would implement without touching `Session`.
pub trait MediaStreamOps: std::fmt::Debug + Send + Sync {
    /// Stable identity for `stream_map` routing, assigned at construction.
    fn handle(&self) -> StreamHandle;

    /// Produce this stream's m-line. `direction` is only meaningful for
    /// offers (`is_offer = true`); answers derive direction from the
    /// remote offer instead.
    fn get_local_media(&self, is_offer: bool, direction: Option<Direction>) -> SdpMedia;

    /// Start the stream against the negotiated local/remote SDP at the
    /// given m-line index. Fails with `StreamNotReady` if already active.
    fn start(&mut self, local: &SdpMedia, remote: &SdpMedia, index: usize) -> Result<()>;

    fn stop(&mut self);

    fn update_direction(&mut self, direction: Direction);

    fn is_active(&self) -> bool;

    fn direction(&self) -> Direction;

    /// Only meaningful for audio; other kinds return `StreamNotReady`.
    fn send_dtmf(&self, digit: char) -> Result<()> {
        let _ = digit;
        Err(SessionError::StreamNotReady)
    }
}

/// Tagged variant over the stream kinds a `Session` can hold, keyed by
/// m-line index in `Session::streams`. Only `Audio` exists today; the
/// shape anticipates `Chat`/`File`/`DesktopSharing` additions (§9).
#[derive(Debug)]
pub enum Stream {
    Audio(AudioStream),
}

impl Stream {
    pub fn as_ops(&self) -> &dyn MediaStreamOps {
        match self {
            Stream::Audio(s) => s,
        }
    }

    pub fn as_ops_mut(&mut self) -> &mut dyn MediaStreamOps {
        match self {
            Stream::Audio(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Stream::Audio(_) => "audio",
        }
    }

    pub fn handle(&self) -> StreamHandle {
        self.as_ops().handle()
    }
}
