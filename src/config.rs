//! Configuration ingress: account and RTP settings consumed at `Session`
//! and `SessionManager` construction. Loading these from disk/CLI is the
//! host application's job; this crate only needs the value types.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// How the MSRP relay should be discovered, mirroring the account
/// configuration schema the SIP client reads at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsrpRelay {
    /// Discover via SRV if none configured, else do without.
    Auto,
    /// Always discover via SRV.
    Srv,
    /// Never use a relay.
    None,
    /// Use a fixed host:port.
    Host(String),
}

/// Account-level configuration used to build outgoing sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub sip_address: String,
    pub password: String,
    pub display_name: Option<String>,
    pub outbound_proxy: Option<String>,
    pub msrp_relay: MsrpRelay,
}

/// Snapshot of RTP transport preferences, captured immutably by a
/// `Session` at construction time (`Session::rtp_options`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtpConfiguration {
    pub local_rtp_address: IpAddr,
    pub use_srtp: bool,
    pub srtp_forced: bool,
    pub use_ice: bool,
    pub ice_stun_address: Option<String>,
    pub ice_stun_port: u16,
}

impl Default for RtpConfiguration {
    fn default() -> Self {
        Self {
            local_rtp_address: IpAddr::from([127, 0, 0, 1]),
            use_srtp: false,
            srtp_forced: false,
            use_ice: false,
            ice_stun_address: None,
            ice_stun_port: 3478,
        }
    }
}

/// Opaque ringtone handle. The core only starts/stops it across the
/// INCOMING state boundary; it never touches audio device I/O.
pub trait Ringtone: std::fmt::Debug + Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Per-(user, host) ringtone selection, with a default fallback.
///
/// Grounded on `sipsimple.session.RingtoneConfiguration`
/// (`original_source/sipsimple/session.py`).
pub struct RingtoneConfiguration {
    default_ringtone: Option<std::sync::Arc<dyn Ringtone>>,
    by_user_host: HashMap<(String, String), std::sync::Arc<dyn Ringtone>>,
}

impl std::fmt::Debug for RingtoneConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingtoneConfiguration")
            .field("has_default", &self.default_ringtone.is_some())
            .field("entries", &self.by_user_host.len())
            .finish()
    }
}

impl RingtoneConfiguration {
    pub fn new() -> Self {
        Self {
            default_ringtone: None,
            by_user_host: HashMap::new(),
        }
    }

    pub fn set_default(&mut self, ringtone: std::sync::Arc<dyn Ringtone>) {
        self.default_ringtone = Some(ringtone);
    }

    pub fn add_for_caller(&mut self, user: impl Into<String>, host: impl Into<String>, ringtone: std::sync::Arc<dyn Ringtone>) {
        self.by_user_host.insert((user.into(), host.into()), ringtone);
    }

    pub fn remove_for_caller(&mut self, user: &str, host: &str) {
        self.by_user_host.remove(&(user.to_string(), host.to_string()));
    }

    /// Resolve the ringtone for an incoming caller, falling back to the
    /// default when there is no per-caller entry.
    pub fn resolve(&self, user: &str, host: &str) -> Option<std::sync::Arc<dyn Ringtone>> {
        self.by_user_host
            .get(&(user.to_string(), host.to_string()))
            .cloned()
            .or_else(|| self.default_ringtone.clone())
    }
}

impl Default for RingtoneConfiguration {
    fn default() -> Self {
        Self::new()
    }
}
