//! Reinvite validation (§4.4). Grounded directly on
//! `sipsimple.session.SessionManager._handle_SCInvitationChangedState`'s
//! `REINVITED` branch (`original_source/sipsimple/session.py`).

use super::types::SdpSession;

/// Fields compared between the current and proposed remote SDP to detect
/// origin tampering (invariant: origin changes on a version-bumped
/// reinvite are always a protocol violation).
const ORIGIN_FIELDS_CHECKED: &str = "user, id, net_type, address_type, address";

/// Outcome of validating a proposed remote SDP against the currently
/// active one.
#[derive(Debug, Clone, PartialEq)]
pub enum ReinviteOutcome {
    /// Identical SDP at the same version: re-assert the current local SDP
    /// and respond 200.
    ReassertCurrent,
    /// A new stream kind was proposed: surface to the user (180 + PROPOSED
    /// + `SessionGotStreamProposal`). `new_kinds` lists the media types
    /// that are newly active and were not in the current set.
    Propose { new_kinds: Vec<String> },
    /// Same stream set (direction/port changes only): auto-answer by
    /// generating the next local SDP and responding 200.
    AutoAnswer,
    /// Reject with 488. `reason` is for logging only.
    Reject { reason: String },
}

/// Validate `new` (the proposed remote SDP) against `cur` (the currently
/// active remote SDP), per spec.md §4.4.
pub fn validate_reinvite(cur: &SdpSession, new: &SdpSession) -> ReinviteOutcome {
    if new.version == cur.version {
        return if new == cur {
            ReinviteOutcome::ReassertCurrent
        } else {
            ReinviteOutcome::Reject {
                reason: "identical version, differing SDP".to_string(),
            }
        };
    }

    if new.version == cur.version + 1 {
        if new.origin != cur.origin {
            return ReinviteOutcome::Reject {
                reason: format!("origin changed ({ORIGIN_FIELDS_CHECKED})"),
            };
        }

        let current_kinds = cur.active_media_kinds();
        let proposed_kinds = new.active_media_kinds();
        let new_kinds: Vec<String> = proposed_kinds
            .iter()
            .filter(|kind| !current_kinds.contains(kind))
            .map(|kind| kind.to_string())
            .collect();

        return if new_kinds.is_empty() {
            ReinviteOutcome::AutoAnswer
        } else {
            ReinviteOutcome::Propose { new_kinds }
        };
    }

    ReinviteOutcome::Reject {
        reason: format!(
            "version gap: current={}, proposed={}",
            cur.version, new.version
        ),
    }
}
