//! Teleport pipeline phases
//!
//! ```text
//! Requested -> PermissionPending -> {Denied | SafetyPending}
//! SafetyPending -> {Approved | SearchPending}
//! SearchPending -> {Approved | Unsafe}
//! ```
//! Any pending phase may also end in `Denied` when the actor goes stale, and a
//! portal request with no link ends `Requested -> Unsafe`.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeleportPhase {
    Requested,
    PermissionPending,
    SafetyPending,
    SearchPending,
    Approved,
    Denied,
    Unsafe,
}

impl TeleportPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Denied | Self::Unsafe)
    }

    pub fn can_transition_to(self, next: TeleportPhase) -> bool {
        use TeleportPhase::*;
        matches!(
            (self, next),
            (Requested, PermissionPending)
                | (Requested, Unsafe)
                | (PermissionPending, Denied)
                | (PermissionPending, SafetyPending)
                | (SafetyPending, Approved)
                | (SafetyPending, SearchPending)
                | (SafetyPending, Denied)
                | (SearchPending, Approved)
                | (SearchPending, Unsafe)
                | (SearchPending, Denied)
        )
    }

    pub fn transition(self, next: TeleportPhase) -> Result<TeleportPhase, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::invalid_state_transition(format!(
                "{self} -> {next}"
            )))
        }
    }
}

impl std::fmt::Display for TeleportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TeleportPhase::Requested => "requested",
            TeleportPhase::PermissionPending => "permission_pending",
            TeleportPhase::SafetyPending => "safety_pending",
            TeleportPhase::SearchPending => "search_pending",
            TeleportPhase::Approved => "approved",
            TeleportPhase::Denied => "denied",
            TeleportPhase::Unsafe => "unsafe",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::TeleportPhase::*;
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        let phase = Requested
            .transition(PermissionPending)
            .and_then(|p| p.transition(SafetyPending))
            .and_then(|p| p.transition(SearchPending))
            .and_then(|p| p.transition(Approved))
            .unwrap();
        assert!(phase.is_terminal());
    }

    #[test]
    fn terminal_phases_have_no_exits() {
        for terminal in [Approved, Denied, Unsafe] {
            for next in [
                Requested,
                PermissionPending,
                SafetyPending,
                SearchPending,
                Approved,
                Denied,
                Unsafe,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn permission_cannot_be_skipped() {
        let err = Requested.transition(SafetyPending).unwrap_err();
        assert_eq!(
            err,
            DomainError::invalid_state_transition("requested -> safety_pending")
        );
        assert!(!PermissionPending.can_transition_to(Approved));
        assert!(!SafetyPending.can_transition_to(Unsafe));
    }
}
