//! External collaborator ports (policy backend, actor state snapshots).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warpgate_domain::{ActorRef, DimensionKind, Position, TeleportCause, WorldId};

use super::error::{PolicyError, SnapshotError};

// =============================================================================
// Policy
// =============================================================================

/// Context handed to the policy backend together with the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub world: WorldId,
    pub dimension: DimensionKind,
    pub cause: TeleportCause,
}

/// Zone/world rule evaluation. May be remote and slow; must not mutate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PolicyPort: Send + Sync {
    async fn evaluate(
        &self,
        actor: ActorRef,
        destination: Position,
        ruleset: Ruleset,
    ) -> Result<bool, PolicyError>;
}

// =============================================================================
// Actor state snapshots
// =============================================================================

/// Opaque handle returned by the snapshot collaborator. The core stores and
/// hands it back but never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotToken(String);

impl SnapshotToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Persists and restores per-world actor state (inventory and the like)
/// around cross-world moves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotPort: Send + Sync {
    /// Capture the actor's state as it is in `world`.
    async fn snapshot(
        &self,
        actor: ActorRef,
        world: WorldId,
    ) -> Result<SnapshotToken, SnapshotError>;

    /// Apply the state for `world`. `None` means the actor has never been
    /// there: initialize fresh state.
    async fn restore(
        &self,
        actor: ActorRef,
        world: WorldId,
        token: Option<SnapshotToken>,
    ) -> Result<(), SnapshotError>;
}
