//! Error types for port operations.

use warpgate_domain::{ActorId, WorldId};

/// Errors raised by the host world when the core writes actor state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorldError {
    #[error("Actor not found: {0}")]
    ActorNotFound(ActorId),

    #[error("World not loaded: {0}")]
    WorldNotLoaded(WorldId),

    /// Host refused the write (e.g., actor is mounted or mid-respawn).
    #[error("World rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
}

impl WorldError {
    pub fn rejected(operation: &'static str, message: impl ToString) -> Self {
        Self::Rejected {
            operation,
            message: message.to_string(),
        }
    }
}

/// Policy backend failures. Never surfaced to callers directly; the
/// permission gate turns them into its configured failure mode.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PolicyError {
    #[error("Policy backend unavailable: {0}")]
    Unavailable(String),

    #[error("Policy evaluation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Policy backend circuit open, retry after {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },
}

/// Snapshot/restore collaborator failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot {operation} failed for actor {actor} in world {world}: {message}")]
    Failed {
        operation: &'static str,
        actor: ActorId,
        world: WorldId,
        message: String,
    },
}

impl SnapshotError {
    pub fn failed(
        operation: &'static str,
        actor: ActorId,
        world: WorldId,
        message: impl ToString,
    ) -> Self {
        Self::Failed {
            operation,
            actor,
            world,
            message: message.to_string(),
        }
    }
}

/// The world context thread cannot run a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WorldContextError {
    /// The world thread has shut down, no more jobs are accepted.
    #[error("World context is closed")]
    Closed,

    /// The job was accepted but the world thread dropped it (panic or shutdown).
    #[error("World context dropped the job before completing it")]
    Dropped,
}
