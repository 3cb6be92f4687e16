//! Teleport request and decision vocabulary.

use serde::{Deserialize, Serialize};

use crate::entities::ActorRef;
use crate::value_objects::Position;
use crate::RequestId;

/// What triggered a teleport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeleportCause {
    Command,
    NetherPortal,
    EndPortal,
    Plugin,
}

impl std::fmt::Display for TeleportCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeleportCause::Command => write!(f, "command"),
            TeleportCause::NetherPortal => write!(f, "nether_portal"),
            TeleportCause::EndPortal => write!(f, "end_portal"),
            TeleportCause::Plugin => write!(f, "plugin"),
        }
    }
}

/// One invocation of the teleport pipeline. The origin is whatever the actor's
/// authoritative position is when the request commits.
#[derive(Debug, Clone, PartialEq)]
pub struct TeleportRequest {
    pub id: RequestId,
    pub actor: ActorRef,
    pub destination: Position,
    pub cause: TeleportCause,
}

impl TeleportRequest {
    pub fn new(actor: ActorRef, destination: Position, cause: TeleportCause) -> Self {
        Self {
            id: RequestId::new(),
            actor,
            destination,
            cause,
        }
    }
}

/// Why a teleport was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DenialReason {
    /// Policy said no
    PolicyDenied,
    /// Actor teleported too recently
    Cooldown { remaining_secs: u64 },
    /// Destination world does not accept teleports
    WorldForbidden,
    /// Actor disconnected or was destroyed mid-pipeline
    StaleActor,
    /// Policy backend failed and the failure mode is deny
    PolicyBackendFailure { message: String },
    /// Host refused to move the actor (mounted, mid-respawn, world unloading)
    MoveRejected { message: String },
    /// The world context is gone (server shutting down)
    WorldUnavailable,
}

impl DenialReason {
    /// Whether the actor should be told about this outcome.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, DenialReason::StaleActor | DenialReason::WorldUnavailable)
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::PolicyDenied => write!(f, "teleport not allowed"),
            DenialReason::Cooldown { remaining_secs } => {
                write!(f, "teleport on cooldown for {remaining_secs}s")
            }
            DenialReason::WorldForbidden => write!(f, "destination world does not allow teleports"),
            DenialReason::StaleActor => write!(f, "actor no longer valid"),
            DenialReason::PolicyBackendFailure { message } => {
                write!(f, "teleport not allowed (policy unavailable: {message})")
            }
            DenialReason::MoveRejected { message } => write!(f, "teleport refused: {message}"),
            DenialReason::WorldUnavailable => write!(f, "world context unavailable"),
        }
    }
}

/// Why no position could be approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsafeReason {
    /// Search exhausted and the configured fallback rejects
    NoSafeLocation,
    /// Portal leads nowhere from this world
    NoPortalLink,
}

impl std::fmt::Display for UnsafeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnsafeReason::NoSafeLocation => write!(f, "no safe location found"),
            UnsafeReason::NoPortalLink => write!(f, "no portal link from this world"),
        }
    }
}

/// Terminal value of the teleport pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TeleportDecision {
    Approved { position: Position },
    Denied { reason: DenialReason },
    Unsafe { reason: UnsafeReason },
}

impl TeleportDecision {
    pub fn approved(position: Position) -> Self {
        Self::Approved { position }
    }

    pub fn denied(reason: DenialReason) -> Self {
        Self::Denied { reason }
    }

    pub fn unsafe_destination(reason: UnsafeReason) -> Self {
        Self::Unsafe { reason }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    pub fn approved_position(&self) -> Option<&Position> {
        match self {
            Self::Approved { position } => Some(position),
            _ => None,
        }
    }
}
