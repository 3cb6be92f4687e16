extern crate self as warpgate_domain;

pub mod entities;
pub mod error;
pub mod ids;
pub mod types;
pub mod value_objects;

pub use entities::{ActorKind, ActorRef, WorldProfile};

pub use error::DomainError;

// Re-export ID types
pub use ids::{ActorId, RequestId, WorldId};

pub use types::{
    DenialReason, TeleportCause, TeleportDecision, TeleportPhase, TeleportRequest, UnsafeReason,
};

pub use value_objects::{
    BlockPos, DimensionKind, Facing, Occupancy, PortalKind, PortalLink, PortalLinkTable, Position,
    END_PLATFORM, NETHER_COORDINATE_RATIO,
};
