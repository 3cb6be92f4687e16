//! World-context confined ports.
//!
//! Everything here may only be called from the world context thread. The
//! traits are synchronous on purpose: callers off that thread go through
//! `WorldContext::run`.

use warpgate_domain::{ActorId, BlockPos, Occupancy, Position, WorldId, WorldProfile};

use super::error::WorldError;

/// Terrain queries.
pub trait WorldQuery {
    /// Occupancy of one block. `None` when the world is unknown or the block
    /// lies outside loaded/generated space.
    fn occupancy_at(&self, world: WorldId, block: BlockPos) -> Option<Occupancy>;

    fn profile(&self, world: WorldId) -> Option<WorldProfile>;
}

/// Authoritative actor state.
pub trait ActorStore {
    /// Current position, `None` once the actor disconnected or was destroyed.
    fn location(&self, actor: ActorId) -> Option<Position>;

    fn set_location(&mut self, actor: ActorId, position: Position) -> Result<(), WorldError>;

    /// Bed respawn point of the actor in `world`, if it has one there.
    fn bed_spawn(&self, actor: ActorId, world: WorldId) -> Option<Position>;
}

/// The host world handed over to the world context thread.
pub trait WorldHost: WorldQuery + ActorStore + Send + 'static {}

impl<T> WorldHost for T where T: WorldQuery + ActorStore + Send + 'static {}
