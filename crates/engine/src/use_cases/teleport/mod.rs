//! Teleport use cases.
//!
//! Safety evaluation, safe-spot search, permission checks, portal mapping and
//! the coordinator that ties them into one pipeline. [`TeleportUseCases`] is
//! the surface handed to commands, event handlers and plugins.

mod coordinator;
mod permission;
mod portal;
mod safety;
mod search;

pub use coordinator::{SpawnResolver, TeleportationCoordinator};
pub use permission::{PermissionConfig, PermissionGate};
pub use portal::{PortalLinker, NETHER_CEILING, NETHER_FLOOR};
pub use safety::{is_safe, PositionSafetyEvaluator, SafetyRules};
pub use search::{scan, SafeLocationSearch, SearchConfig, SearchOutcome};

use std::sync::Arc;

use warpgate_domain::{
    ActorId, ActorRef, PortalKind, Position, TeleportDecision, TeleportRequest, WorldId,
};

use crate::infrastructure::ports::{ActorStore, WorldContextError, WorldQuery};

/// Container for teleport use cases.
#[derive(Clone)]
pub struct TeleportUseCases {
    pub coordinator: Arc<TeleportationCoordinator>,
    pub gate: Arc<PermissionGate>,
    pub search: Arc<SafeLocationSearch>,
    pub linker: Arc<PortalLinker>,
}

impl TeleportUseCases {
    pub fn new(
        coordinator: Arc<TeleportationCoordinator>,
        gate: Arc<PermissionGate>,
        search: Arc<SafeLocationSearch>,
        linker: Arc<PortalLinker>,
    ) -> Self {
        Self {
            coordinator,
            gate,
            search,
            linker,
        }
    }

    /// Respawn point of `actor` in `world_id`. Must run on the world context.
    pub fn get_spawn_location<W>(&self, world: &W, actor: ActorId, world_id: WorldId) -> Position
    where
        W: WorldQuery + ActorStore + ?Sized,
    {
        self.coordinator.get_spawn_location(world, actor, world_id)
    }

    pub async fn spawn_location(
        &self,
        actor: ActorId,
        world_id: WorldId,
    ) -> Result<Position, WorldContextError> {
        self.coordinator.spawn_location(actor, world_id).await
    }

    pub async fn allowed_teleport(&self, actor: ActorRef, destination: Position) -> bool {
        self.gate.allowed_teleport(actor, destination).await
    }

    pub async fn can_teleport(&self, actor: ActorRef, destination: Position) -> bool {
        self.gate.can_teleport(actor, destination).await
    }

    pub async fn find_safe(&self, origin: Position) -> Position {
        self.search.find_safe(origin).await
    }

    pub fn teleport_player(&self, actor: ActorRef, destination: Position) {
        self.coordinator.teleport_player(actor, destination);
    }

    /// Run a request to completion and return its decision.
    pub async fn teleport(&self, request: TeleportRequest) -> TeleportDecision {
        self.coordinator.run(request).await
    }

    pub async fn teleport_through_portal(
        &self,
        actor: ActorRef,
        kind: PortalKind,
        portal: Position,
    ) -> TeleportDecision {
        self.coordinator
            .teleport_through_portal(actor, kind, portal)
            .await
    }

    pub fn nether_destination(&self, actor: ActorRef, portal: &Position) -> Option<Position> {
        self.linker.nether_destination(actor, portal)
    }

    pub fn end_destination(&self, actor: ActorRef, current_world: WorldId) -> Option<Position> {
        self.linker.end_destination(actor, current_world)
    }

    pub fn invalidate_actor(&self, actor: ActorId) {
        self.coordinator.invalidate_actor(actor);
    }

    pub fn forget_actor(&self, actor: ActorId) {
        self.coordinator.forget_actor(actor);
    }
}
