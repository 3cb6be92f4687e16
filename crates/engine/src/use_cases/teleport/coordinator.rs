//! Teleportation coordinator.
//!
//! Drives one request through the pipeline and is the only place that moves
//! an actor:
//!
//! ```text
//! Requested -> PermissionPending -> {Denied | SafetyPending}
//! SafetyPending -> {Approved | SearchPending}
//! SearchPending -> {Approved | Unsafe}
//! ```
//!
//! Requests of one actor are serialized by a per-actor lock taken before the
//! permission check and held until the request is terminal. Requests of
//! different actors never share a lock.
//!
//! Side effects happen only when entering `Approved`. A cross-world move
//! snapshots the departing world's actor state, then restores the arriving
//! world's state, then writes the position. Snapshot and restore failures are
//! logged and do not block the move. An actor that became invalid (left,
//! destroyed, or invalidated through [`TeleportationCoordinator::invalidate_actor`])
//! is caught at the commit step and the request ends `Denied(StaleActor)`
//! without a write.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use warpgate_domain::{
    ActorId, ActorRef, BlockPos, DenialReason, PortalKind, Position, TeleportCause,
    TeleportDecision, TeleportPhase, TeleportRequest, UnsafeReason, WorldId,
};

use crate::infrastructure::ports::{
    ActorStore, SnapshotPort, SnapshotToken, WorldContextError, WorldError, WorldQuery,
};
use crate::infrastructure::snapshot_ledger::SnapshotLedger;
use crate::infrastructure::world_context::WorldContext;

use super::permission::PermissionGate;
use super::portal::PortalLinker;
use super::safety::PositionSafetyEvaluator;
use super::search::{SafeLocationSearch, SearchOutcome};

/// Spawn used when neither the world nor the settings provide one.
const FALLBACK_SPAWN: BlockPos = BlockPos::new(0, 64, 0);

/// Respawn point lookup: bed, then world spawn, then the configured default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnResolver {
    default_spawn: Option<Position>,
}

impl SpawnResolver {
    pub fn new(default_spawn: Option<Position>) -> Self {
        Self { default_spawn }
    }

    /// Must run on the world context.
    pub fn resolve<W>(&self, world: &W, actor: ActorId, world_id: WorldId) -> Position
    where
        W: WorldQuery + ActorStore + ?Sized,
    {
        if let Some(profile) = world.profile(world_id) {
            if profile.respect_beds {
                if let Some(bed) = world.bed_spawn(actor, world_id) {
                    return bed;
                }
            }
            return profile.spawn;
        }
        self.default_spawn
            .unwrap_or_else(|| Position::centered_on(world_id, FALLBACK_SPAWN))
    }
}

#[derive(Debug, thiserror::Error)]
enum CommitError {
    #[error("actor is no longer valid")]
    Stale,

    #[error(transparent)]
    WorldContext(#[from] WorldContextError),

    #[error("host refused the move: {0}")]
    Rejected(WorldError),
}

impl From<WorldError> for CommitError {
    fn from(e: WorldError) -> Self {
        match e {
            WorldError::ActorNotFound(_) => CommitError::Stale,
            other => CommitError::Rejected(other),
        }
    }
}

pub struct TeleportationCoordinator {
    world: WorldContext,
    gate: Arc<PermissionGate>,
    search: Arc<SafeLocationSearch>,
    linker: Arc<PortalLinker>,
    snapshots: Arc<dyn SnapshotPort>,
    safety: PositionSafetyEvaluator,
    spawn: SpawnResolver,
    ledger: SnapshotLedger,
    sequencers: DashMap<ActorId, Arc<Mutex<()>>>,
    cancellations: DashMap<ActorId, CancellationToken>,
}

impl TeleportationCoordinator {
    pub fn new(
        world: WorldContext,
        gate: Arc<PermissionGate>,
        search: Arc<SafeLocationSearch>,
        linker: Arc<PortalLinker>,
        snapshots: Arc<dyn SnapshotPort>,
        safety: PositionSafetyEvaluator,
        spawn: SpawnResolver,
    ) -> Self {
        Self {
            world,
            gate,
            search,
            linker,
            snapshots,
            safety,
            spawn,
            ledger: SnapshotLedger::new(),
            sequencers: DashMap::new(),
            cancellations: DashMap::new(),
        }
    }

    /// Drive `request` to a terminal decision. Never fails; every problem is
    /// expressed in the returned decision.
    pub async fn run(&self, request: TeleportRequest) -> TeleportDecision {
        let span = tracing::info_span!(
            "teleport",
            request_id = %request.id,
            actor_id = %request.actor.id,
            cause = %request.cause,
        );
        self.drive(request).instrument(span).await
    }

    /// Fire-and-forget entry point. The outcome is only observable through
    /// the actor's state afterwards.
    pub fn teleport_player(self: &Arc<Self>, actor: ActorRef, destination: Position) {
        self.submit(TeleportRequest::new(actor, destination, TeleportCause::Plugin));
    }

    /// Run `request` on a background task.
    pub fn submit(self: &Arc<Self>, request: TeleportRequest) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let actor = request.actor;
            let decision = coordinator.run(request).await;
            tracing::debug!(actor = %actor, decision = ?decision, "Background teleport finished");
        });
    }

    /// Teleport through a portal of `kind` standing at `portal`.
    pub async fn teleport_through_portal(
        &self,
        actor: ActorRef,
        kind: PortalKind,
        portal: Position,
    ) -> TeleportDecision {
        let (destination, cause) = match kind {
            PortalKind::Nether => (
                self.linker.nether_destination(actor, &portal),
                TeleportCause::NetherPortal,
            ),
            PortalKind::End => match self.end_destination(actor, portal.world).await {
                Ok(destination) => (destination, TeleportCause::EndPortal),
                Err(e) => {
                    tracing::warn!(actor = %actor, error = %e, "End portal lookup failed");
                    return TeleportDecision::denied(DenialReason::WorldUnavailable);
                }
            },
        };

        let Some(destination) = destination else {
            let mut phase = TeleportPhase::Requested;
            advance(&mut phase, TeleportPhase::Unsafe);
            tracing::info!(actor = %actor, portal = %kind, world_id = %portal.world, "Portal has no link from this world");
            return TeleportDecision::unsafe_destination(UnsafeReason::NoPortalLink);
        };
        self.run(TeleportRequest::new(actor, destination, cause))
            .await
    }

    /// End portal arrival point, resolving anchorless links to the actor's
    /// spawn in the destination world.
    async fn end_destination(
        &self,
        actor: ActorRef,
        current_world: WorldId,
    ) -> Result<Option<Position>, WorldContextError> {
        let linker = Arc::clone(&self.linker);
        let spawn = self.spawn;
        self.world
            .run(move |host| {
                linker.end_destination_or_spawn(actor, current_world, |destination| {
                    Some(spawn.resolve(&*host, actor.id, destination))
                })
            })
            .await
    }

    /// Respawn point of `actor` in `world_id`. Must run on the world context.
    pub fn get_spawn_location<W>(&self, world: &W, actor: ActorId, world_id: WorldId) -> Position
    where
        W: WorldQuery + ActorStore + ?Sized,
    {
        self.spawn.resolve(world, actor, world_id)
    }

    /// [`Self::get_spawn_location`] from outside the world context.
    pub async fn spawn_location(
        &self,
        actor: ActorId,
        world_id: WorldId,
    ) -> Result<Position, WorldContextError> {
        let spawn = self.spawn;
        self.world
            .run(move |host| spawn.resolve(&*host, actor, world_id))
            .await
    }

    /// Abort every pending request of `actor`. Call when the actor leaves or
    /// is destroyed.
    pub fn invalidate_actor(&self, actor: ActorId) {
        if let Some((_, token)) = self.cancellations.remove(&actor) {
            token.cancel();
            tracing::debug!(actor_id = %actor, "Pending teleports invalidated");
        }
    }

    /// Drop all per-actor state, including remembered snapshots. For actors
    /// that are gone for good.
    pub fn forget_actor(&self, actor: ActorId) {
        self.invalidate_actor(actor);
        // A request still holding the sequencer keeps it, so a later request
        // of this actor queues behind it instead of running alongside.
        self.sequencers
            .remove_if(&actor, |_, sequencer| Arc::strong_count(sequencer) == 1);
        self.gate.clear_cooldown(actor);
        let snapshots = self.ledger.forget_actor(actor);
        tracing::debug!(actor_id = %actor, snapshots, "Actor forgotten");
    }

    fn sequencer_for(&self, actor: ActorId) -> Arc<Mutex<()>> {
        Arc::clone(self.sequencers.entry(actor).or_default().value())
    }

    fn cancellation_for(&self, actor: ActorId) -> CancellationToken {
        self.cancellations.entry(actor).or_default().value().clone()
    }

    async fn drive(&self, request: TeleportRequest) -> TeleportDecision {
        let TeleportRequest {
            actor,
            destination,
            cause,
            ..
        } = request;
        let cancel = self.cancellation_for(actor.id);
        let sequencer = self.sequencer_for(actor.id);
        let _turn = sequencer.lock().await;

        let mut phase = TeleportPhase::Requested;
        advance(&mut phase, TeleportPhase::PermissionPending);
        if cancel.is_cancelled() {
            return deny(&mut phase, DenialReason::StaleActor);
        }
        if let Err(reason) = self.gate.check(actor, destination, cause).await {
            return deny(&mut phase, reason);
        }

        advance(&mut phase, TeleportPhase::SafetyPending);
        if cancel.is_cancelled() {
            return deny(&mut phase, DenialReason::StaleActor);
        }
        let target = match self.safety.is_safe_on(&self.world, destination).await {
            Ok(true) => destination,
            Ok(false) => {
                advance(&mut phase, TeleportPhase::SearchPending);
                match self.resolve_unsafe(destination).await {
                    Ok(Some(found)) => found,
                    Ok(None) => {
                        advance(&mut phase, TeleportPhase::Unsafe);
                        tracing::info!(destination = %destination, "No safe location near destination");
                        return TeleportDecision::unsafe_destination(UnsafeReason::NoSafeLocation);
                    }
                    Err(_) => return deny(&mut phase, DenialReason::WorldUnavailable),
                }
            }
            Err(_) => return deny(&mut phase, DenialReason::WorldUnavailable),
        };

        if cancel.is_cancelled() {
            return deny(&mut phase, DenialReason::StaleActor);
        }
        match self.commit(actor, target, &cancel).await {
            Ok(()) => {
                advance(&mut phase, TeleportPhase::Approved);
                self.gate.record_commit(actor.id);
                tracing::info!(position = %target, "Teleport committed");
                TeleportDecision::approved(target)
            }
            Err(CommitError::Stale) => deny(&mut phase, DenialReason::StaleActor),
            Err(CommitError::WorldContext(_)) => deny(&mut phase, DenialReason::WorldUnavailable),
            Err(CommitError::Rejected(e)) => deny(
                &mut phase,
                DenialReason::MoveRejected {
                    message: e.to_string(),
                },
            ),
        }
    }

    /// Search around an unsafe destination, applying the exhausted fallback.
    async fn resolve_unsafe(
        &self,
        destination: Position,
    ) -> Result<Option<Position>, WorldContextError> {
        match self.search.search(destination).await? {
            SearchOutcome::Found(found) => Ok(Some(found)),
            SearchOutcome::Exhausted => {
                let fallback = self.search.fallback_for(destination).await;
                if let Some(position) = &fallback {
                    tracing::warn!(destination = %destination, fallback = %position, "No safe location found, using degraded fallback");
                }
                Ok(fallback)
            }
        }
    }

    async fn commit(
        &self,
        actor: ActorRef,
        target: Position,
        cancel: &CancellationToken,
    ) -> Result<(), CommitError> {
        let probe = cancel.clone();
        let origin = self
            .world
            .run(move |host| {
                if probe.is_cancelled() {
                    None
                } else {
                    host.location(actor.id)
                }
            })
            .await?
            .ok_or(CommitError::Stale)?;

        let crosses_worlds = origin.world != target.world;
        let departed = if crosses_worlds {
            self.swap_world_state(actor, origin.world, target.world)
                .await
        } else {
            None
        };

        let probe = cancel.clone();
        let written = self
            .world
            .run(move |host| {
                if probe.is_cancelled() || host.location(actor.id).is_none() {
                    return Err(CommitError::Stale);
                }
                host.set_location(actor.id, target).map_err(CommitError::from)
            })
            .await
            .map_err(CommitError::from)
            .and_then(|result| result);

        if written.is_err() && crosses_worlds {
            self.undo_world_swap(actor, origin.world, departed).await;
        }
        written
    }

    /// Snapshot the departing world, then restore the arriving one. Returns
    /// the departing snapshot token when one was taken.
    async fn swap_world_state(
        &self,
        actor: ActorRef,
        from: WorldId,
        to: WorldId,
    ) -> Option<SnapshotToken> {
        let departed = match self.snapshots.snapshot(actor, from).await {
            Ok(token) => {
                self.ledger.record(actor.id, from, token.clone());
                Some(token)
            }
            Err(e) => {
                tracing::warn!(actor = %actor, world_id = %from, error = %e, "Snapshot of departing world failed, continuing");
                None
            }
        };

        let arriving = self.ledger.token_for(actor.id, to);
        if let Err(e) = self.snapshots.restore(actor, to, arriving).await {
            tracing::warn!(actor = %actor, world_id = %to, error = %e, "Restore of arriving world failed, continuing");
        }
        departed
    }

    /// Put the departing world's state back after a move that did not happen.
    async fn undo_world_swap(&self, actor: ActorRef, origin: WorldId, departed: Option<SnapshotToken>) {
        let Some(token) = departed else {
            tracing::warn!(actor = %actor, world_id = %origin, "Move aborted after state swap, no snapshot to roll back to");
            return;
        };
        if let Err(e) = self.snapshots.restore(actor, origin, Some(token)).await {
            tracing::warn!(actor = %actor, world_id = %origin, error = %e, "Rolling back actor state failed");
        }
    }
}

fn advance(phase: &mut TeleportPhase, next: TeleportPhase) {
    match phase.transition(next) {
        Ok(entered) => {
            tracing::trace!(from = %phase, to = %entered, "Teleport phase");
            *phase = entered;
        }
        Err(e) => {
            tracing::error!(error = %e, "Unexpected teleport phase transition");
            *phase = next;
        }
    }
}

fn deny(phase: &mut TeleportPhase, reason: DenialReason) -> TeleportDecision {
    advance(phase, TeleportPhase::Denied);
    if reason.is_user_facing() {
        tracing::info!(reason = %reason, "Teleport denied");
    } else {
        tracing::debug!(reason = %reason, "Teleport aborted");
    }
    TeleportDecision::denied(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::app_settings::ExhaustedSearchFallback;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::memory_snapshots::{MemorySnapshotStore, SnapshotEvent};
    use crate::infrastructure::memory_world::MemoryWorld;
    use crate::infrastructure::ports::{
        MockPolicyPort, MockSnapshotPort, PolicyError, PolicyPort, Ruleset, SnapshotError,
        WorldHost,
    };
    use crate::use_cases::teleport::permission::PermissionConfig;
    use crate::use_cases::teleport::safety::SafetyRules;
    use crate::use_cases::teleport::search::SearchConfig;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use warpgate_domain::{
        DimensionKind, Occupancy, PortalLinkTable, WorldProfile, END_PLATFORM,
    };

    struct Harness {
        ctx: WorldContext,
        overworld: WorldId,
        nether: WorldId,
        end: WorldId,
        actor: ActorRef,
        start: Position,
        bed: Position,
    }

    fn profile(id: WorldId, name: &str, dimension: DimensionKind, max_y: i32) -> WorldProfile {
        let spawn = Position::centered_on(id, BlockPos::new(0, 64, 0));
        WorldProfile::new(name, dimension, spawn, 0, max_y).unwrap()
    }

    /// Overworld and nether with a floor at y=63 around the origin, an end
    /// world with the arrival platform, one player standing at the overworld
    /// spawn with a bed at (3, 64, 3).
    fn harness() -> Harness {
        harness_on(|mem| Box::new(mem))
    }

    /// Same world as [`harness`], handed to the world context through `host`.
    fn harness_on(host: impl FnOnce(MemoryWorld) -> Box<dyn WorldHost>) -> Harness {
        let overworld = WorldId::new();
        let nether = WorldId::new();
        let end = WorldId::new();
        let actor = ActorRef::player(ActorId::new());
        let start = Position::centered_on(overworld, BlockPos::new(0, 64, 0));
        let bed = Position::centered_on(overworld, BlockPos::new(3, 64, 3));

        let mem = MemoryWorld::new()
            .with_world(profile(overworld, "world", DimensionKind::Overworld, 256))
            .with_world(profile(nether, "world_nether", DimensionKind::Nether, 128))
            .with_world(profile(end, "world_the_end", DimensionKind::End, 256))
            .with_fill(
                overworld,
                BlockPos::new(-40, 63, -40),
                BlockPos::new(110, 63, 40),
                Occupancy::SOLID,
            )
            .with_fill(
                nether,
                BlockPos::new(-20, 63, -20),
                BlockPos::new(20, 63, 20),
                Occupancy::SOLID,
            )
            .with_fill(
                end,
                END_PLATFORM.offset(-2, -1, -2),
                END_PLATFORM.offset(2, -1, 2),
                Occupancy::SOLID,
            )
            .with_actor(actor.id, start)
            .with_bed(actor.id, bed);
        let (ctx, _thread) = WorldContext::spawn(host(mem)).unwrap();

        Harness {
            ctx,
            overworld,
            nether,
            end,
            actor,
            start,
            bed,
        }
    }

    fn allow_all() -> Arc<dyn PolicyPort> {
        let mut policy = MockPolicyPort::new();
        policy.expect_evaluate().returning(|_, _, _| Ok(true));
        Arc::new(policy)
    }

    fn coordinator_with(
        h: &Harness,
        policy: Arc<dyn PolicyPort>,
        snapshots: Arc<dyn SnapshotPort>,
        search: SearchConfig,
    ) -> Arc<TeleportationCoordinator> {
        let safety = PositionSafetyEvaluator::new(SafetyRules::default());
        let gate = PermissionGate::new(
            h.ctx.clone(),
            policy,
            Arc::new(SystemClock::new()),
            safety,
            PermissionConfig {
                cooldown: Duration::ZERO,
                ..PermissionConfig::default()
            },
        );
        let links = PortalLinkTable::new()
            .link_nether(h.overworld, h.nether)
            .unwrap()
            .link_end(h.overworld, h.end, END_PLATFORM)
            .unwrap();
        Arc::new(TeleportationCoordinator::new(
            h.ctx.clone(),
            Arc::new(gate),
            Arc::new(SafeLocationSearch::new(
                h.ctx.clone(),
                SafetyRules::default(),
                search,
            )),
            Arc::new(PortalLinker::new(links)),
            snapshots,
            safety,
            SpawnResolver::default(),
        ))
    }

    fn coordinator(
        h: &Harness,
        policy: Arc<dyn PolicyPort>,
        snapshots: Arc<dyn SnapshotPort>,
    ) -> Arc<TeleportationCoordinator> {
        coordinator_with(h, policy, snapshots, SearchConfig::default())
    }

    async fn location(h: &Harness, actor: ActorId) -> Option<Position> {
        h.ctx.run(move |host| host.location(actor)).await.unwrap()
    }

    fn request(h: &Harness, destination: Position) -> TeleportRequest {
        TeleportRequest::new(h.actor, destination, TeleportCause::Command)
    }

    #[tokio::test]
    async fn safe_destination_is_committed_as_is() {
        let h = harness();
        // No snapshot expectations: same-world moves never call the collaborator.
        let c = coordinator(&h, allow_all(), Arc::new(MockSnapshotPort::new()));

        let dest = Position::centered_on(h.overworld, BlockPos::new(10, 64, -5));
        let decision = c.run(request(&h, dest)).await;

        assert_eq!(decision, TeleportDecision::approved(dest));
        assert_eq!(location(&h, h.actor.id).await, Some(dest));
    }

    #[tokio::test]
    async fn unsafe_destination_is_replaced_by_search_result() {
        let h = harness();
        let c = coordinator(&h, allow_all(), Arc::new(MockSnapshotPort::new()));

        let mid_air = Position::centered_on(h.overworld, BlockPos::new(0, 80, 0));
        let decision = c.run(request(&h, mid_air)).await;

        let expected = Position::centered_on(h.overworld, BlockPos::new(0, 64, 0));
        assert_eq!(decision, TeleportDecision::approved(expected));
    }

    #[tokio::test]
    async fn denied_request_never_commits() {
        let h = harness();
        let mut policy = MockPolicyPort::new();
        policy.expect_evaluate().returning(|_, _, _| Ok(false));
        let c = coordinator(&h, Arc::new(policy), Arc::new(MockSnapshotPort::new()));

        let dest = Position::centered_on(h.nether, BlockPos::new(0, 64, 0));
        let decision = c.run(request(&h, dest)).await;

        assert_eq!(decision, TeleportDecision::denied(DenialReason::PolicyDenied));
        assert_eq!(location(&h, h.actor.id).await, Some(h.start));
    }

    #[tokio::test]
    async fn policy_backend_failure_denies_by_default() {
        let h = harness();
        let mut policy = MockPolicyPort::new();
        policy
            .expect_evaluate()
            .returning(|_, _, _| Err(PolicyError::Unavailable("zone db down".into())));
        let c = coordinator(&h, Arc::new(policy), Arc::new(MockSnapshotPort::new()));

        let dest = Position::centered_on(h.overworld, BlockPos::new(5, 64, 5));
        let decision = c.run(request(&h, dest)).await;

        assert!(matches!(
            decision,
            TeleportDecision::Denied {
                reason: DenialReason::PolicyBackendFailure { .. }
            }
        ));
        assert_eq!(location(&h, h.actor.id).await, Some(h.start));
    }

    #[tokio::test]
    async fn cross_world_move_snapshots_before_restore_even_when_restore_fails() {
        let h = harness();
        let (actor, overworld, nether) = (h.actor, h.overworld, h.nether);

        let mut seq = Sequence::new();
        let mut snapshots = MockSnapshotPort::new();
        snapshots
            .expect_snapshot()
            .with(eq(actor), eq(overworld))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(SnapshotToken::new("overworld-1")));
        snapshots
            .expect_restore()
            .with(eq(actor), eq(nether), eq(None))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |a, w, _| Err(SnapshotError::failed("restore", a.id, w, "disk full")));
        let c = coordinator(&h, allow_all(), Arc::new(snapshots));

        let dest = Position::centered_on(nether, BlockPos::new(2, 64, 2));
        let decision = c.run(request(&h, dest)).await;

        assert_eq!(decision, TeleportDecision::approved(dest));
        assert_eq!(location(&h, actor.id).await, Some(dest));
    }

    #[tokio::test]
    async fn returning_to_a_world_restores_its_snapshot() {
        let h = harness();
        let store = Arc::new(MemorySnapshotStore::new());
        let c = coordinator(&h, allow_all(), store.clone());

        let there = Position::centered_on(h.nether, BlockPos::new(1, 64, 1));
        assert!(c.run(request(&h, there)).await.is_approved());
        assert!(c.run(request(&h, h.start)).await.is_approved());

        let events = store.events().await;
        assert_eq!(events.len(), 4);
        let first_token = match &events[0] {
            SnapshotEvent::Snapshot { world, token, .. } if *world == h.overworld => token.clone(),
            other => panic!("unexpected first event: {other:?}"),
        };
        assert!(matches!(&events[1], SnapshotEvent::Restore { world, token: None, .. } if *world == h.nether));
        assert!(matches!(&events[2], SnapshotEvent::Snapshot { world, .. } if *world == h.nether));
        assert!(matches!(
            &events[3],
            SnapshotEvent::Restore { world, token: Some(t), .. } if *world == h.overworld && *t == first_token
        ));
    }

    /// Host that refuses every position write.
    struct RefusingHost(MemoryWorld);

    impl WorldQuery for RefusingHost {
        fn occupancy_at(&self, world: WorldId, block: BlockPos) -> Option<Occupancy> {
            self.0.occupancy_at(world, block)
        }

        fn profile(&self, world: WorldId) -> Option<WorldProfile> {
            self.0.profile(world)
        }
    }

    impl ActorStore for RefusingHost {
        fn location(&self, actor: ActorId) -> Option<Position> {
            self.0.location(actor)
        }

        fn set_location(&mut self, _actor: ActorId, _position: Position) -> Result<(), WorldError> {
            Err(WorldError::rejected("set_location", "actor is mounted"))
        }

        fn bed_spawn(&self, actor: ActorId, world: WorldId) -> Option<Position> {
            self.0.bed_spawn(actor, world)
        }
    }

    fn assert_swapped_then_rolled_back(events: &[SnapshotEvent], h: &Harness) {
        assert_eq!(events.len(), 3, "events: {events:?}");
        let departed = match &events[0] {
            SnapshotEvent::Snapshot { world, token, .. } if *world == h.overworld => token.clone(),
            other => panic!("unexpected first event: {other:?}"),
        };
        assert!(matches!(&events[1], SnapshotEvent::Restore { world, token: None, .. } if *world == h.nether));
        assert!(matches!(
            &events[2],
            SnapshotEvent::Restore { world, token: Some(t), .. } if *world == h.overworld && *t == departed
        ));
    }

    #[tokio::test]
    async fn refused_write_after_world_swap_rolls_back_actor_state() {
        let h = harness_on(|mem| Box::new(RefusingHost(mem)));
        let store = Arc::new(MemorySnapshotStore::new());
        let c = coordinator(&h, allow_all(), store.clone());

        let dest = Position::centered_on(h.nether, BlockPos::new(2, 64, 2));
        let decision = c.run(request(&h, dest)).await;

        assert!(matches!(
            decision,
            TeleportDecision::Denied {
                reason: DenialReason::MoveRejected { .. }
            }
        ));
        assert_eq!(location(&h, h.actor.id).await, Some(h.start));
        assert_swapped_then_rolled_back(&store.events().await, &h);
    }

    #[tokio::test]
    async fn refused_same_world_write_needs_no_rollback() {
        let h = harness_on(|mem| Box::new(RefusingHost(mem)));
        // Same-world moves never touch the snapshot collaborator.
        let c = coordinator(&h, allow_all(), Arc::new(MockSnapshotPort::new()));

        let dest = Position::centered_on(h.overworld, BlockPos::new(4, 64, 4));
        let decision = c.run(request(&h, dest)).await;

        assert!(matches!(
            decision,
            TeleportDecision::Denied {
                reason: DenialReason::MoveRejected { .. }
            }
        ));
        assert_eq!(location(&h, h.actor.id).await, Some(h.start));
    }

    /// Snapshot store that holds `restore` into one world until released.
    struct GatedRestore {
        inner: MemorySnapshotStore,
        gated: WorldId,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SnapshotPort for GatedRestore {
        async fn snapshot(
            &self,
            actor: ActorRef,
            world: WorldId,
        ) -> Result<SnapshotToken, SnapshotError> {
            self.inner.snapshot(actor, world).await
        }

        async fn restore(
            &self,
            actor: ActorRef,
            world: WorldId,
            token: Option<SnapshotToken>,
        ) -> Result<(), SnapshotError> {
            if world == self.gated {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.restore(actor, world, token).await
        }
    }

    #[tokio::test]
    async fn invalidation_between_swap_and_write_leaves_no_partial_commit() {
        let h = harness();
        let store = Arc::new(GatedRestore {
            inner: MemorySnapshotStore::new(),
            gated: h.nether,
            entered: Notify::new(),
            release: Notify::new(),
        });
        let c = coordinator(&h, allow_all(), store.clone());

        let dest = Position::centered_on(h.nether, BlockPos::new(2, 64, 2));
        let pending = tokio::spawn({
            let c = Arc::clone(&c);
            let req = request(&h, dest);
            async move { c.run(req).await }
        });

        store.entered.notified().await;
        c.invalidate_actor(h.actor.id);
        store.release.notify_one();

        let decision = pending.await.unwrap();
        assert_eq!(decision, TeleportDecision::denied(DenialReason::StaleActor));
        assert_eq!(location(&h, h.actor.id).await, Some(h.start));
        assert_swapped_then_rolled_back(&store.inner.events().await, &h);
    }

    #[tokio::test]
    async fn actor_gone_at_commit_is_stale() {
        let h = harness();
        let c = coordinator(&h, allow_all(), Arc::new(MockSnapshotPort::new()));
        let ghost = ActorRef::player(ActorId::new());

        let dest = Position::centered_on(h.nether, BlockPos::new(0, 64, 0));
        let decision = c
            .run(TeleportRequest::new(ghost, dest, TeleportCause::Command))
            .await;

        assert_eq!(decision, TeleportDecision::denied(DenialReason::StaleActor));
        assert_eq!(location(&h, ghost.id).await, None);
    }

    /// Blocks inside `evaluate` until released.
    struct GatedPolicy {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PolicyPort for GatedPolicy {
        async fn evaluate(
            &self,
            _actor: ActorRef,
            _destination: Position,
            _ruleset: Ruleset,
        ) -> Result<bool, PolicyError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn invalidated_actor_is_not_moved() {
        let h = harness();
        let policy = Arc::new(GatedPolicy {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let c = coordinator(&h, policy.clone(), Arc::new(MockSnapshotPort::new()));

        let dest = Position::centered_on(h.overworld, BlockPos::new(7, 64, 7));
        let pending = tokio::spawn({
            let c = Arc::clone(&c);
            let req = request(&h, dest);
            async move { c.run(req).await }
        });

        policy.entered.notified().await;
        c.invalidate_actor(h.actor.id);
        policy.release.notify_one();

        let decision = pending.await.unwrap();
        assert_eq!(decision, TeleportDecision::denied(DenialReason::StaleActor));
        assert_eq!(location(&h, h.actor.id).await, Some(h.start));

        // A fresh request after invalidation proceeds normally.
        policy.release.notify_one();
        assert!(c.run(request(&h, dest)).await.is_approved());
    }

    /// Records when each evaluation starts and ends.
    struct SlowPolicy {
        log: std::sync::Mutex<Vec<(ActorId, &'static str)>>,
    }

    #[async_trait]
    impl PolicyPort for SlowPolicy {
        async fn evaluate(
            &self,
            actor: ActorRef,
            _destination: Position,
            _ruleset: Ruleset,
        ) -> Result<bool, PolicyError> {
            self.log.lock().unwrap().push((actor.id, "start"));
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.log.lock().unwrap().push((actor.id, "end"));
            Ok(true)
        }
    }

    #[tokio::test]
    async fn requests_of_one_actor_are_serialized() {
        let h = harness();
        let policy = Arc::new(SlowPolicy {
            log: std::sync::Mutex::new(Vec::new()),
        });
        let c = coordinator(&h, policy.clone(), Arc::new(MockSnapshotPort::new()));

        let a = Position::centered_on(h.overworld, BlockPos::new(1, 64, 0));
        let b = Position::centered_on(h.overworld, BlockPos::new(2, 64, 0));
        let (first, second) = tokio::join!(c.run(request(&h, a)), c.run(request(&h, b)));

        assert!(first.is_approved() && second.is_approved());
        let phases: Vec<&str> = policy.log.lock().unwrap().iter().map(|(_, p)| *p).collect();
        assert_eq!(phases, vec!["start", "end", "start", "end"]);
        assert_eq!(location(&h, h.actor.id).await, Some(b));
    }

    /// Holds the first evaluation until released and tracks how many
    /// evaluations overlap.
    struct ExclusivePolicy {
        calls: AtomicUsize,
        inside: AtomicUsize,
        max_inside: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl PolicyPort for ExclusivePolicy {
        async fn evaluate(
            &self,
            _actor: ActorRef,
            _destination: Position,
            _ruleset: Ruleset,
        ) -> Result<bool, PolicyError> {
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inside.fetch_max(now, Ordering::SeqCst);
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inside.fetch_sub(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn forgetting_an_actor_keeps_its_in_flight_request_exclusive() {
        let h = harness();
        let policy = Arc::new(ExclusivePolicy {
            calls: AtomicUsize::new(0),
            inside: AtomicUsize::new(0),
            max_inside: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let c = coordinator(&h, policy.clone(), Arc::new(MockSnapshotPort::new()));

        let first_dest = Position::centered_on(h.overworld, BlockPos::new(5, 64, 0));
        let first = tokio::spawn({
            let c = Arc::clone(&c);
            let req = request(&h, first_dest);
            async move { c.run(req).await }
        });
        policy.entered.notified().await;

        c.forget_actor(h.actor.id);
        let second_dest = Position::centered_on(h.overworld, BlockPos::new(6, 64, 0));
        let second = tokio::spawn({
            let c = Arc::clone(&c);
            let req = request(&h, second_dest);
            async move { c.run(req).await }
        });

        // The second request waits behind the first one's turn.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(policy.calls.load(Ordering::SeqCst), 1);

        policy.release.notify_one();
        assert_eq!(
            first.await.unwrap(),
            TeleportDecision::denied(DenialReason::StaleActor)
        );
        assert_eq!(second.await.unwrap(), TeleportDecision::approved(second_dest));
        assert_eq!(policy.max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(location(&h, h.actor.id).await, Some(second_dest));
    }

    #[tokio::test]
    async fn different_actors_do_not_wait_for_each_other() {
        let h = harness();
        let other = ActorId::new();
        let policy = Arc::new(SlowPolicy {
            log: std::sync::Mutex::new(Vec::new()),
        });
        let c = coordinator(&h, policy.clone(), Arc::new(MockSnapshotPort::new()));

        let dest = Position::centered_on(h.overworld, BlockPos::new(1, 64, 1));
        let (_, _) = tokio::join!(
            c.run(request(&h, dest)),
            c.run(TeleportRequest::new(ActorRef::entity(other), dest, TeleportCause::Plugin))
        );

        let phases: Vec<&str> = policy.log.lock().unwrap().iter().map(|(_, p)| *p).collect();
        assert_eq!(phases, vec!["start", "start", "end", "end"]);
    }

    #[tokio::test]
    async fn exhausted_search_can_reject() {
        let h = harness();
        let config = SearchConfig {
            horizontal_radius: 0,
            vertical_range: 4,
            exhausted: ExhaustedSearchFallback::Reject,
        };
        let c = coordinator_with(&h, allow_all(), Arc::new(MockSnapshotPort::new()), config);

        let sky = Position::centered_on(h.overworld, BlockPos::new(0, 200, 0));
        let decision = c.run(request(&h, sky)).await;

        assert_eq!(
            decision,
            TeleportDecision::unsafe_destination(UnsafeReason::NoSafeLocation)
        );
        assert_eq!(location(&h, h.actor.id).await, Some(h.start));
    }

    #[tokio::test]
    async fn exhausted_search_degrades_to_destination_by_default() {
        let h = harness();
        let config = SearchConfig {
            horizontal_radius: 0,
            vertical_range: 4,
            ..SearchConfig::default()
        };
        let c = coordinator_with(&h, allow_all(), Arc::new(MockSnapshotPort::new()), config);

        let sky = Position::centered_on(h.overworld, BlockPos::new(0, 200, 0));
        assert_eq!(c.run(request(&h, sky)).await, TeleportDecision::approved(sky));
    }

    #[tokio::test]
    async fn nether_portal_scales_coordinates() {
        let h = harness();
        let c = coordinator(&h, allow_all(), Arc::new(MemorySnapshotStore::new()));

        let portal = Position::new(h.overworld, 100.7, 64.0, -33.0).unwrap();
        let decision = c
            .teleport_through_portal(h.actor, PortalKind::Nether, portal)
            .await;

        let expected = Position::new(h.nether, 12.5, 64.0, -4.5).unwrap();
        assert_eq!(decision, TeleportDecision::approved(expected));
    }

    #[tokio::test]
    async fn end_portal_without_link_is_unsafe() {
        let h = harness();
        // Neither policy nor snapshots may be consulted.
        let c = coordinator(
            &h,
            Arc::new(MockPolicyPort::new()),
            Arc::new(MockSnapshotPort::new()),
        );

        let in_nether = Position::centered_on(h.nether, BlockPos::new(0, 64, 0));
        let decision = c
            .teleport_through_portal(h.actor, PortalKind::End, in_nether)
            .await;

        assert_eq!(
            decision,
            TeleportDecision::unsafe_destination(UnsafeReason::NoPortalLink)
        );
    }

    #[tokio::test]
    async fn end_portal_round_trip_lands_on_platform_then_bed() {
        let h = harness();
        let c = coordinator(&h, allow_all(), Arc::new(MemorySnapshotStore::new()));

        let decision = c
            .teleport_through_portal(h.actor, PortalKind::End, h.start)
            .await;
        let platform = Position::centered_on(h.end, END_PLATFORM);
        assert_eq!(decision, TeleportDecision::approved(platform));

        let decision = c
            .teleport_through_portal(h.actor, PortalKind::End, platform)
            .await;
        assert_eq!(decision, TeleportDecision::approved(h.bed));
    }

    #[tokio::test]
    async fn spawn_location_fallback_chain() {
        let h = harness();
        let c = coordinator(&h, allow_all(), Arc::new(MockSnapshotPort::new()));

        assert_eq!(c.spawn_location(h.actor.id, h.overworld).await.unwrap(), h.bed);
        let nether_spawn = Position::centered_on(h.nether, BlockPos::new(0, 64, 0));
        assert_eq!(
            c.spawn_location(h.actor.id, h.nether).await.unwrap(),
            nether_spawn
        );
        let unknown = WorldId::new();
        assert_eq!(
            c.spawn_location(h.actor.id, unknown).await.unwrap(),
            Position::centered_on(unknown, FALLBACK_SPAWN)
        );
    }

    #[test]
    fn spawn_resolver_honours_world_flags_and_default() {
        let world = WorldId::new();
        let actor = ActorId::new();
        let bed = Position::centered_on(world, BlockPos::new(9, 70, 9));
        let mem = MemoryWorld::new()
            .with_world(profile(world, "no_beds", DimensionKind::Overworld, 256).with_respect_beds(false))
            .with_bed(actor, bed);

        let resolver = SpawnResolver::default();
        assert_eq!(resolver.resolve(&mem, actor, world).y, 64.0);

        let default_spawn = Position::centered_on(WorldId::new(), BlockPos::new(1, 2, 3));
        let resolver = SpawnResolver::new(Some(default_spawn));
        assert_eq!(resolver.resolve(&mem, actor, WorldId::new()), default_spawn);
    }

    #[tokio::test]
    async fn teleport_player_moves_actor_in_background() {
        let h = harness();
        let c = coordinator(&h, allow_all(), Arc::new(MockSnapshotPort::new()));

        let dest = Position::centered_on(h.overworld, BlockPos::new(-3, 64, 8));
        c.teleport_player(h.actor, dest);

        let mut arrived = false;
        for _ in 0..100 {
            if location(&h, h.actor.id).await == Some(dest) {
                arrived = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(arrived);
    }

    #[tokio::test]
    async fn forget_actor_clears_remembered_snapshots() {
        let h = harness();
        let store = Arc::new(MemorySnapshotStore::new());
        let c = coordinator(&h, allow_all(), store.clone());

        let there = Position::centered_on(h.nether, BlockPos::new(1, 64, 1));
        assert!(c.run(request(&h, there)).await.is_approved());
        c.forget_actor(h.actor.id);
        assert!(c.run(request(&h, h.start)).await.is_approved());

        // Coming back after being forgotten starts from fresh state.
        let events = store.events().await;
        assert!(matches!(events.last(), Some(SnapshotEvent::Restore { token: None, .. })));
    }
}
