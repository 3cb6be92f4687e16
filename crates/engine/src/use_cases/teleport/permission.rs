//! Permission gate.
//!
//! Decides whether an actor may teleport to a destination at all, before any
//! safety work happens. Checks run cheapest first: cooldown, world rule,
//! policy backend. The gate never touches actor or world state; the only
//! bookkeeping it owns is the cooldown table, written by the coordinator
//! through [`PermissionGate::record_commit`] after a move is committed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use warpgate_domain::{ActorId, ActorRef, DenialReason, Position, TeleportCause};

use crate::infrastructure::app_settings::{PolicyFailureMode, TeleportSettings};
use crate::infrastructure::ports::{ClockPort, PolicyPort, Ruleset};
use crate::infrastructure::world_context::WorldContext;

use super::safety::PositionSafetyEvaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionConfig {
    /// Zero disables the cooldown
    pub cooldown: Duration,
    pub policy_timeout: Duration,
    pub failure_mode: PolicyFailureMode,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(3),
            policy_timeout: Duration::from_secs(2),
            failure_mode: PolicyFailureMode::Deny,
        }
    }
}

impl PermissionConfig {
    pub fn from_settings(settings: &TeleportSettings) -> Self {
        Self {
            cooldown: Duration::from_secs(settings.cooldown_secs),
            policy_timeout: Duration::from_millis(settings.policy_timeout_ms),
            failure_mode: settings.policy_failure_mode,
        }
    }
}

pub struct PermissionGate {
    world: WorldContext,
    policy: Arc<dyn PolicyPort>,
    clock: Arc<dyn ClockPort>,
    safety: PositionSafetyEvaluator,
    config: PermissionConfig,
    last_commits: DashMap<ActorId, DateTime<Utc>>,
}

impl PermissionGate {
    pub fn new(
        world: WorldContext,
        policy: Arc<dyn PolicyPort>,
        clock: Arc<dyn ClockPort>,
        safety: PositionSafetyEvaluator,
        config: PermissionConfig,
    ) -> Self {
        Self {
            world,
            policy,
            clock,
            safety,
            config,
            last_commits: DashMap::new(),
        }
    }

    /// May `actor` teleport to `destination`?
    pub async fn allowed_teleport(&self, actor: ActorRef, destination: Position) -> bool {
        self.check(actor, destination, TeleportCause::Plugin)
            .await
            .is_ok()
    }

    /// Stricter pre-check: allowed, and the literal destination is safe.
    pub async fn can_teleport(&self, actor: ActorRef, destination: Position) -> bool {
        if !self.allowed_teleport(actor, destination).await {
            return false;
        }
        self.safety
            .is_safe_on(&self.world, destination)
            .await
            .unwrap_or(false)
    }

    /// Run all checks, returning the first reason to refuse.
    pub async fn check(
        &self,
        actor: ActorRef,
        destination: Position,
        cause: TeleportCause,
    ) -> Result<(), DenialReason> {
        if let Some(remaining) = self.cooldown_remaining(actor.id) {
            let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            tracing::debug!(actor = %actor, remaining_secs, "Teleport on cooldown");
            return Err(DenialReason::Cooldown { remaining_secs });
        }

        let world_id = destination.world;
        let profile = self
            .world
            .run(move |host| host.profile(world_id))
            .await
            .map_err(|_| DenialReason::WorldUnavailable)?;
        let Some(profile) = profile else {
            tracing::debug!(actor = %actor, world_id = %world_id, "Teleport into unknown world");
            return Err(DenialReason::WorldForbidden);
        };
        if !profile.teleport_allowed {
            tracing::debug!(actor = %actor, world = %profile.name, "World does not accept teleports");
            return Err(DenialReason::WorldForbidden);
        }

        let ruleset = Ruleset {
            world: world_id,
            dimension: profile.dimension,
            cause,
        };
        let evaluation = self.policy.evaluate(actor, destination, ruleset);
        let failure = match tokio::time::timeout(self.config.policy_timeout, evaluation).await {
            Ok(Ok(true)) => return Ok(()),
            Ok(Ok(false)) => {
                tracing::debug!(actor = %actor, destination = %destination, "Policy denied teleport");
                return Err(DenialReason::PolicyDenied);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "policy evaluation timed out after {}ms",
                self.config.policy_timeout.as_millis()
            ),
        };

        match self.config.failure_mode {
            PolicyFailureMode::Deny => {
                tracing::warn!(actor = %actor, error = %failure, "Policy backend failed, denying teleport");
                Err(DenialReason::PolicyBackendFailure { message: failure })
            }
            PolicyFailureMode::Allow => {
                tracing::warn!(actor = %actor, error = %failure, "Policy backend failed, allowing teleport");
                Ok(())
            }
        }
    }

    /// Start the cooldown for `actor`.
    pub fn record_commit(&self, actor: ActorId) {
        if !self.config.cooldown.is_zero() {
            self.last_commits.insert(actor, self.clock.now());
        }
    }

    pub fn clear_cooldown(&self, actor: ActorId) {
        self.last_commits.remove(&actor);
    }

    fn cooldown_remaining(&self, actor: ActorId) -> Option<Duration> {
        if self.config.cooldown.is_zero() {
            return None;
        }
        let last = *self.last_commits.get(&actor)?;
        let elapsed = (self.clock.now() - last).to_std().unwrap_or(Duration::ZERO);
        let remaining = self.config.cooldown.checked_sub(elapsed)?;
        (!remaining.is_zero()).then_some(remaining)
    }
}
