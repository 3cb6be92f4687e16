//! Static allow/deny policy for development and testing
//!
//! Real deployments plug a permissions system or zone database in behind
//! `PolicyPort`; this adapter answers from fixed deny lists.

use async_trait::async_trait;
use std::collections::HashSet;
use warpgate_domain::{ActorId, ActorRef, Position, WorldId};

use crate::infrastructure::ports::{PolicyError, PolicyPort, Ruleset};

#[derive(Debug, Clone, Default)]
pub struct StaticPolicy {
    denied_worlds: HashSet<WorldId>,
    denied_actors: HashSet<ActorId>,
    /// Only players may enter these worlds.
    players_only: HashSet<WorldId>,
}

impl StaticPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny_world(mut self, world: WorldId) -> Self {
        self.denied_worlds.insert(world);
        self
    }

    pub fn deny_actor(mut self, actor: ActorId) -> Self {
        self.denied_actors.insert(actor);
        self
    }

    pub fn players_only(mut self, world: WorldId) -> Self {
        self.players_only.insert(world);
        self
    }

    fn decide(&self, actor: ActorRef, destination: &Position) -> bool {
        if self.denied_actors.contains(&actor.id) || self.denied_worlds.contains(&destination.world) {
            return false;
        }
        !(self.players_only.contains(&destination.world) && !actor.is_player())
    }
}

#[async_trait]
impl PolicyPort for StaticPolicy {
    async fn evaluate(
        &self,
        actor: ActorRef,
        destination: Position,
        _ruleset: Ruleset,
    ) -> Result<bool, PolicyError> {
        Ok(self.decide(actor, &destination))
    }
}
