//! Last snapshot token per (actor, world).
//!
//! Each world keeps its own copy of an actor's state. When an actor leaves a
//! world the token of that world's snapshot is remembered here; coming back
//! later restores it, a first visit has no token and gets fresh state.

use dashmap::DashMap;
use warpgate_domain::{ActorId, WorldId};

use crate::infrastructure::ports::SnapshotToken;

#[derive(Default)]
pub struct SnapshotLedger {
    tokens: DashMap<(ActorId, WorldId), SnapshotToken>,
}

impl SnapshotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the newest snapshot of `actor` in `world`, returning the one it replaces.
    pub fn record(
        &self,
        actor: ActorId,
        world: WorldId,
        token: SnapshotToken,
    ) -> Option<SnapshotToken> {
        self.tokens.insert((actor, world), token)
    }

    pub fn token_for(&self, actor: ActorId, world: WorldId) -> Option<SnapshotToken> {
        self.tokens.get(&(actor, world)).map(|t| t.value().clone())
    }

    /// Drop every token of an actor (e.g., the actor was deleted for good).
    pub fn forget_actor(&self, actor: ActorId) -> usize {
        let mut removed = 0;
        self.tokens.retain(|(owner, _), _| {
            let keep = *owner != actor;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}
