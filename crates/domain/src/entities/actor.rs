//! Actor references
//!
//! The teleport core never owns an actor. It holds a reference and reads or
//! writes the authoritative position through the world context.

use serde::{Deserialize, Serialize};

use crate::ActorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    Player,
    Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub id: ActorId,
    pub kind: ActorKind,
}

impl ActorRef {
    pub fn player(id: ActorId) -> Self {
        Self {
            id,
            kind: ActorKind::Player,
        }
    }

    pub fn entity(id: ActorId) -> Self {
        Self {
            id,
            kind: ActorKind::Entity,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, ActorKind::Player)
    }
}

impl std::fmt::Display for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ActorKind::Player => write!(f, "player:{}", self.id),
            ActorKind::Entity => write!(f, "entity:{}", self.id),
        }
    }
}
