//! In-memory snapshot store for development and testing
//!
//! Hands out sequential tokens and keeps a log of every call. It stores no
//! actual actor state; the format of that state belongs to the host.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use warpgate_domain::{ActorRef, WorldId};

use crate::infrastructure::ports::{SnapshotError, SnapshotPort, SnapshotToken};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    Snapshot {
        actor: ActorRef,
        world: WorldId,
        token: SnapshotToken,
    },
    Restore {
        actor: ActorRef,
        world: WorldId,
        token: Option<SnapshotToken>,
    },
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    sequence: AtomicU64,
    events: Mutex<Vec<SnapshotEvent>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<SnapshotEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl SnapshotPort for MemorySnapshotStore {
    async fn snapshot(
        &self,
        actor: ActorRef,
        world: WorldId,
    ) -> Result<SnapshotToken, SnapshotError> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let token = SnapshotToken::new(format!("{}:{}:{}", actor.id, world, seq));
        self.events.lock().await.push(SnapshotEvent::Snapshot {
            actor,
            world,
            token: token.clone(),
        });
        tracing::debug!(actor = %actor, world_id = %world, token = token.as_str(), "Actor state snapshot taken");
        Ok(token)
    }

    async fn restore(
        &self,
        actor: ActorRef,
        world: WorldId,
        token: Option<SnapshotToken>,
    ) -> Result<(), SnapshotError> {
        tracing::debug!(
            actor = %actor,
            world_id = %world,
            fresh = token.is_none(),
            "Actor state restored"
        );
        self.events
            .lock()
            .await
            .push(SnapshotEvent::Restore { actor, world, token });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgate_domain::ActorId;

    #[tokio::test]
    async fn records_calls_in_order_with_unique_tokens() {
        let store = MemorySnapshotStore::new();
        let actor = ActorRef::player(ActorId::new());
        let world = WorldId::new();

        let first = store.snapshot(actor, world).await.unwrap();
        let second = store.snapshot(actor, world).await.unwrap();
        assert_ne!(first, second);

        store.restore(actor, world, Some(first.clone())).await.unwrap();

        let events = store.events().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], SnapshotEvent::Snapshot { token, .. } if *token == first));
        assert!(matches!(&events[2], SnapshotEvent::Restore { token: Some(t), .. } if *t == first));
    }
}
