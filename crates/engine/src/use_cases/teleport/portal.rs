//! Portal destination mapping.
//!
//! Pure translation of a portal position into the linked world. The result
//! carries no safety guarantee; the coordinator runs it through the usual
//! safety check and search.

use warpgate_domain::{
    ActorRef, DimensionKind, PortalKind, PortalLink, PortalLinkTable, Position, WorldId,
};

/// Lowest feet height in a nether destination (above the bedrock floor).
pub const NETHER_FLOOR: i32 = 1;
/// Highest feet height in a nether destination (below the bedrock roof).
pub const NETHER_CEILING: i32 = 126;

#[derive(Debug, Clone, Default)]
pub struct PortalLinker {
    links: PortalLinkTable,
}

impl PortalLinker {
    pub fn new(links: PortalLinkTable) -> Self {
        Self { links }
    }

    pub fn links(&self) -> &PortalLinkTable {
        &self.links
    }

    /// Where a nether portal at `portal` leads, `None` if the world has no
    /// nether link. Horizontal coordinates are scaled and snapped to the
    /// center of a block; facing is kept.
    pub fn nether_destination(&self, actor: ActorRef, portal: &Position) -> Option<Position> {
        let link = self.links.find(PortalKind::Nether, portal.world)?;
        let x = (portal.x * link.coordinate_scale).floor();
        let z = (portal.z * link.coordinate_scale).floor();
        let y = match link.destination_dimension {
            DimensionKind::Nether => portal
                .y
                .clamp(f64::from(NETHER_FLOOR), f64::from(NETHER_CEILING)),
            _ => portal.y,
        };

        let destination = Position {
            world: link.destination_world,
            x: x + 0.5,
            y,
            z: z + 0.5,
            facing: portal.facing,
        };
        tracing::trace!(actor = %actor, from = %portal, to = %destination, "Nether portal destination");
        Some(destination)
    }

    /// Fixed arrival point of the end portal in `current_world`. `None` when
    /// there is no end link, or the link has no anchor and the arrival point
    /// is the destination world's spawn.
    pub fn end_destination(&self, actor: ActorRef, current_world: WorldId) -> Option<Position> {
        let link = self.links.find(PortalKind::End, current_world)?;
        let anchor = link.anchor?;
        tracing::trace!(actor = %actor, anchor = %anchor, "End portal destination");
        Some(Position::centered_on(link.destination_world, anchor))
    }

    /// Like [`Self::end_destination`], resolving anchorless links through
    /// `spawn_of(destination_world)`.
    pub fn end_destination_or_spawn<F>(
        &self,
        actor: ActorRef,
        current_world: WorldId,
        spawn_of: F,
    ) -> Option<Position>
    where
        F: FnOnce(WorldId) -> Option<Position>,
    {
        let link = self.end_link(current_world)?;
        match link.anchor {
            Some(anchor) => Some(Position::centered_on(link.destination_world, anchor)),
            None => {
                let spawn = spawn_of(link.destination_world);
                tracing::trace!(actor = %actor, world_id = %link.destination_world, found = spawn.is_some(), "End portal leads to world spawn");
                spawn
            }
        }
    }

    pub fn end_link(&self, current_world: WorldId) -> Option<&PortalLink> {
        self.links.find(PortalKind::End, current_world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgate_domain::{ActorId, Facing, END_PLATFORM};

    struct Worlds {
        overworld: WorldId,
        nether: WorldId,
        end: WorldId,
    }

    fn linker() -> (PortalLinker, Worlds) {
        let w = Worlds {
            overworld: WorldId::new(),
            nether: WorldId::new(),
            end: WorldId::new(),
        };
        let table = PortalLinkTable::new()
            .link_nether(w.overworld, w.nether)
            .unwrap()
            .link_end(w.overworld, w.end, END_PLATFORM)
            .unwrap();
        (PortalLinker::new(table), w)
    }

    fn actor() -> ActorRef {
        ActorRef::player(ActorId::new())
    }

    #[test]
    fn overworld_to_nether_divides_and_clamps() {
        let (linker, w) = linker();
        let portal = Position::new(w.overworld, 100.7, 200.0, -33.0)
            .unwrap()
            .with_facing(Some(Facing::new(45.0, 0.0)));

        let dest = linker.nether_destination(actor(), &portal).unwrap();
        assert_eq!(dest.world, w.nether);
        assert_eq!((dest.x, dest.z), (12.5, -4.5));
        assert_eq!(dest.y, 126.0);
        assert_eq!(dest.facing, portal.facing);
    }

    #[test]
    fn nether_to_overworld_multiplies() {
        let (linker, w) = linker();
        let portal = Position::new(w.nether, 12.5, 40.0, -4.5).unwrap();

        let dest = linker.nether_destination(actor(), &portal).unwrap();
        assert_eq!(dest.world, w.overworld);
        assert_eq!((dest.x, dest.y, dest.z), (100.5, 40.0, -35.5));
    }

    #[test]
    fn nether_destination_is_idempotent() {
        let (linker, w) = linker();
        let entity = actor();
        let portal = Position::new(w.overworld, -1234.25, 70.0, 987.75).unwrap();
        assert_eq!(
            linker.nether_destination(entity, &portal),
            linker.nether_destination(entity, &portal)
        );
    }

    #[test]
    fn no_link_means_no_destination() {
        let (linker, w) = linker();
        let portal = Position::new(w.end, 0.0, 64.0, 0.0).unwrap();
        assert_eq!(linker.nether_destination(actor(), &portal), None);
        assert_eq!(linker.end_destination(actor(), w.nether), None);
        assert_eq!(
            linker.end_destination_or_spawn(actor(), w.nether, |_| panic!("no lookup without a link")),
            None
        );
    }

    #[test]
    fn entering_the_end_lands_on_the_platform() {
        let (linker, w) = linker();
        let dest = linker.end_destination(actor(), w.overworld).unwrap();
        assert_eq!(dest, Position::centered_on(w.end, END_PLATFORM));
    }

    #[test]
    fn leaving_the_end_uses_spawn_lookup() {
        let (linker, w) = linker();
        assert_eq!(linker.end_destination(actor(), w.end), None);

        let spawn = Position::new(w.overworld, 0.5, 70.0, 0.5).unwrap();
        let dest = linker.end_destination_or_spawn(actor(), w.end, |world| {
            assert_eq!(world, w.overworld);
            Some(spawn)
        });
        assert_eq!(dest, Some(spawn));
    }
}
