//! In-memory world host for development and testing
//!
//! Sparse block map per world plus an actor table. Blocks that were never set
//! are air; blocks outside a world's loaded radius or height band report
//! `None`, like ungenerated chunks on a real server. Nothing is persisted.

use std::collections::HashMap;

use warpgate_domain::{ActorId, BlockPos, Occupancy, Position, WorldId, WorldProfile};

use crate::infrastructure::ports::{ActorStore, WorldError, WorldQuery};

/// Horizontal half-extent of the loaded area when none is configured.
const DEFAULT_LOADED_RADIUS: i32 = 512;

struct MemoryDimension {
    profile: WorldProfile,
    loaded_radius: i32,
    blocks: HashMap<BlockPos, Occupancy>,
}

/// World host backed by hash maps.
#[derive(Default)]
pub struct MemoryWorld {
    worlds: HashMap<WorldId, MemoryDimension>,
    actors: HashMap<ActorId, Position>,
    beds: HashMap<(ActorId, WorldId), Position>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a world. Replaces any previous world with the same id.
    pub fn with_world(mut self, profile: WorldProfile) -> Self {
        self.add_world(profile);
        self
    }

    pub fn add_world(&mut self, profile: WorldProfile) {
        self.worlds.insert(
            profile.id,
            MemoryDimension {
                profile,
                loaded_radius: DEFAULT_LOADED_RADIUS,
                blocks: HashMap::new(),
            },
        );
    }

    /// Limit the loaded area of `world` to `|x|, |z| <= radius`.
    pub fn with_loaded_radius(mut self, world: WorldId, radius: i32) -> Self {
        if let Some(dim) = self.worlds.get_mut(&world) {
            dim.loaded_radius = radius;
        }
        self
    }

    pub fn with_actor(mut self, actor: ActorId, position: Position) -> Self {
        self.actors.insert(actor, position);
        self
    }

    pub fn with_bed(mut self, actor: ActorId, bed: Position) -> Self {
        self.beds.insert((actor, bed.world), bed);
        self
    }

    pub fn set_block(&mut self, world: WorldId, block: BlockPos, occupancy: Occupancy) {
        if let Some(dim) = self.worlds.get_mut(&world) {
            if occupancy == Occupancy::AIR {
                dim.blocks.remove(&block);
            } else {
                dim.blocks.insert(block, occupancy);
            }
        }
    }

    pub fn with_block(mut self, world: WorldId, block: BlockPos, occupancy: Occupancy) -> Self {
        self.set_block(world, block, occupancy);
        self
    }

    /// Fill the inclusive box between `a` and `b`.
    pub fn fill(&mut self, world: WorldId, a: BlockPos, b: BlockPos, occupancy: Occupancy) {
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    self.set_block(world, BlockPos::new(x, y, z), occupancy);
                }
            }
        }
    }

    pub fn with_fill(
        mut self,
        world: WorldId,
        a: BlockPos,
        b: BlockPos,
        occupancy: Occupancy,
    ) -> Self {
        self.fill(world, a, b, occupancy);
        self
    }

    /// Actor leaves the server.
    pub fn remove_actor(&mut self, actor: ActorId) -> Option<Position> {
        self.actors.remove(&actor)
    }
}

impl WorldQuery for MemoryWorld {
    fn occupancy_at(&self, world: WorldId, block: BlockPos) -> Option<Occupancy> {
        let dim = self.worlds.get(&world)?;
        let in_band = block.y >= dim.profile.min_y && block.y < dim.profile.max_y;
        let in_radius = block.x.abs() <= dim.loaded_radius && block.z.abs() <= dim.loaded_radius;
        if !(in_band && in_radius) {
            return None;
        }
        Some(dim.blocks.get(&block).copied().unwrap_or(Occupancy::AIR))
    }

    fn profile(&self, world: WorldId) -> Option<WorldProfile> {
        self.worlds.get(&world).map(|dim| dim.profile.clone())
    }
}

impl ActorStore for MemoryWorld {
    fn location(&self, actor: ActorId) -> Option<Position> {
        self.actors.get(&actor).copied()
    }

    fn set_location(&mut self, actor: ActorId, position: Position) -> Result<(), WorldError> {
        if !self.worlds.contains_key(&position.world) {
            return Err(WorldError::WorldNotLoaded(position.world));
        }
        match self.actors.get_mut(&actor) {
            Some(current) => {
                *current = position;
                Ok(())
            }
            None => Err(WorldError::ActorNotFound(actor)),
        }
    }

    fn bed_spawn(&self, actor: ActorId, world: WorldId) -> Option<Position> {
        self.beds.get(&(actor, world)).copied()
    }
}
