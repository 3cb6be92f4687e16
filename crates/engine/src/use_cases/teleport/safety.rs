//! Position safety evaluation.
//!
//! A position is safe when an actor standing there is not obstructed, not
//! standing in anything hazardous and will land on a supporting surface
//! within a short drop. Evaluation is a pure read of world data and must run
//! on the world context.

use warpgate_domain::{BlockPos, Position, WorldProfile};

use crate::infrastructure::app_settings::TeleportSettings;
use crate::infrastructure::ports::{WorldContextError, WorldQuery};
use crate::infrastructure::world_context::WorldContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyRules {
    /// Blocks occupied by an actor's body, feet upward
    pub actor_height: u8,
    /// Blocks below the feet searched for a floor
    pub support_tolerance: u8,
}

impl Default for SafetyRules {
    fn default() -> Self {
        Self {
            actor_height: 2,
            support_tolerance: 3,
        }
    }
}

impl SafetyRules {
    pub fn from_settings(settings: &TeleportSettings) -> Self {
        Self {
            actor_height: settings.actor_height.max(1),
            support_tolerance: settings.support_tolerance.max(1),
        }
    }
}

/// Whether an actor can stand at `position`.
///
/// Anything the world cannot answer (unknown world, unloaded blocks, outside
/// the height band) counts as unsafe.
pub fn is_safe<W>(world: &W, position: &Position, rules: &SafetyRules) -> bool
where
    W: WorldQuery + ?Sized,
{
    match world.profile(position.world) {
        Some(profile) => is_safe_block(world, &profile, position.block(), rules),
        None => false,
    }
}

/// Safety check for the block holding the actor's feet, with the world
/// profile already resolved.
pub(crate) fn is_safe_block<W>(
    world: &W,
    profile: &WorldProfile,
    feet: BlockPos,
    rules: &SafetyRules,
) -> bool
where
    W: WorldQuery + ?Sized,
{
    let height = i32::from(rules.actor_height.max(1));
    if feet.y < profile.min_y || feet.y > profile.max_y - height {
        return false;
    }

    for dy in 0..height {
        match world.occupancy_at(profile.id, feet.offset(0, dy, 0)) {
            Some(block) if block.is_passable() && !block.hazardous => {}
            _ => return false,
        }
    }

    if profile.vertical_safety_waived {
        return true;
    }

    for depth in 1..=i32::from(rules.support_tolerance) {
        let below = feet.offset(0, -depth, 0);
        match world.occupancy_at(profile.id, below) {
            // Below the bottom of the world is the void.
            None => return false,
            Some(block) if block.stops_fall() => return block.supports && !block.hazardous,
            Some(_) => {}
        }
    }
    false
}

/// Safety predicate bound to a fixed set of rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionSafetyEvaluator {
    rules: SafetyRules,
}

impl PositionSafetyEvaluator {
    pub fn new(rules: SafetyRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> SafetyRules {
        self.rules
    }

    /// Evaluate on the calling thread, which must be the world context.
    pub fn is_safe<W>(&self, world: &W, position: &Position) -> bool
    where
        W: WorldQuery + ?Sized,
    {
        is_safe(world, position, &self.rules)
    }

    /// Evaluate as one job on the world context.
    pub async fn is_safe_on(
        &self,
        world: &WorldContext,
        position: Position,
    ) -> Result<bool, WorldContextError> {
        let rules = self.rules;
        world
            .run(move |host| is_safe(&*host, &position, &rules))
            .await
    }
}
