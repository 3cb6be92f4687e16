//! Safe location search.
//!
//! Scans outward from an unsafe destination and returns the first safe spot
//! in a fixed order. This is a scan, not a nearest-point optimization: a
//! candidate in an inner ring always wins over one in an outer ring, and
//! within a column lower candidates win over higher ones, even when a
//! later candidate is closer in straight-line distance.
//!
//! Order:
//! 1. Chebyshev rings `r = 0..=horizontal_radius` around the origin block
//! 2. within a ring, `dx` ascending, then `dz` ascending
//! 3. within a column, from the origin height down to `origin - vertical_range`,
//!    then from `origin + 1` up to `origin + vertical_range`
//!
//! Heights are clamped to the world's band. A candidate that is safe because
//! a floor lies within the drop tolerance is lowered onto that floor.

use warpgate_domain::{BlockPos, Position, WorldProfile};

use crate::infrastructure::app_settings::{ExhaustedSearchFallback, TeleportSettings};
use crate::infrastructure::ports::{WorldContextError, WorldQuery};
use crate::infrastructure::world_context::WorldContext;

use super::safety::{is_safe_block, SafetyRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub horizontal_radius: u32,
    pub vertical_range: u32,
    pub exhausted: ExhaustedSearchFallback,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            horizontal_radius: 8,
            vertical_range: 48,
            exhausted: ExhaustedSearchFallback::Origin,
        }
    }
}

impl SearchConfig {
    pub fn from_settings(settings: &TeleportSettings) -> Self {
        Self {
            horizontal_radius: settings.search_radius,
            vertical_range: settings.search_vertical_range,
            exhausted: settings.exhausted_search_fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOutcome {
    /// First safe candidate, centered on its block
    Found(Position),
    /// Nothing safe within the search bounds
    Exhausted,
}

/// Run the whole scan on the calling thread, which must be the world context.
pub fn scan<W>(
    world: &W,
    origin: &Position,
    rules: &SafetyRules,
    config: &SearchConfig,
) -> SearchOutcome
where
    W: WorldQuery + ?Sized,
{
    let Some(profile) = world.profile(origin.world) else {
        return SearchOutcome::Exhausted;
    };
    let center = origin.block();
    let radius = i32::try_from(config.horizontal_radius).unwrap_or(i32::MAX);

    for r in 0..=radius {
        for dx in -r..=r {
            for dz in -r..=r {
                if dx.abs().max(dz.abs()) != r {
                    continue;
                }
                for y in column_heights(center.y, config.vertical_range, &profile) {
                    let feet = BlockPos::new(center.x + dx, y, center.z + dz);
                    if is_safe_block(world, &profile, feet, rules) {
                        let feet = settle(world, &profile, feet);
                        let found =
                            Position::centered_on(origin.world, feet).with_facing(origin.facing);
                        return SearchOutcome::Found(found);
                    }
                }
            }
        }
    }
    SearchOutcome::Exhausted
}

/// Lower a safe candidate onto the floor it would drop to anyway.
fn settle<W>(world: &W, profile: &WorldProfile, mut feet: BlockPos) -> BlockPos
where
    W: WorldQuery + ?Sized,
{
    if profile.vertical_safety_waived {
        return feet;
    }
    while let Some(below) = world.occupancy_at(profile.id, feet.below()) {
        if below.stops_fall() {
            break;
        }
        feet = feet.below();
    }
    feet
}

/// Heights of one column in scan order: downward from the origin, then upward.
fn column_heights(origin_y: i32, range: u32, profile: &WorldProfile) -> impl Iterator<Item = i32> {
    let range = i32::try_from(range).unwrap_or(i32::MAX);
    let low = origin_y.saturating_sub(range).max(profile.min_y);
    let high = origin_y.saturating_add(range).min(profile.max_y - 1);

    let down = (low..=origin_y.min(high)).rev();
    let up = origin_y.saturating_add(1).max(low)..=high;
    down.chain(up)
}

/// Async front of the scan, marshalled onto the world context.
pub struct SafeLocationSearch {
    world: WorldContext,
    rules: SafetyRules,
    config: SearchConfig,
}

impl SafeLocationSearch {
    pub fn new(world: WorldContext, rules: SafetyRules, config: SearchConfig) -> Self {
        Self {
            world,
            rules,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Scan around `origin` as a single world-context job.
    pub async fn search(&self, origin: Position) -> Result<SearchOutcome, WorldContextError> {
        let rules = self.rules;
        let config = self.config;
        self.world
            .run(move |host| scan(&*host, &origin, &rules, &config))
            .await
    }

    /// Degraded result for an exhausted search, `None` when configured to reject.
    pub async fn fallback_for(&self, origin: Position) -> Option<Position> {
        match self.config.exhausted {
            ExhaustedSearchFallback::Origin => Some(origin),
            ExhaustedSearchFallback::Reject => None,
            ExhaustedSearchFallback::WorldSpawn => {
                let world = origin.world;
                match self.world.run(move |host| host.profile(world)).await {
                    Ok(Some(profile)) => Some(profile.spawn),
                    Ok(None) => Some(origin),
                    Err(e) => {
                        tracing::warn!(world_id = %world, error = %e, "World spawn unavailable for search fallback");
                        Some(origin)
                    }
                }
            }
        }
    }

    /// Find a safe position near `origin`. Always resolves; when nothing safe
    /// is found the origin (or the world spawn, per configuration) comes back.
    pub async fn find_safe(&self, origin: Position) -> Position {
        match self.search(origin).await {
            Ok(SearchOutcome::Found(position)) => position,
            Ok(SearchOutcome::Exhausted) => {
                tracing::debug!(origin = %origin, fallback = %self.config.exhausted, "Safe location search exhausted");
                self.fallback_for(origin).await.unwrap_or(origin)
            }
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Safe location search could not run, returning origin");
                origin
            }
        }
    }
}
