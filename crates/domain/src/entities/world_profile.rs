//! WorldProfile entity - What the host tells us about a loaded world

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{DimensionKind, Position};
use crate::WorldId;

/// Read-only description of a loaded world.
///
/// World registration and configuration live in the host; the teleport core
/// only reads these fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldProfile {
    pub id: WorldId,
    pub name: String,
    pub dimension: DimensionKind,
    pub spawn: Position,
    /// Lowest block y an actor may stand in
    pub min_y: i32,
    /// Highest block y (exclusive) of the world
    pub max_y: i32,
    /// Void worlds and skyblock-style maps: skip the floor support check
    #[serde(default)]
    pub vertical_safety_waived: bool,
    /// Use an actor's bed as respawn point when it has one in this world
    #[serde(default = "default_true")]
    pub respect_beds: bool,
    /// World-level rule: may anything teleport into this world
    #[serde(default = "default_true")]
    pub teleport_allowed: bool,
}

fn default_true() -> bool {
    true
}

impl WorldProfile {
    pub fn new(
        name: impl Into<String>,
        dimension: DimensionKind,
        spawn: Position,
        min_y: i32,
        max_y: i32,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("World name cannot be empty"));
        }
        if min_y >= max_y {
            return Err(DomainError::validation(format!(
                "World height band is empty: min_y={min_y} max_y={max_y}"
            )));
        }
        Ok(Self {
            id: spawn.world,
            name,
            dimension,
            spawn,
            min_y,
            max_y,
            vertical_safety_waived: false,
            respect_beds: true,
            teleport_allowed: true,
        })
    }

    pub fn with_vertical_safety_waived(mut self, waived: bool) -> Self {
        self.vertical_safety_waived = waived;
        self
    }

    pub fn with_respect_beds(mut self, respect: bool) -> Self {
        self.respect_beds = respect;
        self
    }

    pub fn with_teleport_allowed(mut self, allowed: bool) -> Self {
        self.teleport_allowed = allowed;
        self
    }

    /// Clamp a block y into the range an actor of `height` fits in.
    pub fn clamp_standing_y(&self, y: i32, height: u8) -> i32 {
        let top = (self.max_y - i32::from(height)).max(self.min_y);
        y.clamp(self.min_y, top)
    }
}
