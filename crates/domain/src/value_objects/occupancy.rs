//! Block occupancy as reported by the host world.

use serde::{Deserialize, Serialize};

/// What occupies a single block.
///
/// - `solid`: the block obstructs an actor's body
/// - `hazardous`: standing in or on it hurts (lava, fire, magma, void)
/// - `supports`: an actor can stand on top of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occupancy {
    pub solid: bool,
    pub hazardous: bool,
    pub supports: bool,
}

impl Occupancy {
    pub const AIR: Self = Self {
        solid: false,
        hazardous: false,
        supports: false,
    };

    pub const SOLID: Self = Self {
        solid: true,
        hazardous: false,
        supports: true,
    };

    /// Hazardous fluid (lava-like): not solid, does not hold an actor up.
    pub const HAZARD: Self = Self {
        solid: false,
        hazardous: true,
        supports: false,
    };

    /// Harmless fluid (water-like).
    pub const FLUID: Self = Self {
        solid: false,
        hazardous: false,
        supports: false,
    };

    /// Hot solid block (magma-like): holds an actor up but hurts.
    pub const HOT_SOLID: Self = Self {
        solid: true,
        hazardous: true,
        supports: true,
    };

    /// An actor's body can occupy this block.
    pub fn is_passable(&self) -> bool {
        !self.solid
    }

    /// Neither passable air nor fluid: the first such block below an actor
    /// decides whether it is standing or falling.
    pub fn stops_fall(&self) -> bool {
        self.solid || self.supports || self.hazardous
    }
}

impl Default for Occupancy {
    fn default() -> Self {
        Self::AIR
    }
}
