//! Position value objects
//!
//! A `Position` is a point in a specific world. Equality is exact and only meant
//! for deduplication; anything that needs "closeness" must use
//! [`Position::distance_squared`] explicitly.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::WorldId;

/// Look direction carried along with a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Facing {
    pub yaw: f32,
    pub pitch: f32,
}

impl Facing {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }
}

/// Integer block coordinates inside a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    pub const fn below(self) -> Self {
        self.offset(0, -1, 0)
    }

    pub const fn above(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub const fn with_y(self, y: i32) -> Self {
        Self { y, ..self }
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A point in a world, optionally with a facing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub world: WorldId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
}

impl Position {
    /// Create a position, rejecting non-finite coordinates.
    pub fn new(world: WorldId, x: f64, y: f64, z: f64) -> Result<Self, DomainError> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(DomainError::validation(format!(
                "Position coordinates must be finite, got ({x}, {y}, {z})"
            )));
        }
        Ok(Self {
            world,
            x,
            y,
            z,
            facing: None,
        })
    }

    /// Position standing on the bottom center of a block.
    pub fn centered_on(world: WorldId, block: BlockPos) -> Self {
        Self {
            world,
            x: f64::from(block.x) + 0.5,
            y: f64::from(block.y),
            z: f64::from(block.z) + 0.5,
            facing: None,
        }
    }

    pub fn with_facing(mut self, facing: Option<Facing>) -> Self {
        self.facing = facing;
        self
    }

    /// Same coordinates and facing, different world.
    pub fn in_world(mut self, world: WorldId) -> Self {
        self.world = world;
        self
    }

    /// The block containing the actor's feet.
    pub fn block(&self) -> BlockPos {
        BlockPos {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }

    /// Squared euclidean distance, `None` when the worlds differ.
    pub fn distance_squared(&self, other: &Position) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dx * dx + dy * dy + dz * dz)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@({:.2}, {:.2}, {:.2})",
            self.world, self.x, self.y, self.z
        )
    }
}
