//! Portal link configuration
//!
//! Static, read-only table describing which world a portal in a given world
//! leads to and how coordinates translate on the way.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{BlockPos, DimensionKind};
use crate::WorldId;

/// Ratio between overworld and nether horizontal coordinates.
pub const NETHER_COORDINATE_RATIO: f64 = 8.0;

/// Obsidian platform actors land on when entering an end dimension.
pub const END_PLATFORM: BlockPos = BlockPos::new(100, 49, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalKind {
    Nether,
    End,
}

impl std::fmt::Display for PortalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortalKind::Nether => write!(f, "nether"),
            PortalKind::End => write!(f, "end"),
        }
    }
}

/// One directed portal transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalLink {
    pub kind: PortalKind,
    pub source_world: WorldId,
    pub source_dimension: DimensionKind,
    pub destination_world: WorldId,
    pub destination_dimension: DimensionKind,
    /// Multiplier applied to horizontal coordinates
    pub coordinate_scale: f64,
    /// Fixed arrival block, replaces coordinate translation when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<BlockPos>,
}

/// All configured portal links, keyed by (kind, source world).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortalLinkTable {
    links: Vec<PortalLink>,
}

impl PortalLinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single directed link, replacing any link of the same kind from
    /// the same source world.
    pub fn insert(&mut self, link: PortalLink) -> Result<(), DomainError> {
        if !(link.coordinate_scale.is_finite() && link.coordinate_scale > 0.0) {
            return Err(DomainError::validation(format!(
                "Portal coordinate scale must be positive, got {}",
                link.coordinate_scale
            )));
        }
        if link.source_world == link.destination_world {
            return Err(DomainError::validation(
                "Portal link must lead to a different world",
            ));
        }
        self.links
            .retain(|l| !(l.kind == link.kind && l.source_world == link.source_world));
        self.links.push(link);
        Ok(())
    }

    /// Link an overworld and a nether world in both directions.
    pub fn link_nether(mut self, overworld: WorldId, nether: WorldId) -> Result<Self, DomainError> {
        self.insert(PortalLink {
            kind: PortalKind::Nether,
            source_world: overworld,
            source_dimension: DimensionKind::Overworld,
            destination_world: nether,
            destination_dimension: DimensionKind::Nether,
            coordinate_scale: 1.0 / NETHER_COORDINATE_RATIO,
            anchor: None,
        })?;
        self.insert(PortalLink {
            kind: PortalKind::Nether,
            source_world: nether,
            source_dimension: DimensionKind::Nether,
            destination_world: overworld,
            destination_dimension: DimensionKind::Overworld,
            coordinate_scale: NETHER_COORDINATE_RATIO,
            anchor: None,
        })?;
        Ok(self)
    }

    /// Link an overworld and an end world in both directions.
    ///
    /// Entering the end lands on `platform`; leaving it has no anchor, the
    /// destination world's spawn applies.
    pub fn link_end(
        mut self,
        overworld: WorldId,
        end: WorldId,
        platform: BlockPos,
    ) -> Result<Self, DomainError> {
        self.insert(PortalLink {
            kind: PortalKind::End,
            source_world: overworld,
            source_dimension: DimensionKind::Overworld,
            destination_world: end,
            destination_dimension: DimensionKind::End,
            coordinate_scale: 1.0,
            anchor: Some(platform),
        })?;
        self.insert(PortalLink {
            kind: PortalKind::End,
            source_world: end,
            source_dimension: DimensionKind::End,
            destination_world: overworld,
            destination_dimension: DimensionKind::Overworld,
            coordinate_scale: 1.0,
            anchor: None,
        })?;
        Ok(self)
    }

    pub fn find(&self, kind: PortalKind, source_world: WorldId) -> Option<&PortalLink> {
        self.links
            .iter()
            .find(|l| l.kind == kind && l.source_world == source_world)
    }

    pub fn links(&self) -> &[PortalLink] {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
