//! Value objects: immutable, compared by value.

mod dimension;
mod occupancy;
mod portal_link;
mod position;

pub use dimension::DimensionKind;
pub use occupancy::Occupancy;
pub use portal_link::{
    PortalKind, PortalLink, PortalLinkTable, END_PLATFORM, NETHER_COORDINATE_RATIO,
};
pub use position::{BlockPos, Facing, Position};
