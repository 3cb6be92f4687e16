//! Domain entities - Things with identity the teleport core refers to

mod actor;
mod world_profile;

pub use actor::{ActorKind, ActorRef};
pub use world_profile::WorldProfile;
