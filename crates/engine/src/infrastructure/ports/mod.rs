//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - World data (terrain queries and actor state, world-context confined)
//! - Policy evaluation (could be a zone database, a permissions plugin, a remote service)
//! - Actor state snapshots around cross-world moves
//! - Clock (for testing)

mod error;
mod external;
mod testing;
mod world;

// =============================================================================
// World Ports
// =============================================================================
pub use world::{ActorStore, WorldHost, WorldQuery};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{PolicyPort, Ruleset, SnapshotPort, SnapshotToken};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::{MockPolicyPort, MockSnapshotPort};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{PolicyError, SnapshotError, WorldContextError, WorldError};
