//! Infrastructure implementations.
//!
//! Port traits plus the adapters that back them: the world context thread,
//! in-memory hosts for development, the resilient policy wrapper and settings.

pub mod app_settings;
pub mod circuit_breaker;
pub mod clock;
pub mod memory_snapshots;
pub mod memory_world;
pub mod ports;
pub mod resilient_policy;
pub mod snapshot_ledger;
pub mod static_policy;
pub mod world_context;
