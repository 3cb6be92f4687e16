//! Warpgate engine library.
//!
//! Teleport safety and coordination on top of a host world that may only be
//! touched from one thread.
//!
//! ## Structure
//!
//! - `use_cases/` - The teleport pipeline (safety, search, permission, portals, coordinator)
//! - `infrastructure/` - Ports, the world context thread and adapters
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
