//! # Warpgate Domain Types
//!
//! Vocabulary shared by every layer that talks about a teleport: what caused
//! it, which phase it is in and how it ended.
//!
//! ## Design Principles
//!
//! 1. **Pure data types** - No I/O, no async, no side effects
//! 2. **Serializable** - Decisions are logged and may be reported to clients

mod phase;
pub use phase::TeleportPhase;

mod teleport;
pub use teleport::{DenialReason, TeleportCause, TeleportDecision, TeleportRequest, UnsafeReason};
