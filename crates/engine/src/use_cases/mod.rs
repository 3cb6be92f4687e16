//! Use cases - User story orchestration.

pub mod teleport;

pub use teleport::TeleportUseCases;
