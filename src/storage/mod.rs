//! Storage module.
//!
//! Repository interfaces for the three persisted collections (vehicle
//! identities, edge-server identities, the alert sequence) and their
//! in-memory and file-backed implementations. Nothing is ever deleted
//! from any collection.

pub mod jsonl;
pub mod memory;
pub mod models;
pub mod repository;

pub use jsonl::*;
pub use memory::*;
pub use models::*;
pub use repository::*;
