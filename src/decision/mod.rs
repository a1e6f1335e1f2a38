//! Decision engine.
//!
//! Turns raw vehicle sensor readings into alert classifications:
//! - Input validation (field type checks, never raises alerts)
//! - Ordered rule evaluation (first match wins)

pub mod engine;
pub mod sensor;

pub use engine::*;
pub use sensor::*;
