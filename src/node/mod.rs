//! Edge node module.
//!
//! Request context plus the `EdgeNode` sensor-to-ledger pipeline.

pub mod context;
pub mod edge;

pub use context::*;
pub use edge::*;
