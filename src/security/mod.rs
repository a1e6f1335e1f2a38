//! Security module.
//!
//! Log-only threat scanning for alert messages and sensor payloads.

pub mod scanner;

pub use scanner::*;
