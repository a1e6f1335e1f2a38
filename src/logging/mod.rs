//! Structured logging with request context.
//!
//! Provides the `LogContext` prefix carried through edge-node request
//! handling and the process-wide logger initialisation.

pub mod structured;

pub use structured::*;
