//! Identity and infrastructure registries.
//!
//! Two disjoint authorization domains:
//! - Vehicles (ordinary or emergency), trust-scored
//! - Edge servers (roadside units), active/inactive and performance-scored

pub mod identity;
pub mod infrastructure;
pub mod principal;

pub use identity::*;
pub use infrastructure::*;
pub use principal::*;
