//! Alert ledger
//!
//! Append-only, hash-chained alert history with a bounded recent view,
//! role-based admission and admitted-alert notifications.

pub mod admission;
pub mod alert;
pub mod alert_system;
pub mod events;
pub mod ring;

pub use admission::*;
pub use alert::*;
pub use alert_system::*;
pub use events::*;
pub use ring::*;
