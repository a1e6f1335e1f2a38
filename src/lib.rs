//! IoV Alert Core - decision, trust and relay engine for vehicle alerts
//!
//! Edge nodes ingest raw vehicle sensor readings, decide whether an alert
//! is warranted, enforce trust- and role-based admission, and commit
//! admitted alerts to a shared append-only ledger that every node and
//! vehicle observes in the same order.
//!
//! 1. **Admission** - Every write path matches every identity kind
//! 2. **Logging** - Every decision point logged with request context
//! 3. **Audit** - Ledger entries are hash-chained and never change
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `registry` - Vehicle and edge-server registries, resolved identities
//! - `decision` - Sensor validation and rule-based classification
//! - `ledger` - Admission policy, hash-chained history, recent ring, events
//! - `node` - Edge node pipeline (validate, classify, admit)
//! - `storage` - Repository traits, in-memory and JSON-lines stores
//! - `security` - Log-only threat scanning of alert text
//! - `logging` - Structured logging with request context
//! - `python` - Optional PyO3 binding (feature `python`)

pub mod config;
pub mod decision;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod node;
pub mod registry;
pub mod security;
pub mod storage;
pub mod types;

#[cfg(feature = "python")]
pub mod python;

pub use config::{LedgerConfig, NodeConfig};
pub use decision::{classify, validate_sensor_data, Decision, SensorSnapshot};
pub use error::{
    AuthorizationError, ErrorCategory, LedgerError, NodeError, RegistryError, StoreError,
    ValidationError,
};
pub use ledger::{Alert, AlertEvent, AlertRef, AlertSystem, LedgerEntry, Subscription};
pub use node::{EdgeNode, ProcessingOutcome};
pub use registry::{Identity, Registries};
pub use types::{Address, AlertType, Priority, VehicleCategory};
