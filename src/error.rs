//! Error taxonomy.
//!
//! Four caller-facing categories: validation ("fix your input"),
//! authorization ("you may not do this"), not-found, and transient
//! store failures (the only retryable kind). Integrity failures mark a
//! ledger that no longer verifies and are never retried.

use std::time::Duration;

use thiserror::Error;

use crate::decision::sensor::SensorValidationError;
use crate::types::Address;

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Authorization,
    NotFound,
    Transient,
    Integrity,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Integrity => "integrity",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Transient)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("identifier must not be empty")]
    InvalidId,

    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(u8),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyMessage | ValidationError::MessageTooLong { .. } => {
                "INVALID_MESSAGE"
            }
            ValidationError::InvalidId => "INVALID_ID",
            ValidationError::InvalidAddress(_) => "INVALID_ADDRESS",
            ValidationError::ScoreOutOfRange(_) => "OUT_OF_RANGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("caller is not a registered vehicle")]
    Unauthorized,

    #[error("trust score {trust_score} is below {threshold}; only CRITICAL alerts are permitted")]
    LowTrustRestricted { trust_score: u8, threshold: u8 },

    #[error("caller is not an emergency vehicle")]
    NotEmergencyVehicle,

    #[error("relayer is not an active edge server")]
    UnauthorizedRelayer,

    #[error("origin vehicle is not registered")]
    OriginNotRegistered,
}

impl AuthorizationError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthorizationError::Unauthorized => "UNAUTHORIZED",
            AuthorizationError::LowTrustRestricted { .. } => "LOW_TRUST_RESTRICTED",
            AuthorizationError::NotEmergencyVehicle => "NOT_EMERGENCY_VEHICLE",
            AuthorizationError::UnauthorizedRelayer => "UNAUTHORIZED_RELAYER",
            AuthorizationError::OriginNotRegistered => "ORIGIN_NOT_REGISTERED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{0} is already registered")]
    AlreadyRegistered(Address),

    #[error("{0} is not registered")]
    NotRegistered(Address),

    #[error("no edge server at {0}")]
    NotFound(Address),

    #[error("edge server {0} is not active")]
    NotActive(Address),

    #[error("edge server {0} is already active")]
    AlreadyActive(Address),

    #[error("index {index} is out of range for {count} servers")]
    IndexOutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl RegistryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RegistryError::NotRegistered(_)
            | RegistryError::NotFound(_)
            | RegistryError::IndexOutOfRange { .. } => ErrorCategory::NotFound,
            RegistryError::AlreadyRegistered(_)
            | RegistryError::NotActive(_)
            | RegistryError::AlreadyActive(_)
            | RegistryError::Invalid(_) => ErrorCategory::Validation,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            RegistryError::NotRegistered(_) => "NOT_REGISTERED",
            RegistryError::NotFound(_) => "NOT_FOUND",
            RegistryError::NotActive(_) => "NOT_ACTIVE",
            RegistryError::AlreadyActive(_) => "ALREADY_ACTIVE",
            RegistryError::IndexOutOfRange { .. } => "OUT_OF_RANGE",
            RegistryError::Invalid(e) => e.code(),
        }
    }
}

/// Failures of the shared alert store substrate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("alert store unavailable: {0}")]
    Unavailable(String),

    #[error("alert store did not acknowledge within {0:?}")]
    Timeout(Duration),

    #[error("alert store entry {line} is corrupt: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Another store instance holds the exclusive file lock.
    #[error("alert store is locked by another writer: {0}")]
    Locked(String),

    /// A failed append could not be rolled back; the file may hold a torn line.
    #[error("alert store is poisoned: {0}")]
    Poisoned(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Timeout(_) | StoreError::Locked(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid alert: {0}")]
    Validation(#[from] ValidationError),

    #[error("alert rejected: {0}")]
    Authorization(#[from] AuthorizationError),

    // Store text stays in the source chain, never in the caller-facing message.
    #[error("{}", store_summary(.0))]
    Store(#[source] StoreError),
}

fn store_summary(err: &StoreError) -> &'static str {
    if err.is_transient() {
        "ledger store unavailable, retry later"
    } else {
        "ledger store failed integrity checks"
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Store(err)
    }
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::Validation(_) => ErrorCategory::Validation,
            LedgerError::Authorization(_) => ErrorCategory::Authorization,
            LedgerError::Store(e) if e.is_transient() => ErrorCategory::Transient,
            LedgerError::Store(_) => ErrorCategory::Integrity,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(e) => e.code(),
            LedgerError::Authorization(e) => e.code(),
            LedgerError::Store(StoreError::Timeout(_)) => "STORE_TIMEOUT",
            LedgerError::Store(StoreError::Unavailable(_)) => "STORE_UNAVAILABLE",
            LedgerError::Store(StoreError::Corrupt { .. }) => "STORE_CORRUPT",
            LedgerError::Store(StoreError::Locked(_)) => "STORE_LOCKED",
            LedgerError::Store(StoreError::Poisoned(_)) => "STORE_POISONED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Failure of an edge-node request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error(transparent)]
    InvalidSensorData(#[from] SensorValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl NodeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            NodeError::InvalidSensorData(_) => ErrorCategory::Validation,
            NodeError::Ledger(e) => e.category(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            NodeError::InvalidSensorData(_) => "INVALID_SENSOR_DATA",
            NodeError::Ledger(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}
