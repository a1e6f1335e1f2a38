//! Alert records and sealed ledger entries.
//!
//! An `Alert` is what observers see. A `LedgerEntry` wraps it with its
//! sequence number, admission path and hash-chain links; entries are
//! immutable once sealed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Address, AlertType, Priority};

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub message: String,
    /// The vehicle the alert is attributed to, also for relayed alerts.
    pub origin: Address,
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    pub priority: Priority,
    pub is_emergency_broadcast: bool,
}

/// Which admission path produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdmissionPath {
    Direct,
    EmergencyBroadcast,
    Relay { relayer: Address },
}

impl AdmissionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPath::Direct => "direct",
            AdmissionPath::EmergencyBroadcast => "emergency_broadcast",
            AdmissionPath::Relay { .. } => "relay",
        }
    }
}

/// Handle returned to the caller of an admitted alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRef {
    pub sequence: u64,
    pub entry_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub alert: Alert,
    pub path: AdmissionPath,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl LedgerEntry {
    /// Build an entry and compute its hash.
    pub fn seal(sequence: u64, alert: Alert, path: AdmissionPath, prev_hash: &str) -> Self {
        let entry_hash = compute_entry_hash(sequence, &alert, &path, prev_hash);
        Self {
            sequence,
            alert,
            path,
            prev_hash: prev_hash.to_string(),
            entry_hash,
        }
    }

    /// Recompute the hash and compare with the stored one.
    pub fn verify(&self) -> bool {
        compute_entry_hash(self.sequence, &self.alert, &self.path, &self.prev_hash)
            == self.entry_hash
    }

    pub fn alert_ref(&self) -> AlertRef {
        AlertRef {
            sequence: self.sequence,
            entry_hash: self.entry_hash.clone(),
        }
    }
}

/// SHA-256 over the entry's fields, hex encoded.
///
/// Variable-length fields are length-prefixed so no two distinct entries
/// share an encoding.
pub fn compute_entry_hash(
    sequence: u64,
    alert: &Alert,
    path: &AdmissionPath,
    prev_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_be_bytes());
    hasher.update((prev_hash.len() as u64).to_be_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(alert.origin.as_bytes());
    hasher.update(alert.timestamp.timestamp().to_be_bytes());
    hasher.update(alert.timestamp.timestamp_subsec_nanos().to_be_bytes());
    hasher.update([
        alert.alert_type as u8,
        alert.priority as u8,
        u8::from(alert.is_emergency_broadcast),
    ]);
    match path {
        AdmissionPath::Direct => hasher.update([0u8]),
        AdmissionPath::EmergencyBroadcast => hasher.update([1u8]),
        AdmissionPath::Relay { relayer } => {
            hasher.update([2u8]);
            hasher.update(relayer.as_bytes());
        }
    }
    hasher.update((alert.message.len() as u64).to_be_bytes());
    hasher.update(alert.message.as_bytes());
    hex::encode(hasher.finalize())
}
