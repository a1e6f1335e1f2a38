//! The shared alert ledger.
//!
//! Three write paths (direct send, emergency broadcast, relay) share one
//! append path. Authorization runs first against the registries as they
//! stand at call time; rejected alerts never touch the lock. Admitted
//! alerts are sealed into the hash chain, acknowledged by the store, then
//! committed to the in-memory views and published, all under the write
//! lock so every reader and subscriber observes one total order.
//!
//! Nothing is committed locally until the store acknowledges. A caller that
//! gives up before then leaves no trace; after it, the entry is permanent.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;

use crate::config::LedgerConfig;
use crate::error::{LedgerError, StoreError};
use crate::ledger::admission::AdmissionPolicy;
use crate::ledger::alert::{AdmissionPath, Alert, AlertRef, LedgerEntry, GENESIS_HASH};
use crate::ledger::events::{AlertEvent, EventBus, Subscription};
use crate::ledger::ring::RecentBuffer;
use crate::registry::principal::Registries;
use crate::storage::memory::InMemoryAlertStore;
use crate::storage::repository::AlertStore;
use crate::types::{Address, AlertType, Priority};

struct LedgerState {
    history: Vec<LedgerEntry>,
    recent: RecentBuffer<Alert>,
}

impl LedgerState {
    fn head_hash(&self) -> &str {
        self.history
            .last()
            .map(|entry| entry.entry_hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }
}

/// Fields of an authorized alert that is not yet sealed.
struct Draft<'a> {
    message: &'a str,
    origin: Address,
    alert_type: AlertType,
    priority: Priority,
    is_emergency_broadcast: bool,
}

pub struct AlertSystem {
    config: LedgerConfig,
    policy: AdmissionPolicy,
    registries: Registries,
    store: Arc<dyn AlertStore>,
    state: RwLock<LedgerState>,
    events: EventBus,
}

impl std::fmt::Debug for AlertSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSystem")
            .field("config", &self.config)
            .field("count", &self.count())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}

impl AlertSystem {
    /// Open a ledger over `store`, replaying and re-verifying every
    /// acknowledged entry.
    pub fn open(
        config: LedgerConfig,
        registries: Registries,
        store: Arc<dyn AlertStore>,
    ) -> Result<Self, LedgerError> {
        let history = store.load()?;
        verify_entries(&history)?;

        let mut recent = RecentBuffer::new(config.recent_capacity);
        for entry in &history {
            recent.push(entry.alert.clone());
        }

        let state = LedgerState { history, recent };
        log::info!(
            "LEDGER_OPENED entries={} head={}",
            state.history.len(),
            &state.head_hash()[..12]
        );

        Ok(Self {
            policy: AdmissionPolicy::from(&config),
            events: EventBus::new(config.subscriber_buffer),
            config,
            registries,
            store,
            state: RwLock::new(state),
        })
    }

    /// A fresh ledger backed by an in-memory store.
    pub fn in_memory(config: LedgerConfig, registries: Registries) -> Self {
        let state = LedgerState {
            history: Vec::new(),
            recent: RecentBuffer::new(config.recent_capacity),
        };
        Self {
            policy: AdmissionPolicy::from(&config),
            events: EventBus::new(config.subscriber_buffer),
            config,
            registries,
            store: Arc::new(InMemoryAlertStore::new()),
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Direct alert from a registered vehicle, subject to the trust gate.
    pub fn send_alert(
        &self,
        caller: &Address,
        message: &str,
        alert_type: AlertType,
        priority: Priority,
    ) -> Result<AlertRef, LedgerError> {
        let path = AdmissionPath::Direct;
        self.policy
            .admit_direct(self.registries.vehicle(caller), message, priority)
            .map_err(|e| rejected(path, caller, e))?;

        self.append(
            Draft {
                message,
                origin: *caller,
                alert_type,
                priority,
                is_emergency_broadcast: false,
            },
            path,
        )
    }

    /// Broadcast from an emergency vehicle. Always CRITICAL; no trust gate.
    pub fn emergency_broadcast(
        &self,
        caller: &Address,
        message: &str,
        alert_type: AlertType,
    ) -> Result<AlertRef, LedgerError> {
        let path = AdmissionPath::EmergencyBroadcast;
        self.policy
            .admit_emergency(self.registries.vehicle(caller), message)
            .map_err(|e| rejected(path, caller, e))?;

        self.append(
            Draft {
                message,
                origin: *caller,
                alert_type,
                priority: Priority::Critical,
                is_emergency_broadcast: true,
            },
            path,
        )
    }

    /// Alert submitted by an active edge server on behalf of `origin`.
    /// The alert is attributed to `origin`; the relayer is kept on the entry.
    pub fn relay_alert(
        &self,
        relayer: &Address,
        message: &str,
        alert_type: AlertType,
        priority: Priority,
        origin: &Address,
    ) -> Result<AlertRef, LedgerError> {
        let path = AdmissionPath::Relay { relayer: *relayer };
        self.policy
            .admit_relay(
                self.registries.edge_server(relayer),
                self.registries.vehicle(origin),
                message,
            )
            .map_err(|e| rejected(path, relayer, e))?;

        self.append(
            Draft {
                message,
                origin: *origin,
                alert_type,
                priority,
                is_emergency_broadcast: false,
            },
            path,
        )
    }

    fn append(&self, draft: Draft<'_>, path: AdmissionPath) -> Result<AlertRef, LedgerError> {
        let deadline = Instant::now() + self.config.append_timeout;
        let mut state = match self.state.try_write_until(deadline) {
            Some(state) => state,
            None => {
                log::warn!(
                    "ALERT_APPEND_TIMEOUT path={} origin={} waited_ms={}",
                    path.as_str(),
                    draft.origin,
                    self.config.append_timeout.as_millis()
                );
                return Err(StoreError::Timeout(self.config.append_timeout).into());
            }
        };

        let sequence = state.history.len() as u64;
        let alert = Alert {
            message: draft.message.to_string(),
            origin: draft.origin,
            timestamp: Utc::now(),
            alert_type: draft.alert_type,
            priority: draft.priority,
            is_emergency_broadcast: draft.is_emergency_broadcast,
        };
        let entry = LedgerEntry::seal(sequence, alert, path, state.head_hash());

        if let Err(err) = self.store.append(&entry, deadline) {
            log::error!(
                "ALERT_APPEND_FAILED seq={} path={} transient={} error={}",
                sequence,
                path.as_str(),
                err.is_transient(),
                err
            );
            return Err(err.into());
        }

        log::info!(
            "ALERT_ADMITTED seq={} path={} type={} priority={} origin={}",
            sequence,
            path.as_str(),
            entry.alert.alert_type,
            entry.alert.priority,
            entry.alert.origin
        );

        let alert_ref = entry.alert_ref();
        let event = AlertEvent::from(&entry);
        state.recent.push(entry.alert.clone());
        state.history.push(entry);
        self.events.publish(&event);

        Ok(alert_ref)
    }

    /// Full history, append order.
    pub fn get_all(&self) -> Vec<Alert> {
        let state = self.state.read();
        state.history.iter().map(|e| e.alert.clone()).collect()
    }

    /// Contents of the recent ring, oldest first.
    pub fn get_recent(&self) -> Vec<Alert> {
        self.state.read().recent.to_vec()
    }

    pub fn get_by_type(&self, alert_type: AlertType) -> Vec<Alert> {
        self.filtered(|alert| alert.alert_type == alert_type)
    }

    pub fn get_emergency_only(&self) -> Vec<Alert> {
        self.filtered(|alert| alert.is_emergency_broadcast)
    }

    pub fn get_by_origin(&self, origin: &Address) -> Vec<Alert> {
        self.filtered(|alert| alert.origin == *origin)
    }

    fn filtered(&self, keep: impl Fn(&Alert) -> bool) -> Vec<Alert> {
        let state = self.state.read();
        state
            .history
            .iter()
            .map(|e| &e.alert)
            .filter(|alert| keep(*alert))
            .cloned()
            .collect()
    }

    pub fn get(&self, sequence: u64) -> Option<LedgerEntry> {
        let index = usize::try_from(sequence).ok()?;
        self.state.read().history.get(index).cloned()
    }

    /// Sealed entries from `sequence` onwards, for pollers catching up.
    pub fn entries_since(&self, sequence: u64) -> Vec<LedgerEntry> {
        let state = self.state.read();
        let start = usize::try_from(sequence)
            .unwrap_or(usize::MAX)
            .min(state.history.len());
        state.history[start..].to_vec()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.state.read().history.clone()
    }

    pub fn count(&self) -> usize {
        self.state.read().history.len()
    }

    pub fn head_hash(&self) -> String {
        self.state.read().head_hash().to_string()
    }

    /// Re-verify every entry and chain link.
    pub fn verify_chain(&self) -> Result<(), StoreError> {
        verify_entries(&self.state.read().history)
    }

    /// Receive one event per alert admitted from now on.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }
}

fn rejected(path: AdmissionPath, caller: &Address, err: LedgerError) -> LedgerError {
    log::warn!(
        "ALERT_REJECTED path={} caller={} code={} category={}",
        path.as_str(),
        caller,
        err.code(),
        err.category().as_str()
    );
    err
}

/// Check sequence numbers, hashes and links. Lines are 1-based.
fn verify_entries(entries: &[LedgerEntry]) -> Result<(), StoreError> {
    let mut prev_hash = GENESIS_HASH;
    for (index, entry) in entries.iter().enumerate() {
        let line = index + 1;
        if entry.sequence != index as u64 {
            return Err(StoreError::Corrupt {
                line,
                reason: format!("sequence {} at position {}", entry.sequence, index),
            });
        }
        if entry.prev_hash != prev_hash {
            return Err(StoreError::Corrupt {
                line,
                reason: "broken chain link".to_string(),
            });
        }
        if !entry.verify() {
            return Err(StoreError::Corrupt {
                line,
                reason: "entry hash mismatch".to_string(),
            });
        }
        prev_hash = &entry.entry_hash;
    }
    Ok(())
}
