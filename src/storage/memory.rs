//! In-memory stores.
//!
//! Registry stores sit behind `parking_lot::RwLock`; the alert store behind a
//! `Mutex` whose acquisition is bounded by the caller's deadline.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::error::{RegistryError, StoreError};
use crate::ledger::alert::LedgerEntry;
use crate::storage::models::{IdentityRecord, InfrastructureRecord};
use crate::storage::repository::{AlertStore, IdentityStore, InfrastructureStore, RecordUpdate};
use crate::types::Address;

#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    records: RwLock<HashMap<Address, IdentityRecord>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn get(&self, address: &Address) -> Option<IdentityRecord> {
        self.records.read().get(address).cloned()
    }

    fn insert_new(&self, address: Address, record: IdentityRecord) -> bool {
        let mut records = self.records.write();
        if records.contains_key(&address) {
            return false;
        }
        records.insert(address, record);
        true
    }

    fn update(
        &self,
        address: &Address,
        f: RecordUpdate<'_, IdentityRecord>,
    ) -> Result<(), RegistryError> {
        let mut records = self.records.write();
        f(records.get_mut(address))
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}

#[derive(Debug, Default)]
struct InfrastructureTable {
    records: HashMap<Address, InfrastructureRecord>,
    order: Vec<Address>,
}

#[derive(Debug, Default)]
pub struct InMemoryInfrastructureStore {
    table: RwLock<InfrastructureTable>,
}

impl InMemoryInfrastructureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InfrastructureStore for InMemoryInfrastructureStore {
    fn get(&self, address: &Address) -> Option<InfrastructureRecord> {
        self.table.read().records.get(address).cloned()
    }

    fn insert_new(&self, address: Address, record: InfrastructureRecord) -> bool {
        let mut table = self.table.write();
        if table.records.contains_key(&address) {
            return false;
        }
        table.records.insert(address, record);
        table.order.push(address);
        true
    }

    fn update(
        &self,
        address: &Address,
        f: RecordUpdate<'_, InfrastructureRecord>,
    ) -> Result<(), RegistryError> {
        let mut table = self.table.write();
        f(table.records.get_mut(address))
    }

    fn len(&self) -> usize {
        self.table.read().order.len()
    }

    fn address_at(&self, index: usize) -> Option<Address> {
        self.table.read().order.get(index).copied()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertStore for InMemoryAlertStore {
    fn append(&self, entry: &LedgerEntry, deadline: Instant) -> Result<(), StoreError> {
        let started = Instant::now();
        let mut entries = self
            .entries
            .try_lock_until(deadline)
            .ok_or_else(|| StoreError::Timeout(deadline.saturating_duration_since(started)))?;

        let expected = entries.len() as u64;
        if entry.sequence != expected {
            return Err(StoreError::Corrupt {
                line: entry.sequence as usize,
                reason: format!("expected sequence {}, got {}", expected, entry.sequence),
            });
        }
        entries.push(entry.clone());
        Ok(())
    }

    fn load(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.entries.lock().clone())
    }
}
