//! Repository traits.
//!
//! Registries and the ledger take these as injected `Arc<dyn ..>` handles,
//! so every node or test harness can supply an isolated instance.
//!
//! Registry stores model a local replica: reads are infallible and
//! `update` runs its closure atomically with respect to other writers.
//! The alert store is the shared substrate and may fail transiently.

use std::time::Instant;

use crate::error::{RegistryError, StoreError};
use crate::ledger::alert::LedgerEntry;
use crate::storage::models::{IdentityRecord, InfrastructureRecord};
use crate::types::Address;

/// Closure applied to a record under the store's write lock.
/// Receives `None` when the address has no record.
pub type RecordUpdate<'a, R> = &'a mut dyn FnMut(Option<&mut R>) -> Result<(), RegistryError>;

pub trait IdentityStore: Send + Sync {
    fn get(&self, address: &Address) -> Option<IdentityRecord>;

    /// Insert a record unless the address already has one. Returns `false`
    /// when the address was already present.
    fn insert_new(&self, address: Address, record: IdentityRecord) -> bool;

    fn update(
        &self,
        address: &Address,
        f: RecordUpdate<'_, IdentityRecord>,
    ) -> Result<(), RegistryError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait InfrastructureStore: Send + Sync {
    fn get(&self, address: &Address) -> Option<InfrastructureRecord>;

    /// Insert a record unless the address already has one. Enumeration order
    /// is insertion order.
    fn insert_new(&self, address: Address, record: InfrastructureRecord) -> bool;

    fn update(
        &self,
        address: &Address,
        f: RecordUpdate<'_, InfrastructureRecord>,
    ) -> Result<(), RegistryError>;

    fn len(&self) -> usize;

    fn address_at(&self, index: usize) -> Option<Address>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only, single-logical-writer alert substrate.
pub trait AlertStore: Send + Sync {
    /// Durably append `entry`. Must either acknowledge before `deadline` or
    /// fail with a transient error; an acknowledged entry is permanent.
    fn append(&self, entry: &LedgerEntry, deadline: Instant) -> Result<(), StoreError>;

    /// Every acknowledged entry, in sequence order.
    fn load(&self) -> Result<Vec<LedgerEntry>, StoreError>;
}
