//! Vehicle identity registry.
//!
//! Registration is self-service (first request wins); trust score and
//! category changes are administrative and come only from the control plane.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{RegistryError, ValidationError};
use crate::storage::memory::InMemoryIdentityStore;
use crate::storage::models::IdentityRecord;
use crate::storage::repository::IdentityStore;
use crate::types::{check_score, Address, VehicleCategory, INITIAL_SCORE};

#[derive(Clone)]
pub struct IdentityRegistry {
    store: Arc<dyn IdentityStore>,
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("vehicles", &self.store.len())
            .finish()
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryIdentityStore::new()))
    }

    /// Register a vehicle. Fails if the address is already registered or
    /// `vehicle_id` is blank. Trust starts at 100.
    pub fn register(
        &self,
        address: Address,
        vehicle_id: &str,
        category: VehicleCategory,
    ) -> Result<(), RegistryError> {
        let vehicle_id = vehicle_id.trim();
        if vehicle_id.is_empty() {
            log::warn!("VEHICLE_REGISTER_REJECTED address={} reason=invalid_id", address);
            return Err(ValidationError::InvalidId.into());
        }

        let record = IdentityRecord {
            vehicle_id: vehicle_id.to_string(),
            category,
            registered: true,
            registered_at: Utc::now(),
            trust_score: INITIAL_SCORE,
        };

        if !self.store.insert_new(address, record) {
            log::warn!(
                "VEHICLE_REGISTER_REJECTED address={} reason=already_registered",
                address
            );
            return Err(RegistryError::AlreadyRegistered(address));
        }

        log::info!(
            "VEHICLE_REGISTERED address={} vehicle_id={} category={}",
            address,
            vehicle_id,
            category
        );
        Ok(())
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.store.get(address).map(|r| r.registered).unwrap_or(false)
    }

    pub fn get(&self, address: &Address) -> Option<IdentityRecord> {
        self.store.get(address).filter(|r| r.registered)
    }

    pub fn get_category(&self, address: &Address) -> Result<VehicleCategory, RegistryError> {
        self.get(address)
            .map(|r| r.category)
            .ok_or(RegistryError::NotRegistered(*address))
    }

    /// False for unregistered and ordinary vehicles.
    pub fn is_emergency_vehicle(&self, address: &Address) -> bool {
        matches!(self.get_category(address), Ok(VehicleCategory::Emergency))
    }

    /// 0 for unregistered addresses.
    pub fn get_trust_score(&self, address: &Address) -> u8 {
        self.get(address).map(|r| r.trust_score).unwrap_or(0)
    }

    /// Administrative: set a vehicle's trust score.
    pub fn update_trust_score(&self, address: &Address, score: u8) -> Result<(), RegistryError> {
        let score = check_score(score)?;
        let mut previous = 0;
        self.store.update(address, &mut |record| match record {
            Some(record) if record.registered => {
                previous = record.trust_score;
                record.trust_score = score;
                Ok(())
            }
            _ => Err(RegistryError::NotRegistered(*address)),
        })?;

        log::info!(
            "TRUST_SCORE_UPDATED address={} previous={} current={}",
            address,
            previous,
            score
        );
        Ok(())
    }

    /// Administrative: change a vehicle's category.
    pub fn update_category(
        &self,
        address: &Address,
        category: VehicleCategory,
    ) -> Result<(), RegistryError> {
        self.store.update(address, &mut |record| match record {
            Some(record) if record.registered => {
                record.category = category;
                Ok(())
            }
            _ => Err(RegistryError::NotRegistered(*address)),
        })?;

        log::info!(
            "VEHICLE_CATEGORY_UPDATED address={} category={}",
            address,
            category
        );
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.store.len()
    }
}
