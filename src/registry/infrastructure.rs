//! Edge-server (infrastructure) registry.
//!
//! Independent of vehicle identities. Every mutation is administrative;
//! records are deactivated, never removed.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{RegistryError, ValidationError};
use crate::storage::memory::InMemoryInfrastructureStore;
use crate::storage::models::InfrastructureRecord;
use crate::storage::repository::InfrastructureStore;
use crate::types::{check_score, Address, INITIAL_SCORE};

#[derive(Clone)]
pub struct InfrastructureRegistry {
    store: Arc<dyn InfrastructureStore>,
}

impl std::fmt::Debug for InfrastructureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfrastructureRegistry")
            .field("servers", &self.store.len())
            .finish()
    }
}

impl Default for InfrastructureRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl InfrastructureRegistry {
    pub fn new(store: Arc<dyn InfrastructureStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryInfrastructureStore::new()))
    }

    /// Administrative: register an edge server, active with performance 100.
    pub fn register_server(
        &self,
        server_id: &str,
        address: Address,
        location: &str,
    ) -> Result<(), RegistryError> {
        let server_id = server_id.trim();
        if server_id.is_empty() {
            return Err(ValidationError::InvalidId.into());
        }
        if address.is_zero() {
            return Err(ValidationError::InvalidAddress(address.to_string()).into());
        }

        let record = InfrastructureRecord {
            server_id: server_id.to_string(),
            location: location.trim().to_string(),
            active: true,
            registered_at: Utc::now(),
            performance_score: INITIAL_SCORE,
        };

        if !self.store.insert_new(address, record) {
            log::warn!(
                "SERVER_REGISTER_REJECTED address={} reason=already_registered",
                address
            );
            return Err(RegistryError::AlreadyRegistered(address));
        }

        log::info!(
            "SERVER_REGISTERED address={} server_id={} location={:?}",
            address,
            server_id,
            location
        );
        Ok(())
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.store.get(address).map(|r| r.active).unwrap_or(false)
    }

    pub fn get_info(&self, address: &Address) -> Result<InfrastructureRecord, RegistryError> {
        self.store
            .get(address)
            .ok_or(RegistryError::NotFound(*address))
    }

    /// 0 for unknown addresses.
    pub fn get_performance_score(&self, address: &Address) -> u8 {
        self.store
            .get(address)
            .map(|r| r.performance_score)
            .unwrap_or(0)
    }

    /// Administrative or monitoring: set a server's performance score.
    pub fn update_performance_score(
        &self,
        address: &Address,
        score: u8,
    ) -> Result<(), RegistryError> {
        let score = check_score(score)?;
        self.store.update(address, &mut |record| match record {
            Some(record) => {
                record.performance_score = score;
                Ok(())
            }
            None => Err(RegistryError::NotFound(*address)),
        })?;

        log::info!(
            "PERFORMANCE_SCORE_UPDATED address={} score={}",
            address,
            score
        );
        Ok(())
    }

    /// Unknown addresses are reported as `NotActive`.
    pub fn deactivate(&self, address: &Address) -> Result<(), RegistryError> {
        self.store.update(address, &mut |record| match record {
            Some(record) if record.active => {
                record.active = false;
                Ok(())
            }
            _ => Err(RegistryError::NotActive(*address)),
        })?;

        log::warn!("SERVER_DEACTIVATED address={}", address);
        Ok(())
    }

    pub fn reactivate(&self, address: &Address) -> Result<(), RegistryError> {
        self.store.update(address, &mut |record| match record {
            Some(record) if record.active => Err(RegistryError::AlreadyActive(*address)),
            Some(record) => {
                record.active = true;
                Ok(())
            }
            None => Err(RegistryError::NotFound(*address)),
        })?;

        log::info!("SERVER_REACTIVATED address={}", address);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.store.len()
    }

    /// Address of the `index`-th registered server, in registration order.
    pub fn by_index(&self, index: usize) -> Result<Address, RegistryError> {
        self.store
            .address_at(index)
            .ok_or(RegistryError::IndexOutOfRange {
                index,
                count: self.store.len(),
            })
    }

    /// All server addresses in registration order.
    pub fn addresses(&self) -> Vec<Address> {
        (0..self.store.len())
            .filter_map(|i| self.store.address_at(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn registry_with(servers: &[(&str, u8)]) -> InfrastructureRegistry {
        let registry = InfrastructureRegistry::in_memory();
        for (id, n) in servers {
            registry.register_server(id, addr(*n), "A4 km 12").unwrap();
        }
        registry
    }

    #[test]
    fn test_register_server_defaults() {
        let registry = registry_with(&[("rsu-1", 1)]);
        let info = registry.get_info(&addr(1)).unwrap();
        assert_eq!(info.server_id, "rsu-1");
        assert!(info.active);
        assert_eq!(info.performance_score, 100);
        assert!(registry.is_active(&addr(1)));
    }

    #[test]
    fn test_register_server_rejections() {
        let registry = registry_with(&[("rsu-1", 1)]);
        assert_eq!(
            registry.register_server("rsu-1b", addr(1), "x"),
            Err(RegistryError::AlreadyRegistered(addr(1)))
        );
        assert_eq!(
            registry.register_server("", addr(2), "x"),
            Err(RegistryError::Invalid(ValidationError::InvalidId))
        );
        assert!(matches!(
            registry.register_server("rsu-0", Address::ZERO, "x"),
            Err(RegistryError::Invalid(ValidationError::InvalidAddress(_)))
        ));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_deactivate_reactivate() {
        let registry = registry_with(&[("rsu-1", 1)]);

        registry.deactivate(&addr(1)).unwrap();
        assert!(!registry.is_active(&addr(1)));
        assert_eq!(
            registry.deactivate(&addr(1)),
            Err(RegistryError::NotActive(addr(1)))
        );

        registry.reactivate(&addr(1)).unwrap();
        assert!(registry.is_active(&addr(1)));
        assert_eq!(
            registry.reactivate(&addr(1)),
            Err(RegistryError::AlreadyActive(addr(1)))
        );

        assert_eq!(
            registry.reactivate(&addr(7)),
            Err(RegistryError::NotFound(addr(7)))
        );
        assert_eq!(
            registry.deactivate(&addr(7)),
            Err(RegistryError::NotActive(addr(7)))
        );
        // Deactivation keeps the record.
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_performance_score() {
        let registry = registry_with(&[("rsu-1", 1)]);
        registry.update_performance_score(&addr(1), 42).unwrap();
        assert_eq!(registry.get_performance_score(&addr(1)), 42);
        assert_eq!(
            registry.update_performance_score(&addr(1), 200),
            Err(RegistryError::Invalid(ValidationError::ScoreOutOfRange(200)))
        );
        assert_eq!(
            registry.update_performance_score(&addr(5), 10),
            Err(RegistryError::NotFound(addr(5)))
        );
        assert_eq!(registry.get_performance_score(&addr(5)), 0);
    }

    #[test]
    fn test_enumeration_is_registration_order() {
        let registry = registry_with(&[("rsu-c", 30), ("rsu-a", 10), ("rsu-b", 20)]);
        assert_eq!(registry.count(), 3);
        assert_eq!(registry.by_index(0), Ok(addr(30)));
        assert_eq!(registry.by_index(2), Ok(addr(20)));
        assert_eq!(
            registry.by_index(3),
            Err(RegistryError::IndexOutOfRange { index: 3, count: 3 })
        );
        assert_eq!(registry.addresses(), vec![addr(30), addr(10), addr(20)]);
    }
}
