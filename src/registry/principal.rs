//! Resolved identities.
//!
//! Authorization checks work on `Identity`, a closed set of the three kinds
//! of principal. Adding a kind forces every admission rule to be revisited.

use std::fmt;
use std::sync::Arc;

use crate::registry::identity::IdentityRegistry;
use crate::registry::infrastructure::InfrastructureRegistry;
use crate::types::{Address, VehicleCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    OrdinaryVehicle { address: Address, trust_score: u8 },
    EmergencyVehicle { address: Address, trust_score: u8 },
    EdgeServer { address: Address, active: bool },
}

impl Identity {
    pub fn address(&self) -> Address {
        match self {
            Identity::OrdinaryVehicle { address, .. }
            | Identity::EmergencyVehicle { address, .. }
            | Identity::EdgeServer { address, .. } => *address,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Identity::OrdinaryVehicle { .. } => "ordinary_vehicle",
            Identity::EmergencyVehicle { .. } => "emergency_vehicle",
            Identity::EdgeServer { .. } => "edge_server",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.address())
    }
}

/// Read-side view over both registries, shared by the ledger and edge nodes.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    identities: Arc<IdentityRegistry>,
    infrastructure: Arc<InfrastructureRegistry>,
}

impl Registries {
    pub fn new(
        identities: Arc<IdentityRegistry>,
        infrastructure: Arc<InfrastructureRegistry>,
    ) -> Self {
        Self {
            identities,
            infrastructure,
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn identities(&self) -> &Arc<IdentityRegistry> {
        &self.identities
    }

    pub fn infrastructure(&self) -> &Arc<InfrastructureRegistry> {
        &self.infrastructure
    }

    /// Resolve `address` in the vehicle domain.
    pub fn vehicle(&self, address: &Address) -> Option<Identity> {
        self.identities.get(address).map(|record| match record.category {
            VehicleCategory::Ordinary => Identity::OrdinaryVehicle {
                address: *address,
                trust_score: record.trust_score,
            },
            VehicleCategory::Emergency => Identity::EmergencyVehicle {
                address: *address,
                trust_score: record.trust_score,
            },
        })
    }

    /// Resolve `address` in the infrastructure domain.
    pub fn edge_server(&self, address: &Address) -> Option<Identity> {
        self.infrastructure
            .get_info(address)
            .ok()
            .map(|record| Identity::EdgeServer {
                address: *address,
                active: record.active,
            })
    }
}
