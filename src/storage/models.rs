//! Persisted registry models.
//!
//! These records are the rows of the vehicle and edge-server collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::VehicleCategory;

/// One registered vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub vehicle_id: String,
    pub category: VehicleCategory,
    pub registered: bool,
    pub registered_at: DateTime<Utc>,
    /// Always within `0..=100`; starts at 100.
    pub trust_score: u8,
}

/// One registered edge server (roadside unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureRecord {
    pub server_id: String,
    pub location: String,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    /// Always within `0..=100`; starts at 100.
    pub performance_score: u8,
}
