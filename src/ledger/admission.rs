//! Admission rules for the three write paths.
//!
//! Each rule matches every `Identity` kind explicitly. Checks run in a fixed
//! order so the first failing rule is the one reported.

use crate::config::LedgerConfig;
use crate::error::{AuthorizationError, LedgerError, ValidationError};
use crate::registry::principal::Identity;
use crate::types::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub low_trust_threshold: u8,
    pub max_message_len: usize,
}

impl From<&LedgerConfig> for AdmissionPolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            low_trust_threshold: config.low_trust_threshold,
            max_message_len: config.max_message_len,
        }
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl AdmissionPolicy {
    /// Message must hold 1..=max_message_len characters.
    pub fn check_message(&self, message: &str) -> Result<(), ValidationError> {
        let len = message.chars().count();
        if len == 0 {
            return Err(ValidationError::EmptyMessage);
        }
        if len > self.max_message_len {
            return Err(ValidationError::MessageTooLong {
                len,
                max: self.max_message_len,
            });
        }
        Ok(())
    }

    /// Direct send: registered vehicle, valid message, then the trust gate.
    /// The trust gate applies to emergency vehicles too.
    pub fn admit_direct(
        &self,
        caller: Option<Identity>,
        message: &str,
        priority: Priority,
    ) -> Result<(), LedgerError> {
        let trust_score = match caller {
            Some(Identity::OrdinaryVehicle { trust_score, .. })
            | Some(Identity::EmergencyVehicle { trust_score, .. }) => trust_score,
            Some(Identity::EdgeServer { .. }) | None => {
                return Err(AuthorizationError::Unauthorized.into())
            }
        };

        self.check_message(message)?;

        if trust_score < self.low_trust_threshold && priority != Priority::Critical {
            return Err(AuthorizationError::LowTrustRestricted {
                trust_score,
                threshold: self.low_trust_threshold,
            }
            .into());
        }
        Ok(())
    }

    /// Emergency broadcast: registered emergency vehicle, valid message.
    /// No trust gate.
    pub fn admit_emergency(&self, caller: Option<Identity>, message: &str) -> Result<(), LedgerError> {
        match caller {
            Some(Identity::EmergencyVehicle { .. }) => {}
            Some(Identity::OrdinaryVehicle { .. }) => {
                return Err(AuthorizationError::NotEmergencyVehicle.into())
            }
            Some(Identity::EdgeServer { .. }) | None => {
                return Err(AuthorizationError::Unauthorized.into())
            }
        }

        self.check_message(message)?;
        Ok(())
    }

    /// Relay: active edge server relaying for a registered vehicle, valid
    /// message. No trust gate on either side.
    pub fn admit_relay(
        &self,
        relayer: Option<Identity>,
        origin: Option<Identity>,
        message: &str,
    ) -> Result<(), LedgerError> {
        match relayer {
            Some(Identity::EdgeServer { active: true, .. }) => {}
            Some(Identity::EdgeServer { active: false, .. })
            | Some(Identity::OrdinaryVehicle { .. })
            | Some(Identity::EmergencyVehicle { .. })
            | None => return Err(AuthorizationError::UnauthorizedRelayer.into()),
        }

        match origin {
            Some(Identity::OrdinaryVehicle { .. }) | Some(Identity::EmergencyVehicle { .. }) => {}
            Some(Identity::EdgeServer { .. }) | None => {
                return Err(AuthorizationError::OriginNotRegistered.into())
            }
        }

        self.check_message(message)?;
        Ok(())
    }
}
