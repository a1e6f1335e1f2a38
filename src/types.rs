//! Shared domain types.
//!
//! Addresses identify both vehicles and edge servers; the two registries
//! keep them in separate authorization domains.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound for trust and performance scores.
pub const MAX_SCORE: u8 = 100;

/// Score given to every freshly registered vehicle or server.
pub const INITIAL_SCORE: u8 = MAX_SCORE;

/// A 20-byte account address, rendered as lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse a hex address, with or without the `0x` prefix.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let bytes = hex::decode(digits).map_err(|_| ValidationError::InvalidAddress(s.to_string()))?;
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| ValidationError::InvalidAddress(s.to_string()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Vehicle category as held by the identity registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleCategory {
    Ordinary,
    Emergency,
}

impl VehicleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleCategory::Ordinary => "ORDINARY",
            VehicleCategory::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    Accident,
    Hazard,
    Congestion,
    Emergency,
}

impl AlertType {
    pub const ALL: [AlertType; 4] = [
        AlertType::Accident,
        AlertType::Hazard,
        AlertType::Congestion,
        AlertType::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Accident => "ACCIDENT",
            AlertType::Hazard => "HAZARD",
            AlertType::Congestion => "CONGESTION",
            AlertType::Emergency => "EMERGENCY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert priority. Variant order is severity order, so `Ord` compares severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check a score against the `0..=100` range.
pub fn check_score(score: u8) -> Result<u8, ValidationError> {
    if score > MAX_SCORE {
        return Err(ValidationError::ScoreOutOfRange(score));
    }
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr = Address::parse("0x00000000000000000000000000000000000000Ab").unwrap();
        assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000ab");

        let bare = Address::parse("00000000000000000000000000000000000000ab").unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn test_address_parse_rejects_bad_input() {
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("not an address").is_err());
        assert!(Address::parse("").is_err());
    }

    #[test]
    fn test_address_serde() {
        let addr = Address::from_bytes([7u8; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_priority_order_is_severity() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(AlertType::parse("hazard"), Some(AlertType::Hazard));
        assert_eq!(Priority::parse("CRITICAL"), Some(Priority::Critical));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn test_check_score() {
        assert!(check_score(0).is_ok());
        assert!(check_score(100).is_ok());
        assert!(matches!(check_score(101), Err(ValidationError::ScoreOutOfRange(101))));
    }
}
