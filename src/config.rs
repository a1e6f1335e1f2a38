//! Node and ledger configuration.
//!
//! Defaults carry the admission policy constants; `from_env` lets an edge
//! deployment override them with `IOV_*` variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::types::MAX_SCORE;

/// Capacity of the recent-alerts ring.
pub const DEFAULT_RECENT_CAPACITY: usize = 100;

/// Longest accepted alert message, in characters.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 500;

/// Trust scores below this may only raise CRITICAL direct alerts.
pub const DEFAULT_LOW_TRUST_THRESHOLD: u8 = 50;

pub const DEFAULT_APPEND_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Admission policy and store limits for the alert ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub recent_capacity: usize,
    pub max_message_len: usize,
    pub low_trust_threshold: u8,
    pub append_timeout: Duration,
    /// How far a subscriber may fall behind before it starts losing events.
    pub subscriber_buffer: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            recent_capacity: DEFAULT_RECENT_CAPACITY,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            low_trust_threshold: DEFAULT_LOW_TRUST_THRESHOLD,
            append_timeout: Duration::from_millis(DEFAULT_APPEND_TIMEOUT_MS),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub node_id: String,
    pub ledger: LedgerConfig,
    /// JSON-lines ledger file; `None` keeps the ledger in memory.
    pub ledger_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "edge-0".to_string(),
            ledger: LedgerConfig::default(),
            ledger_path: None,
        }
    }
}

impl NodeConfig {
    pub fn with_node_id(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from `IOV_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Missing keys keep their defaults; present but unparsable keys fail.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(node_id) = lookup("IOV_NODE_ID") {
            config.node_id = node_id.trim().to_string();
        }
        if let Some(capacity) = parse_var(&lookup, "IOV_RECENT_CAPACITY")? {
            config.ledger.recent_capacity = capacity;
        }
        if let Some(max_len) = parse_var(&lookup, "IOV_MAX_MESSAGE_LEN")? {
            config.ledger.max_message_len = max_len;
        }
        if let Some(threshold) = parse_var(&lookup, "IOV_LOW_TRUST_THRESHOLD")? {
            config.ledger.low_trust_threshold = threshold;
        }
        if let Some(timeout_ms) = parse_var::<u64, _>(&lookup, "IOV_APPEND_TIMEOUT_MS")? {
            config.ledger.append_timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(buffer) = parse_var(&lookup, "IOV_SUBSCRIBER_BUFFER")? {
            config.ledger.subscriber_buffer = buffer;
        }
        if let Some(path) = lookup("IOV_LEDGER_PATH").filter(|p| !p.trim().is_empty()) {
            config.ledger_path = Some(PathBuf::from(path.trim()));
        }

        config.validate()?;

        log::info!(
            "CONFIG_LOADED node_id={} recent_capacity={} low_trust_threshold={} append_timeout_ms={} ledger_path={:?}",
            config.node_id,
            config.ledger.recent_capacity,
            config.ledger.low_trust_threshold,
            config.ledger.append_timeout.as_millis(),
            config.ledger_path
        );

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_id.is_empty() {
            bail!("node_id must not be empty");
        }
        if self.ledger.subscriber_buffer == 0 {
            bail!("subscriber_buffer must be at least 1");
        }
        if self.ledger.recent_capacity == 0 {
            bail!("recent_capacity must be at least 1");
        }
        if self.ledger.max_message_len == 0 {
            bail!("max_message_len must be at least 1");
        }
        if self.ledger.low_trust_threshold > MAX_SCORE {
            bail!(
                "low_trust_threshold {} exceeds {}",
                self.ledger.low_trust_threshold,
                MAX_SCORE
            );
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("{} has invalid value {:?}", key, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
