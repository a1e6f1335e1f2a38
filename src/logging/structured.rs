//! Structured logging utilities.
//!
//! Every edge-node request logs with a `[node=..] [req=..]` prefix so lines
//! from concurrent requests can be correlated.

use std::fmt;

use uuid::Uuid;

/// Initialize the process-wide logger. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Logging context for a node, optionally narrowed to one request.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub node_id: String,
    pub request_id: Option<String>,
}

impl LogContext {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            request_id: None,
        }
    }

    pub fn with_request(&self, request_id: &str) -> Self {
        Self {
            node_id: self.node_id.clone(),
            request_id: Some(request_id.to_string()),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request_id {
            Some(rid) => write!(f, "[node={}] [req={}]", self.node_id, rid),
            None => write!(f, "[node={}]", self.node_id),
        }
    }
}

/// `req-` followed by the first 8 hex characters of a v4 UUID.
pub fn new_request_id() -> String {
    format!("req-{}", &Uuid::new_v4().simple().to_string()[..8])
}
