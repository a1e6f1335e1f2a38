//! Per-request context.
//!
//! One `RequestContext` is created for every call into an edge node and
//! carries the ids used to correlate its log lines.

use chrono::{DateTime, Utc};

use crate::logging::structured::{new_request_id, LogContext};
use crate::types::Address;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub node_id: String,
    pub caller: Address,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(node_id: &str, caller: Address) -> Self {
        Self {
            request_id: new_request_id(),
            node_id: node_id.to_string(),
            caller,
            received_at: Utc::now(),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.node_id).with_request(&self.request_id)
    }

    /// Milliseconds since the request was received.
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.received_at).num_milliseconds()
    }
}
