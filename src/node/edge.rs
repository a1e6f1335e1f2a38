//! Edge node orchestration.
//!
//! An edge node is one server in front of the shared ledger. Sensor data
//! goes through a synchronous pipeline:
//! 1. Threat scan of the raw payload (logged and counted, never blocks)
//! 2. Type validation into a `SensorSnapshot`
//! 3. Classification
//! 4. If an alert is warranted, admission through the ledger
//!
//! Nothing is written to the ledger when classification says no alert.
//! Many nodes may share one `AlertSystem`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::config::NodeConfig;
use crate::decision::engine::{classify, Decision};
use crate::decision::sensor::{validate_sensor_data, SensorSnapshot};
use crate::error::{ErrorCategory, LedgerError, NodeError, RegistryError};
use crate::ledger::alert::AlertRef;
use crate::ledger::alert_system::AlertSystem;
use crate::ledger::events::Subscription;
use crate::logging::structured::LogContext;
use crate::registry::principal::Registries;
use crate::security::scanner::{scan_message, scan_payload, ScanReport};
use crate::storage::jsonl::JsonlAlertStore;
use crate::storage::memory::InMemoryAlertStore;
use crate::storage::repository::AlertStore;
use crate::types::{Address, AlertType, Priority, VehicleCategory};

use super::context::RequestContext;

/// Result of processing one sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingOutcome {
    pub decision: Decision,
    /// Set when the decision raised an alert and the ledger admitted it.
    pub alert: Option<AlertRef>,
}

impl ProcessingOutcome {
    pub fn alert_triggered(&self) -> bool {
        self.alert.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub registered: bool,
    pub category: Option<VehicleCategory>,
    pub trust_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub node_id: String,
    pub server_address: Address,
    pub total_alerts: usize,
    pub recent_alerts: usize,
    pub snapshots_processed: u64,
    pub alerts_triggered: u64,
    pub rejections: u64,
    pub store_failures: u64,
    /// Threat-pattern matches and oversized strings seen in inputs.
    pub security_detections: u64,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    #[serde(flatten)]
    pub status: HealthStatus,
    pub node_id: String,
    pub server_address: Address,
    pub total_alerts: usize,
    pub subscribers: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Debug, Default)]
struct Counters {
    snapshots_processed: AtomicU64,
    alerts_triggered: AtomicU64,
    rejections: AtomicU64,
    store_failures: AtomicU64,
    security_detections: AtomicU64,
}

#[derive(Debug)]
pub struct EdgeNode {
    config: NodeConfig,
    server_address: Address,
    ledger: Arc<AlertSystem>,
    log_ctx: LogContext,
    started_at: Instant,
    counters: Counters,
}

impl EdgeNode {
    pub fn new(config: NodeConfig, server_address: Address, ledger: Arc<AlertSystem>) -> Self {
        let node = Self {
            log_ctx: LogContext::new(&config.node_id),
            config,
            server_address,
            ledger,
            started_at: Instant::now(),
            counters: Counters::default(),
        };
        log::info!(
            "{} EDGE_NODE_STARTED server={} alerts={}",
            node.log_ctx,
            node.server_address,
            node.ledger.count()
        );
        node
    }

    /// Open the ledger named by `config` (JSON-lines file or in-memory) and
    /// start a node over it.
    pub fn open(
        config: NodeConfig,
        server_address: Address,
        registries: Registries,
    ) -> Result<Self, LedgerError> {
        let store: Arc<dyn AlertStore> = match &config.ledger_path {
            Some(path) => Arc::new(JsonlAlertStore::open(path)?),
            None => Arc::new(InMemoryAlertStore::new()),
        };
        let ledger = AlertSystem::open(config.ledger.clone(), registries, store)?;
        Ok(Self::new(config, server_address, Arc::new(ledger)))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn server_address(&self) -> Address {
        self.server_address
    }

    pub fn ledger(&self) -> &Arc<AlertSystem> {
        &self.ledger
    }

    pub fn registries(&self) -> &Registries {
        self.ledger.registries()
    }

    pub fn register_vehicle(
        &self,
        address: Address,
        vehicle_id: &str,
        category: VehicleCategory,
    ) -> Result<(), RegistryError> {
        self.registries()
            .identities()
            .register(address, vehicle_id, category)
    }

    pub fn check_registration(&self, address: &Address) -> RegistrationStatus {
        let identities = self.registries().identities();
        match identities.get(address) {
            Some(record) => RegistrationStatus {
                registered: true,
                category: Some(record.category),
                trust_score: record.trust_score,
            },
            None => RegistrationStatus {
                registered: false,
                category: None,
                trust_score: 0,
            },
        }
    }

    pub fn send_alert(
        &self,
        caller: &Address,
        message: &str,
        alert_type: AlertType,
        priority: Priority,
    ) -> Result<AlertRef, NodeError> {
        let ctx = RequestContext::new(&self.config.node_id, *caller);
        let log_ctx = ctx.log_context();
        self.record_scan(&scan_message(message, &log_ctx));

        let result = self.ledger.send_alert(caller, message, alert_type, priority);
        self.finish(&ctx, &log_ctx, "send_alert", result)
    }

    pub fn emergency_broadcast(
        &self,
        caller: &Address,
        message: &str,
        alert_type: AlertType,
    ) -> Result<AlertRef, NodeError> {
        let ctx = RequestContext::new(&self.config.node_id, *caller);
        let log_ctx = ctx.log_context();
        self.record_scan(&scan_message(message, &log_ctx));

        let result = self.ledger.emergency_broadcast(caller, message, alert_type);
        self.finish(&ctx, &log_ctx, "emergency_broadcast", result)
    }

    /// Relay an alert observed from `origin`, signed off by this node's
    /// own server address.
    pub fn relay_alert(
        &self,
        message: &str,
        alert_type: AlertType,
        priority: Priority,
        origin: &Address,
    ) -> Result<AlertRef, NodeError> {
        let ctx = RequestContext::new(&self.config.node_id, *origin);
        let log_ctx = ctx.log_context();
        self.record_scan(&scan_message(message, &log_ctx));

        let result = self.ledger.relay_alert(
            &self.server_address,
            message,
            alert_type,
            priority,
            origin,
        );
        self.finish(&ctx, &log_ctx, "relay_alert", result)
    }

    /// Validate raw sensor JSON, classify it and, when warranted, raise an
    /// alert on behalf of `caller`.
    pub fn process_sensor_data(
        &self,
        caller: &Address,
        data: &Value,
        is_emergency_vehicle: bool,
    ) -> Result<ProcessingOutcome, NodeError> {
        let ctx = RequestContext::new(&self.config.node_id, *caller);
        let log_ctx = ctx.log_context();
        log::debug!("{} SENSOR_DATA_RECEIVED caller={}", log_ctx, caller);

        self.record_scan(&scan_payload(data, &log_ctx));

        let snapshot = match validate_sensor_data(data) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.counters.rejections.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "{} SENSOR_DATA_INVALID fields={:?}",
                    log_ctx,
                    err.fields()
                );
                return Err(err.into());
            }
        };

        self.run_pipeline(&ctx, &log_ctx, &snapshot, is_emergency_vehicle)
    }

    /// Classify an already-validated snapshot and admit the alert if any.
    pub fn process_snapshot(
        &self,
        caller: &Address,
        snapshot: &SensorSnapshot,
        is_emergency_vehicle: bool,
    ) -> Result<ProcessingOutcome, NodeError> {
        let ctx = RequestContext::new(&self.config.node_id, *caller);
        let log_ctx = ctx.log_context();
        self.run_pipeline(&ctx, &log_ctx, snapshot, is_emergency_vehicle)
    }

    fn run_pipeline(
        &self,
        ctx: &RequestContext,
        log_ctx: &LogContext,
        snapshot: &SensorSnapshot,
        is_emergency_vehicle: bool,
    ) -> Result<ProcessingOutcome, NodeError> {
        self.counters
            .snapshots_processed
            .fetch_add(1, Ordering::Relaxed);

        let decision = classify(snapshot);
        let classification = match decision.classification() {
            Some(c) => c,
            None => {
                log::debug!("{} DECISION_NO_ALERT", log_ctx);
                return Ok(ProcessingOutcome {
                    decision,
                    alert: None,
                });
            }
        };

        log::debug!(
            "{} DECISION_ALERT rule={} type={} priority={}",
            log_ctx,
            classification.rule,
            classification.alert_type,
            classification.priority
        );

        let (operation, result) = if is_emergency_vehicle {
            (
                "emergency_broadcast",
                self.ledger.emergency_broadcast(
                    &ctx.caller,
                    &classification.message,
                    classification.alert_type,
                ),
            )
        } else {
            (
                "send_alert",
                self.ledger.send_alert(
                    &ctx.caller,
                    &classification.message,
                    classification.alert_type,
                    classification.priority,
                ),
            )
        };

        let alert_ref = self.finish(ctx, log_ctx, operation, result)?;
        Ok(ProcessingOutcome {
            decision,
            alert: Some(alert_ref),
        })
    }

    fn record_scan(&self, report: &ScanReport) {
        if !report.is_clean() {
            self.counters
                .security_detections
                .fetch_add(report.total() as u64, Ordering::Relaxed);
        }
    }

    fn finish(
        &self,
        ctx: &RequestContext,
        log_ctx: &LogContext,
        operation: &str,
        result: Result<AlertRef, LedgerError>,
    ) -> Result<AlertRef, NodeError> {
        match result {
            Ok(alert_ref) => {
                self.counters.alerts_triggered.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "{} ALERT_TRIGGERED op={} seq={} elapsed_ms={}",
                    log_ctx,
                    operation,
                    alert_ref.sequence,
                    ctx.elapsed_ms()
                );
                Ok(alert_ref)
            }
            Err(err) => {
                match err.category() {
                    ErrorCategory::Transient | ErrorCategory::Integrity => {
                        self.counters.store_failures.fetch_add(1, Ordering::Relaxed)
                    }
                    ErrorCategory::Validation
                    | ErrorCategory::Authorization
                    | ErrorCategory::NotFound => {
                        self.counters.rejections.fetch_add(1, Ordering::Relaxed)
                    }
                };
                log::warn!(
                    "{} REQUEST_FAILED op={} code={} retryable={}",
                    log_ctx,
                    operation,
                    err.code(),
                    err.is_retryable()
                );
                Err(err.into())
            }
        }
    }

    /// Admitted-alert feed of the shared ledger.
    pub fn subscribe(&self) -> Subscription {
        self.ledger.subscribe()
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            node_id: self.config.node_id.clone(),
            server_address: self.server_address,
            total_alerts: self.ledger.count(),
            recent_alerts: self.ledger.get_recent().len(),
            snapshots_processed: self.counters.snapshots_processed.load(Ordering::Relaxed),
            alerts_triggered: self.counters.alerts_triggered.load(Ordering::Relaxed),
            rejections: self.counters.rejections.load(Ordering::Relaxed),
            store_failures: self.counters.store_failures.load(Ordering::Relaxed),
            security_detections: self.counters.security_detections.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// Degraded when this node cannot relay: its server record is missing
    /// or inactive.
    pub fn health(&self) -> HealthReport {
        let infrastructure = self.registries().infrastructure();
        let status = match infrastructure.get_info(&self.server_address) {
            Ok(record) if record.active => HealthStatus::Healthy,
            Ok(_) => HealthStatus::Degraded {
                reason: "edge server is deactivated".to_string(),
            },
            Err(_) => HealthStatus::Degraded {
                reason: "edge server is not registered".to_string(),
            },
        };
        if let HealthStatus::Degraded { reason } = &status {
            log::warn!("{} HEALTH_DEGRADED reason={:?}", self.log_ctx, reason);
        }

        HealthReport {
            status,
            node_id: self.config.node_id.clone(),
            server_address: self.server_address,
            total_alerts: self.ledger.count(),
            subscribers: self.ledger.subscriber_count(),
        }
    }
}
