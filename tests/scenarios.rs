//! End-to-end admission scenarios across registries, ledger and edge nodes.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde_json::json;

use iov_alert_core::decision::{classify, Rule, SensorSnapshot};
use iov_alert_core::error::{AuthorizationError, ErrorCategory, LedgerError, StoreError};
use iov_alert_core::ledger::{AdmissionPath, AlertSystem, LedgerEntry};
use iov_alert_core::storage::{AlertStore, JsonlAlertStore};
use iov_alert_core::{
    Address, AlertType, EdgeNode, LedgerConfig, NodeConfig, Priority, Registries, VehicleCategory,
};

fn addr(n: u8) -> Address {
    Address::from_bytes([n; 20])
}

fn registries() -> Registries {
    let registries = Registries::in_memory();
    registries
        .identities()
        .register(addr(1), "V1", VehicleCategory::Ordinary)
        .unwrap();
    registries
        .identities()
        .register(addr(2), "V2", VehicleCategory::Emergency)
        .unwrap();
    registries
        .infrastructure()
        .register_server("rsu-1", addr(100), "junction 4")
        .unwrap();
    registries
}

fn ledger() -> AlertSystem {
    AlertSystem::in_memory(LedgerConfig::default(), registries())
}

#[test]
fn scenario_a_ordinary_vehicle_alert_admitted() {
    let ledger = ledger();
    ledger
        .send_alert(&addr(1), "Pothole ahead", AlertType::Hazard, Priority::Medium)
        .unwrap();

    let all = ledger.get_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].message, "Pothole ahead");
    assert_eq!(all[0].alert_type, AlertType::Hazard);
    assert_eq!(all[0].priority, Priority::Medium);
    assert_eq!(all[0].origin, addr(1));
    assert!(!all[0].is_emergency_broadcast);
}

#[test]
fn scenario_b_trust_gate_ignores_category_on_direct_send() {
    let ledger = ledger();
    ledger
        .registries()
        .identities()
        .update_trust_score(&addr(2), 30)
        .unwrap();

    let err = ledger
        .send_alert(&addr(2), "test", AlertType::Hazard, Priority::Low)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Authorization(AuthorizationError::LowTrustRestricted {
            trust_score: 30,
            threshold: 50
        })
    );
    assert_eq!(err.category(), ErrorCategory::Authorization);

    // The broadcast path is not gated.
    ledger
        .emergency_broadcast(&addr(2), "test", AlertType::Emergency)
        .unwrap();
    assert_eq!(ledger.count(), 1);
}

#[test]
fn scenario_c_collision_dominates_speed() {
    let decision = classify(&SensorSnapshot {
        collision: Some(true),
        speed: Some(200.0),
        ..Default::default()
    });
    let c = decision.classification().unwrap();
    assert_eq!((c.alert_type, c.priority), (AlertType::Accident, Priority::Critical));
}

#[test]
fn scenario_d_visibility_precedes_temperature() {
    let decision = classify(&SensorSnapshot {
        visibility: Some(30.0),
        temperature: Some(-10.0),
        ..Default::default()
    });
    let c = decision.classification().unwrap();
    assert_eq!(c.rule, Rule::LowVisibility);
    assert_eq!((c.alert_type, c.priority), (AlertType::Hazard, Priority::High));
}

#[test]
fn scenario_e_deactivated_relayer_rejected() {
    let ledger = ledger();
    ledger
        .registries()
        .infrastructure()
        .deactivate(&addr(100))
        .unwrap();

    let err = ledger
        .relay_alert(&addr(100), "Debris", AlertType::Hazard, Priority::High, &addr(1))
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::Authorization(AuthorizationError::UnauthorizedRelayer)
    );
    assert_eq!(ledger.count(), 0);
}

#[test]
fn relay_attributes_alert_to_origin_vehicle() {
    let ledger = ledger();
    let alert_ref = ledger
        .relay_alert(&addr(100), "Debris", AlertType::Hazard, Priority::High, &addr(1))
        .unwrap();

    let entry = ledger.get(alert_ref.sequence).unwrap();
    assert_eq!(entry.alert.origin, addr(1));
    assert_ne!(entry.alert.origin, addr(100));
    assert_eq!(entry.path, AdmissionPath::Relay { relayer: addr(100) });
}

#[test]
fn vehicle_cannot_relay_and_server_cannot_send() {
    let ledger = ledger();
    assert_eq!(
        ledger
            .relay_alert(&addr(1), "x", AlertType::Hazard, Priority::Low, &addr(2))
            .unwrap_err(),
        LedgerError::Authorization(AuthorizationError::UnauthorizedRelayer)
    );
    assert_eq!(
        ledger
            .send_alert(&addr(100), "x", AlertType::Hazard, Priority::Critical)
            .unwrap_err(),
        LedgerError::Authorization(AuthorizationError::Unauthorized)
    );
}

#[test]
fn concurrent_nodes_share_one_total_order() {
    let config = LedgerConfig {
        subscriber_buffer: 256,
        ..LedgerConfig::default()
    };
    let ledger = Arc::new(AlertSystem::in_memory(config, registries()));
    let mut sub = ledger.subscribe();
    let nodes: Vec<Arc<EdgeNode>> = (0..4)
        .map(|i| {
            Arc::new(EdgeNode::new(
                NodeConfig::with_node_id(&format!("edge-{}", i)),
                addr(100),
                Arc::clone(&ledger),
            ))
        })
        .collect();

    let handles: Vec<_> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let node = Arc::clone(node);
            thread::spawn(move || {
                for j in 0..50 {
                    node.send_alert(
                        &addr(1),
                        &format!("node {} alert {}", i, j),
                        AlertType::Congestion,
                        Priority::Low,
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = ledger.entries();
    assert_eq!(entries.len(), 200);
    for (index, entry) in entries.iter().enumerate() {
        assert_eq!(entry.sequence, index as u64);
    }
    ledger.verify_chain().unwrap();

    let messages: HashSet<String> = entries.iter().map(|e| e.alert.message.clone()).collect();
    assert_eq!(messages.len(), 200);

    let events = sub.drain();
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (0..200).collect::<Vec<u64>>());
    assert_eq!(sub.lagged(), 0);
    assert_eq!(ledger.get_recent().len(), 100);
}

struct FlakyStore;

impl AlertStore for FlakyStore {
    fn append(&self, _entry: &LedgerEntry, _deadline: Instant) -> Result<(), StoreError> {
        Err(StoreError::Timeout(std::time::Duration::from_millis(5)))
    }

    fn load(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(Vec::new())
    }
}

#[test]
fn store_timeout_is_retryable_not_a_rejection() {
    let ledger = Arc::new(
        AlertSystem::open(LedgerConfig::default(), registries(), Arc::new(FlakyStore)).unwrap(),
    );
    let node = EdgeNode::new(NodeConfig::default(), addr(100), ledger);

    let err = node
        .process_sensor_data(&addr(1), &json!({"collision": true}), false)
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), "STORE_TIMEOUT");

    let stats = node.stats();
    assert_eq!(stats.store_failures, 1);
    assert_eq!(stats.rejections, 0);
    assert_eq!(stats.total_alerts, 0);
}

#[test]
fn jsonl_ledger_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.jsonl");
    let registries = registries();

    let first_head = {
        let store = Arc::new(JsonlAlertStore::open(&path).unwrap());
        let ledger = AlertSystem::open(LedgerConfig::default(), registries.clone(), store).unwrap();
        ledger
            .send_alert(&addr(1), "Pothole ahead", AlertType::Hazard, Priority::Medium)
            .unwrap();
        ledger
            .emergency_broadcast(&addr(2), "Ambulance inbound", AlertType::Emergency)
            .unwrap();
        ledger
            .relay_alert(&addr(100), "Debris", AlertType::Hazard, Priority::High, &addr(1))
            .unwrap();
        ledger.head_hash()
    };

    let store = Arc::new(JsonlAlertStore::open(&path).unwrap());
    let reopened = AlertSystem::open(LedgerConfig::default(), registries, store).unwrap();
    assert_eq!(reopened.count(), 3);
    assert_eq!(reopened.head_hash(), first_head);
    assert_eq!(reopened.get_emergency_only().len(), 1);
    assert_eq!(reopened.get_by_origin(&addr(1)).len(), 2);

    let next = reopened
        .send_alert(&addr(1), "Clear again", AlertType::Congestion, Priority::Low)
        .unwrap();
    assert_eq!(next.sequence, 3);
}

#[test]
fn edge_node_opens_configured_ledger_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        ledger_path: Some(dir.path().join("ledger.jsonl")),
        ..NodeConfig::with_node_id("edge-file")
    };

    let node = EdgeNode::open(config.clone(), addr(100), registries()).unwrap();
    node.process_sensor_data(&addr(1), &json!({"roadCondition": "debris"}), false)
        .unwrap();
    drop(node);

    let node = EdgeNode::open(config, addr(100), registries()).unwrap();
    assert_eq!(node.stats().total_alerts, 1);
    assert!(node.health().is_healthy());
}

#[test]
fn second_node_on_same_ledger_file_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        ledger_path: Some(dir.path().join("ledger.jsonl")),
        ..NodeConfig::with_node_id("edge-a")
    };

    let first = EdgeNode::open(config.clone(), addr(100), registries()).unwrap();
    let err = EdgeNode::open(
        NodeConfig {
            node_id: "edge-b".to_string(),
            ..config.clone()
        },
        addr(100),
        registries(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "STORE_LOCKED");
    assert!(err.is_retryable());

    first
        .send_alert(&addr(1), "Pothole ahead", AlertType::Hazard, Priority::Medium)
        .unwrap();
    first
        .send_alert(&addr(1), "Debris ahead", AlertType::Hazard, Priority::High)
        .unwrap();
    drop(first);

    // Once the first writer is gone the file reopens with one unbroken chain.
    let second = EdgeNode::open(config, addr(100), registries()).unwrap();
    let next = second
        .send_alert(&addr(1), "Clear again", AlertType::Congestion, Priority::Low)
        .unwrap();
    assert_eq!(next.sequence, 2);
    second.ledger().verify_chain().unwrap();
}
