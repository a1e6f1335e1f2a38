//! Python bindings.
//!
//! `EdgeNodeHandle` wraps one in-process edge node over in-memory
//! registries. Validation and authorization failures raise `ValueError`;
//! transient store failures raise `RuntimeError` so callers can retry.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use serde::Serialize;
use serde_json::Value;

use crate::config::NodeConfig;
use crate::decision::engine::classify;
use crate::decision::sensor::validate_sensor_data;
use crate::error::{NodeError, RegistryError, ValidationError};
use crate::ledger::alert::AlertRef;
use crate::logging::structured::init_logger;
use crate::node::edge::EdgeNode;
use crate::registry::principal::Registries;
use crate::types::{Address, AlertType, Priority, VehicleCategory};

fn node_err(err: NodeError) -> PyErr {
    let message = format!("{}: {}", err.code(), err);
    if err.is_retryable() {
        PyRuntimeError::new_err(message)
    } else {
        PyValueError::new_err(message)
    }
}

fn registry_err(err: RegistryError) -> PyErr {
    PyValueError::new_err(format!("{}: {}", err.code(), err))
}

fn address(raw: &str) -> PyResult<Address> {
    Address::parse(raw).map_err(|e: ValidationError| PyValueError::new_err(e.to_string()))
}

fn alert_type(raw: &str) -> PyResult<AlertType> {
    AlertType::parse(raw)
        .ok_or_else(|| PyValueError::new_err(format!("unknown alert type: {:?}", raw)))
}

fn priority(raw: &str) -> PyResult<Priority> {
    Priority::parse(raw).ok_or_else(|| PyValueError::new_err(format!("unknown priority: {:?}", raw)))
}

fn category(is_emergency: bool) -> VehicleCategory {
    if is_emergency {
        VehicleCategory::Emergency
    } else {
        VehicleCategory::Ordinary
    }
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

fn parse_json(raw: &str) -> PyResult<Value> {
    serde_json::from_str(raw).map_err(|e| PyValueError::new_err(format!("invalid JSON: {}", e)))
}

fn alert_ref_dict(py: Python<'_>, alert_ref: &AlertRef) -> PyResult<Py<PyAny>> {
    let dict = PyDict::new(py);
    dict.set_item("sequence", alert_ref.sequence)?;
    dict.set_item("entry_hash", &alert_ref.entry_hash)?;
    Ok(dict.into())
}

#[pyclass]
pub struct EdgeNodeHandle {
    node: EdgeNode,
}

#[pymethods]
impl EdgeNodeHandle {
    /// Start a node. Settings not given here come from `IOV_*` variables.
    #[new]
    fn new(node_id: String, server_address: String) -> PyResult<Self> {
        init_logger();

        let mut config = NodeConfig::from_env().map_err(|e| PyValueError::new_err(e.to_string()))?;
        config.node_id = node_id;
        config
            .validate()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;

        let server = address(&server_address)?;
        let node = EdgeNode::open(config, server, Registries::in_memory())
            .map_err(|e| node_err(e.into()))?;
        Ok(Self { node })
    }

    #[pyo3(signature = (address_hex, vehicle_id, is_emergency=false))]
    fn register_vehicle(&self, address_hex: &str, vehicle_id: &str, is_emergency: bool) -> PyResult<()> {
        self.node
            .register_vehicle(address(address_hex)?, vehicle_id, category(is_emergency))
            .map_err(registry_err)
    }

    fn register_server(&self, server_id: &str, address_hex: &str, location: &str) -> PyResult<()> {
        self.node
            .registries()
            .infrastructure()
            .register_server(server_id, address(address_hex)?, location)
            .map_err(registry_err)
    }

    /// Returns the processing outcome as a JSON string.
    #[pyo3(signature = (caller, sensor_json, is_emergency_vehicle=false))]
    fn process_sensor_data(
        &self,
        caller: &str,
        sensor_json: &str,
        is_emergency_vehicle: bool,
    ) -> PyResult<String> {
        let data = parse_json(sensor_json)?;
        let outcome = self
            .node
            .process_sensor_data(&address(caller)?, &data, is_emergency_vehicle)
            .map_err(node_err)?;
        to_json(&outcome)
    }

    fn send_alert(
        &self,
        py: Python<'_>,
        caller: &str,
        message: &str,
        alert_type_name: &str,
        priority_name: &str,
    ) -> PyResult<Py<PyAny>> {
        let alert_ref = self
            .node
            .send_alert(
                &address(caller)?,
                message,
                alert_type(alert_type_name)?,
                priority(priority_name)?,
            )
            .map_err(node_err)?;
        alert_ref_dict(py, &alert_ref)
    }

    fn emergency_broadcast(
        &self,
        py: Python<'_>,
        caller: &str,
        message: &str,
        alert_type_name: &str,
    ) -> PyResult<Py<PyAny>> {
        let alert_ref = self
            .node
            .emergency_broadcast(&address(caller)?, message, alert_type(alert_type_name)?)
            .map_err(node_err)?;
        alert_ref_dict(py, &alert_ref)
    }

    fn relay_alert(
        &self,
        py: Python<'_>,
        message: &str,
        alert_type_name: &str,
        priority_name: &str,
        origin: &str,
    ) -> PyResult<Py<PyAny>> {
        let alert_ref = self
            .node
            .relay_alert(
                message,
                alert_type(alert_type_name)?,
                priority(priority_name)?,
                &address(origin)?,
            )
            .map_err(node_err)?;
        alert_ref_dict(py, &alert_ref)
    }

    /// Recent alerts, oldest first, as a JSON array.
    fn recent_alerts(&self) -> PyResult<String> {
        to_json(&self.node.ledger().get_recent())
    }

    fn stats(&self) -> PyResult<String> {
        to_json(&self.node.stats())
    }

    fn health(&self) -> PyResult<String> {
        to_json(&self.node.health())
    }
}

/// Classify a sensor reading without touching any ledger.
#[pyfunction]
fn classify_sensor_data(sensor_json: &str) -> PyResult<String> {
    let data = parse_json(sensor_json)?;
    let snapshot = validate_sensor_data(&data).map_err(|e| node_err(e.into()))?;
    to_json(&classify(&snapshot))
}

/// Python module definition
#[pymodule]
fn iov_alert_core(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<EdgeNodeHandle>()?;
    m.add_function(wrap_pyfunction!(classify_sensor_data, m)?)?;
    Ok(())
}
