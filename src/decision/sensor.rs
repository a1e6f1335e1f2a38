//! Sensor snapshots and the input validation pass.
//!
//! Validation runs before classification. It type-checks each known field
//! and reports every bad field at once; it never raises alerts.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherCondition {
    Clear,
    Rain,
    HeavyRain,
    Snow,
    Ice,
    Fog,
    Other(String),
}

impl WeatherCondition {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "CLEAR" => WeatherCondition::Clear,
            "RAIN" => WeatherCondition::Rain,
            "HEAVY_RAIN" => WeatherCondition::HeavyRain,
            "SNOW" => WeatherCondition::Snow,
            "ICE" => WeatherCondition::Ice,
            "FOG" => WeatherCondition::Fog,
            _ => WeatherCondition::Other(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoadCondition {
    Normal,
    Pothole,
    Debris,
    Construction,
    Other(String),
}

impl RoadCondition {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "NORMAL" => RoadCondition::Normal,
            "POTHOLE" => RoadCondition::Pothole,
            "DEBRIS" => RoadCondition::Debris,
            "CONSTRUCTION" => RoadCondition::Construction,
            _ => RoadCondition::Other(raw.to_string()),
        }
    }
}

/// "heavy rain", "heavy-rain" and "HEAVY_RAIN" all normalize to `HEAVY_RAIN`.
fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// One reading from a vehicle. Every field is optional; an absent field
/// skips the rules that depend on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSnapshot {
    /// km/h
    pub speed: Option<f64>,
    /// °C
    pub temperature: Option<f64>,
    /// percent
    pub visibility: Option<f64>,
    pub collision: Option<bool>,
    pub weather_condition: Option<WeatherCondition>,
    pub road_condition: Option<RoadCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub expected: &'static str,
    pub found: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} must be a {}, got {}", self.field, self.expected, self.found)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid sensor data: {}", join_errors(.errors))]
pub struct SensorValidationError {
    pub errors: Vec<FieldError>,
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl SensorValidationError {
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Look up a field by its camelCase name, falling back to snake_case.
/// `null` counts as absent.
fn lookup<'a, 'n>(
    obj: &'a Map<String, Value>,
    camel: &'n str,
    snake: &'n str,
) -> Option<(&'n str, &'a Value)> {
    [camel, snake]
        .into_iter()
        .find_map(|name| obj.get(name).map(|value| (name, value)))
        .filter(|(_, value)| !value.is_null())
}

fn number_field(
    obj: &Map<String, Value>,
    name: &str,
    errors: &mut Vec<FieldError>,
) -> Option<f64> {
    let (key, value) = lookup(obj, name, name)?;
    match value.as_f64() {
        Some(n) => Some(n),
        None => {
            errors.push(FieldError {
                field: key.to_string(),
                expected: "number",
                found: json_type(value),
            });
            None
        }
    }
}

fn string_field<'a>(
    obj: &'a Map<String, Value>,
    camel: &str,
    snake: &str,
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    let (key, value) = lookup(obj, camel, snake)?;
    match value.as_str() {
        Some(s) => Some(s),
        None => {
            errors.push(FieldError {
                field: key.to_string(),
                expected: "string",
                found: json_type(value),
            });
            None
        }
    }
}

/// Type-check raw sensor data and build a snapshot.
///
/// Unknown fields (gps, acceleration, ...) are ignored.
pub fn validate_sensor_data(data: &Value) -> Result<SensorSnapshot, SensorValidationError> {
    let obj = match data.as_object() {
        Some(obj) => obj,
        None => {
            return Err(SensorValidationError {
                errors: vec![FieldError {
                    field: "sensorData".to_string(),
                    expected: "object",
                    found: json_type(data),
                }],
            })
        }
    };

    let mut errors = Vec::new();

    let speed = number_field(obj, "speed", &mut errors);
    let temperature = number_field(obj, "temperature", &mut errors);
    let visibility = number_field(obj, "visibility", &mut errors);

    let collision = match lookup(obj, "collision", "collision") {
        Some((_, Value::Bool(b))) => Some(*b),
        Some((key, other)) => {
            errors.push(FieldError {
                field: key.to_string(),
                expected: "boolean",
                found: json_type(other),
            });
            None
        }
        None => None,
    };

    let weather_condition = string_field(obj, "weatherCondition", "weather_condition", &mut errors)
        .map(WeatherCondition::parse);
    let road_condition = string_field(obj, "roadCondition", "road_condition", &mut errors)
        .map(RoadCondition::parse);

    if !errors.is_empty() {
        return Err(SensorValidationError { errors });
    }

    Ok(SensorSnapshot {
        speed,
        temperature,
        visibility,
        collision,
        weather_condition,
        road_condition,
    })
}
