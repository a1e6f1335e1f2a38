//! Alert classification.
//!
//! Maps a validated sensor snapshot to an alert type and priority.

use std::fmt;

use serde::Serialize;

use crate::decision::sensor::{RoadCondition, SensorSnapshot, WeatherCondition};
use crate::types::{AlertType, Priority};

pub const LOW_VISIBILITY_PERCENT: f64 = 50.0;
pub const ICE_RISK_CELSIUS: f64 = -5.0;
pub const ASPHALT_RISK_CELSIUS: f64 = 50.0;
pub const SPEED_LIMIT_KMH: f64 = 120.0;

/// The rule that produced a classification, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Collision,
    LowVisibility,
    IceRisk,
    AsphaltRisk,
    HeavyRain,
    SnowOrIce,
    Fog,
    RoadObstruction,
    Construction,
    Speeding,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Collision => "collision",
            Rule::LowVisibility => "low_visibility",
            Rule::IceRisk => "ice_risk",
            Rule::AsphaltRisk => "asphalt_risk",
            Rule::HeavyRain => "heavy_rain",
            Rule::SnowOrIce => "snow_or_ice",
            Rule::Fog => "fog",
            Rule::RoadObstruction => "road_obstruction",
            Rule::Construction => "construction",
            Rule::Speeding => "speeding",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub rule: Rule,
    pub alert_type: AlertType,
    pub priority: Priority,
    pub message: String,
}

/// Outcome of classifying one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    NoAlert,
    Alert(Classification),
}

impl Decision {
    pub fn should_alert(&self) -> bool {
        matches!(self, Decision::Alert(_))
    }

    pub fn classification(&self) -> Option<&Classification> {
        match self {
            Decision::Alert(c) => Some(c),
            Decision::NoAlert => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Alert(c) => c.rule.as_str(),
            Decision::NoAlert => "no_alert",
        }
    }
}

fn alert(rule: Rule, alert_type: AlertType, priority: Priority, message: String) -> Decision {
    Decision::Alert(Classification {
        rule,
        alert_type,
        priority,
        message,
    })
}

/// Classify a snapshot.
///
/// # Rule order
/// First match wins; later rules are not evaluated.
/// 1. collision                      -> ACCIDENT / CRITICAL
/// 2. visibility < 50 %              -> HAZARD / HIGH
/// 3. temperature < -5 °C            -> HAZARD / HIGH
/// 4. temperature > 50 °C            -> HAZARD / MEDIUM
/// 5. weather HEAVY_RAIN             -> HAZARD / HIGH
/// 6. weather SNOW or ICE            -> HAZARD / HIGH
/// 7. weather FOG                    -> HAZARD / MEDIUM
/// 8. road POTHOLE or DEBRIS         -> HAZARD / MEDIUM
/// 9. road CONSTRUCTION              -> CONGESTION / MEDIUM
/// 10. speed > 120 km/h              -> CONGESTION / LOW
/// 11. otherwise                     -> no alert
pub fn classify(snapshot: &SensorSnapshot) -> Decision {
    if snapshot.collision == Some(true) {
        return alert(
            Rule::Collision,
            AlertType::Accident,
            Priority::Critical,
            "Collision detected".to_string(),
        );
    }

    if let Some(visibility) = snapshot.visibility {
        if visibility < LOW_VISIBILITY_PERCENT {
            return alert(
                Rule::LowVisibility,
                AlertType::Hazard,
                Priority::High,
                format!("Low visibility: {}%", visibility),
            );
        }
    }

    if let Some(temperature) = snapshot.temperature {
        if temperature < ICE_RISK_CELSIUS {
            return alert(
                Rule::IceRisk,
                AlertType::Hazard,
                Priority::High,
                format!("Ice risk: temperature {}°C", temperature),
            );
        }
        if temperature > ASPHALT_RISK_CELSIUS {
            return alert(
                Rule::AsphaltRisk,
                AlertType::Hazard,
                Priority::Medium,
                format!("Asphalt damage risk: temperature {}°C", temperature),
            );
        }
    }

    match &snapshot.weather_condition {
        Some(WeatherCondition::HeavyRain) => {
            return alert(
                Rule::HeavyRain,
                AlertType::Hazard,
                Priority::High,
                "Heavy rain reported".to_string(),
            );
        }
        Some(WeatherCondition::Snow) | Some(WeatherCondition::Ice) => {
            return alert(
                Rule::SnowOrIce,
                AlertType::Hazard,
                Priority::High,
                "Snow or ice on the road".to_string(),
            );
        }
        Some(WeatherCondition::Fog) => {
            return alert(
                Rule::Fog,
                AlertType::Hazard,
                Priority::Medium,
                "Fog reported".to_string(),
            );
        }
        _ => {}
    }

    match &snapshot.road_condition {
        Some(RoadCondition::Pothole) => {
            return alert(
                Rule::RoadObstruction,
                AlertType::Hazard,
                Priority::Medium,
                "Pothole on the road".to_string(),
            );
        }
        Some(RoadCondition::Debris) => {
            return alert(
                Rule::RoadObstruction,
                AlertType::Hazard,
                Priority::Medium,
                "Debris on the road".to_string(),
            );
        }
        Some(RoadCondition::Construction) => {
            return alert(
                Rule::Construction,
                AlertType::Congestion,
                Priority::Medium,
                "Construction zone ahead".to_string(),
            );
        }
        _ => {}
    }

    if let Some(speed) = snapshot.speed {
        if speed > SPEED_LIMIT_KMH {
            return alert(
                Rule::Speeding,
                AlertType::Congestion,
                Priority::Low,
                format!("Excessive speed: {} km/h", speed),
            );
        }
    }

    Decision::NoAlert
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(decision: &Decision) -> Option<(Rule, AlertType, Priority)> {
        decision
            .classification()
            .map(|c| (c.rule, c.alert_type, c.priority))
    }

    #[test]
    fn test_collision_dominates_speed() {
        let snapshot = SensorSnapshot {
            collision: Some(true),
            speed: Some(200.0),
            ..Default::default()
        };
        assert_eq!(
            kind(&classify(&snapshot)),
            Some((Rule::Collision, AlertType::Accident, Priority::Critical))
        );
    }

    #[test]
    fn test_visibility_precedes_temperature() {
        let snapshot = SensorSnapshot {
            visibility: Some(30.0),
            temperature: Some(-10.0),
            ..Default::default()
        };
        let decision = classify(&snapshot);
        assert_eq!(
            kind(&decision),
            Some((Rule::LowVisibility, AlertType::Hazard, Priority::High))
        );
        assert_eq!(decision.classification().unwrap().message, "Low visibility: 30%");
    }

    #[test]
    fn test_each_rule() {
        let cases = vec![
            (
                SensorSnapshot { temperature: Some(-6.0), ..Default::default() },
                Some((Rule::IceRisk, AlertType::Hazard, Priority::High)),
            ),
            (
                SensorSnapshot { temperature: Some(51.0), ..Default::default() },
                Some((Rule::AsphaltRisk, AlertType::Hazard, Priority::Medium)),
            ),
            (
                SensorSnapshot {
                    weather_condition: Some(WeatherCondition::HeavyRain),
                    ..Default::default()
                },
                Some((Rule::HeavyRain, AlertType::Hazard, Priority::High)),
            ),
            (
                SensorSnapshot {
                    weather_condition: Some(WeatherCondition::Ice),
                    ..Default::default()
                },
                Some((Rule::SnowOrIce, AlertType::Hazard, Priority::High)),
            ),
            (
                SensorSnapshot {
                    weather_condition: Some(WeatherCondition::Fog),
                    ..Default::default()
                },
                Some((Rule::Fog, AlertType::Hazard, Priority::Medium)),
            ),
            (
                SensorSnapshot {
                    road_condition: Some(RoadCondition::Debris),
                    ..Default::default()
                },
                Some((Rule::RoadObstruction, AlertType::Hazard, Priority::Medium)),
            ),
            (
                SensorSnapshot {
                    road_condition: Some(RoadCondition::Construction),
                    ..Default::default()
                },
                Some((Rule::Construction, AlertType::Congestion, Priority::Medium)),
            ),
            (
                SensorSnapshot { speed: Some(121.0), ..Default::default() },
                Some((Rule::Speeding, AlertType::Congestion, Priority::Low)),
            ),
        ];

        for (snapshot, expected) in cases {
            assert_eq!(kind(&classify(&snapshot)), expected, "{:?}", snapshot);
        }
    }

    #[test]
    fn test_thresholds_are_strict() {
        let at_limits = SensorSnapshot {
            visibility: Some(50.0),
            temperature: Some(-5.0),
            speed: Some(120.0),
            ..Default::default()
        };
        assert_eq!(classify(&at_limits), Decision::NoAlert);

        let hot_limit = SensorSnapshot {
            temperature: Some(50.0),
            ..Default::default()
        };
        assert_eq!(classify(&hot_limit), Decision::NoAlert);
    }

    #[test]
    fn test_no_alert_for_calm_snapshot() {
        let snapshot = SensorSnapshot {
            speed: Some(80.0),
            temperature: Some(20.0),
            visibility: Some(95.0),
            collision: Some(false),
            weather_condition: Some(WeatherCondition::Clear),
            road_condition: Some(RoadCondition::Normal),
        };
        let decision = classify(&snapshot);
        assert!(!decision.should_alert());
        assert_eq!(decision.as_str(), "no_alert");
    }

    #[test]
    fn test_unknown_conditions_match_nothing() {
        let snapshot = SensorSnapshot {
            weather_condition: Some(WeatherCondition::Other("sandstorm".to_string())),
            road_condition: Some(RoadCondition::Other("gravel".to_string())),
            ..Default::default()
        };
        assert_eq!(classify(&snapshot), Decision::NoAlert);
    }

    #[test]
    fn test_environment_outranks_road() {
        let snapshot = SensorSnapshot {
            weather_condition: Some(WeatherCondition::Fog),
            road_condition: Some(RoadCondition::Pothole),
            speed: Some(150.0),
            ..Default::default()
        };
        assert_eq!(kind(&classify(&snapshot)).map(|k| k.0), Some(Rule::Fog));
    }
}
