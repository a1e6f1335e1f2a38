//! Threat scanning for alert text and raw sensor payloads.
//!
//! Alert messages travel to every vehicle and dashboard that reads the
//! ledger, so injection-looking content is worth flagging. Scanning only
//! reports: nothing is rejected or rewritten, and the ledger keeps exactly
//! what was admitted.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::logging::structured::LogContext;

/// Strings longer than this inside a sensor payload are counted as oversized.
pub const MAX_SENSOR_STRING_LEN: usize = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    Script,
    Sql,
    Shell,
    PathTraversal,
}

impl ThreatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatKind::Script => "script",
            ThreatKind::Sql => "sql",
            ThreatKind::Shell => "shell",
            ThreatKind::PathTraversal => "path",
        }
    }
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    // Patterns are literals; a failure here is a coding error.
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("threat pattern must compile"))
        .collect()
}

lazy_static! {
    static ref THREAT_PATTERNS: Vec<(ThreatKind, Vec<Regex>)> = vec![
        (
            ThreatKind::Script,
            compile(&[
                r"(?i)<script[^>]*>",
                r"(?i)javascript:",
                r"(?i)on\w+\s*=",
                r"(?i)<iframe[^>]*>",
            ]),
        ),
        (
            ThreatKind::Sql,
            compile(&[
                r"(?i)'\s*(or|and)\s*'?\d",
                r"(?i);\s*(drop|delete|truncate|alter)\s",
                r"(?i)union\s+(all\s+)?select",
            ]),
        ),
        (
            ThreatKind::Shell,
            compile(&[
                r";\s*(rm|cat|wget|curl|chmod)\s",
                r"\|\s*(bash|sh|zsh)",
                r"`[^`]+`",
                r"\$\([^)]+\)",
            ]),
        ),
        (
            ThreatKind::PathTraversal,
            compile(&[r"\.\.[\\/]", r"[\\/]etc[\\/](passwd|shadow)"]),
        ),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub detections: Vec<ThreatKind>,
    pub oversized: usize,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.detections.is_empty() && self.oversized == 0
    }

    /// Threat matches plus oversized strings.
    pub fn total(&self) -> usize {
        self.detections.len() + self.oversized
    }

    pub fn count(&self, kind: ThreatKind) -> usize {
        self.detections.iter().filter(|k| **k == kind).count()
    }

    fn log(&self, ctx: &LogContext, source: &str) {
        if self.is_clean() {
            log::debug!("{} SCAN_CLEAN source={}", ctx, source);
            return;
        }
        log::warn!(
            "{} SECURITY_DETECTIONS source={} script={} sql={} shell={} path={} oversized={}",
            ctx,
            source,
            self.count(ThreatKind::Script),
            self.count(ThreatKind::Sql),
            self.count(ThreatKind::Shell),
            self.count(ThreatKind::PathTraversal),
            self.oversized
        );
    }
}

fn scan_str(s: &str, report: &mut ScanReport) {
    for (kind, patterns) in THREAT_PATTERNS.iter() {
        if patterns.iter().any(|p| p.is_match(s)) {
            report.detections.push(*kind);
        }
    }
}

/// Scan one alert message. Each threat kind is reported at most once.
pub fn scan_message(message: &str, ctx: &LogContext) -> ScanReport {
    let mut report = ScanReport::default();
    scan_str(message, &mut report);
    report.log(ctx, "message");
    report
}

/// Scan every string (keys included) in a raw sensor payload.
pub fn scan_payload(payload: &Value, ctx: &LogContext) -> ScanReport {
    let mut report = ScanReport::default();
    walk(payload, &mut report);
    report.log(ctx, "sensor_data");
    report
}

fn walk(value: &Value, report: &mut ScanReport) {
    match value {
        Value::String(s) => {
            if s.len() > MAX_SENSOR_STRING_LEN {
                report.oversized += 1;
            }
            scan_str(s, report);
        }
        Value::Array(items) => items.iter().for_each(|item| walk(item, report)),
        Value::Object(obj) => {
            for (key, val) in obj {
                scan_str(key, report);
                walk(val, report);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
