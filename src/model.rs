//! Core data model shared by every component of the monitor
//!
//! All types serialize with camelCase field names so snapshots can be handed to
//! a dashboard frontend unchanged.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MonitorError, MonitorResult};

/// Source used for events the monitor raises about itself
pub const SYSTEM_SOURCE: &str = "monitoring-system";

/// Kind of fact a [`MonitoringEvent`] records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Violation,
    Improvement,
    Alert,
    Metric,
    Trend,
}

/// Severity of a [`MonitoringEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl EventSeverity {
    /// Error and critical events count as issues (dashboard, alerting)
    pub fn is_issue(self) -> bool {
        matches!(self, EventSeverity::Error | EventSeverity::Critical)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub category: String,
    pub tags: Vec<String>,
}

/// An immutable fact observed by the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: EventType,

    pub severity: EventSeverity,

    pub timestamp: DateTime<Utc>,

    /// File path, or [`SYSTEM_SOURCE`]
    pub source: String,

    pub message: String,

    /// Opaque payload, shape depends on the producer
    pub data: serde_json::Value,

    pub metadata: EventMetadata,
}

impl MonitoringEvent {
    pub fn new(
        event_type: EventType,
        severity: EventSeverity,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            severity,
            timestamp: Utc::now(),
            source: source.into(),
            message: message.into(),
            data: serde_json::Value::Null,
            metadata: EventMetadata::default(),
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_metadata(mut self, category: impl Into<String>, tags: Vec<String>) -> Self {
        self.metadata = EventMetadata {
            category: category.into(),
            tags,
        };
        self
    }
}

/// Category a metric rolls up into for health scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Compliance,
    Performance,
    Quality,
    Security,
}

impl MetricCategory {
    pub const ALL: [MetricCategory; 4] = [
        MetricCategory::Compliance,
        MetricCategory::Performance,
        MetricCategory::Quality,
        MetricCategory::Security,
    ];
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricCategory::Compliance => "compliance",
            MetricCategory::Performance => "performance",
            MetricCategory::Quality => "quality",
            MetricCategory::Security => "security",
        };
        f.write_str(name)
    }
}

/// Short-window direction of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// Warning and critical bounds for a percent-style score, lower is worse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThreshold {
    pub warning: f64,
    pub critical: f64,
}

impl AlertThreshold {
    /// Build a threshold, rejecting values that cannot be evaluated
    ///
    /// Both bounds must be finite, inside `0..=100`, and `critical` may not be
    /// above `warning`.
    pub fn new(metric: &str, warning: f64, critical: f64) -> MonitorResult<Self> {
        let threshold = Self { warning, critical };
        threshold.validate(metric)?;
        Ok(threshold)
    }

    pub fn validate(&self, metric: &str) -> MonitorResult<()> {
        let invalid = |reason: String| MonitorError::InvalidThreshold {
            metric: metric.to_string(),
            reason,
        };

        for (label, value) in [("warning", self.warning), ("critical", self.critical)] {
            if !value.is_finite() {
                return Err(invalid(format!("{label} bound is not a finite number")));
            }
            if !(0.0..=100.0).contains(&value) {
                return Err(invalid(format!("{label} bound {value} is outside 0..=100")));
            }
        }

        if self.critical > self.warning {
            return Err(invalid(format!(
                "critical bound {} is above warning bound {}",
                self.critical, self.warning
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricMetadata {
    pub description: String,
    pub impact: String,
    pub recommendations: Vec<String>,
}

/// A point-in-time measurement derived from one analyzer's score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureMetric {
    pub name: String,

    /// Score in `0..=100`
    pub value: f64,

    pub unit: String,

    pub timestamp: DateTime<Utc>,

    pub category: MetricCategory,

    pub trend: Trend,

    pub threshold: AlertThreshold,

    pub metadata: MetricMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Threshold,
    Anomaly,
    Violation,
    Trend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertActions {
    pub immediate: Vec<String>,
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
}

/// A stateful notification, open until explicitly resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringAlert {
    pub id: String,

    #[serde(rename = "type")]
    pub alert_type: AlertType,

    pub severity: AlertSeverity,

    pub title: String,

    pub description: String,

    pub timestamp: DateTime<Utc>,

    pub source: String,

    pub data: serde_json::Value,

    pub actions: AlertActions,

    pub resolved: bool,

    pub resolved_at: Option<DateTime<Utc>>,

    pub resolved_by: Option<String>,
}

/// Severity reported by an analyzer for a single finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single issue detected by an analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: ViolationSeverity,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Violation {
    pub fn new(severity: ViolationSeverity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
            file: None,
            line: None,
            rule: None,
        }
    }
}

/// Result of analyzing the whole tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeReport {
    /// Compliance score in `0..=100`
    pub score: f64,
    pub violations: Vec<Violation>,
}

/// Result of analyzing a single file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub violations: Vec<Violation>,
}
