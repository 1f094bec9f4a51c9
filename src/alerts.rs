//! Alert evaluation and lifecycle
//!
//! Alerts come from two sources with different de-duplication rules:
//!
//! ```text
//! metric value <= critical           → threshold alert, severity critical
//! metric value <= warning            → threshold alert, severity high
//!   open threshold alert for metric? → update its data, never duplicate
//!
//! event severity critical            → violation alert, severity critical
//! event severity error               → violation alert, severity high
//!   (every qualifying event opens a new alert)
//! ```
//!
//! Alerts are only closed through [`AlertManager::resolve_alert`]; a recovered
//! metric does not resolve anything on its own.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::MonitorResult;
use crate::model::{
    AlertActions, AlertSeverity, AlertThreshold, AlertType, ArchitectureMetric, EventSeverity,
    MonitoringAlert, MonitoringEvent,
};

const LONG_TERM_GUIDANCE: [&str; 3] = [
    "Review architecture guidelines with the team",
    "Add automated compliance checks to the CI pipeline",
    "Schedule regular architecture review sessions",
];

/// Owns thresholds and every alert raised during the monitor's lifetime
#[derive(Debug, Default)]
pub struct AlertManager {
    thresholds: HashMap<String, AlertThreshold>,

    /// All alerts in creation order, resolved ones included
    alerts: Vec<MonitoringAlert>,

    /// Metric name → id of its open threshold alert
    open_threshold_alerts: HashMap<String, String>,
}

impl AlertManager {
    pub fn new(thresholds: HashMap<String, AlertThreshold>) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn threshold(&self, metric: &str) -> Option<AlertThreshold> {
        self.thresholds.get(metric).copied()
    }

    /// Override the threshold of a metric
    ///
    /// Malformed bounds are rejected, never clamped.
    pub fn set_threshold(&mut self, metric: &str, warning: f64, critical: f64) -> MonitorResult<()> {
        let threshold = AlertThreshold::new(metric, warning, critical)?;
        debug!("threshold for {metric} set to warning={warning}, critical={critical}");
        self.thresholds.insert(metric.to_string(), threshold);
        Ok(())
    }

    /// Evaluate metrics against their thresholds
    ///
    /// Returns the alerts opened by this call. Breaches of a metric that already
    /// has an open threshold alert refresh that alert instead.
    pub fn evaluate_thresholds(&mut self, metrics: &[ArchitectureMetric]) -> Vec<MonitoringAlert> {
        let mut opened = vec![];

        for metric in metrics {
            let Some(threshold) = self.thresholds.get(&metric.name).copied() else {
                trace!("no threshold configured for {}, skipping", metric.name);
                continue;
            };

            let severity = if metric.value <= threshold.critical {
                AlertSeverity::Critical
            } else if metric.value <= threshold.warning {
                AlertSeverity::High
            } else {
                continue;
            };

            let data = json!({
                "metric": metric.name,
                "value": metric.value,
                "threshold": threshold,
                "category": metric.category,
                "observedAt": metric.timestamp,
            });

            if let Some(existing) = self.open_threshold_alert_mut(&metric.name) {
                trace!("{} still breaching, refreshing open alert {}", metric.name, existing.id);
                existing.severity = existing.severity.max(severity);
                existing.data = data;
                continue;
            }

            let recommendations = &metric.metadata.recommendations;
            let bound = match severity {
                AlertSeverity::Critical => threshold.critical,
                _ => threshold.warning,
            };

            let alert = MonitoringAlert {
                id: Uuid::new_v4().to_string(),
                alert_type: AlertType::Threshold,
                severity,
                title: format!("{} below threshold", metric.name),
                description: format!(
                    "{} is {:.1}{} (threshold: {:.1})",
                    metric.name, metric.value, unit_suffix(&metric.unit), bound
                ),
                timestamp: Utc::now(),
                source: metric.name.clone(),
                data,
                actions: AlertActions {
                    immediate: slice(recommendations, 0, 2),
                    short_term: slice(recommendations, 2, 4),
                    long_term: LONG_TERM_GUIDANCE.iter().map(|s| s.to_string()).collect(),
                },
                resolved: false,
                resolved_at: None,
                resolved_by: None,
            };

            debug!("opened {:?} threshold alert for {}", severity, metric.name);
            self.open_threshold_alerts
                .insert(metric.name.clone(), alert.id.clone());
            self.alerts.push(alert.clone());
            opened.push(alert);
        }

        opened
    }

    /// Open a violation alert for an error or critical event
    pub fn evaluate_event(&mut self, event: &MonitoringEvent) -> Option<MonitoringAlert> {
        let severity = match event.severity {
            EventSeverity::Critical => AlertSeverity::Critical,
            EventSeverity::Error => AlertSeverity::High,
            EventSeverity::Warning | EventSeverity::Info => return None,
        };

        let alert = MonitoringAlert {
            id: Uuid::new_v4().to_string(),
            alert_type: AlertType::Violation,
            severity,
            title: format!("Architecture violation in {}", event.source),
            description: event.message.clone(),
            timestamp: Utc::now(),
            source: event.source.clone(),
            data: json!({
                "eventId": event.id,
                "event": event.data,
            }),
            actions: AlertActions {
                immediate: vec![format!("Review the reported violations in {}", event.source)],
                short_term: vec!["Fix the violations before merging further changes".to_string()],
                long_term: LONG_TERM_GUIDANCE.iter().map(|s| s.to_string()).collect(),
            },
            resolved: false,
            resolved_at: None,
            resolved_by: None,
        };

        debug!("opened {:?} violation alert for {}", severity, event.source);
        self.alerts.push(alert.clone());
        Some(alert)
    }

    /// Resolve an open alert
    ///
    /// Returns the resolved alert, or `None` if the id is unknown or the alert
    /// was already resolved. Neither case is an error.
    pub fn resolve_alert(&mut self, id: &str, resolved_by: &str) -> Option<MonitoringAlert> {
        let alert = self.alerts.iter_mut().find(|a| a.id == id && !a.resolved)?;

        alert.resolved = true;
        alert.resolved_at = Some(Utc::now());
        alert.resolved_by = Some(resolved_by.to_string());

        let resolved = alert.clone();
        self.open_threshold_alerts.retain(|_, alert_id| alert_id != id);

        debug!("alert {id} resolved by {resolved_by}");
        Some(resolved)
    }

    pub fn active_alerts(&self) -> Vec<MonitoringAlert> {
        self.alerts.iter().filter(|a| !a.resolved).cloned().collect()
    }

    /// Every alert ever raised, oldest first
    pub fn all_alerts(&self) -> &[MonitoringAlert] {
        &self.alerts
    }

    fn open_threshold_alert_mut(&mut self, metric: &str) -> Option<&mut MonitoringAlert> {
        let id = self.open_threshold_alerts.get(metric)?;
        self.alerts.iter_mut().find(|a| &a.id == id && !a.resolved)
    }
}

fn slice(items: &[String], start: usize, end: usize) -> Vec<String> {
    items.iter().skip(start).take(end - start).cloned().collect()
}

fn unit_suffix(unit: &str) -> &str {
    match unit {
        "percentage" | "percent" => "%",
        _ => "",
    }
}
