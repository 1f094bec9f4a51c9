//! Dashboard snapshot aggregation
//!
//! A snapshot is computed from the current in-memory state on every request
//! and never triggers analysis.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alerts::AlertManager;
use crate::events::EventLog;
use crate::metrics::MetricStore;
use crate::model::{ArchitectureMetric, MetricCategory, MonitoringAlert, MonitoringEvent};

/// Maximum number of recommendations on a snapshot
const MAX_RECOMMENDATIONS: usize = 10;

/// Weight of a category in the overall health score
pub fn category_weight(category: MetricCategory) -> f64 {
    match category {
        MetricCategory::Compliance => 0.30,
        MetricCategory::Performance => 0.25,
        MetricCategory::Quality => 0.25,
        MetricCategory::Security => 0.20,
    }
}

/// Trend series bucket for a metric name
///
/// Bucketing goes by name rather than by the metric's own category, so
/// externally named metrics still land somewhere sensible.
pub fn trend_bucket(metric_name: &str) -> MetricCategory {
    if ["modularity", "interface", "type-safety"]
        .iter()
        .any(|needle| metric_name.contains(needle))
    {
        MetricCategory::Compliance
    } else if metric_name.contains("performance") {
        MetricCategory::Performance
    } else if metric_name.contains("dependency") {
        MetricCategory::Security
    } else {
        MetricCategory::Quality
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendSeries {
    pub compliance: Vec<TrendPoint>,
    pub performance: Vec<TrendPoint>,
    pub quality: Vec<TrendPoint>,
    pub security: Vec<TrendPoint>,
}

impl TrendSeries {
    fn bucket_mut(&mut self, category: MetricCategory) -> &mut Vec<TrendPoint> {
        match category {
            MetricCategory::Compliance => &mut self.compliance,
            MetricCategory::Performance => &mut self.performance,
            MetricCategory::Quality => &mut self.quality,
            MetricCategory::Security => &mut self.security,
        }
    }
}

/// Point-in-time view of the monitor's state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringDashboard {
    /// Weighted health across metric categories, `0..=100`
    pub overall_health: f64,

    /// Latest metric per name
    pub metrics: Vec<ArchitectureMetric>,

    /// Open and resolved alerts
    pub alerts: Vec<MonitoringAlert>,

    pub trends: TrendSeries,

    /// Most recent error and critical events, newest first
    pub top_issues: Vec<MonitoringEvent>,

    pub recommendations: Vec<String>,

    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct DashboardOptions {
    pub trend_points: usize,
    pub top_issues_limit: usize,
}

/// Build a dashboard snapshot
///
/// `last_pass` names the metrics recorded by the most recent full pass. Only
/// those count towards the overall health, so a category whose analyzers
/// failed that pass drops out instead of contributing a stale value.
pub fn aggregate(
    metrics: &MetricStore,
    alerts: &AlertManager,
    events: &EventLog,
    last_pass: &[String],
    options: DashboardOptions,
) -> MonitoringDashboard {
    let latest: Vec<ArchitectureMetric> = metrics.latest().into_iter().cloned().collect();
    let current: Vec<ArchitectureMetric> = latest
        .iter()
        .filter(|m| last_pass.contains(&m.name))
        .cloned()
        .collect();

    let mut trends = TrendSeries::default();
    for metric in &latest {
        trends.bucket_mut(trend_bucket(&metric.name)).extend(
            metrics
                .recent(&metric.name, options.trend_points)
                .into_iter()
                .map(|m| TrendPoint {
                    metric: m.name.clone(),
                    value: m.value,
                    timestamp: m.timestamp,
                }),
        );
    }

    MonitoringDashboard {
        overall_health: overall_health(&current),
        recommendations: recommendations(&latest, alerts.all_alerts()),
        alerts: alerts.all_alerts().to_vec(),
        trends,
        top_issues: events.recent_issues(options.top_issues_limit),
        metrics: latest,
        last_updated: Utc::now(),
    }
}

/// Weighted mean of the per-category averages of `latest`
///
/// Categories without a metric drop out and the remaining weights are
/// renormalized. Without any metric the health is `0.0`.
pub fn overall_health(latest: &[ArchitectureMetric]) -> f64 {
    let mut per_category: HashMap<MetricCategory, (f64, usize)> = HashMap::new();
    for metric in latest {
        let entry = per_category.entry(metric.category).or_default();
        entry.0 += metric.value;
        entry.1 += 1;
    }

    let (weighted, weights) = MetricCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let (sum, count) = per_category.get(&category)?;
            Some((category_weight(category), sum / *count as f64))
        })
        .fold((0.0, 0.0), |(weighted, weights), (weight, value)| {
            (weighted + weight * value, weights + weight)
        });

    if weights == 0.0 {
        0.0
    } else {
        weighted / weights
    }
}

/// Immediate actions of open alerts first, then advice for metrics below warning
fn recommendations(latest: &[ArchitectureMetric], alerts: &[MonitoringAlert]) -> Vec<String> {
    let from_alerts = alerts
        .iter()
        .filter(|a| !a.resolved)
        .flat_map(|a| a.actions.immediate.iter());

    let from_metrics = latest
        .iter()
        .filter(|m| m.value <= m.threshold.warning)
        .flat_map(|m| m.metadata.recommendations.iter().take(2));

    let mut seen = HashSet::new();
    from_alerts
        .chain(from_metrics)
        .filter(|r| seen.insert(r.as_str()))
        .take(MAX_RECOMMENDATIONS)
        .cloned()
        .collect()
}
