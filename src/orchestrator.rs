//! Analyzer orchestration
//!
//! The orchestrator owns the registered analyzers and knows how to run them;
//! it holds no monitoring state. Turning reports into metrics needs the
//! metric history (for the trend) and the configured thresholds, so the
//! conversion helpers take those as arguments and the monitor applies them
//! under its own lock once the analyzers have returned.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, instrument, trace, warn};

use crate::analyzer::{Analyzer, AnalyzerKind, FileCategory};
use crate::error::{MonitorError, MonitorResult};
use crate::model::{
    AlertThreshold, ArchitectureMetric, EventSeverity, EventType, FileReport, MetricMetadata,
    MonitoringEvent, SYSTEM_SOURCE, TreeReport, Trend, Violation, ViolationSeverity,
};

/// Result of one analyzer's tree analysis
#[derive(Debug)]
pub struct TreeOutcome {
    pub kind: AnalyzerKind,
    pub result: anyhow::Result<TreeReport>,
}

/// Result of one analyzer's single-file analysis
#[derive(Debug)]
pub struct FileOutcome {
    pub kind: AnalyzerKind,
    pub result: anyhow::Result<FileReport>,
}

struct RegisteredAnalyzer {
    kind: AnalyzerKind,
    analyzer: Arc<dyn Analyzer>,
}

/// Ordered set of named analyzers
pub struct Orchestrator {
    analyzers: Vec<RegisteredAnalyzer>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("analyzers", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}

impl Orchestrator {
    /// Build the orchestrator, keeping registration order
    pub fn new(analyzers: Vec<(AnalyzerKind, Arc<dyn Analyzer>)>) -> MonitorResult<Self> {
        let mut seen = HashSet::new();
        for (kind, _) in &analyzers {
            if !seen.insert(*kind) {
                return Err(MonitorError::DuplicateAnalyzer(kind.to_string()));
            }
        }

        Ok(Self {
            analyzers: analyzers
                .into_iter()
                .map(|(kind, analyzer)| RegisteredAnalyzer { kind, analyzer })
                .collect(),
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = AnalyzerKind> + '_ {
        self.analyzers.iter().map(|a| a.kind)
    }

    /// Run every analyzer over the tree, one after another
    ///
    /// A failing analyzer never stops the others; its error is returned in
    /// its outcome.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub async fn run_full_pass(&self, root: &Path) -> Vec<TreeOutcome> {
        let mut outcomes = Vec::with_capacity(self.analyzers.len());

        for registered in &self.analyzers {
            let started = Instant::now();
            let result = registered
                .analyzer
                .analyze_tree(root)
                .await
                .and_then(validate_report);

            trace!(
                "{} finished in {:?} (ok: {})",
                registered.kind,
                started.elapsed(),
                result.is_ok()
            );

            outcomes.push(TreeOutcome {
                kind: registered.kind,
                result,
            });
        }

        outcomes
    }

    /// Run the analyzers relevant to `category` against one file
    ///
    /// The analyzers run concurrently, outcomes keep registration order.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn run_for_file(&self, category: FileCategory, path: &Path) -> Vec<FileOutcome> {
        let relevant: Vec<_> = self
            .analyzers
            .iter()
            .filter(|registered| registered.kind.handles(category))
            .collect();

        debug!("running {} analyzers for {category} file", relevant.len());

        join_all(relevant.into_iter().map(|registered| async move {
            FileOutcome {
                kind: registered.kind,
                result: registered.analyzer.analyze_file(path).await,
            }
        }))
        .await
    }
}

fn validate_report(mut report: TreeReport) -> anyhow::Result<TreeReport> {
    if !report.score.is_finite() {
        anyhow::bail!("score is not a finite number");
    }

    if !(0.0..=100.0).contains(&report.score) {
        warn!("score {} outside 0..=100, clamping", report.score);
        report.score = report.score.clamp(0.0, 100.0);
    }

    Ok(report)
}

/// Build the metric for one analyzer's tree report
pub fn to_metric(
    kind: AnalyzerKind,
    report: &TreeReport,
    trend: Trend,
    threshold: AlertThreshold,
) -> ArchitectureMetric {
    let mut recommendations: Vec<String> = most_severe(&report.violations, 2)
        .map(|v| format!("Address: {}", v.description))
        .collect();
    recommendations.extend(kind.recommendations().iter().map(|r| r.to_string()));

    ArchitectureMetric {
        name: kind.metric_name().to_string(),
        value: report.score,
        unit: "percentage".to_string(),
        timestamp: Utc::now(),
        category: kind.category(),
        trend,
        threshold,
        metadata: MetricMetadata {
            description: format!(
                "{} ({} violation(s))",
                kind.description(),
                report.violations.len()
            ),
            impact: kind.impact().to_string(),
            recommendations,
        },
    }
}

/// Event recorded when an analyzer fails during a pass
pub fn failure_event(kind: AnalyzerKind, error: &anyhow::Error) -> MonitoringEvent {
    MonitoringEvent::new(
        EventType::Alert,
        EventSeverity::Error,
        SYSTEM_SOURCE,
        format!("{kind} analysis failed: {error:#}"),
    )
    .with_data(json!({ "analyzer": kind, "error": format!("{error:#}") }))
    .with_metadata("analysis-error", vec![kind.to_string()])
}

/// Event severity for a set of file violations, `None` when there are none
pub fn file_event_severity(violations: &[Violation]) -> Option<EventSeverity> {
    let worst = violations.iter().map(|v| v.severity).max()?;

    Some(match worst {
        ViolationSeverity::Critical => EventSeverity::Critical,
        ViolationSeverity::High => EventSeverity::Error,
        ViolationSeverity::Medium | ViolationSeverity::Low => EventSeverity::Warning,
    })
}

fn most_severe(violations: &[Violation], limit: usize) -> impl Iterator<Item = &Violation> {
    let mut serious: Vec<_> = violations
        .iter()
        .filter(|v| v.severity >= ViolationSeverity::High)
        .collect();
    serious.sort_by(|a, b| b.severity.cmp(&a.severity));
    serious.into_iter().take(limit)
}
