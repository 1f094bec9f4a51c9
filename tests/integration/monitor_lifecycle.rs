//! Monitor lifecycle tests
//!
//! These tests drive a monitor through its public API:
//! - Start/stop idempotency and lifecycle notifications
//! - Threshold alerts across passes
//! - Failing analyzers
//! - Dashboard aggregation over real passes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use archwatch::{
    AlertSeverity, AnalyzerKind, EventSeverity, Monitor, MonitorStatus, Notification,
    NotificationKind,
};
use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use crate::helpers::*;

fn counter(monitor: &Monitor, kind: NotificationKind) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let handler_count = Arc::clone(&count);
    monitor.subscribe(kind, move |_| {
        handler_count.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    init_tracing();
    let analyzer = Gated::new(90.0, 100);
    let monitor = Monitor::new(
        test_config(60_000),
        vec![(AnalyzerKind::Modularity, gated(&analyzer))],
    )
    .unwrap();

    let started = counter(&monitor, NotificationKind::MonitoringStarted);
    let stopped = counter(&monitor, NotificationKind::MonitoringStopped);

    monitor.start_monitoring().await;
    monitor.start_monitoring().await;

    assert_eq!(monitor.status().await, MonitorStatus::Running);
    assert_eq!(analyzer.calls(), 1, "second start must not run another pass");
    assert_eq!(started.load(Ordering::SeqCst), 1);

    monitor.stop_monitoring().await;
    monitor.stop_monitoring().await;

    assert_eq!(monitor.status().await, MonitorStatus::Idle);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);

    // can be started again after a stop
    monitor.start_monitoring().await;
    assert!(monitor.is_running().await);
    assert_eq!(analyzer.calls(), 2);
    monitor.stop_monitoring().await;
}

#[tokio::test]
async fn test_start_seeds_metrics_before_returning() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![
            (AnalyzerKind::Modularity, fixed(82.0)),
            (AnalyzerKind::TypeSafety, fixed(91.0)),
        ],
    )
    .unwrap();

    let mut stream = monitor.notifications();
    monitor.start_monitoring().await;

    let dashboard = monitor.get_dashboard();
    let names: Vec<_> = dashboard.metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["modularity-compliance", "type-safety-compliance"]);

    assert_matches!(
        stream.recv().await.unwrap(),
        Notification::PeriodicAnalysis(summary) if summary.metrics.len() == 2
    );
    assert_matches!(
        stream.recv().await.unwrap(),
        Notification::MonitoringStarted { .. }
    );

    monitor.stop_monitoring().await;
}

#[tokio::test]
async fn test_breach_opens_one_critical_alert_that_survives_recovery() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![(AnalyzerKind::Modularity, sequence(&[45.0, 40.0, 85.0]))],
    )
    .unwrap();

    let violations = counter(&monitor, NotificationKind::ThresholdViolation);

    monitor.start_monitoring().await;

    let alerts = monitor.get_active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    assert!(alerts[0].title.contains("modularity-compliance"));

    // still breaching: refreshed, not duplicated
    monitor.run_full_pass().await;
    assert_eq!(monitor.get_active_alerts().len(), 1);
    assert_eq!(monitor.get_active_alerts()[0].data["value"], 40.0);

    // recovered: stays open until resolved
    monitor.run_full_pass().await;
    let alerts = monitor.get_active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(violations.load(Ordering::SeqCst), 1);

    let resolved = monitor.resolve_alert(&alerts[0].id, Some("alice")).unwrap();
    assert!(resolved.resolved);
    assert!(monitor.get_active_alerts().is_empty());

    let dashboard = monitor.get_dashboard();
    assert_eq!(dashboard.alerts.len(), 1);
    assert!(dashboard.alerts[0].resolved);

    monitor.stop_monitoring().await;
}

#[tokio::test]
async fn test_failing_analyzer_is_reported_and_omitted() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![
            (AnalyzerKind::Modularity, fixed(88.0)),
            (AnalyzerKind::Dependency, failing()),
            (AnalyzerKind::Interface, fixed(77.0)),
        ],
    )
    .unwrap();

    let errors = Arc::new(Mutex::new(vec![]));
    {
        let errors = Arc::clone(&errors);
        monitor
            .subscribe_named("analysis-error", move |notification| {
                if let Notification::AnalysisError(event) = notification {
                    errors.lock().unwrap().push(event.clone());
                }
            })
            .unwrap();
    }

    monitor.start_monitoring().await;

    let dashboard = monitor.get_dashboard();
    let names: Vec<_> = dashboard.metrics.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["interface-consistency", "modularity-compliance"]);

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].severity, EventSeverity::Error);
    assert_eq!(errors[0].source, "monitoring-system");
    assert!(errors[0].message.contains("tsconfig.json"));

    let issues = &dashboard.top_issues;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].id, errors[0].id);

    monitor.stop_monitoring().await;
}

#[tokio::test]
async fn test_unknown_notification_name_is_rejected() {
    let monitor = Monitor::new(test_config(60_000), vec![]).unwrap();

    assert!(monitor.subscribe_named("metric-recorded", |_| {}).is_err());
}

#[tokio::test]
async fn test_dashboard_health_over_present_categories() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![
            (AnalyzerKind::Modularity, fixed(80.0)),
            (AnalyzerKind::Performance, fixed(60.0)),
            (AnalyzerKind::Dependency, fixed(70.0)),
        ],
    )
    .unwrap();

    monitor.run_full_pass().await;
    let dashboard = monitor.get_dashboard();

    // no quality metric, so its weight drops out
    let expected = (0.30 * 80.0 + 0.25 * 60.0 + 0.20 * 70.0) / 0.75;
    assert!((dashboard.overall_health - expected).abs() < 1e-9);

    assert_eq!(dashboard.trends.compliance.len(), 1);
    assert_eq!(dashboard.trends.performance.len(), 1);
    assert_eq!(dashboard.trends.security.len(), 1);
    assert!(dashboard.trends.quality.is_empty());
}

#[tokio::test]
async fn test_failed_category_drops_out_of_health() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![
            (AnalyzerKind::Modularity, fixed(80.0)),
            (AnalyzerKind::Dependency, flaky(20.0, 1)),
        ],
    )
    .unwrap();

    monitor.run_full_pass().await;
    let expected = (0.30 * 80.0 + 0.20 * 20.0) / 0.50;
    assert!((monitor.get_dashboard().overall_health - expected).abs() < 1e-9);

    // the stale dependency reading stays listed but no longer counts
    monitor.run_full_pass().await;
    let dashboard = monitor.get_dashboard();
    assert_eq!(dashboard.metrics.len(), 2);
    assert!((dashboard.overall_health - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_metric_history_and_event_range() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![(AnalyzerKind::Modularity, sequence(&[90.0, 91.0, 60.0]))],
    )
    .unwrap();

    let before = Utc::now();
    for _ in 0..3 {
        monitor.run_full_pass().await;
    }

    let values: Vec<f64> = monitor
        .get_metric_history("modularity-compliance", 1)
        .iter()
        .map(|m| m.value)
        .collect();
    assert_eq!(values, vec![90.0, 91.0, 60.0]);
    assert!(monitor.get_metric_history("unknown-metric", 1).is_empty());

    // 60 against a mean of 90.5 is declining, and breaches the warning bound
    let events = monitor.get_events_in_range(before, Utc::now() + Duration::seconds(1));
    assert!(
        events
            .iter()
            .any(|e| e.metadata.category == "trend" && e.severity == EventSeverity::Warning)
    );
    assert!(events.iter().any(|e| e.metadata.category == "threshold-alert"));

    let empty = monitor.get_events_in_range(before - Duration::hours(2), before - Duration::hours(1));
    assert!(empty.is_empty());
}
