//! Change-triggered analysis tests
//!
//! These tests verify the per-file path:
//! - Unrecognized files are ignored
//! - Severity mapping and violation alerts
//! - Manifests only reach the dependency analyzer
//! - Queued and watched changes reach the change runner
//! - Directories created while watching are picked up

use std::sync::{Arc, Mutex};
use std::time::Duration;

use archwatch::model::AlertType;
use archwatch::{
    AlertSeverity, AnalyzerKind, EventSeverity, EventType, Monitor, MonitorConfig,
    NotificationKind, ViolationSeverity,
};
use chrono::Utc;
use pretty_assertions::assert_eq;

use crate::helpers::*;

fn recorder(monitor: &Monitor) -> Arc<Mutex<Vec<NotificationKind>>> {
    let seen = Arc::new(Mutex::new(vec![]));
    let handler_seen = Arc::clone(&seen);
    monitor.subscribe_all(move |notification| {
        handler_seen.lock().unwrap().push(notification.kind());
    });
    seen
}

fn all_events(monitor: &Monitor) -> Vec<archwatch::MonitoringEvent> {
    monitor.get_events_in_range(
        Utc::now() - chrono::Duration::hours(1),
        Utc::now() + chrono::Duration::hours(1),
    )
}

#[tokio::test]
async fn test_unrecognized_file_produces_no_events() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![(
            AnalyzerKind::Modularity,
            fixed_with_file_violations(90.0, &[ViolationSeverity::Critical]),
        )],
    )
    .unwrap();
    let seen = recorder(&monitor);

    for path in ["docs/architecture.png", "README.md", "src/styles.css"] {
        assert!(monitor.analyze_changed_file(path).await.is_none());
    }

    assert!(all_events(&monitor).is_empty());
    assert!(seen.lock().unwrap().is_empty());
    assert!(monitor.get_active_alerts().is_empty());
}

#[tokio::test]
async fn test_critical_violation_opens_violation_alert() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![
            (
                AnalyzerKind::Modularity,
                fixed_with_file_violations(90.0, &[ViolationSeverity::Medium]),
            ),
            (
                AnalyzerKind::TypeSafety,
                fixed_with_file_violations(90.0, &[ViolationSeverity::Critical]),
            ),
        ],
    )
    .unwrap();
    let seen = recorder(&monitor);

    let event = monitor
        .analyze_changed_file("src/services/orders.ts")
        .await
        .unwrap();

    assert_eq!(event.event_type, EventType::Violation);
    assert_eq!(event.severity, EventSeverity::Critical);
    assert_eq!(event.source, "src/services/orders.ts");
    assert_eq!(event.metadata.category, "file-change");
    assert_eq!(event.data["category"], "source");
    assert_eq!(event.data["violations"].as_array().unwrap().len(), 2);

    let alerts = monitor.get_active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Violation);
    assert_eq!(alerts[0].severity, AlertSeverity::Critical);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            NotificationKind::FileChangeDetected,
            NotificationKind::ViolationAlert
        ]
    );
}

#[tokio::test]
async fn test_warning_violations_do_not_alert() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![(
            AnalyzerKind::Interface,
            fixed_with_file_violations(90.0, &[ViolationSeverity::Low, ViolationSeverity::Medium]),
        )],
    )
    .unwrap();

    let event = monitor.analyze_changed_file("src/api.tsx").await.unwrap();

    assert_eq!(event.severity, EventSeverity::Warning);
    assert!(monitor.get_active_alerts().is_empty());
    assert!(monitor.get_dashboard().top_issues.is_empty());
}

#[tokio::test]
async fn test_manifest_only_reaches_dependency_analyzer() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![
            (
                AnalyzerKind::Modularity,
                fixed_with_file_violations(90.0, &[ViolationSeverity::Critical]),
            ),
            (
                AnalyzerKind::Dependency,
                fixed_with_file_violations(90.0, &[ViolationSeverity::High]),
            ),
        ],
    )
    .unwrap();

    let event = monitor.analyze_changed_file("package.json").await.unwrap();

    assert_eq!(event.severity, EventSeverity::Error);
    assert_eq!(event.data["category"], "manifest");
    assert_eq!(event.metadata.tags, vec!["manifest", "dependency"]);

    let alerts = monitor.get_active_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, AlertSeverity::High);
}

#[tokio::test]
async fn test_file_analyzer_failure_is_reported() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![
            (AnalyzerKind::Modularity, failing()),
            (
                AnalyzerKind::TypeSafety,
                fixed_with_file_violations(90.0, &[ViolationSeverity::Low]),
            ),
        ],
    )
    .unwrap();
    let seen = recorder(&monitor);

    let event = monitor.analyze_changed_file("src/app.ts").await.unwrap();
    assert_eq!(event.severity, EventSeverity::Warning);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            NotificationKind::AnalysisError,
            NotificationKind::FileChangeDetected
        ]
    );
}

#[tokio::test]
async fn test_queued_changes_reach_change_runner() {
    let monitor = Monitor::new(
        test_config(60_000),
        vec![(
            AnalyzerKind::Modularity,
            fixed_with_file_violations(90.0, &[ViolationSeverity::High]),
        )],
    )
    .unwrap();

    // not running yet
    assert!(!monitor.notify_file_changed("src/a.ts").await);

    monitor.start_monitoring().await;

    assert!(monitor.notify_file_changed("src/a.ts").await);
    assert!(monitor.notify_file_changed("src/b.ts").await);
    assert!(!monitor.notify_file_changed("node_modules/react/index.js").await);

    wait_for_processed(&monitor, 2).await;

    let sources: Vec<String> = all_events(&monitor)
        .into_iter()
        .filter(|e| e.event_type == EventType::Violation)
        .map(|e| e.source)
        .collect();
    assert_eq!(sources, vec!["src/a.ts", "src/b.ts"]);

    monitor.stop_monitoring().await;
}

async fn wait_for_processed(monitor: &Monitor, expected: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let count = monitor.changes_processed().await.unwrap_or(0);
        if count >= expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {expected} processed changes, got {count}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_watcher_feeds_written_files() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();

    let mut config = MonitorConfig::for_root(dir.path());
    config.interval_ms = 60_000;

    let monitor = Monitor::new(
        config,
        vec![(
            AnalyzerKind::Modularity,
            fixed_with_file_violations(90.0, &[ViolationSeverity::Critical]),
        )],
    )
    .unwrap();
    monitor.start_monitoring().await;

    std::fs::write(dir.path().join("src/app.ts"), "export const answer = 42;\n").unwrap();

    wait_until("watched change to open an alert", || {
        !monitor.get_active_alerts().is_empty()
    })
    .await;

    let alert = &monitor.get_active_alerts()[0];
    assert!(alert.source.ends_with("app.ts"));

    monitor.stop_monitoring().await;
}

#[tokio::test]
async fn test_watcher_follows_new_directories() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("src")).unwrap();

    let mut config = MonitorConfig::for_root(dir.path());
    config.interval_ms = 60_000;

    let monitor = Monitor::new(
        config,
        vec![(
            AnalyzerKind::Modularity,
            fixed_with_file_violations(90.0, &[ViolationSeverity::Critical]),
        )],
    )
    .unwrap();
    monitor.start_monitoring().await;

    let feature = dir.path().join("src/feature");
    std::fs::create_dir(&feature).unwrap();

    // the directory is registered asynchronously, keep writing until it is
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while monitor.get_active_alerts().is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for a change in the new directory"
        );
        std::fs::write(feature.join("widget.ts"), "export const widget = 1;\n").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let alert = &monitor.get_active_alerts()[0];
    assert!(alert.source.ends_with("widget.ts"));

    monitor.stop_monitoring().await;
}
