//! The architecture monitor
//!
//! [`Monitor`] is the public entry point. It owns the shared [`MonitorCore`]
//! (analyzers, in-memory state, notification bus and the pass gate) and the
//! lifecycle of the actors that drive it:
//!
//! ```text
//!              start_monitoring()
//!   Idle ──────────────────────────────▶ Running
//!    ▲    initial full pass (waits)         │ SchedulerActor  (timer → full pass, skip when busy)
//!    │                                      │ ChangeRunner    (queue → file pass, wait when busy)
//!    │                                      │ FileWatcher     (notify → ChangeQueue)
//!    └──────────────────────────────────────┘
//!              stop_monitoring()
//! ```
//!
//! Analyzer calls are the only suspension points of a pass. Recording metrics,
//! evaluating alerts and reading the dashboard are synchronous and happen under
//! a short-lived state lock; notifications are published after it is released.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actors::messages::{SchedulerStats, TickOutcome};
use crate::actors::runner::ChangeRunnerHandle;
use crate::actors::scheduler::SchedulerHandle;
use crate::alerts::AlertManager;
use crate::analyzer::{Analyzer, AnalyzerKind, FALLBACK_THRESHOLD, FileCategory, FileClassifier};
use crate::bus::{EventBus, Notification, NotificationKind, PassSummary, SubscriptionId};
use crate::config::MonitorConfig;
use crate::dashboard::{self, DashboardOptions, MonitoringDashboard};
use crate::error::MonitorResult;
use crate::events::EventLog;
use crate::metrics::MetricStore;
use crate::model::{
    AlertSeverity, ArchitectureMetric, EventSeverity, EventType, MonitoringAlert,
    MonitoringEvent, Trend,
};
use crate::orchestrator::{
    FileOutcome, Orchestrator, failure_event, file_event_severity, to_metric,
};
use crate::watcher::{ChangeQueue, FileWatcher, is_ignored};

/// Who resolved alerts closed without an explicit name
const SYSTEM_RESOLVER: &str = "system";

struct MonitorState {
    metrics: MetricStore,
    alerts: AlertManager,
    events: EventLog,

    /// Metrics recorded by the most recent full pass
    last_pass: Vec<String>,
}

/// State and analyzers shared between the monitor and its actors
pub(crate) struct MonitorCore {
    config: MonitorConfig,
    orchestrator: Orchestrator,
    classifier: FileClassifier,
    state: Mutex<MonitorState>,
    bus: EventBus,

    /// Held for the duration of every analysis, full pass or single file
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl MonitorCore {
    pub(crate) fn gate(&self) -> &Arc<tokio::sync::Mutex<()>> {
        &self.gate
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run every analyzer over the tree and record the results
    ///
    /// The caller must hold the pass gate.
    #[instrument(skip(self), fields(root = %self.config.root.display()))]
    pub(crate) async fn full_pass(&self) -> PassSummary {
        let started_at = Utc::now();
        let started = Instant::now();
        debug!("starting full analysis pass");

        let outcomes = self.orchestrator.run_full_pass(&self.config.root).await;

        let mut notifications = vec![];
        let mut recorded = vec![];
        let mut failed_analyzers = vec![];

        let alerts_opened = {
            let mut state = self.state();
            let mut metrics: Vec<ArchitectureMetric> = vec![];

            for outcome in outcomes {
                let report = match outcome.result {
                    Ok(report) => report,
                    Err(e) => {
                        error!(analyzer = %outcome.kind, "analysis failed: {e:#}");
                        let event = failure_event(outcome.kind, &e);
                        state.events.append(event.clone());
                        notifications.push(Notification::AnalysisError(event));
                        failed_analyzers.push(outcome.kind.to_string());
                        continue;
                    }
                };

                let name = outcome.kind.metric_name();
                let trend = state.metrics.trend(name, report.score);
                let threshold = state.alerts.threshold(name).unwrap_or(FALLBACK_THRESHOLD);
                let metric = to_metric(outcome.kind, &report, trend, threshold);

                if let Some(event) = trend_event(&metric) {
                    state.events.append(event);
                }

                recorded.push(metric.name.clone());
                state.metrics.record(metric.clone());
                metrics.push(metric);
            }

            state.last_pass.clone_from(&recorded);

            let opened = state.alerts.evaluate_thresholds(&metrics);
            for alert in &opened {
                warn!(metric = %alert.source, severity = ?alert.severity, "{}", alert.title);
                state.events.append(alert_event(alert));
                notifications.push(Notification::ThresholdViolation(alert.clone()));
            }

            opened.len()
        };

        let summary = PassSummary {
            started_at,
            duration: started.elapsed(),
            metrics: recorded,
            failed_analyzers,
            alerts_opened,
        };

        debug!(
            "full pass finished in {:?}: {} metrics, {} failures, {} new alerts",
            summary.duration,
            summary.metrics.len(),
            summary.failed_analyzers.len(),
            summary.alerts_opened
        );

        for notification in notifications {
            self.bus.publish(notification);
        }
        self.bus
            .publish(Notification::PeriodicAnalysis(summary.clone()));

        summary
    }

    /// Analyze a single changed file
    ///
    /// Waits for the pass gate. Returns the event that was recorded, if the
    /// file had any violations.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub(crate) async fn analyze_changed_file(&self, path: &Path) -> Option<MonitoringEvent> {
        let category = self.classify(path)?;

        let outcomes = {
            let _guard = self.gate.lock().await;
            self.orchestrator.run_for_file(category, path).await
        };

        self.record_file_outcomes(path, category, outcomes)
    }

    /// Analyze a file taken from the change queue
    ///
    /// Like [`analyze_changed_file`](Self::analyze_changed_file), but gives up
    /// without analyzing anything once `stopped` turns true while waiting for
    /// the pass gate.
    #[instrument(skip(self, stopped), fields(path = %path.display()))]
    pub(crate) async fn analyze_queued_file(
        &self,
        path: &Path,
        stopped: &mut watch::Receiver<bool>,
    ) -> Option<MonitoringEvent> {
        let category = self.classify(path)?;

        let outcomes = {
            let _guard = tokio::select! {
                biased;

                Ok(_) = stopped.wait_for(|stopped| *stopped) => {
                    debug!("monitoring stopped, dropping queued change");
                    return None;
                }

                guard = self.gate.lock() => guard,
            };
            self.orchestrator.run_for_file(category, path).await
        };

        self.record_file_outcomes(path, category, outcomes)
    }

    fn classify(&self, path: &Path) -> Option<FileCategory> {
        let category = self.classifier.classify(path);
        if category.is_none() {
            trace!("unrecognized file type, ignoring");
        }
        category
    }

    /// Record the outcome of a per-file run and publish its notifications
    fn record_file_outcomes(
        &self,
        path: &Path,
        category: FileCategory,
        outcomes: Vec<FileOutcome>,
    ) -> Option<MonitoringEvent> {
        let mut notifications = vec![];
        let mut violations = vec![];
        let mut tags = vec![category.to_string()];

        let recorded = {
            let mut state = self.state();

            for outcome in outcomes {
                match outcome.result {
                    Ok(report) => {
                        tags.push(outcome.kind.to_string());
                        violations.extend(report.violations);
                    }
                    Err(e) => {
                        warn!(analyzer = %outcome.kind, "file analysis failed: {e:#}");
                        let event = failure_event(outcome.kind, &e);
                        state.events.append(event.clone());
                        notifications.push(Notification::AnalysisError(event));
                    }
                }
            }

            file_event_severity(&violations).map(|severity| {
                let event = MonitoringEvent::new(
                    EventType::Violation,
                    severity,
                    path.display().to_string(),
                    format!(
                        "{} violation(s) found in {}",
                        violations.len(),
                        path.display()
                    ),
                )
                .with_data(json!({ "category": category, "violations": violations }))
                .with_metadata("file-change", tags);

                state.events.append(event.clone());
                notifications.push(Notification::FileChangeDetected(event.clone()));

                if let Some(alert) = state.alerts.evaluate_event(&event) {
                    notifications.push(Notification::ViolationAlert(alert));
                }

                event
            })
        };

        match &recorded {
            Some(event) => debug!("recorded {:?} event for changed file", event.severity),
            None => trace!("no violations in changed file"),
        }

        for notification in notifications {
            self.bus.publish(notification);
        }

        recorded
    }
}

fn trend_event(metric: &ArchitectureMetric) -> Option<MonitoringEvent> {
    let (event_type, severity, direction) = match metric.trend {
        Trend::Declining => (EventType::Trend, EventSeverity::Warning, "declining"),
        Trend::Improving => (EventType::Improvement, EventSeverity::Info, "improving"),
        Trend::Stable => return None,
    };

    let event = MonitoringEvent::new(
        event_type,
        severity,
        metric.name.clone(),
        format!("{} is {direction} ({:.1})", metric.name, metric.value),
    )
    .with_data(json!({ "metric": metric.name, "value": metric.value, "trend": metric.trend }))
    .with_metadata("trend", vec![metric.category.to_string()]);

    Some(event)
}

fn alert_event(alert: &MonitoringAlert) -> MonitoringEvent {
    let severity = match alert.severity {
        AlertSeverity::Critical => EventSeverity::Critical,
        _ => EventSeverity::Error,
    };

    MonitoringEvent::new(
        EventType::Alert,
        severity,
        alert.source.clone(),
        alert.title.clone(),
    )
    .with_data(json!({ "alertId": alert.id, "description": alert.description }))
    .with_metadata("threshold-alert", vec![alert.source.clone()])
}

/// Lifecycle state of a [`Monitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Idle,
    Running,
}

/// Actors and watcher alive while the monitor is running
struct Running {
    scheduler: SchedulerHandle,
    runner: ChangeRunnerHandle,
    queue: Arc<ChangeQueue>,
    watcher: Option<FileWatcher>,
}

/// Architecture compliance monitor over one source tree
///
/// Cloning is cheap; clones control the same monitor.
#[derive(Clone)]
pub struct Monitor {
    core: Arc<MonitorCore>,
    lifecycle: Arc<tokio::sync::Mutex<Option<Running>>>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("root", &self.core.config.root)
            .field("orchestrator", &self.core.orchestrator)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create an idle monitor
    ///
    /// Each registered analyzer gets its kind's default threshold unless the
    /// configuration overrides it.
    pub fn new(
        config: MonitorConfig,
        analyzers: Vec<(AnalyzerKind, Arc<dyn Analyzer>)>,
    ) -> MonitorResult<Self> {
        config.validate()?;

        let orchestrator = Orchestrator::new(analyzers)?;
        let classifier = FileClassifier::from_config(&config.watch)?;

        let mut thresholds: HashMap<String, _> = orchestrator
            .kinds()
            .map(|kind| (kind.metric_name().to_string(), kind.default_threshold()))
            .collect();
        thresholds.extend(config.thresholds.clone());

        let state = MonitorState {
            metrics: MetricStore::new(
                config.history_capacity,
                config.trend_window,
                config.trend_sensitivity,
            ),
            alerts: AlertManager::new(thresholds),
            events: EventLog::new(config.event_log_capacity),
            last_pass: vec![],
        };

        debug!(?orchestrator, "monitor created");

        Ok(Self {
            core: Arc::new(MonitorCore {
                config,
                orchestrator,
                classifier,
                state: Mutex::new(state),
                bus: EventBus::new(),
                gate: Arc::new(tokio::sync::Mutex::new(())),
            }),
            lifecycle: Arc::new(tokio::sync::Mutex::new(None)),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.core.config
    }

    /// Start monitoring
    ///
    /// Runs one full pass before returning, then arms the periodic timer and
    /// the file watcher. Does nothing when already running. A watcher that
    /// fails to start is logged and monitoring continues without it.
    #[instrument(skip(self), fields(root = %self.core.config.root.display()))]
    pub async fn start_monitoring(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            debug!("monitor already running");
            return;
        }

        info!("starting architecture monitoring");

        {
            let _guard = self.core.gate.lock().await;
            self.core.full_pass().await;
        }

        let scheduler = SchedulerHandle::spawn(Arc::clone(&self.core), self.core.config.interval());
        let queue = Arc::new(ChangeQueue::new());

        let watch = &self.core.config.watch;
        let watcher = if watch.enabled {
            match FileWatcher::start(
                &self.core.config.root,
                watch.ignored_dirs.clone(),
                Arc::clone(&queue),
            ) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    warn!("could not watch source tree, continuing without file changes: {e}");
                    None
                }
            }
        } else {
            debug!("file watching disabled");
            None
        };

        let runner = ChangeRunnerHandle::spawn(Arc::clone(&self.core), Arc::clone(&queue));

        *lifecycle = Some(Running {
            scheduler,
            runner,
            queue,
            watcher,
        });
        drop(lifecycle);

        self.core
            .bus
            .publish(Notification::MonitoringStarted { at: Utc::now() });
    }

    /// Stop monitoring
    ///
    /// Cancels the timer and detaches the watcher. A full pass that is already
    /// running finishes and records its results. Queued file changes, including
    /// one still waiting for that pass, are dropped; once this returns no new
    /// analysis starts.
    #[instrument(skip(self))]
    pub async fn stop_monitoring(&self) {
        let Some(running) = self.lifecycle.lock().await.take() else {
            debug!("monitor not running");
            return;
        };

        drop(running.watcher);

        if let Err(e) = running.scheduler.shutdown().await {
            warn!("scheduler did not shut down cleanly: {e:#}");
        }
        if let Err(e) = running.runner.shutdown().await {
            warn!("change runner did not shut down cleanly: {e:#}");
        }

        let dropped = running.queue.len();
        running.queue.clear();
        if dropped > 0 {
            debug!("dropped {dropped} pending file changes");
        }

        info!("architecture monitoring stopped");
        self.core
            .bus
            .publish(Notification::MonitoringStopped { at: Utc::now() });
    }

    pub async fn status(&self) -> MonitorStatus {
        match *self.lifecycle.lock().await {
            Some(_) => MonitorStatus::Running,
            None => MonitorStatus::Idle,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.status().await == MonitorStatus::Running
    }

    /// Snapshot of the current state, never triggers analysis
    pub fn get_dashboard(&self) -> MonitoringDashboard {
        let state = self.core.state();
        dashboard::aggregate(
            &state.metrics,
            &state.alerts,
            &state.events,
            &state.last_pass,
            DashboardOptions {
                trend_points: self.core.config.trend_points,
                top_issues_limit: self.core.config.top_issues_limit,
            },
        )
    }

    /// Events with `start <= timestamp <= end`, oldest first
    pub fn get_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MonitoringEvent> {
        self.core.state().events.in_range(start, end)
    }

    pub fn get_active_alerts(&self) -> Vec<MonitoringAlert> {
        self.core.state().alerts.active_alerts()
    }

    /// Resolve an open alert
    ///
    /// Unknown ids and already resolved alerts are ignored and return `None`.
    pub fn resolve_alert(&self, id: &str, resolved_by: Option<&str>) -> Option<MonitoringAlert> {
        let resolved = self
            .core
            .state()
            .alerts
            .resolve_alert(id, resolved_by.unwrap_or(SYSTEM_RESOLVER));

        match &resolved {
            Some(alert) => {
                info!(alert = %alert.id, "alert resolved: {}", alert.title);
                self.core
                    .bus
                    .publish(Notification::AlertResolved(alert.clone()));
            }
            None => trace!("no open alert with id {id}"),
        }

        resolved
    }

    /// Override a metric's threshold for all following evaluations
    pub fn set_alert_threshold(&self, metric: &str, warning: f64, critical: f64) -> MonitorResult<()> {
        self.core
            .state()
            .alerts
            .set_threshold(metric, warning, critical)
    }

    /// Retained history of a metric from the last `hours` hours, oldest first
    pub fn get_metric_history(&self, metric: &str, hours: u32) -> Vec<ArchitectureMetric> {
        self.core.state().metrics.history(metric, hours)
    }

    /// Register a handler for one kind of notification
    pub fn subscribe<F>(&self, kind: NotificationKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.core.bus.subscribe(kind, handler)
    }

    /// Register a handler by notification name, e.g. `"threshold-violation"`
    pub fn subscribe_named<F>(&self, name: &str, handler: F) -> MonitorResult<SubscriptionId>
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        Ok(self.subscribe(name.parse()?, handler))
    }

    /// Register a handler for every notification
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.core.bus.subscribe_all(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.bus.unsubscribe(id)
    }

    /// Stream of every notification published from now on
    pub fn notifications(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.core.bus.stream()
    }

    /// Run a full pass now, waiting for any running analysis first
    pub async fn run_full_pass(&self) -> PassSummary {
        let _guard = self.core.gate.lock().await;
        self.core.full_pass().await
    }

    /// Ask the scheduler for an immediate tick
    ///
    /// Returns `None` when the monitor is not running.
    pub async fn tick_now(&self) -> Option<TickOutcome> {
        let scheduler = self.scheduler().await?;
        match scheduler.tick_now().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("manual tick failed: {e:#}");
                None
            }
        }
    }

    pub async fn scheduler_stats(&self) -> Option<SchedulerStats> {
        self.scheduler().await?.stats().await
    }

    /// Queue a changed file for the change runner
    ///
    /// Returns `false` when the monitor is not running, the path is excluded,
    /// or a run for it is already pending.
    pub async fn notify_file_changed(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let config = &self.core.config;
        if is_ignored(path, &config.root, &config.watch.ignored_dirs) {
            trace!("ignoring change in excluded path {}", path.display());
            return false;
        }

        match &*self.lifecycle.lock().await {
            Some(running) => running.queue.push(path.to_path_buf()),
            None => false,
        }
    }

    /// Number of queued file changes analyzed since the monitor started
    pub async fn changes_processed(&self) -> Option<u64> {
        let runner = self
            .lifecycle
            .lock()
            .await
            .as_ref()
            .map(|running| running.runner.clone())?;
        runner.processed().await.ok()
    }

    /// Analyze one changed file right away, bypassing the change queue
    ///
    /// Waits for any running analysis. Returns the recorded event, `None` for
    /// unrecognized files or files without violations.
    pub async fn analyze_changed_file(&self, path: impl AsRef<Path>) -> Option<MonitoringEvent> {
        self.core.analyze_changed_file(path.as_ref()).await
    }

    async fn scheduler(&self) -> Option<SchedulerHandle> {
        self.lifecycle
            .lock()
            .await
            .as_ref()
            .map(|running| running.scheduler.clone())
    }
}
