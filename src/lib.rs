//! Continuous architecture compliance monitoring
//!
//! A [`Monitor`] runs a set of [`Analyzer`]s over a source tree, periodically
//! and whenever a watched file changes. Scores become metrics with a bounded
//! history, breaches become alerts, and everything observed is recorded as
//! events and published on an in-process notification bus.

pub mod actors;
pub mod alerts;
pub mod analyzer;
pub mod bus;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod orchestrator;
pub mod watcher;

pub use analyzer::{Analyzer, AnalyzerKind, FileCategory};
pub use bus::{Notification, NotificationKind, PassSummary, SubscriptionId};
pub use config::{MonitorConfig, WatchConfig, read_config_file};
pub use dashboard::MonitoringDashboard;
pub use error::{MonitorError, MonitorResult};
pub use model::{
    AlertSeverity, AlertThreshold, ArchitectureMetric, EventSeverity, EventType, MetricCategory,
    MonitoringAlert, MonitoringEvent, Trend, Violation, ViolationSeverity,
};
pub use monitor::{Monitor, MonitorStatus};
