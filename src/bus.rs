//! In-process notification bus
//!
//! Subscribers register a handler for one named notification (or for all of
//! them) and are invoked synchronously, in registration order, in the order
//! notifications are published. Every notification is additionally sent on a
//! broadcast channel for async consumers; like the metric channel of the actor
//! pipeline it may lag and drop messages for slow receivers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::MonitorError;
use crate::model::{MonitoringAlert, MonitoringEvent};

/// Capacity of the broadcast side of the bus
const STREAM_CAPACITY: usize = 256;

/// Names under which notifications can be subscribed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    MonitoringStarted,
    MonitoringStopped,
    AnalysisError,
    PeriodicAnalysis,
    FileChangeDetected,
    ThresholdViolation,
    ViolationAlert,
    AlertResolved,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 8] = [
        NotificationKind::MonitoringStarted,
        NotificationKind::MonitoringStopped,
        NotificationKind::AnalysisError,
        NotificationKind::PeriodicAnalysis,
        NotificationKind::FileChangeDetected,
        NotificationKind::ThresholdViolation,
        NotificationKind::ViolationAlert,
        NotificationKind::AlertResolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::MonitoringStarted => "monitoring-started",
            NotificationKind::MonitoringStopped => "monitoring-stopped",
            NotificationKind::AnalysisError => "analysis-error",
            NotificationKind::PeriodicAnalysis => "periodic-analysis",
            NotificationKind::FileChangeDetected => "file-change-detected",
            NotificationKind::ThresholdViolation => "threshold-violation",
            NotificationKind::ViolationAlert => "violation-alert",
            NotificationKind::AlertResolved => "alert-resolved",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MonitorError::UnknownNotification(s.to_string()))
    }
}

/// Outcome of one full analysis pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,

    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// Names of the metrics recorded by the pass
    pub metrics: Vec<String>,

    /// Analyzers whose tree analysis failed
    pub failed_analyzers: Vec<String>,

    /// Number of threshold alerts opened by the pass
    pub alerts_opened: usize,
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

/// A notification published on the bus
#[derive(Debug, Clone)]
pub enum Notification {
    MonitoringStarted { at: DateTime<Utc> },
    MonitoringStopped { at: DateTime<Utc> },
    AnalysisError(MonitoringEvent),
    PeriodicAnalysis(PassSummary),
    FileChangeDetected(MonitoringEvent),
    ThresholdViolation(MonitoringAlert),
    ViolationAlert(MonitoringAlert),
    AlertResolved(MonitoringAlert),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::MonitoringStarted { .. } => NotificationKind::MonitoringStarted,
            Notification::MonitoringStopped { .. } => NotificationKind::MonitoringStopped,
            Notification::AnalysisError(_) => NotificationKind::AnalysisError,
            Notification::PeriodicAnalysis(_) => NotificationKind::PeriodicAnalysis,
            Notification::FileChangeDetected(_) => NotificationKind::FileChangeDetected,
            Notification::ThresholdViolation(_) => NotificationKind::ThresholdViolation,
            Notification::ViolationAlert(_) => NotificationKind::ViolationAlert,
            Notification::AlertResolved(_) => NotificationKind::AlertResolved,
        }
    }
}

/// Identifies a registered handler so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,

    /// `None` receives every notification
    kind: Option<NotificationKind>,

    handler: Handler,
}

/// Ordered, synchronous publish/subscribe channel
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    stream: broadcast::Sender<Notification>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            subscribers: RwLock::new(vec![]),
            next_id: AtomicU64::new(0),
            stream,
        }
    }

    /// Register a handler for one kind of notification
    pub fn subscribe<F>(&self, kind: NotificationKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.add_subscriber(Some(kind), Arc::new(handler))
    }

    /// Register a handler for every notification
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.add_subscriber(None, Arc::new(handler))
    }

    /// Remove a handler, returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Receiver for every notification published from now on
    pub fn stream(&self) -> broadcast::Receiver<Notification> {
        self.stream.subscribe()
    }

    /// Deliver a notification to every matching handler, then to the stream
    pub fn publish(&self, notification: Notification) {
        let kind = notification.kind();

        // handlers run outside the lock so they may (un)subscribe themselves
        let handlers: Vec<Handler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.kind.is_none_or(|k| k == kind))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        trace!("publishing {kind} to {} handlers", handlers.len());
        for handler in handlers {
            handler(&notification);
        }

        if self.stream.send(notification).is_err() {
            trace!("no stream receivers for {kind}");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn add_subscriber(&self, kind: Option<NotificationKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber { id, kind, handler });
        id
    }
}
