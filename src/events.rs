//! In-memory log of monitoring events

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::model::MonitoringEvent;

/// Bounded, append-only event log
///
/// Events are stored in append order; once the capacity is reached the oldest
/// event is dropped.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<MonitoringEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn append(&mut self, event: MonitoringEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Events with `start <= timestamp <= end`, oldest first
    pub fn in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MonitoringEvent> {
        self.events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect()
    }

    /// Most recent error and critical events, newest first
    pub fn recent_issues(&self, limit: usize) -> Vec<MonitoringEvent> {
        self.events
            .iter()
            .rev()
            .filter(|e| e.severity.is_issue())
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
