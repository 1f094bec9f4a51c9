//! Bounded per-metric history
//!
//! Each metric name owns a ring buffer with a fixed capacity. When the buffer is
//! full the oldest entry is evicted, regardless of its age. Time-filtered
//! queries therefore only ever see the retained window.

use std::collections::{HashMap, VecDeque};

use chrono::{Duration, Utc};
use tracing::trace;

use crate::model::{ArchitectureMetric, Trend};

/// Append-only metric history with FIFO eviction
#[derive(Debug)]
pub struct MetricStore {
    history: HashMap<String, VecDeque<ArchitectureMetric>>,
    capacity: usize,
    trend_window: usize,
    trend_sensitivity: f64,
}

impl MetricStore {
    pub fn new(capacity: usize, trend_window: usize, trend_sensitivity: f64) -> Self {
        Self {
            history: HashMap::new(),
            capacity: capacity.max(1),
            trend_window: trend_window.max(1),
            trend_sensitivity,
        }
    }

    /// Append a metric to the history of its name
    pub fn record(&mut self, metric: ArchitectureMetric) {
        let entries = self
            .history
            .entry(metric.name.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));

        if entries.len() == self.capacity {
            entries.pop_front();
        }

        trace!("recording {} = {:.1}", metric.name, metric.value);
        entries.push_back(metric);
    }

    /// Classify `current` against the mean of the most recent recorded values
    ///
    /// With fewer than two recorded points the answer is always
    /// [`Trend::Stable`], so a cold start never produces a false signal.
    pub fn trend(&self, name: &str, current: f64) -> Trend {
        let Some(entries) = self.history.get(name) else {
            return Trend::Stable;
        };

        if entries.len() < 2 {
            return Trend::Stable;
        }

        let window = entries.len().min(self.trend_window);
        let mean = entries.iter().rev().take(window).map(|m| m.value).sum::<f64>() / window as f64;
        let difference = current - mean;

        if difference > self.trend_sensitivity {
            Trend::Improving
        } else if difference < -self.trend_sensitivity {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    /// Retained entries recorded within the last `since_hours` hours, oldest first
    pub fn history(&self, name: &str, since_hours: u32) -> Vec<ArchitectureMetric> {
        let cutoff = Utc::now() - Duration::hours(i64::from(since_hours));

        self.history
            .get(name)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|m| m.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent `limit` entries for a name, oldest first
    pub fn recent(&self, name: &str, limit: usize) -> Vec<&ArchitectureMetric> {
        self.history
            .get(name)
            .map(|entries| {
                let skip = entries.len().saturating_sub(limit);
                entries.iter().skip(skip).collect()
            })
            .unwrap_or_default()
    }

    /// Latest entry of every metric, ordered by name
    pub fn latest(&self) -> Vec<&ArchitectureMetric> {
        let mut latest: Vec<_> = self.history.values().filter_map(|e| e.back()).collect();
        latest.sort_by(|a, b| a.name.cmp(&b.name));
        latest
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.history.keys().map(String::as_str)
    }

    /// Number of retained entries for a name
    pub fn len(&self, name: &str) -> usize {
        self.history.get(name).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
