use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::trace;

use crate::error::{MonitorError, MonitorResult};
use crate::model::AlertThreshold;

/// Monitor configuration
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    /// Root of the monitored source tree
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Interval between periodic full passes
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Entries retained per metric name
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Number of previous values averaged for trend detection
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Minimum difference from the window mean that counts as a trend
    #[serde(default = "default_trend_sensitivity")]
    pub trend_sensitivity: f64,

    /// Events retained in the in-memory event log
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Maximum number of issues shown on the dashboard
    #[serde(default = "default_top_issues_limit")]
    pub top_issues_limit: usize,

    /// Points per metric included in dashboard trend series
    #[serde(default = "default_trend_points")]
    pub trend_points: usize,

    #[serde(default)]
    pub watch: WatchConfig,

    /// Per-metric overrides of the default thresholds
    #[serde(default)]
    pub thresholds: HashMap<String, AlertThreshold>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            interval_ms: default_interval_ms(),
            history_capacity: default_history_capacity(),
            trend_window: default_trend_window(),
            trend_sensitivity: default_trend_sensitivity(),
            event_log_capacity: default_event_log_capacity(),
            top_issues_limit: default_top_issues_limit(),
            trend_points: default_trend_points(),
            watch: WatchConfig::default(),
            thresholds: HashMap::new(),
        }
    }
}

impl MonitorConfig {
    /// Configuration rooted at `root` with default settings
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        let zero_fields = [
            ("interval_ms", self.interval_ms == 0),
            ("history_capacity", self.history_capacity == 0),
            ("trend_window", self.trend_window == 0),
            ("event_log_capacity", self.event_log_capacity == 0),
        ];

        for (field, is_zero) in zero_fields {
            if is_zero {
                return Err(MonitorError::InvalidConfig(format!(
                    "`{field}` must be greater than zero"
                )));
            }
        }

        if !self.trend_sensitivity.is_finite() || self.trend_sensitivity < 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "`trend_sensitivity` must be a non-negative number, got {}",
                self.trend_sensitivity
            )));
        }

        for (metric, threshold) in &self.thresholds {
            threshold.validate(metric)?;
        }

        Ok(())
    }
}

/// File watcher configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,

    /// Directory names never reported as changed (build output, dependencies, VCS)
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,

    /// File names treated as analyzable source code
    #[serde(default = "default_source_pattern")]
    pub source_pattern: String,

    /// File names treated as dependency manifests
    #[serde(default = "default_manifest_pattern")]
    pub manifest_pattern: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
            ignored_dirs: default_ignored_dirs(),
            source_pattern: default_source_pattern(),
            manifest_pattern: default_manifest_pattern(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_history_capacity() -> usize {
    100
}

fn default_trend_window() -> usize {
    5
}

fn default_trend_sensitivity() -> f64 {
    5.0
}

fn default_event_log_capacity() -> usize {
    10_000
}

fn default_top_issues_limit() -> usize {
    10
}

fn default_trend_points() -> usize {
    24
}

fn default_watch_enabled() -> bool {
    true
}

fn default_ignored_dirs() -> Vec<String> {
    ["node_modules", "dist", "build", "coverage", ".git", "target"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_source_pattern() -> String {
    r"\.(ts|tsx|js|jsx|mjs|cjs)$".to_string()
}

fn default_manifest_pattern() -> String {
    r"^(package\.json|package-lock\.json|yarn\.lock|pnpm-lock\.yaml)$".to_string()
}

pub fn read_config_file(path: impl AsRef<Path>) -> MonitorResult<MonitorConfig> {
    let file_content = std::fs::read_to_string(path)?;
    let config: MonitorConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
