//! Test analyzers and helper functions for integration tests

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use archwatch::model::{FileReport, TreeReport};
use archwatch::{Analyzer, MonitorConfig, Violation, ViolationSeverity};
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Route crate logs to the test output, once per test binary
pub fn init_tracing() {
    let filter = filter::Targets::new().with_target("archwatch", LevelFilter::DEBUG);
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_test_writer()
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .try_init();
}

/// Configuration with the watcher off and the given tick interval
pub fn test_config(interval_ms: u64) -> MonitorConfig {
    let mut config = MonitorConfig::for_root(".");
    config.interval_ms = interval_ms;
    config.watch.enabled = false;
    config
}

pub fn violations(severities: &[ViolationSeverity]) -> Vec<Violation> {
    severities
        .iter()
        .enumerate()
        .map(|(i, severity)| Violation::new(*severity, format!("violation #{i}")))
        .collect()
}

/// Poll `condition` until it holds, panicking after five seconds
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Always reports the same score and file violations
pub struct Fixed {
    pub score: f64,
    pub file_violations: Vec<Violation>,
}

pub fn fixed(score: f64) -> Arc<dyn Analyzer> {
    Arc::new(Fixed {
        score,
        file_violations: vec![],
    })
}

pub fn fixed_with_file_violations(score: f64, severities: &[ViolationSeverity]) -> Arc<dyn Analyzer> {
    Arc::new(Fixed {
        score,
        file_violations: violations(severities),
    })
}

#[async_trait]
impl Analyzer for Fixed {
    async fn analyze_tree(&self, _root: &Path) -> anyhow::Result<TreeReport> {
        Ok(TreeReport {
            score: self.score,
            violations: vec![],
        })
    }

    async fn analyze_file(&self, _path: &Path) -> anyhow::Result<FileReport> {
        Ok(FileReport {
            violations: self.file_violations.clone(),
        })
    }
}

/// Reports the given scores in order, repeating the last one
pub struct Sequence {
    scores: Mutex<Vec<f64>>,
}

pub fn sequence(scores: &[f64]) -> Arc<dyn Analyzer> {
    Arc::new(Sequence {
        scores: Mutex::new(scores.iter().rev().copied().collect()),
    })
}

#[async_trait]
impl Analyzer for Sequence {
    async fn analyze_tree(&self, _root: &Path) -> anyhow::Result<TreeReport> {
        let mut scores = self.scores.lock().unwrap();
        let score = match scores.len() {
            0 => anyhow::bail!("no scores left"),
            1 => scores[0],
            _ => scores.pop().unwrap(),
        };

        Ok(TreeReport {
            score,
            violations: vec![],
        })
    }

    async fn analyze_file(&self, _path: &Path) -> anyhow::Result<FileReport> {
        Ok(FileReport::default())
    }
}

/// Fails every call
pub struct Failing;

pub fn failing() -> Arc<dyn Analyzer> {
    Arc::new(Failing)
}

#[async_trait]
impl Analyzer for Failing {
    async fn analyze_tree(&self, _root: &Path) -> anyhow::Result<TreeReport> {
        anyhow::bail!("could not parse tsconfig.json")
    }

    async fn analyze_file(&self, _path: &Path) -> anyhow::Result<FileReport> {
        anyhow::bail!("could not parse tsconfig.json")
    }
}

/// Reports a fixed score for the first `successes` tree analyses, then fails
pub struct Flaky {
    score: f64,
    remaining: AtomicUsize,
}

pub fn flaky(score: f64, successes: usize) -> Arc<dyn Analyzer> {
    Arc::new(Flaky {
        score,
        remaining: AtomicUsize::new(successes),
    })
}

#[async_trait]
impl Analyzer for Flaky {
    async fn analyze_tree(&self, _root: &Path) -> anyhow::Result<TreeReport> {
        let left = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        anyhow::ensure!(left.is_ok(), "analyzer crashed");

        Ok(TreeReport {
            score: self.score,
            violations: vec![],
        })
    }

    async fn analyze_file(&self, _path: &Path) -> anyhow::Result<FileReport> {
        Ok(FileReport::default())
    }
}

/// Tree analysis blocks until a permit is released, tracking overlap
///
/// Every finished tree analysis consumes one permit.
pub struct Gated {
    score: f64,
    permits: Semaphore,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl Gated {
    pub fn new(score: f64, initial_permits: usize) -> Arc<Self> {
        Arc::new(Self {
            score,
            permits: Semaphore::new(initial_permits),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    pub fn release(&self, permits: usize) {
        self.permits.add_permits(permits);
    }

    /// Tree and file analyses started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of analyses that were running at the same time
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Analyzer for Gated {
    async fn analyze_tree(&self, _root: &Path) -> anyhow::Result<TreeReport> {
        self.enter();
        let permit = self.permits.acquire().await;
        self.leave();
        permit?.forget();

        Ok(TreeReport {
            score: self.score,
            violations: vec![],
        })
    }

    async fn analyze_file(&self, _path: &Path) -> anyhow::Result<FileReport> {
        self.enter();
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.leave();

        Ok(FileReport::default())
    }
}

pub fn gated(analyzer: &Arc<Gated>) -> Arc<dyn Analyzer> {
    Arc::clone(analyzer) as Arc<dyn Analyzer>
}
