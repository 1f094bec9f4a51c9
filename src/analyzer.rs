//! Analyzer collaborator contract
//!
//! Analyzers are opaque to the monitor: they inspect the source tree (or one
//! file) and hand back a score plus violations. Everything the monitor needs to
//! turn those reports into metrics lives on [`AnalyzerKind`].

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::WatchConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::model::{AlertThreshold, FileReport, MetricCategory, TreeReport};

/// Threshold applied to metrics without a configured or kind-specific one
pub const FALLBACK_THRESHOLD: AlertThreshold = AlertThreshold {
    warning: 70.0,
    critical: 50.0,
};

/// A structural analyzer over a source tree
///
/// Implementations must be `Send + Sync`; the monitor shares them between the
/// periodic scheduler and the change runner. Errors are reported, never
/// propagated: a failing analyzer only drops its own metric for that pass.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze the whole tree below `root`
    async fn analyze_tree(&self, root: &Path) -> anyhow::Result<TreeReport>;

    /// Analyze a single changed file
    async fn analyze_file(&self, path: &Path) -> anyhow::Result<FileReport>;
}

/// The analyzers the monitor knows how to turn into metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyzerKind {
    Modularity,
    Dependency,
    Interface,
    TypeSafety,
    Performance,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 5] = [
        AnalyzerKind::Modularity,
        AnalyzerKind::Dependency,
        AnalyzerKind::Interface,
        AnalyzerKind::TypeSafety,
        AnalyzerKind::Performance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalyzerKind::Modularity => "modularity",
            AnalyzerKind::Dependency => "dependency",
            AnalyzerKind::Interface => "interface",
            AnalyzerKind::TypeSafety => "type-safety",
            AnalyzerKind::Performance => "performance",
        }
    }

    /// Name of the metric produced from this analyzer's score
    pub fn metric_name(self) -> &'static str {
        match self {
            AnalyzerKind::Modularity => "modularity-compliance",
            AnalyzerKind::Dependency => "dependency-health",
            AnalyzerKind::Interface => "interface-consistency",
            AnalyzerKind::TypeSafety => "type-safety-compliance",
            AnalyzerKind::Performance => "performance-compliance",
        }
    }

    pub fn category(self) -> MetricCategory {
        match self {
            AnalyzerKind::Modularity | AnalyzerKind::Interface | AnalyzerKind::TypeSafety => {
                MetricCategory::Compliance
            }
            AnalyzerKind::Performance => MetricCategory::Performance,
            AnalyzerKind::Dependency => MetricCategory::Security,
        }
    }

    pub fn default_threshold(self) -> AlertThreshold {
        match self {
            AnalyzerKind::Modularity => AlertThreshold {
                warning: 70.0,
                critical: 50.0,
            },
            AnalyzerKind::Dependency => AlertThreshold {
                warning: 80.0,
                critical: 60.0,
            },
            AnalyzerKind::Interface => AlertThreshold {
                warning: 75.0,
                critical: 55.0,
            },
            AnalyzerKind::TypeSafety => AlertThreshold {
                warning: 85.0,
                critical: 70.0,
            },
            AnalyzerKind::Performance => FALLBACK_THRESHOLD,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AnalyzerKind::Modularity => "Adherence to module size and boundary rules",
            AnalyzerKind::Dependency => "Health of the dependency graph and manifests",
            AnalyzerKind::Interface => "Consistency of exported interfaces and contracts",
            AnalyzerKind::TypeSafety => "Absence of unsafe typing patterns",
            AnalyzerKind::Performance => "Absence of known performance anti-patterns",
        }
    }

    pub fn impact(self) -> &'static str {
        match self {
            AnalyzerKind::Modularity => "Oversized or tangled modules slow down every change",
            AnalyzerKind::Dependency => {
                "Outdated or circular dependencies expose the project to breakage and vulnerabilities"
            }
            AnalyzerKind::Interface => "Inconsistent interfaces cause integration bugs",
            AnalyzerKind::TypeSafety => "Weak typing lets defects reach runtime",
            AnalyzerKind::Performance => "Anti-patterns degrade responsiveness under load",
        }
    }

    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            AnalyzerKind::Modularity => &[
                "Split modules that exceed the size limit",
                "Move shared helpers into dedicated packages",
                "Enforce module boundaries with lint rules",
                "Document ownership of each module",
            ],
            AnalyzerKind::Dependency => &[
                "Update outdated dependencies",
                "Break circular imports",
                "Remove unused dependencies",
                "Pin dependency versions in manifests",
            ],
            AnalyzerKind::Interface => &[
                "Align naming of exported interfaces",
                "Consolidate duplicated type definitions",
                "Version public contracts explicitly",
                "Add interface documentation",
            ],
            AnalyzerKind::TypeSafety => &[
                "Replace `any` with precise types",
                "Enable strict compiler options",
                "Remove unchecked type assertions",
                "Add type tests for public APIs",
            ],
            AnalyzerKind::Performance => &[
                "Remove synchronous work from hot paths",
                "Memoize expensive computations",
                "Batch repeated I/O operations",
                "Add performance budgets to CI",
            ],
        }
    }

    /// Whether a change to a file of `category` is relevant to this analyzer
    pub fn handles(self, category: FileCategory) -> bool {
        match category {
            FileCategory::Source => !matches!(self, AnalyzerKind::Dependency),
            FileCategory::Manifest => matches!(self, AnalyzerKind::Dependency),
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recognized kinds of changed files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    /// TypeScript/JavaScript source
    Source,

    /// Dependency manifest or lock file
    Manifest,
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileCategory::Source => f.write_str("source"),
            FileCategory::Manifest => f.write_str("manifest"),
        }
    }
}

/// Maps file names to a [`FileCategory`]
#[derive(Debug, Clone)]
pub struct FileClassifier {
    source: Regex,
    manifest: Regex,
}

impl FileClassifier {
    pub fn new(source_pattern: &str, manifest_pattern: &str) -> MonitorResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                MonitorError::InvalidConfig(format!("invalid file pattern `{pattern}`: {e}"))
            })
        };

        Ok(Self {
            source: compile(source_pattern)?,
            manifest: compile(manifest_pattern)?,
        })
    }

    pub fn from_config(config: &WatchConfig) -> MonitorResult<Self> {
        Self::new(&config.source_pattern, &config.manifest_pattern)
    }

    /// Category of `path`, `None` for files no analyzer cares about
    pub fn classify(&self, path: &Path) -> Option<FileCategory> {
        let name = path.file_name()?.to_str()?;

        if self.manifest.is_match(name) {
            Some(FileCategory::Manifest)
        } else if self.source.is_match(name) {
            Some(FileCategory::Source)
        } else {
            None
        }
    }
}
