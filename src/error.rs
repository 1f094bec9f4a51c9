//! Error types for the monitor

/// Result type alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors surfaced at the monitor's API boundary
///
/// Analyzer failures never surface here; they are recovered inside a pass
/// and reported as events instead.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A threshold pair that cannot be evaluated
    #[error("invalid threshold for `{metric}`: {reason}")]
    InvalidThreshold { metric: String, reason: String },

    /// Invalid monitor configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The same analyzer kind was registered twice
    #[error("analyzer `{0}` registered more than once")]
    DuplicateAnalyzer(String),

    /// Subscription to a notification name the bus does not publish
    #[error("unknown notification `{0}`")]
    UnknownNotification(String),

    /// Filesystem watcher error
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O error (config file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}
