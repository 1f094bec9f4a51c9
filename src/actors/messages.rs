//! Message types for actor communication
//!
//! Every actor is controlled through an mpsc command channel; replies travel
//! back over oneshot channels carried in the command.

use serde::Serialize;
use tokio::sync::oneshot;

/// Commands that can be sent to the SchedulerActor
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Tick immediately (bypassing the interval timer)
    ///
    /// Follows the same rules as a timer tick: skipped while a pass runs.
    TickNow {
        respond_to: oneshot::Sender<TickOutcome>,
    },

    /// Get tick statistics
    GetStats {
        respond_to: oneshot::Sender<SchedulerStats>,
    },

    /// Cancel the timer and exit
    ///
    /// A pass already in flight keeps running and records its results.
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickOutcome {
    /// A full pass was started
    Started,

    /// A pass was still running, the tick was dropped
    Skipped,
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    /// Ticks that started a pass
    pub passes_started: u64,

    /// Ticks dropped because a pass was running
    pub ticks_skipped: u64,
}

/// Commands that can be sent to the ChangeRunnerActor
#[derive(Debug)]
pub enum RunnerCommand {
    /// Get the number of file changes analyzed so far
    GetProcessed { respond_to: oneshot::Sender<u64> },

    /// Stop taking changes from the queue and exit
    ///
    /// Acknowledged once the actor no longer touches monitor state.
    Shutdown { respond_to: oneshot::Sender<()> },
}
