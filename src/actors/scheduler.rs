//! SchedulerActor - Triggers periodic full passes
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick ─┐
//!             ├→ try pass gate ─ free → spawn full pass (holds the gate until done)
//! TickNow ────┘                └ busy → skip tick (no queueing)
//! ```
//!
//! A tick never waits for a running pass, so passes can not pile up behind a
//! slow analyzer. Stopping the actor only cancels the timer: a pass that was
//! already spawned runs to completion and records its results.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, instrument, trace, warn};

use crate::monitor::MonitorCore;

use super::messages::{SchedulerCommand, SchedulerStats, TickOutcome};

/// Actor owning the periodic pass timer
pub(crate) struct SchedulerActor {
    core: Arc<MonitorCore>,

    command_rx: mpsc::Receiver<SchedulerCommand>,

    interval_duration: Duration,

    stats: SchedulerStats,
}

impl SchedulerActor {
    pub fn new(
        core: Arc<MonitorCore>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        interval_duration: Duration,
    ) -> Self {
        Self {
            core,
            command_rx,
            interval_duration,
            stats: SchedulerStats::default(),
        }
    }

    /// Run the actor's main loop
    #[instrument(skip(self), fields(interval = ?self.interval_duration))]
    pub async fn run(mut self) {
        debug!("starting scheduler actor");

        // the first pass already ran synchronously on start
        let mut ticker = interval_at(
            Instant::now() + self.interval_duration,
            self.interval_duration,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => {
                    // every handle dropped
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    match cmd {
                        SchedulerCommand::TickNow { respond_to } => {
                            let outcome = self.tick();
                            let _ = respond_to.send(outcome);
                        }

                        SchedulerCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats.clone());
                        }

                        SchedulerCommand::Shutdown { respond_to } => {
                            debug!("received shutdown command");
                            let _ = respond_to.send(());
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        debug!("scheduler actor stopped");
    }

    fn tick(&mut self) -> TickOutcome {
        let Ok(guard) = Arc::clone(self.core.gate()).try_lock_owned() else {
            debug!("previous analysis still running, skipping tick");
            self.stats.ticks_skipped += 1;
            return TickOutcome::Skipped;
        };

        self.stats.passes_started += 1;
        trace!("starting periodic pass #{}", self.stats.passes_started);

        let core = Arc::clone(&self.core);
        tokio::spawn(async move {
            core.full_pass().await;
            drop(guard);
        });

        TickOutcome::Started
    }
}

/// Handle for controlling a SchedulerActor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle").finish_non_exhaustive()
    }
}

impl SchedulerHandle {
    /// Spawn a new scheduler actor
    pub(crate) fn spawn(core: Arc<MonitorCore>, interval: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(core, cmd_rx, interval);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Tick immediately, bypassing the timer
    pub async fn tick_now(&self) -> Result<TickOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::TickNow { respond_to: tx })
            .await
            .context("failed to send TickNow command")?;

        rx.await.context("failed to receive tick outcome")
    }

    pub async fn stats(&self) -> Option<SchedulerStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Cancel the timer
    ///
    /// Returns once the actor has left its loop; no tick fires afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("scheduler stopped without acknowledging")
    }
}

