//! ChangeRunnerActor - Analyzes changed files
//!
//! ## Message Flow
//!
//! ```text
//! notify callback → ChangeQueue (one slot per path) → ChangeRunnerActor
//!                                                        │ waits for pass gate
//!                                                        ▼
//!                          per-file analysis → MonitoringEvent → [EventBus, AlertManager]
//! ```
//!
//! Unlike the scheduler, the runner waits for the pass gate instead of
//! skipping: a change arriving mid-pass is analyzed once the pass is done.
//! Shutting down raises a stop signal first, so a change still waiting for
//! the gate is dropped rather than analyzed after the monitor stopped.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, instrument, trace, warn};

use crate::monitor::MonitorCore;
use crate::watcher::ChangeQueue;

use super::messages::RunnerCommand;

/// Actor draining the change queue
pub(crate) struct ChangeRunnerActor {
    core: Arc<MonitorCore>,

    queue: Arc<ChangeQueue>,

    command_rx: mpsc::Receiver<RunnerCommand>,

    /// Turns true when the monitor stops
    stopped: watch::Receiver<bool>,

    /// Changes analyzed so far
    processed: u64,
}

impl ChangeRunnerActor {
    pub fn new(
        core: Arc<MonitorCore>,
        queue: Arc<ChangeQueue>,
        command_rx: mpsc::Receiver<RunnerCommand>,
        stopped: watch::Receiver<bool>,
    ) -> Self {
        Self {
            core,
            queue,
            command_rx,
            stopped,
            processed: 0,
        }
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting change runner actor");

        'outer: loop {
            while !self.is_stopped() {
                let Some(path) = self.queue.pop() else {
                    break;
                };

                trace!("analyzing change to {}", path.display());
                self.core.analyze_queued_file(&path, &mut self.stopped).await;
                if self.is_stopped() {
                    break;
                }
                self.processed += 1;

                // a shutdown must not wait for the rest of the queue
                match self.command_rx.try_recv() {
                    Ok(cmd) => {
                        if !self.handle_command(cmd) {
                            break 'outer;
                        }
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        warn!("command channel closed, shutting down");
                        break 'outer;
                    }
                }
            }

            // once stopped, only a command can wake the actor
            let stopped = self.is_stopped();

            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    if !self.handle_command(cmd) {
                        break;
                    }
                }

                _ = self.queue.notified(), if !stopped => {}
            }
        }

        debug!("change runner actor stopped");
    }

    /// Returns `false` when the actor should stop
    fn handle_command(&mut self, cmd: RunnerCommand) -> bool {
        match cmd {
            RunnerCommand::GetProcessed { respond_to } => {
                let _ = respond_to.send(self.processed);
                true
            }

            RunnerCommand::Shutdown { respond_to } => {
                debug!("received shutdown command");
                let _ = respond_to.send(());
                false
            }
        }
    }
}

/// Handle for controlling a ChangeRunnerActor
#[derive(Clone)]
pub struct ChangeRunnerHandle {
    sender: mpsc::Sender<RunnerCommand>,
    stop: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for ChangeRunnerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeRunnerHandle").finish_non_exhaustive()
    }
}

impl ChangeRunnerHandle {
    /// Spawn a new change runner actor draining `queue`
    pub(crate) fn spawn(core: Arc<MonitorCore>, queue: Arc<ChangeQueue>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (stop_tx, stop_rx) = watch::channel(false);

        let actor = ChangeRunnerActor::new(core, queue, cmd_rx, stop_rx);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            stop: Arc::new(stop_tx),
        }
    }

    /// Number of changes analyzed so far
    pub async fn processed(&self) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RunnerCommand::GetProcessed { respond_to: tx })
            .await
            .context("failed to send GetProcessed command")?;

        rx.await.context("failed to receive response")
    }

    /// Stop taking changes from the queue
    ///
    /// A change waiting for the pass gate is dropped. Returns once the actor
    /// has exited, so no file analysis starts after this.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop.send_replace(true);

        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RunnerCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("change runner stopped without acknowledging")
    }
}
