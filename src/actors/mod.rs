//! Actors driving a running monitor
//!
//! Each actor runs as an independent async task and is controlled through an
//! mpsc command channel wrapped in a cloneable handle.
//!
//! ## Architecture Overview
//!
//! ```text
//!        ┌──────────────┐          ┌──────────────┐
//!        │   Monitor    │          │  notify      │
//!        └──────┬───────┘          │  watcher     │
//!               │ spawns           └──────┬───────┘
//!       ┌───────┴────────┐                │ push (coalescing)
//!       │                │                ▼
//! ┌─────▼──────┐  ┌──────▼───────┐  ┌─────────────┐
//! │ Scheduler  │  │ ChangeRunner │◀─│ ChangeQueue │
//! └─────┬──────┘  └──────┬───────┘  └─────────────┘
//!       │ try_lock        │ lock
//!       └──────┐   ┌──────┘
//!            ┌─▼───▼─┐
//!            │ gate  │  one analysis at a time
//!            └───┬───┘
//!                ▼
//!          Orchestrator → MetricStore / AlertManager / EventLog → EventBus
//! ```
//!
//! ## Actor Types
//!
//! - **SchedulerActor**: Starts a full pass on every tick, skipping ticks while a pass runs
//! - **ChangeRunnerActor**: Analyzes queued file changes one by one, waiting for a running pass
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has an mpsc command channel for control messages
//! 2. **Request/Response**: oneshot channels for synchronous queries
//! 3. **Exclusion**: a shared tokio mutex serializes all analysis

pub mod messages;
pub mod runner;
pub mod scheduler;
