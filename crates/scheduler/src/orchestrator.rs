//! The autonomous scheduling loop.
//!
//! Two independent ticks drive the hospital:
//!
//! - **Decision tick**: snapshot the world, ask the [`DecisionOracle`] for an action batch,
//!   then apply each action in order against *current* state. The oracle call happens outside
//!   the hospital lock and is bounded by a timeout.
//! - **Sweep tick**: move every instrument set whose sterilization cycle has elapsed into
//!   storage.
//!
//! ## Concurrency
//!
//! The hospital lock is only ever taken for synchronous steps (snapshot, apply batch, sweep),
//! never across an `.await`. While the oracle is thinking, REST handlers and the sweep tick keep
//! changing the world, which is why every action is re-validated when applied rather than
//! trusted from the snapshot.
//!
//! At most one decision is in flight at a time; a decision tick that fires while one is still
//! pending is skipped rather than queued. Stopping the orchestrator is cooperative: the running
//! flag is checked before each tick and again before a late batch is applied.

use crate::oracle::DecisionOracle;
use crate::{OracleError, SchedulerConfig};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use wardflow_core::hospital::lock;
use wardflow_core::{
    Clock, ErrorCategory, InstrumentSet, Notification, NotificationSink, SharedHospital,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TickOutcome {
    /// The orchestrator was stopped when the tick fired.
    Stopped,
    /// A previous decision was still awaiting the oracle.
    InFlight,
    /// The oracle failed or timed out; nothing was applied.
    OracleFailed(String),
    /// The orchestrator was stopped while the oracle was thinking; the batch was dropped.
    Discarded,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub proposed: usize,
    pub applied: usize,
    pub skipped: usize,
}

impl TickReport {
    fn without_batch(outcome: TickOutcome) -> Self {
        Self {
            outcome,
            proposed: 0,
            applied: 0,
            skipped: 0,
        }
    }
}

/// Clears the in-flight flag when the decision tick ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    hospital: SharedHospital,
    oracle: Arc<dyn DecisionOracle>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    cfg: SchedulerConfig,
    running: AtomicBool,
    in_flight: AtomicBool,
}

impl Orchestrator {
    /// Creates an orchestrator in the running state.
    pub fn new(
        hospital: SharedHospital,
        oracle: Arc<dyn DecisionOracle>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        cfg: SchedulerConfig,
    ) -> Self {
        Self {
            hospital,
            oracle,
            sink,
            clock,
            cfg,
            running: AtomicBool::new(true),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::SeqCst) {
            RunState::Running
        } else {
            RunState::Stopped
        }
    }

    /// Flips between running and stopped and returns the new state.
    pub fn toggle(&self) -> RunState {
        let was_running = self.running.fetch_xor(true, Ordering::SeqCst);
        let state = if was_running {
            RunState::Stopped
        } else {
            RunState::Running
        };
        tracing::info!("orchestrator {:?}", state);
        state
    }

    pub fn is_deciding(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Runs one decision cycle.
    ///
    /// Oracle failures and rejected actions are reported through the notification sink and in
    /// the returned [`TickReport`]; they never propagate.
    pub async fn decision_tick(&self) -> TickReport {
        if !self.running.load(Ordering::SeqCst) {
            return TickReport::without_batch(TickOutcome::Stopped);
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("decision tick skipped, previous decision still in flight");
            return TickReport::without_batch(TickOutcome::InFlight);
        }
        let _in_flight = InFlight(&self.in_flight);

        let snapshot = {
            let hospital = lock(&self.hospital);
            hospital.snapshot(self.clock.now())
        };

        let timeout = self.cfg.oracle_timeout();
        let decided = match tokio::time::timeout(timeout, self.oracle.decide(&snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(timeout)),
        };

        let actions = match decided {
            Ok(actions) => actions,
            Err(e) => {
                tracing::warn!("decision tick failed: {}", e);
                self.sink.notify(Notification::error(
                    "Decision failed",
                    e.to_string(),
                    self.clock.now(),
                ));
                return TickReport::without_batch(TickOutcome::OracleFailed(e.to_string()));
            }
        };

        if !self.running.load(Ordering::SeqCst) {
            tracing::info!(
                "orchestrator stopped while deciding, discarding {} actions",
                actions.len()
            );
            return TickReport {
                outcome: TickOutcome::Discarded,
                proposed: actions.len(),
                applied: 0,
                skipped: 0,
            };
        }

        let mut report = TickReport {
            outcome: TickOutcome::Completed,
            proposed: actions.len(),
            applied: 0,
            skipped: 0,
        };
        let mut notifications = Vec::new();
        {
            let mut hospital = lock(&self.hospital);
            for action in &actions {
                let now = self.clock.now();
                match hospital.apply(action, now) {
                    Ok(mut emitted) => {
                        report.applied += 1;
                        notifications.append(&mut emitted);
                    }
                    Err(e) => {
                        report.skipped += 1;
                        let notification = if e.category() == ErrorCategory::Storage {
                            tracing::error!("applying '{}' failed: {}", action, e);
                            Notification::error("Action failed", format!("{action}: {e}"), now)
                        } else {
                            tracing::warn!("skipping '{}': {}", action, e);
                            Notification::info("Action skipped", format!("{action}: {e}"), now)
                        };
                        notifications.push(notification);
                    }
                }
            }
        }

        for notification in notifications {
            self.sink.notify(notification);
        }
        if report.proposed > 0 {
            tracing::info!(
                "decision tick applied {} of {} actions",
                report.applied,
                report.proposed
            );
        }
        report
    }

    /// Completes every elapsed sterilization cycle. Does nothing while stopped.
    pub fn sweep_tick(&self) -> Vec<InstrumentSet> {
        if !self.running.load(Ordering::SeqCst) {
            return Vec::new();
        }

        let now = self.clock.now();
        let swept = lock(&self.hospital).sweep_sterilization(now);
        match swept {
            Ok(sets) => {
                for set in &sets {
                    self.sink.notify(Notification::info(
                        "Sterilization complete",
                        format!("{} is ready in storage", set.name),
                        now,
                    ));
                }
                sets
            }
            Err(e) => {
                tracing::error!("sterilization sweep failed: {}", e);
                self.sink
                    .notify(Notification::error("Sterilization sweep failed", e.to_string(), now));
                Vec::new()
            }
        }
    }

    /// Drives both ticks until `shutdown` resolves.
    ///
    /// Each decision tick runs as its own task so the sweep keeps its cadence while the oracle
    /// is being awaited.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let mut decision = tokio::time::interval(self.cfg.decision_interval());
        decision.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweep = tokio::time::interval(self.cfg.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "orchestrator started (oracle: {}, decision every {:?}, sweep every {:?})",
            self.oracle.name(),
            self.cfg.decision_interval(),
            self.cfg.sweep_interval()
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = decision.tick() => {
                    let this = Arc::clone(&self);
                    tokio::spawn(async move {
                        this.decision_tick().await;
                    });
                }
                _ = sweep.tick() => {
                    self.sweep_tick();
                }
            }
        }

        tracing::info!("orchestrator shut down");
    }
}
