//! Tick scheduler and run lifecycle
//!
//! One tick steps every agent once, in load order, against spatial
//! contexts snapshotted before the first step. Snapshotting up front
//! means agents within a tick all see the same world, whatever order
//! they act in.

use crate::core::error::Result;
use crate::core::types::{ModelTime, Tick};
use crate::llm::DecisionSource;
use crate::scenario::context::SpatialContext;
use crate::scenario::state::ScenarioState;
use crate::sim::record::{RecordEntry, RunRecord};
use crate::sim::step::{step_agent, AgentOutcome};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Hour at which each simulated day begins
const DAY_START: ModelTime = ModelTime { hour: 4, minute: 0 };

/// Lifecycle of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Paused,
    Terminated,
}

/// Everything that happened in one tick
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: Tick,
    /// Simulated clock at the start of the tick
    pub time: ModelTime,
    pub day: u32,
    pub outcomes: Vec<AgentOutcome>,
}

/// Drives the simulation: owns the state, the decision source, and the
/// run record.
pub struct Scheduler<S: DecisionSource> {
    state: ScenarioState,
    source: S,
    record: RunRecord,
    run_state: RunState,
    /// Completed ticks; the next tick is numbered `tick + 1`
    tick: Tick,
    day: u32,
    time: ModelTime,
    stop: Arc<AtomicBool>,
}

impl<S: DecisionSource> Scheduler<S> {
    pub fn new(state: ScenarioState, source: S) -> Self {
        Self {
            state,
            source,
            record: RunRecord::new(),
            run_state: RunState::NotStarted,
            tick: 0,
            day: 1,
            time: DAY_START,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn scenario(&self) -> &ScenarioState {
        &self.state
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn time(&self) -> ModelTime {
        self.time
    }

    /// Handle for requesting termination from another task or a signal
    /// handler. Observed between agent steps; the in-flight step always
    /// completes.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn start(&mut self) {
        if self.run_state == RunState::NotStarted {
            self.run_state = RunState::Running;
            tracing::info!(
                scenario = %self.state.rules.name,
                agents = self.state.agents().len(),
                "run started"
            );
        }
    }

    pub fn pause(&mut self) {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            self.run_state = RunState::Running;
        }
    }

    /// Run one tick. Returns `None` without stepping anything unless the
    /// run is in `Running`.
    pub async fn tick(&mut self) -> Result<Option<TickReport>> {
        if self.run_state != RunState::Running {
            return Ok(None);
        }

        let tick_number = self.tick + 1;
        let tick_time = self.time;
        let ids = self.state.agent_ids();

        // Snapshot every agent's view before any of them move
        let mut contexts = Vec::with_capacity(ids.len());
        for &id in &ids {
            contexts.push(SpatialContext::snapshot(&self.state, id)?);
        }

        let mut outcomes = Vec::with_capacity(ids.len());
        for (&id, ctx) in ids.iter().zip(&contexts) {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!(tick = tick_number, "stop requested, ending run");
                self.run_state = RunState::Terminated;
                break;
            }
            let outcome = step_agent(&mut self.state, &self.source, id, ctx, tick_number).await?;
            self.record.append(RecordEntry {
                tick: tick_number,
                agent_id: outcome.agent_id,
                agent: outcome.agent.clone(),
                action: outcome.action.to_string(),
                status: outcome.status,
            });
            outcomes.push(outcome);
        }

        // A stop observed mid-tick leaves the tick incomplete; the
        // counter and clock only advance for fully stepped ticks.
        if self.run_state == RunState::Running {
            self.tick = tick_number;
            self.advance_clock();

            if self.finished() {
                self.run_state = RunState::Terminated;
                tracing::info!(
                    tick = self.tick,
                    day = self.day,
                    active = self.state.active_count(),
                    "run terminated"
                );
            }
        }

        Ok(Some(TickReport {
            tick: tick_number,
            time: tick_time,
            day: self.day,
            outcomes,
        }))
    }

    fn advance_clock(&mut self) {
        let remaining = self.time.time_to(&DAY_START);
        // Crossing the day-start hour begins a new simulated day; at
        // exactly day start the current day has only just begun
        if remaining != 0 && remaining <= self.state.rules.minutes_per_step {
            self.day += 1;
            tracing::debug!(day = self.day, "new simulated day");
        }
        self.time = self.time.n_mins_from_now(self.state.rules.minutes_per_step);
    }

    fn finished(&self) -> bool {
        self.state.all_terminal()
            || self.tick >= self.state.rules.max_ticks
            || self.day > self.state.rules.n_days
    }

    /// Tick until the run terminates
    pub async fn run_to_completion(&mut self) -> Result<()> {
        self.start();
        while self.run_state == RunState::Running {
            self.tick().await?;
        }
        Ok(())
    }

    /// Close the record, flush the source, and write the run CSV under
    /// `out_dir/<scenario name>/`.
    pub fn finalize(&mut self, out_dir: &Path) -> Result<PathBuf> {
        self.run_state = RunState::Terminated;
        self.record.finalize();
        self.source.finalize()?;
        let dir = out_dir.join(&self.state.rules.name);
        let path = self.record.write_csv(&dir)?;
        tracing::info!(summary = %self.record.summary(), "run finalized");
        Ok(path)
    }
}
