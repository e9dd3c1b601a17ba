//! Stage processors: one worker per stage that pulls the oldest item from its
//! input stage, processes it and writes the next stage back.
//!
//! A processor never holds item state between cycles. Everything it knows
//! about an item comes from the record store at pull time.

pub mod classification;
pub mod placeholder;
pub mod prompt;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::PipelineError;
use crate::state_machine::{ItemPatch, Stage, StageMachine, StageOutcome, Transition, WorkItem};
use crate::store::{RecordStore, StoreError};

pub use classification::{ClassificationProcessor, ClassificationSettings};
pub use placeholder::PlaceholderProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorStatus {
    Idle,
    Processing,
    Error,
    Stopped,
}

impl std::fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessorStatus::Idle => write!(f, "idle"),
            ProcessorStatus::Processing => write!(f, "processing"),
            ProcessorStatus::Error => write!(f, "error"),
            ProcessorStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// What one pull → process → advance cycle did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Nothing was waiting in the input stage.
    Idle,
    Advanced {
        item_id: String,
        from: Stage,
        to: Stage,
    },
    /// Processing failed; the item stays put and is pulled again later.
    Retained { item_id: String, reason: String },
}

/// The stage-specific work a processor does.
pub enum ProcessorKind {
    Classification(ClassificationProcessor),
    Extraction(PlaceholderProcessor),
    FinalProcessing(PlaceholderProcessor),
    /// Marks processed items done.
    Completion,
}

impl ProcessorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessorKind::Classification(_) => "classification",
            ProcessorKind::Extraction(_) => "extraction",
            ProcessorKind::FinalProcessing(_) => "final_processing",
            ProcessorKind::Completion => "completion",
        }
    }

    pub async fn process(&self, item: &mut WorkItem) -> StageOutcome {
        match self {
            ProcessorKind::Classification(p) => p.process(item).await,
            ProcessorKind::Extraction(p) | ProcessorKind::FinalProcessing(p) => {
                p.process(item).await
            }
            ProcessorKind::Completion => StageOutcome::Success,
        }
    }

    /// Whether a successfully processed item should skip straight to DONE.
    /// Only classification exits early, for items it could not classify.
    pub fn short_circuits(&self, item: &WorkItem) -> bool {
        matches!(self, ProcessorKind::Classification(_))
            && item.classification_status.is_permanent_failure()
    }
}

/// Status snapshot for one processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorSnapshot {
    pub stage: Stage,
    pub pulls_from: Stage,
    pub kind: &'static str,
    pub status: ProcessorStatus,
    pub current_item: Option<String>,
    pub poll_interval_secs: f64,
}

struct ProcessorState {
    status: ProcessorStatus,
    current_item: Option<String>,
}

pub struct StageProcessor {
    reported_stage: Stage,
    pulls_from: Stage,
    poll_interval: Duration,
    kind: ProcessorKind,
    records: Arc<dyn RecordStore>,
    state: Mutex<ProcessorState>,
    running: AtomicBool,
    // held for the whole of a cycle
    cycle: tokio::sync::Mutex<()>,
}

impl StageProcessor {
    pub fn new(
        reported_stage: Stage,
        pulls_from: Stage,
        poll_interval: Duration,
        kind: ProcessorKind,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            reported_stage,
            pulls_from,
            poll_interval,
            kind,
            records,
            state: Mutex::new(ProcessorState {
                status: ProcessorStatus::Idle,
                current_item: None,
            }),
            running: AtomicBool::new(false),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn reported_stage(&self) -> Stage {
        self.reported_stage
    }

    pub fn pulls_from(&self) -> Stage {
        self.pulls_from
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn kind(&self) -> &ProcessorKind {
        &self.kind
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, ProcessorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ProcessorStatus {
        self.state().status
    }

    pub fn current_item(&self) -> Option<String> {
        self.state().current_item.clone()
    }

    fn set_status(&self, status: ProcessorStatus) {
        self.state().status = status;
    }

    pub fn snapshot(&self) -> ProcessorSnapshot {
        let state = self.state();
        ProcessorSnapshot {
            stage: self.reported_stage,
            pulls_from: self.pulls_from,
            kind: self.kind.name(),
            status: state.status,
            current_item: state.current_item.clone(),
            poll_interval_secs: self.poll_interval.as_secs_f64(),
        }
    }

    /// Oldest item waiting in the input stage.
    pub async fn pull_next(&self) -> Result<Option<WorkItem>, StoreError> {
        Ok(self
            .records
            .list_by_stage(self.pulls_from, Some(1))
            .await?
            .into_iter()
            .next())
    }

    /// Write the stage that follows `outcome`. Failures leave the item as is.
    pub async fn advance(
        &self,
        item: &WorkItem,
        outcome: &StageOutcome,
    ) -> Result<Transition, StoreError> {
        let short_circuit = self.kind.short_circuits(item);
        let transition = StageMachine::next(self.pulls_from, outcome, short_circuit);
        if let Some(target) = transition.target() {
            self.records.patch(&item.id, &ItemPatch::stage(target)).await?;
            tracing::info!(
                item_id = %item.id,
                from = %self.pulls_from,
                to = %target,
                short_circuit,
                "item advanced"
            );
        }
        Ok(transition)
    }

    /// One pull → process → advance cycle. Waits for any cycle already in
    /// progress on this processor.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let _cycle = self.cycle.lock().await;
        self.guarded_cycle().await
    }

    /// Run a cycle only if the processor is idle and no cycle is in flight.
    /// Returns `None` without doing anything otherwise.
    pub async fn try_run_cycle(&self) -> Option<Result<CycleOutcome, PipelineError>> {
        let _cycle = self.cycle.try_lock().ok()?;
        if self.status() != ProcessorStatus::Idle {
            return None;
        }
        Some(self.guarded_cycle().await)
    }

    async fn guarded_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let result = AssertUnwindSafe(self.cycle_inner()).catch_unwind().await;
        {
            let mut state = self.state();
            if state.status == ProcessorStatus::Processing {
                state.status = ProcessorStatus::Idle;
            }
            state.current_item = None;
        }
        result.unwrap_or_else(|panic| {
            Err(PipelineError::Panicked {
                stage: self.reported_stage,
                message: panic_message(panic.as_ref()),
            })
        })
    }

    async fn cycle_inner(&self) -> Result<CycleOutcome, PipelineError> {
        let Some(mut item) = self.pull_next().await? else {
            self.set_status(ProcessorStatus::Idle);
            return Ok(CycleOutcome::Idle);
        };

        {
            let mut state = self.state();
            state.status = ProcessorStatus::Processing;
            state.current_item = Some(item.id.clone());
        }
        let started = Instant::now();
        tracing::debug!(stage = %self.reported_stage, item_id = %item.id, "processing item");

        let outcome = self.kind.process(&mut item).await;
        let transition = self.advance(&item, &outcome).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        Ok(match transition {
            Transition::Next(to) | Transition::ShortCircuit(to) => CycleOutcome::Advanced {
                item_id: item.id,
                from: self.pulls_from,
                to,
            },
            Transition::Retain { reason, .. } => {
                tracing::warn!(
                    stage = %self.reported_stage,
                    item_id = %item.id,
                    elapsed_ms,
                    %reason,
                    "processing failed, item retained"
                );
                CycleOutcome::Retained {
                    item_id: item.id,
                    reason,
                }
            }
            Transition::Complete => CycleOutcome::Idle,
        })
    }

    /// Poll until stopped or `shutdown` fires. A failed cycle sets the
    /// `error` status and doubles the wait before the next one.
    pub async fn run_loop(&self, mut shutdown: watch::Receiver<bool>) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            stage = %self.reported_stage,
            pulls_from = %self.pulls_from,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "processor started"
        );

        while self.is_running() && !*shutdown.borrow() {
            let delay = match self.run_cycle().await {
                Ok(outcome) => {
                    if outcome != CycleOutcome::Idle {
                        tracing::debug!(stage = %self.reported_stage, ?outcome, "cycle finished");
                    }
                    self.poll_interval
                }
                Err(e) => {
                    tracing::error!(stage = %self.reported_stage, error = %e, "processor cycle failed");
                    self.set_status(ProcessorStatus::Error);
                    self.poll_interval * 2
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!(stage = %self.reported_stage, "processor loop exited");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut state = self.state();
        state.status = ProcessorStatus::Stopped;
        state.current_item = None;
    }

    /// Wait out any cycle in flight, including one started by a trigger on
    /// another task, then stop. Holding the cycle lock while stopping keeps a
    /// new trigger from slipping in between.
    pub(crate) async fn quiesce(&self) {
        let _cycle = self.cycle.lock().await;
        self.stop();
    }

    /// Back to a fresh idle processor, ready to be started again.
    pub fn reset(&self) {
        let mut state = self.state();
        state.status = ProcessorStatus::Idle;
        state.current_item = None;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
