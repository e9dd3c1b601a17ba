//! Runs one polling loop per stage processor.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::processor::{CycleOutcome, ProcessorSnapshot, ProcessorStatus, StageProcessor};
use crate::state_machine::Stage;
use crate::store::RecordStore;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub engine_running: bool,
    /// Keyed by the stage each processor reports as.
    pub processors: BTreeMap<Stage, ProcessorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Ran(CycleOutcome),
    /// The processor was busy; nothing was run or queued.
    Skipped(ProcessorStatus),
    UnknownStage,
}

#[derive(Default)]
struct LoopSet {
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

pub struct PipelineEngine {
    processors: Vec<Arc<StageProcessor>>,
    records: Arc<dyn RecordStore>,
    running: AtomicBool,
    loops: Mutex<LoopSet>,
}

impl PipelineEngine {
    pub fn new(processors: Vec<StageProcessor>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            processors: processors.into_iter().map(Arc::new).collect(),
            records,
            running: AtomicBool::new(false),
            loops: Mutex::new(LoopSet::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn stage_order(&self) -> &'static [Stage] {
        &Stage::ORDER
    }

    pub fn processor(&self, stage: Stage) -> Option<&Arc<StageProcessor>> {
        self.processors.iter().find(|p| p.reported_stage() == stage)
    }

    pub fn processors(&self) -> impl Iterator<Item = &Arc<StageProcessor>> {
        self.processors.iter()
    }

    /// Spawn every processor loop. Returns `false` if they were already running.
    pub async fn start(&self) -> bool {
        let mut loops = self.loops.lock().await;
        if self.is_running() {
            tracing::debug!("engine already running");
            return false;
        }

        let (tx, rx) = watch::channel(false);
        for processor in &self.processors {
            processor.reset();
            let processor = Arc::clone(processor);
            let shutdown = rx.clone();
            loops.handles.push(tokio::spawn(async move {
                processor.run_loop(shutdown).await;
            }));
        }
        loops.shutdown = Some(tx);
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(processors = self.processors.len(), "pipeline engine started");
        true
    }

    /// Stop every loop and wait for the tasks to finish. Loop cycles are
    /// cancelled and their items are picked up again on the next start.
    /// A triggered cycle runs on its caller's task and is waited for instead.
    /// Once this returns no processor is mid-cycle.
    /// Returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        let mut loops = self.loops.lock().await;
        if !self.is_running() {
            tracing::debug!("engine not running");
            return false;
        }
        self.running.store(false, Ordering::SeqCst);

        if let Some(tx) = loops.shutdown.take() {
            let _ = tx.send(true);
        }
        for handle in loops.handles.drain(..) {
            handle.abort();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "processor task panicked");
                }
            }
        }
        for processor in &self.processors {
            processor.quiesce().await;
        }

        tracing::info!("pipeline engine stopped");
        true
    }

    pub async fn task_count(&self) -> usize {
        self.loops.lock().await.handles.len()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            engine_running: self.is_running(),
            processors: self
                .processors
                .iter()
                .map(|p| (p.reported_stage(), p.snapshot()))
                .collect(),
        }
    }

    /// Run one cycle of `stage`'s processor on the caller's task, but only if
    /// that processor is idle.
    pub async fn trigger_stage_check(&self, stage: Stage) -> Result<TriggerOutcome, PipelineError> {
        let Some(processor) = self.processor(stage) else {
            return Ok(TriggerOutcome::UnknownStage);
        };
        match processor.try_run_cycle().await {
            Some(result) => {
                let outcome = result?;
                tracing::info!(%stage, ?outcome, "stage check triggered");
                Ok(TriggerOutcome::Ran(outcome))
            }
            None => Ok(TriggerOutcome::Skipped(processor.status())),
        }
    }
}
