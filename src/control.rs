//! Read-only views and administrative actions over the pipeline.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::{PipelineEngine, TriggerOutcome};
use crate::error::PipelineError;
use crate::lifecycle::{ControlResponse, EngineLifecycle};
use crate::processor::{CycleOutcome, ProcessorStatus};
use crate::state_machine::{ItemPatch, Stage, WorkItem};
use crate::store::RecordStore;

#[derive(Debug, Clone, Serialize)]
pub struct StageDescription {
    pub stage: Stage,
    pub key: String,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageInfo {
    pub stages: Vec<StageDescription>,
    pub flow: Vec<(Stage, Stage)>,
}

pub fn stage_info() -> StageInfo {
    let stages = Stage::ORDER
        .iter()
        .map(|&stage| StageDescription {
            stage,
            key: stage.to_string(),
            description: stage.description(),
        })
        .collect();
    let flow = Stage::ORDER
        .iter()
        .filter_map(|&stage| stage.next().map(|next| (stage, next)))
        .collect();
    StageInfo { stages, flow }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub by_stage: BTreeMap<Stage, usize>,
    pub total: usize,
}

pub async fn queue_depths(records: &dyn RecordStore) -> Result<QueueDepths, PipelineError> {
    let mut by_stage = BTreeMap::new();
    for stage in Stage::ORDER {
        by_stage.insert(stage, records.count_by_stage(stage).await?);
    }
    let total = by_stage.values().sum();
    Ok(QueueDepths { by_stage, total })
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessorMetrics {
    pub status: ProcessorStatus,
    pub has_current_item: bool,
    pub poll_interval_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub queue_lengths: BTreeMap<Stage, usize>,
    pub total_items: usize,
    pub engine_running: bool,
    pub processors: BTreeMap<Stage, ProcessorMetrics>,
}

pub async fn metrics(
    records: &dyn RecordStore,
    engine: &PipelineEngine,
) -> Result<Metrics, PipelineError> {
    let depths = queue_depths(records).await?;
    let status = engine.status();
    let processors = status
        .processors
        .into_iter()
        .map(|(stage, snapshot)| {
            (
                stage,
                ProcessorMetrics {
                    status: snapshot.status,
                    has_current_item: snapshot.current_item.is_some(),
                    poll_interval_secs: snapshot.poll_interval_secs,
                },
            )
        })
        .collect();
    Ok(Metrics {
        queue_lengths: depths.by_stage,
        total_items: depths.total,
        engine_running: status.engine_running,
        processors,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ForceAdvance {
    Advanced { from: Stage, to: Stage, item: Box<WorkItem> },
    AlreadyDone,
}

/// Move an item one stage forward, skipping that stage's processing.
pub async fn force_advance(
    records: &dyn RecordStore,
    id: &str,
) -> Result<ForceAdvance, PipelineError> {
    let item = records
        .get(id)
        .await?
        .ok_or_else(|| PipelineError::ItemNotFound(id.to_string()))?;
    let Some(next) = item.stage.next() else {
        return Ok(ForceAdvance::AlreadyDone);
    };

    let updated = records.patch(id, &ItemPatch::stage(next)).await?;
    tracing::info!(item_id = id, from = %item.stage, to = %next, "item force-advanced");
    Ok(ForceAdvance::Advanced {
        from: item.stage,
        to: next,
        item: Box::new(updated),
    })
}

/// Trigger a stage check on a running engine.
pub async fn trigger(
    lifecycle: &EngineLifecycle,
    stage: Stage,
) -> Result<ControlResponse, PipelineError> {
    if !lifecycle.is_started() {
        return Ok(ControlResponse::rejected("Pipeline engine is not running"));
    }
    let response = match lifecycle.engine().trigger_stage_check(stage).await? {
        TriggerOutcome::Ran(CycleOutcome::Idle) => {
            ControlResponse::ok(format!("Triggered {stage} check: no items waiting"))
        }
        TriggerOutcome::Ran(CycleOutcome::Advanced { item_id, to, .. }) => {
            ControlResponse::ok(format!("Triggered {stage} check: moved {item_id} to {to}"))
        }
        TriggerOutcome::Ran(CycleOutcome::Retained { item_id, reason }) => {
            ControlResponse::ok(format!("Triggered {stage} check: {item_id} retained ({reason})"))
        }
        TriggerOutcome::Skipped(status) => {
            ControlResponse::rejected(format!("{stage} processor is {status}, check skipped"))
        }
        TriggerOutcome::UnknownStage => {
            ControlResponse::rejected(format!("No processor reports stage {stage}"))
        }
    };
    Ok(response)
}
