use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::state_machine::Stage;
use crate::store::StoreError;

/// Crate-level error for engine and control operations.
///
/// OCR and model errors never reach this type: the Classification processor
/// turns them into an unclassified reason on the item.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("{stage} processor panicked: {message}")]
    Panicked { stage: Stage, message: String },
}
