//! Record and pipeline-config stores.
//!
//! The engine only talks to these traits. [`MemoryRecordStore`] and
//! [`MemoryConfigStore`] are the in-process implementations used for tests
//! and local runs; the Supabase variants talk to PostgREST.

mod memory;
mod supabase;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline_config::PipelineConfig;
use crate::state_machine::{ItemPatch, Stage, WorkItem};

pub use memory::{MemoryConfigStore, MemoryRecordStore};
pub use supabase::{PostgrestClient, SupabaseConfigStore, SupabaseRecordStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("store returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to decode store response: {0}")]
    Decode(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One row per case, with a mutable `stage` column.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Items in `stage`, oldest `created_at` first. `None` means no limit.
    async fn list_by_stage(
        &self,
        stage: Stage,
        limit: Option<usize>,
    ) -> Result<Vec<WorkItem>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<WorkItem>, StoreError>;

    /// Apply `patch` atomically and return the updated row.
    async fn patch(&self, id: &str, patch: &ItemPatch) -> Result<WorkItem, StoreError>;

    async fn create(&self, item: WorkItem) -> Result<WorkItem, StoreError>;

    async fn count_by_stage(&self, stage: Stage) -> Result<usize, StoreError> {
        Ok(self.list_by_stage(stage, None).await?.len())
    }
}

/// Append-only history of [`PipelineConfig`] versions.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Highest version, if any was ever published.
    async fn latest(&self) -> Result<Option<PipelineConfig>, StoreError>;

    /// Newest first.
    async fn history(&self, limit: usize) -> Result<Vec<PipelineConfig>, StoreError>;

    async fn insert(&self, config: PipelineConfig) -> Result<PipelineConfig, StoreError>;

    /// Drop every version. Returns how many were removed.
    async fn delete_all(&self) -> Result<usize, StoreError>;
}
