use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ConfigStore, RecordStore, StoreError};
use crate::pipeline_config::PipelineConfig;
use crate::state_machine::{ItemPatch, Stage, WorkItem};

/// Process-local record store. Patches are atomic per row under the write lock.
#[derive(Default)]
pub struct MemoryRecordStore {
    items: RwLock<HashMap<String, WorkItem>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(|i| (i.id.clone(), i)).collect()),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_by_stage(
        &self,
        stage: Stage,
        limit: Option<usize>,
    ) -> Result<Vec<WorkItem>, StoreError> {
        let items = self.items.read().await;
        let mut matching: Vec<WorkItem> = items
            .values()
            .filter(|i| i.stage == stage)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn get(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn patch(&self, id: &str, patch: &ItemPatch) -> Result<WorkItem, StoreError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply(item);
        Ok(item.clone())
    }

    async fn create(&self, item: WorkItem) -> Result<WorkItem, StoreError> {
        let mut items = self.items.write().await;
        if items.contains_key(&item.id) {
            return Err(StoreError::Conflict(item.id));
        }
        items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn count_by_stage(&self, stage: Stage) -> Result<usize, StoreError> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|i| i.stage == stage)
            .count())
    }
}

/// Process-local config history. Starts empty, like a fresh deployment.
#[derive(Default)]
pub struct MemoryConfigStore {
    versions: RwLock<Vec<PipelineConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn latest(&self) -> Result<Option<PipelineConfig>, StoreError> {
        Ok(self
            .versions
            .read()
            .await
            .iter()
            .max_by_key(|c| c.version)
            .cloned())
    }

    async fn history(&self, limit: usize) -> Result<Vec<PipelineConfig>, StoreError> {
        let mut versions = self.versions.read().await.clone();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        versions.truncate(limit);
        Ok(versions)
    }

    async fn insert(&self, config: PipelineConfig) -> Result<PipelineConfig, StoreError> {
        let mut versions = self.versions.write().await;
        if versions.iter().any(|c| c.version >= config.version) {
            return Err(StoreError::Conflict(format!(
                "pipeline config version {}",
                config.version
            )));
        }
        versions.push(config.clone());
        Ok(config)
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        let mut versions = self.versions.write().await;
        let removed = versions.len();
        versions.clear();
        Ok(removed)
    }
}
