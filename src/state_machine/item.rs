use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::stage::Stage;

/// The result of processing an item in one stage.
///
/// Content problems are not failures: the processor records them on the item
/// and succeeds. `Failure` is for infrastructure trouble (a store write, a
/// network error) and leaves the item in place to be pulled again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    Success,
    Failure(String),
}

/// Classification marker persisted on the item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStatus {
    #[default]
    Unset,
    Classified,
    Unclassified,
    Error,
}

impl ClassificationStatus {
    /// Items in these states cannot continue through stages that expect classified data.
    pub fn is_permanent_failure(self) -> bool {
        matches!(
            self,
            ClassificationStatus::Unclassified | ClassificationStatus::Error
        )
    }
}

/// One case row as held by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub stage: Stage,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub blob_name: Option<String>,
    #[serde(default)]
    pub lob: Option<String>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub classification_status: ClassificationStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub case_parameters: Map<String, Value>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            stage: Stage::New,
            file_name: None,
            file_url: None,
            blob_name: None,
            lob: None,
            process: None,
            classification_status: ClassificationStatus::Unset,
            case_parameters: Map::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_file(mut self, file_name: impl Into<String>, blob_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self.blob_name = Some(blob_name.into());
        self
    }

    /// Lower-cased extension of the declared file name, without the dot.
    pub fn file_extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Partial update of a work item. Only set fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_status: Option<ClassificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_parameters: Option<Map<String, Value>>,
    /// `Some(None)` clears the column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<Option<String>>,
}

impl ItemPatch {
    pub fn stage(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an in-memory snapshot; bumps `updated_at`.
    pub fn apply(&self, item: &mut WorkItem) {
        if let Some(stage) = self.stage {
            item.stage = stage;
        }
        if let Some(lob) = &self.lob {
            item.lob = Some(lob.clone());
        }
        if let Some(process) = &self.process {
            item.process = Some(process.clone());
        }
        if let Some(status) = self.classification_status {
            item.classification_status = status;
        }
        if let Some(params) = &self.case_parameters {
            item.case_parameters = params.clone();
        }
        if let Some(last_error) = &self.last_error {
            item.last_error = last_error.clone();
        }
        item.updated_at = Utc::now();
    }
}
