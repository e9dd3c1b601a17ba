//! Versioned classification configuration.
//!
//! A [`PipelineConfig`] is immutable once stored. Changing prompts or pairs
//! means publishing a [`PipelineConfigDraft`], which becomes the next version.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{ConfigStore, StoreError};

/// One allowed (line of business, process) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LobProcessPair {
    pub lob: String,
    pub process: String,
}

impl LobProcessPair {
    pub fn new(lob: impl Into<String>, process: impl Into<String>) -> Self {
        Self {
            lob: lob.into(),
            process: process.into(),
        }
    }
}

/// Sampling parameters for the extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LlmParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    500
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub id: String,
    pub version: u32,
    pub lob_prompt: String,
    pub process_prompt: String,
    pub lob_process_pairs: Vec<LobProcessPair>,
    #[serde(default)]
    pub llm_params: LlmParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineConfig {
    /// Exact, case-sensitive lookup.
    pub fn contains_pair(&self, lob: &str, process: &str) -> bool {
        self.lob_process_pairs
            .iter()
            .any(|p| p.lob == lob && p.process == process)
    }
}

/// Input for creating the next config version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfigDraft {
    pub lob_prompt: String,
    pub process_prompt: String,
    pub lob_process_pairs: Vec<LobProcessPair>,
    #[serde(default)]
    pub llm_params: LlmParams,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Duplicate LOB-Process pairs are not allowed: {lob}|{process}")]
    DuplicatePair { lob: String, process: String },

    #[error("LOB-Process pair {index} has an empty lob or process")]
    EmptyPair { index: usize },

    #[error("temperature must be between 0 and 2, got {0}")]
    Temperature(f32),

    #[error("max_tokens must be greater than zero")]
    MaxTokens,
}

impl PipelineConfigDraft {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, pair) in self.lob_process_pairs.iter().enumerate() {
            if pair.lob.trim().is_empty() || pair.process.trim().is_empty() {
                return Err(ConfigError::EmptyPair { index });
            }
            if !seen.insert(pair) {
                return Err(ConfigError::DuplicatePair {
                    lob: pair.lob.clone(),
                    process: pair.process.clone(),
                });
            }
        }

        let temperature = self.llm_params.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Temperature(temperature));
        }
        if self.llm_params.max_tokens == 0 {
            return Err(ConfigError::MaxTokens);
        }
        Ok(())
    }

    /// Freeze the draft as `version`.
    pub fn into_config(self, version: u32) -> PipelineConfig {
        let now = Utc::now();
        PipelineConfig {
            id: Uuid::new_v4().to_string(),
            version,
            lob_prompt: self.lob_prompt,
            process_prompt: self.process_prompt,
            lob_process_pairs: self.lob_process_pairs,
            llm_params: self.llm_params,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Validate `draft` and store it as `latest.version + 1` (or 1).
pub async fn publish(
    store: &dyn ConfigStore,
    draft: PipelineConfigDraft,
) -> Result<PipelineConfig, PublishError> {
    draft.validate()?;
    let next_version = store.latest().await?.map_or(1, |c| c.version + 1);
    let config = store.insert(draft.into_config(next_version)).await?;
    tracing::info!(
        version = config.version,
        pairs = config.lob_process_pairs.len(),
        "published pipeline config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;

    fn draft(pairs: &[(&str, &str)]) -> PipelineConfigDraft {
        PipelineConfigDraft {
            lob_prompt: "Identify the line of business.".into(),
            process_prompt: "Identify the process.".into(),
            lob_process_pairs: pairs
                .iter()
                .map(|(l, p)| LobProcessPair::new(*l, *p))
                .collect(),
            llm_params: LlmParams::default(),
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert_eq!(draft(&[("L1", "P1"), ("L1", "P2"), ("L2", "P1")]).validate(), Ok(()));
    }

    #[test]
    fn duplicate_pairs_rejected() {
        let err = draft(&[("L1", "P1"), ("L2", "P2"), ("L1", "P1")])
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicatePair {
                lob: "L1".into(),
                process: "P1".into()
            }
        );
    }

    #[test]
    fn pairs_are_case_sensitive_for_uniqueness() {
        assert!(draft(&[("Motor", "Claims"), ("motor", "claims")]).validate().is_ok());
    }

    #[test]
    fn empty_pair_rejected() {
        let err = draft(&[("L1", "P1"), ("  ", "P2")]).validate().unwrap_err();
        assert_eq!(err, ConfigError::EmptyPair { index: 1 });
    }

    #[test]
    fn llm_params_bounds() {
        let mut d = draft(&[("L1", "P1")]);
        d.llm_params.temperature = 2.5;
        assert_eq!(d.validate(), Err(ConfigError::Temperature(2.5)));

        let mut d = draft(&[("L1", "P1")]);
        d.llm_params.max_tokens = 0;
        assert_eq!(d.validate(), Err(ConfigError::MaxTokens));
    }

    #[test]
    fn contains_pair_is_exact() {
        let config = draft(&[("Motor", "Claims")]).into_config(1);
        assert!(config.contains_pair("Motor", "Claims"));
        assert!(!config.contains_pair("motor", "Claims"));
        assert!(!config.contains_pair("Motor", "Claims "));
        assert!(!config.contains_pair("Claims", "Motor"));
    }

    #[test]
    fn deserialize_draft_with_default_params() {
        let json = r#"{
            "lob_prompt": "a",
            "process_prompt": "b",
            "lob_process_pairs": [{"lob": "L1", "process": "P1"}]
        }"#;
        let d: PipelineConfigDraft = serde_json::from_str(json).unwrap();
        assert_eq!(d.llm_params, LlmParams::default());
    }

    #[tokio::test]
    async fn publish_assigns_increasing_versions() {
        let store = MemoryConfigStore::new();
        let first = publish(&store, draft(&[("L1", "P1")])).await.unwrap();
        let second = publish(&store, draft(&[("L1", "P1"), ("L2", "P2")]))
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_ne!(first.id, second.id);

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.lob_process_pairs.len(), 2);
    }

    #[tokio::test]
    async fn publish_rejects_invalid_draft_without_storing() {
        let store = MemoryConfigStore::new();
        let result = publish(&store, draft(&[("L1", "P1"), ("L1", "P1")])).await;
        assert!(matches!(result, Err(PublishError::Invalid(_))));
        assert!(store.latest().await.unwrap().is_none());
    }
}
