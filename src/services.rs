//! Builds stores, providers and the engine from [`EngineConfig`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::anthropic::{AnthropicClient, AnthropicExtractor};
use crate::artifact::{ArtifactStore, AzureBlobStore, FsArtifactStore, MemoryArtifactStore};
use crate::config::{ArtifactBackend, EngineConfig, RecordBackend};
use crate::engine::PipelineEngine;
use crate::error::PipelineError;
use crate::lifecycle::EngineLifecycle;
use crate::ocr::MistralOcrClient;
use crate::processor::{
    ClassificationProcessor, ClassificationSettings, PlaceholderProcessor, ProcessorKind,
    StageProcessor,
};
use crate::provider::{ExtractionProvider, OcrProvider};
use crate::state_machine::{Stage, WorkItem};
use crate::store::{
    ConfigStore, MemoryConfigStore, MemoryRecordStore, PostgrestClient, RecordStore,
    SupabaseConfigStore, SupabaseRecordStore,
};

/// Storage backends shared by the engine and the control surface.
#[derive(Clone)]
pub struct Services {
    pub config: EngineConfig,
    pub records: Arc<dyn RecordStore>,
    pub configs: Arc<dyn ConfigStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl Services {
    pub fn from_config(config: &EngineConfig) -> Self {
        let (records, configs): (Arc<dyn RecordStore>, Arc<dyn ConfigStore>) =
            match config.record_backend {
                RecordBackend::Memory => (
                    Arc::new(MemoryRecordStore::new()),
                    Arc::new(MemoryConfigStore::new()),
                ),
                RecordBackend::Supabase => {
                    let db = PostgrestClient::new(&config.supabase_url, config.supabase_key.clone());
                    (
                        Arc::new(SupabaseRecordStore::new(db.clone())),
                        Arc::new(SupabaseConfigStore::new(db)),
                    )
                }
            };

        let artifacts: Arc<dyn ArtifactStore> = match config.artifact_backend {
            ArtifactBackend::Memory => Arc::new(MemoryArtifactStore::new()),
            ArtifactBackend::Fs => Arc::new(FsArtifactStore::new(&config.artifact_dir)),
            ArtifactBackend::Azure => Arc::new(AzureBlobStore::new(
                &config.azure_container_url,
                &config.azure_sas_token,
            )),
        };

        tracing::debug!(
            record_backend = ?config.record_backend,
            artifact_backend = ?config.artifact_backend,
            "services wired"
        );
        Self {
            config: config.clone(),
            records,
            configs,
            artifacts,
        }
    }

    /// OCR and LLM clients. Both API keys must be set.
    pub fn providers(&self) -> Result<(Arc<dyn OcrProvider>, Arc<dyn ExtractionProvider>)> {
        let config = &self.config;
        if config.mistral_api_key.is_empty() {
            bail!("MISTRAL_API_KEY is not set (env or mistral_api_key in caseflow.toml)");
        }
        if config.anthropic_api_key.is_empty() {
            bail!("ANTHROPIC_API_KEY is not set (env or anthropic_api_key in caseflow.toml)");
        }

        let ocr = match &config.ocr_base_url {
            Some(url) => MistralOcrClient::with_base_url(
                config.mistral_api_key.clone(),
                config.ocr_model.clone(),
                url.clone(),
            ),
            None => MistralOcrClient::new(config.mistral_api_key.clone(), config.ocr_model.clone()),
        };
        let client = match &config.anthropic_base_url {
            Some(url) => AnthropicClient::with_base_url(config.anthropic_api_key.clone(), url.clone()),
            None => AnthropicClient::new(config.anthropic_api_key.clone()),
        };
        let extractor = AnthropicExtractor::new(client, config.llm_model.clone());

        Ok((Arc::new(ocr), Arc::new(extractor)))
    }

    /// The standard four processors, one per stage after NEW.
    pub fn processors(
        &self,
        ocr: Arc<dyn OcrProvider>,
        extractor: Arc<dyn ExtractionProvider>,
    ) -> Vec<StageProcessor> {
        let config = &self.config;
        let classification = ClassificationProcessor::new(
            self.records.clone(),
            self.configs.clone(),
            self.artifacts.clone(),
            ocr,
            extractor,
            ClassificationSettings {
                config_ttl: config.config_ttl(),
                ocr_text_limit: config.ocr_text_limit,
                ocr_placeholder_fallback: config.ocr_placeholder_fallback,
            },
        );

        vec![
            StageProcessor::new(
                Stage::Classification,
                Stage::New,
                Duration::from_secs_f64(config.poll.classification),
                ProcessorKind::Classification(classification),
                self.records.clone(),
            ),
            StageProcessor::new(
                Stage::DataExtraction,
                Stage::Classification,
                Duration::from_secs_f64(config.poll.extraction),
                ProcessorKind::Extraction(PlaceholderProcessor::new(
                    "extraction",
                    Duration::from_millis(config.extraction_delay_ms),
                )),
                self.records.clone(),
            ),
            StageProcessor::new(
                Stage::Processing,
                Stage::DataExtraction,
                Duration::from_secs_f64(config.poll.processing),
                ProcessorKind::FinalProcessing(PlaceholderProcessor::new(
                    "final_processing",
                    Duration::from_millis(config.processing_delay_ms),
                )),
                self.records.clone(),
            ),
            StageProcessor::new(
                Stage::Done,
                Stage::Processing,
                Duration::from_secs_f64(config.poll.completion),
                ProcessorKind::Completion,
                self.records.clone(),
            ),
        ]
    }

    /// Upload a document and register it as a new case in NEW.
    pub async fn intake(
        &self,
        title: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<WorkItem, PipelineError> {
        let stored = self.artifacts.upload(content, file_name).await?;
        let mut item = WorkItem::new(title).with_file(file_name, stored.key);
        item.file_url = Some(stored.url);
        let item = self.records.create(item).await?;
        tracing::info!(item_id = %item.id, file_name, "case created");
        Ok(item)
    }

    pub fn engine_with(
        &self,
        ocr: Arc<dyn OcrProvider>,
        extractor: Arc<dyn ExtractionProvider>,
    ) -> Arc<PipelineEngine> {
        Arc::new(PipelineEngine::new(
            self.processors(ocr, extractor),
            self.records.clone(),
        ))
    }

    pub fn engine(&self) -> Result<Arc<PipelineEngine>> {
        let (ocr, extractor) = self.providers()?;
        Ok(self.engine_with(ocr, extractor))
    }

    pub fn lifecycle(&self) -> Result<Arc<EngineLifecycle>> {
        Ok(Arc::new(EngineLifecycle::new(
            self.engine()?,
            self.config.restart_pause(),
        )))
    }
}
