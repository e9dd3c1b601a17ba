//! NEW → CLASSIFICATION: OCR the uploaded document and ask the model for a
//! configured (lob, process) pair.
//!
//! Content problems (no config, unreadable file, no confident answer) are not
//! retried. The item is marked unclassified and the stage exits to DONE.
//! Only a failed write back to the record store leaves the item in NEW.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use super::prompt::{build_system_prompt, build_user_prompt, truncate_chars, validate_pair};
use crate::artifact::ArtifactStore;
use crate::ocr::{OcrError, join_pages, mime_for_extension};
use crate::pipeline_config::{LobProcessPair, PipelineConfig};
use crate::provider::{ExtractionProvider, OcrProvider};
use crate::state_machine::{ClassificationStatus, ItemPatch, StageOutcome, WorkItem};
use crate::store::{ConfigStore, RecordStore};

const NO_CONFIG: &str = "no pipeline configuration";
const DOWNLOAD_FAILED: &str = "failed to download file";
const OCR_FAILED: &str = "OCR failed or empty result";

/// Tunables taken from `EngineConfig`.
#[derive(Debug, Clone)]
pub struct ClassificationSettings {
    pub config_ttl: Duration,
    pub ocr_text_limit: usize,
    pub ocr_placeholder_fallback: bool,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            config_ttl: Duration::from_secs(300),
            ocr_text_limit: 8000,
            ocr_placeholder_fallback: true,
        }
    }
}

struct CachedConfig {
    config: PipelineConfig,
    fetched_at: Instant,
}

/// A validated classification ready to be committed.
struct Classified {
    pair: LobProcessPair,
    ocr_text: String,
    ocr_degraded: bool,
    config_version: u32,
}

pub struct ClassificationProcessor {
    records: Arc<dyn RecordStore>,
    configs: Arc<dyn ConfigStore>,
    artifacts: Arc<dyn ArtifactStore>,
    ocr: Arc<dyn OcrProvider>,
    extractor: Arc<dyn ExtractionProvider>,
    settings: ClassificationSettings,
    cache: Mutex<Option<CachedConfig>>,
}

impl ClassificationProcessor {
    pub fn new(
        records: Arc<dyn RecordStore>,
        configs: Arc<dyn ConfigStore>,
        artifacts: Arc<dyn ArtifactStore>,
        ocr: Arc<dyn OcrProvider>,
        extractor: Arc<dyn ExtractionProvider>,
        settings: ClassificationSettings,
    ) -> Self {
        Self {
            records,
            configs,
            artifacts,
            ocr,
            extractor,
            settings,
            cache: Mutex::new(None),
        }
    }

    /// Classify `item` and write the result back. On success `item` is
    /// replaced by the stored row.
    pub async fn process(&self, item: &mut WorkItem) -> StageOutcome {
        let patch = match self.classify(item).await {
            Ok(classified) => {
                tracing::info!(
                    item_id = %item.id,
                    lob = %classified.pair.lob,
                    process = %classified.pair.process,
                    config_version = classified.config_version,
                    "item classified"
                );
                self.classified_patch(item, classified)
            }
            Err(reason) => {
                tracing::warn!(item_id = %item.id, %reason, "item left unclassified");
                unclassified_patch(item, &reason)
            }
        };

        match self.records.patch(&item.id, &patch).await {
            Ok(updated) => {
                *item = updated;
                StageOutcome::Success
            }
            Err(e) => {
                tracing::error!(item_id = %item.id, error = %e, "failed to store classification");
                StageOutcome::Failure(format!("failed to store classification: {e}"))
            }
        }
    }

    /// Latest config, re-fetched once the cached copy is older than the TTL.
    /// A failed fetch keeps whatever was cached.
    async fn current_config(&self) -> Option<PipelineConfig> {
        let mut cache = self.cache.lock().await;
        let fresh = cache
            .as_ref()
            .is_some_and(|c| c.fetched_at.elapsed() < self.settings.config_ttl);
        if !fresh {
            match self.configs.latest().await {
                Ok(Some(config)) => {
                    tracing::debug!(version = config.version, "pipeline config refreshed");
                    *cache = Some(CachedConfig {
                        config,
                        fetched_at: Instant::now(),
                    });
                }
                Ok(None) => *cache = None,
                Err(e) => {
                    tracing::warn!(error = %e, "pipeline config fetch failed, using cached copy");
                }
            }
        }
        cache.as_ref().map(|c| c.config.clone())
    }

    async fn classify(&self, item: &WorkItem) -> Result<Classified, String> {
        let config = self.current_config().await.ok_or(NO_CONFIG)?;
        let (ocr_text, ocr_degraded) = self.read_document(item).await?;

        let system_prompt = build_system_prompt(&config);
        let user_prompt = build_user_prompt(
            &config,
            truncate_chars(&ocr_text, self.settings.ocr_text_limit),
        );
        let answer = self
            .extractor
            .extract(
                &system_prompt,
                &user_prompt,
                config.llm_params.temperature,
                config.llm_params.max_tokens,
            )
            .await
            .map_err(|e| format!("classification request failed: {e}"))?;
        let pair = validate_pair(&config, &answer)?;

        Ok(Classified {
            pair,
            ocr_text,
            ocr_degraded,
            config_version: config.version,
        })
    }

    /// Download the artifact into a temp file and OCR it. The temp file is
    /// removed when this returns, whatever the outcome.
    async fn read_document(&self, item: &WorkItem) -> Result<(String, bool), String> {
        let blob_name = item.blob_name.as_deref().ok_or(DOWNLOAD_FAILED)?;
        let bytes = self.artifacts.download(blob_name).await.map_err(|e| {
            tracing::warn!(item_id = %item.id, blob_name, error = %e, "artifact download failed");
            DOWNLOAD_FAILED.to_string()
        })?;

        let ext = item.file_extension().unwrap_or_default();
        let local = spool(&bytes, &ext).await.map_err(|e| {
            tracing::warn!(item_id = %item.id, error = %e, "could not write temp file");
            DOWNLOAD_FAILED.to_string()
        })?;

        let result = match mime_for_extension(&ext) {
            Some(mime) => {
                let document = tokio::fs::read(local.path())
                    .await
                    .map_err(|_| DOWNLOAD_FAILED.to_string())?;
                self.ocr.ocr(&document, mime).await
            }
            None => Err(OcrError::UnsupportedType(ext.clone())),
        };
        drop(local);

        match result {
            Ok(pages) => {
                let text = join_pages(&pages);
                if text.is_empty() {
                    Err(OCR_FAILED.to_string())
                } else {
                    Ok((text, false))
                }
            }
            Err(OcrError::UnsupportedType(ext)) => {
                tracing::warn!(item_id = %item.id, ext = %ext, "document type not supported by OCR");
                Err(OCR_FAILED.to_string())
            }
            Err(e) if self.settings.ocr_placeholder_fallback => {
                tracing::warn!(
                    item_id = %item.id,
                    provider = self.ocr.name(),
                    error = %e,
                    "OCR call failed, substituting placeholder description"
                );
                Ok((placeholder_description(item, &ext, bytes.len()), true))
            }
            Err(e) => {
                tracing::warn!(item_id = %item.id, provider = self.ocr.name(), error = %e, "OCR call failed");
                Err(OCR_FAILED.to_string())
            }
        }
    }

    fn classified_patch(&self, item: &WorkItem, classified: Classified) -> ItemPatch {
        let mut params = item.case_parameters.clone();
        params.remove("classification_failure");
        params.insert("ocr_text".into(), Value::String(classified.ocr_text));
        if classified.ocr_degraded {
            params.insert("ocr_degraded".into(), Value::Bool(true));
        }

        let entry = json!({
            "provider": self.extractor.name(),
            "model": self.extractor.model(),
            "ocr_provider": self.ocr.name(),
            "timestamp": Utc::now().to_rfc3339(),
            "config_version": classified.config_version,
            "result": {
                "lob": classified.pair.lob,
                "process": classified.pair.process,
            },
        });
        match params.get_mut("classification_history") {
            Some(Value::Array(history)) => history.push(entry),
            _ => {
                params.insert("classification_history".into(), Value::Array(vec![entry]));
            }
        }

        ItemPatch {
            lob: Some(classified.pair.lob),
            process: Some(classified.pair.process),
            classification_status: Some(ClassificationStatus::Classified),
            case_parameters: Some(params),
            last_error: Some(None),
            ..Default::default()
        }
    }
}

fn unclassified_patch(item: &WorkItem, reason: &str) -> ItemPatch {
    let mut params = item.case_parameters.clone();
    params.insert(
        "classification_failure".into(),
        json!({ "reason": reason, "timestamp": Utc::now().to_rfc3339() }),
    );
    ItemPatch {
        classification_status: Some(ClassificationStatus::Unclassified),
        case_parameters: Some(params),
        last_error: Some(Some(reason.to_string())),
        ..Default::default()
    }
}

/// Write `bytes` to a named temp file that keeps the declared extension.
/// The returned handle deletes the file when dropped.
async fn spool(bytes: &[u8], ext: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let suffix = if ext.is_empty() {
        String::new()
    } else {
        format!(".{ext}")
    };
    let file = tempfile::Builder::new()
        .prefix("caseflow-")
        .suffix(&suffix)
        .tempfile()?;
    tokio::fs::write(file.path(), bytes).await?;
    Ok(file)
}

// Lossy stand-in for OCR text so the model can still work from the metadata.
fn placeholder_description(item: &WorkItem, ext: &str, size: usize) -> String {
    format!(
        "Document text could not be extracted.\nTitle: {}\nFile name: {}\nFile type: {}\nSize: {size} bytes",
        item.title,
        item.file_name.as_deref().unwrap_or("unknown"),
        if ext.is_empty() { "unknown" } else { ext },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anthropic::AnthropicError;
    use crate::artifact::MemoryArtifactStore;
    use crate::pipeline_config::{LlmParams, PipelineConfigDraft, publish};
    use crate::processor::{CycleOutcome, ProcessorKind, StageProcessor};
    use crate::provider::ExtractedPair;
    use crate::state_machine::Stage;
    use crate::store::{MemoryConfigStore, MemoryRecordStore};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct MockOcr {
        result: Result<Vec<String>, u16>,
        calls: StdMutex<Vec<String>>,
    }

    impl MockOcr {
        fn pages(pages: &[&str]) -> Self {
            Self {
                result: Ok(pages.iter().map(|p| p.to_string()).collect()),
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                result: Err(status),
                calls: StdMutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OcrProvider for MockOcr {
        fn name(&self) -> &str {
            "mock-ocr"
        }

        async fn ocr(&self, _document: &[u8], mime_type: &str) -> Result<Vec<String>, OcrError> {
            self.calls.lock().unwrap().push(mime_type.to_string());
            match &self.result {
                Ok(pages) => Ok(pages.clone()),
                Err(status) => Err(OcrError::ApiError {
                    status: *status,
                    message: "provider down".into(),
                }),
            }
        }
    }

    struct MockExtractor {
        answer: Option<ExtractedPair>,
        prompts: StdMutex<Vec<String>>,
    }

    impl MockExtractor {
        fn answering(lob: Option<&str>, process: Option<&str>) -> Self {
            Self {
                answer: Some(ExtractedPair {
                    lob: lob.map(String::from),
                    process: process.map(String::from),
                }),
                prompts: StdMutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                answer: None,
                prompts: StdMutex::new(Vec::new()),
            }
        }

        fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl ExtractionProvider for MockExtractor {
        fn name(&self) -> &str {
            "mock-llm"
        }

        fn model(&self) -> &str {
            "mock-model-1"
        }

        async fn extract(
            &self,
            _system_prompt: &str,
            user_prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<ExtractedPair, AnthropicError> {
            self.prompts.lock().unwrap().push(user_prompt.to_string());
            self.answer.clone().ok_or(AnthropicError::ApiError {
                status: 529,
                message: "overloaded".into(),
            })
        }
    }

    struct Fixture {
        records: Arc<MemoryRecordStore>,
        configs: Arc<MemoryConfigStore>,
        artifacts: Arc<MemoryArtifactStore>,
        ocr: Arc<MockOcr>,
        extractor: Arc<MockExtractor>,
    }

    impl Fixture {
        fn new(ocr: MockOcr, extractor: MockExtractor) -> Self {
            Self {
                records: Arc::new(MemoryRecordStore::new()),
                configs: Arc::new(MemoryConfigStore::new()),
                artifacts: Arc::new(MemoryArtifactStore::new()),
                ocr: Arc::new(ocr),
                extractor: Arc::new(extractor),
            }
        }

        fn processor(&self, settings: ClassificationSettings) -> ClassificationProcessor {
            ClassificationProcessor::new(
                self.records.clone(),
                self.configs.clone(),
                self.artifacts.clone(),
                self.ocr.clone(),
                self.extractor.clone(),
                settings,
            )
        }

        /// The classification worker as the engine wires it: NEW → CLASSIFICATION.
        fn stage_processor(&self) -> StageProcessor {
            StageProcessor::new(
                Stage::Classification,
                Stage::New,
                Duration::from_secs(3),
                ProcessorKind::Classification(self.processor(Default::default())),
                self.records.clone(),
            )
        }

        async fn publish(&self, pairs: &[(&str, &str)]) {
            let draft = PipelineConfigDraft {
                lob_prompt: "Pick the LOB.".into(),
                process_prompt: "Pick the process.".into(),
                lob_process_pairs: pairs
                    .iter()
                    .map(|(l, p)| LobProcessPair::new(*l, *p))
                    .collect(),
                llm_params: LlmParams::default(),
            };
            publish(self.configs.as_ref(), draft).await.unwrap();
        }

        /// Store an item in NEW with an uploaded blob named `file_name`.
        async fn item(&self, file_name: &str) -> WorkItem {
            let blob = format!("blob-{file_name}");
            self.artifacts.insert(blob.clone(), b"document bytes".to_vec()).await;
            let item = WorkItem::new("Claim").with_file(file_name, blob);
            self.records.create(item).await.unwrap()
        }
    }

    #[tokio::test]
    async fn classifies_and_commits_pair() {
        let fx = Fixture::new(
            MockOcr::pages(&["ACCIDENT REPORT", "page two"]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims"), ("Home", "Renewal")]).await;
        let mut item = fx.item("claim.pdf").await;

        let outcome = fx.processor(Default::default()).process(&mut item).await;

        assert_eq!(outcome, StageOutcome::Success);
        assert_eq!(item.lob.as_deref(), Some("Motor"));
        assert_eq!(item.process.as_deref(), Some("Claims"));
        assert_eq!(item.classification_status, ClassificationStatus::Classified);
        assert_eq!(item.last_error, None);
        assert_eq!(item.stage, Stage::New);
        assert_eq!(item.case_parameters["ocr_text"], "ACCIDENT REPORT\n\npage two");

        let history = item.case_parameters["classification_history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["provider"], "mock-llm");
        assert_eq!(history[0]["model"], "mock-model-1");
        assert_eq!(history[0]["config_version"], 1);
        assert_eq!(history[0]["result"]["lob"], "Motor");

        let stored = fx.records.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored, item);
        assert_eq!(fx.ocr.calls.lock().unwrap()[0], "application/pdf");
    }

    #[tokio::test]
    async fn missing_config_leaves_item_unclassified() {
        let fx = Fixture::new(
            MockOcr::pages(&["text"]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        let mut item = fx.item("claim.pdf").await;

        let outcome = fx.processor(Default::default()).process(&mut item).await;

        assert_eq!(outcome, StageOutcome::Success);
        assert_eq!(item.classification_status, ClassificationStatus::Unclassified);
        assert_eq!(item.last_error.as_deref(), Some(NO_CONFIG));
        assert_eq!(
            item.case_parameters["classification_failure"]["reason"],
            NO_CONFIG
        );
        assert_eq!(fx.ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_blob_is_a_download_failure() {
        let fx = Fixture::new(
            MockOcr::pages(&["text"]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let mut item = fx
            .records
            .create(WorkItem::new("No upload").with_file("claim.pdf", "never-uploaded.pdf"))
            .await
            .unwrap();

        fx.processor(Default::default()).process(&mut item).await;

        assert_eq!(item.classification_status, ClassificationStatus::Unclassified);
        assert_eq!(item.last_error.as_deref(), Some(DOWNLOAD_FAILED));
    }

    #[tokio::test]
    async fn empty_ocr_result_is_unclassified() {
        let fx = Fixture::new(
            MockOcr::pages(&["   ", ""]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let mut item = fx.item("scan.png").await;

        fx.processor(Default::default()).process(&mut item).await;

        assert_eq!(item.classification_status, ClassificationStatus::Unclassified);
        assert_eq!(item.last_error.as_deref(), Some(OCR_FAILED));
        assert!(fx.extractor.last_prompt().is_none());
    }

    #[tokio::test]
    async fn unsupported_extension_never_reaches_provider() {
        let fx = Fixture::new(
            MockOcr::pages(&["text"]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let mut item = fx.item("letter.docx").await;

        fx.processor(Default::default()).process(&mut item).await;

        assert_eq!(item.last_error.as_deref(), Some(OCR_FAILED));
        assert_eq!(fx.ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn ocr_error_falls_back_to_placeholder() {
        let fx = Fixture::new(
            MockOcr::failing(503),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let mut item = fx.item("claim.pdf").await;

        fx.processor(Default::default()).process(&mut item).await;

        assert_eq!(item.classification_status, ClassificationStatus::Classified);
        assert_eq!(item.case_parameters["ocr_degraded"], true);
        let prompt = fx.extractor.last_prompt().unwrap();
        assert!(prompt.contains("File name: claim.pdf"));
    }

    #[tokio::test]
    async fn ocr_error_without_fallback_is_unclassified() {
        let fx = Fixture::new(
            MockOcr::failing(503),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let mut item = fx.item("claim.pdf").await;
        let settings = ClassificationSettings {
            ocr_placeholder_fallback: false,
            ..Default::default()
        };

        fx.processor(settings).process(&mut item).await;

        assert_eq!(item.classification_status, ClassificationStatus::Unclassified);
        assert_eq!(item.last_error.as_deref(), Some(OCR_FAILED));
    }

    #[tokio::test]
    async fn pair_outside_config_is_unclassified() {
        let fx = Fixture::new(
            MockOcr::pages(&["text"]),
            MockExtractor::answering(Some("Marine"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let mut item = fx.item("claim.pdf").await;

        fx.processor(Default::default()).process(&mut item).await;

        assert_eq!(item.classification_status, ClassificationStatus::Unclassified);
        assert!(item.lob.is_none());
        assert!(item.last_error.unwrap().contains("Marine|Claims"));
    }

    #[tokio::test]
    async fn null_answer_and_call_failure_are_unclassified() {
        for extractor in [MockExtractor::answering(None, None), MockExtractor::failing()] {
            let fx = Fixture::new(MockOcr::pages(&["text"]), extractor);
            fx.publish(&[("Motor", "Claims")]).await;
            let mut item = fx.item("claim.pdf").await;

            let outcome = fx.processor(Default::default()).process(&mut item).await;

            assert_eq!(outcome, StageOutcome::Success);
            assert_eq!(item.classification_status, ClassificationStatus::Unclassified);
        }
    }

    #[tokio::test]
    async fn ocr_text_is_truncated_for_the_model_but_stored_in_full() {
        let long_text = "x".repeat(50) + "TAIL";
        let fx = Fixture::new(
            MockOcr::pages(&[long_text.as_str()]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let mut item = fx.item("claim.pdf").await;
        let settings = ClassificationSettings {
            ocr_text_limit: 50,
            ..Default::default()
        };

        fx.processor(settings).process(&mut item).await;

        assert!(!fx.extractor.last_prompt().unwrap().contains("TAIL"));
        assert_eq!(item.case_parameters["ocr_text"], long_text.as_str());
    }

    #[tokio::test]
    async fn config_is_cached_until_ttl_expires() {
        let fx = Fixture::new(
            MockOcr::pages(&["text"]),
            MockExtractor::answering(Some("Home"), Some("Renewal")),
        );
        fx.publish(&[("Motor", "Claims")]).await;

        let cached = fx.processor(Default::default());
        let mut first = fx.item("a.pdf").await;
        cached.process(&mut first).await;
        assert_eq!(first.classification_status, ClassificationStatus::Unclassified);

        fx.publish(&[("Motor", "Claims"), ("Home", "Renewal")]).await;

        let mut second = fx.item("b.pdf").await;
        cached.process(&mut second).await;
        assert_eq!(second.classification_status, ClassificationStatus::Unclassified);

        let uncached = fx.processor(ClassificationSettings {
            config_ttl: Duration::ZERO,
            ..Default::default()
        });
        let mut third = fx.item("c.pdf").await;
        uncached.process(&mut third).await;
        assert_eq!(third.classification_status, ClassificationStatus::Classified);
        assert_eq!(
            third.case_parameters["classification_history"][0]["config_version"],
            2
        );
    }

    #[tokio::test]
    async fn failed_commit_is_a_retryable_failure() {
        let fx = Fixture::new(
            MockOcr::pages(&["text"]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        fx.artifacts.insert("blob.pdf", b"bytes".to_vec()).await;
        // never stored, so the patch cannot find the row
        let mut item = WorkItem::new("Ghost").with_file("claim.pdf", "blob.pdf");

        let outcome = fx.processor(Default::default()).process(&mut item).await;

        assert!(matches!(
            outcome,
            StageOutcome::Failure(reason) if reason.starts_with("failed to store classification")
        ));
        assert_eq!(item.classification_status, ClassificationStatus::Unset);
    }

    #[tokio::test]
    async fn cycle_moves_classified_item_to_classification() {
        let fx = Fixture::new(
            MockOcr::pages(&["ACCIDENT REPORT"]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let item = fx.item("claim.pdf").await;

        let outcome = fx.stage_processor().run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Advanced {
                item_id: item.id.clone(),
                from: Stage::New,
                to: Stage::Classification,
            }
        );
        let stored = fx.records.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::Classification);
        assert_eq!(stored.classification_status, ClassificationStatus::Classified);
        assert_eq!(stored.lob.as_deref(), Some("Motor"));
    }

    #[tokio::test]
    async fn cycle_sends_unreadable_item_straight_to_done() {
        let fx = Fixture::new(
            MockOcr::pages(&[""]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        fx.publish(&[("Motor", "Claims")]).await;
        let item = fx.item("scan.pdf").await;
        let processor = fx.stage_processor();

        let outcome = processor.run_cycle().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Advanced {
                item_id: item.id.clone(),
                from: Stage::New,
                to: Stage::Done,
            }
        );
        let stored = fx.records.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::Done);
        assert_eq!(stored.classification_status, ClassificationStatus::Unclassified);
        assert_eq!(stored.last_error.as_deref(), Some(OCR_FAILED));
        assert!(processor.kind().short_circuits(&stored));
    }

    #[tokio::test]
    async fn cycle_without_config_exits_to_done() {
        let fx = Fixture::new(
            MockOcr::pages(&["text"]),
            MockExtractor::answering(Some("Motor"), Some("Claims")),
        );
        let item = fx.item("claim.pdf").await;

        let outcome = fx.stage_processor().run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Advanced { to: Stage::Done, .. }));
        let stored = fx.records.get(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::Done);
        assert_eq!(stored.last_error.as_deref(), Some(NO_CONFIG));
    }

    #[tokio::test]
    async fn spool_keeps_extension_and_cleans_up() {
        let path = {
            let file = spool(b"abc", "pdf").await.unwrap();
            let path = file.path().to_path_buf();
            assert!(path.to_string_lossy().ends_with(".pdf"));
            assert_eq!(tokio::fs::read(&path).await.unwrap(), b"abc");
            path
        };
        assert!(!path.exists());
    }
}
