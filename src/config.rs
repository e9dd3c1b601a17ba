//! Engine configuration loaded from `caseflow.toml`.
//!
//! [`EngineConfig`] holds every tunable of the engine and its adapters.
//! Keys missing from the file fall back to defaults. Secrets and endpoints
//! may also come from the environment, which wins over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "caseflow.toml";

/// Which record/config store implementation to wire in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordBackend {
    #[default]
    Memory,
    Supabase,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactBackend {
    #[default]
    Memory,
    Fs,
    Azure,
}

/// Poll interval per processor, in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollIntervals {
    #[serde(default = "default_fast_poll")]
    pub classification: f64,
    #[serde(default = "default_fast_poll")]
    pub extraction: f64,
    #[serde(default = "default_slow_poll")]
    pub processing: f64,
    #[serde(default = "default_slow_poll")]
    pub completion: f64,
}

fn default_fast_poll() -> f64 {
    3.0
}

fn default_slow_poll() -> f64 {
    5.0
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            classification: default_fast_poll(),
            extraction: default_fast_poll(),
            processing: default_slow_poll(),
            completion: default_slow_poll(),
        }
    }
}

/// Top-level configuration loaded from `caseflow.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub record_backend: RecordBackend,

    #[serde(default)]
    pub artifact_backend: ArtifactBackend,

    /// Directory used by the `fs` artifact backend.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    #[serde(default)]
    pub poll: PollIntervals,

    /// How long a fetched pipeline config is reused before re-fetching.
    #[serde(default = "default_config_ttl_secs")]
    pub config_ttl_secs: u64,

    /// OCR text is cut to this many characters before it reaches the model.
    #[serde(default = "default_ocr_text_limit")]
    pub ocr_text_limit: usize,

    /// Substitute a placeholder description when the OCR call itself fails.
    #[serde(default = "default_true")]
    pub ocr_placeholder_fallback: bool,

    /// Simulated latency of the extraction stage.
    #[serde(default = "default_extraction_delay_ms")]
    pub extraction_delay_ms: u64,

    /// Simulated latency of the final processing stage.
    #[serde(default = "default_processing_delay_ms")]
    pub processing_delay_ms: u64,

    /// Pause between stop and start on restart.
    #[serde(default = "default_restart_pause_ms")]
    pub restart_pause_ms: u64,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_ocr_model")]
    pub ocr_model: String,

    #[serde(default)]
    pub anthropic_api_key: String,

    /// Full Messages endpoint URL, for proxies and tests.
    #[serde(default)]
    pub anthropic_base_url: Option<String>,

    #[serde(default)]
    pub mistral_api_key: String,

    /// Full OCR endpoint URL.
    #[serde(default)]
    pub ocr_base_url: Option<String>,

    #[serde(default)]
    pub supabase_url: String,

    #[serde(default)]
    pub supabase_key: String,

    #[serde(default)]
    pub azure_container_url: String,

    #[serde(default)]
    pub azure_sas_token: String,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_config_ttl_secs() -> u64 {
    300
}

fn default_ocr_text_limit() -> usize {
    8000
}

fn default_true() -> bool {
    true
}

fn default_extraction_delay_ms() -> u64 {
    3000
}

fn default_processing_delay_ms() -> u64 {
    4000
}

fn default_restart_pause_ms() -> u64 {
    1000
}

fn default_llm_model() -> String {
    crate::anthropic::extract::DEFAULT_MODEL.to_string()
}

fn default_ocr_model() -> String {
    crate::ocr::client::DEFAULT_MODEL.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            record_backend: RecordBackend::default(),
            artifact_backend: ArtifactBackend::default(),
            artifact_dir: default_artifact_dir(),
            poll: PollIntervals::default(),
            config_ttl_secs: default_config_ttl_secs(),
            ocr_text_limit: default_ocr_text_limit(),
            ocr_placeholder_fallback: true,
            extraction_delay_ms: default_extraction_delay_ms(),
            processing_delay_ms: default_processing_delay_ms(),
            restart_pause_ms: default_restart_pause_ms(),
            llm_model: default_llm_model(),
            ocr_model: default_ocr_model(),
            anthropic_api_key: String::new(),
            anthropic_base_url: None,
            mistral_api_key: String::new(),
            ocr_base_url: None,
            supabase_url: String::new(),
            supabase_key: String::new(),
            azure_container_url: String::new(),
            azure_sas_token: String::new(),
        }
    }
}

// Non-empty environment values replace the file value.
fn env_override(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

impl EngineConfig {
    /// Load `caseflow.toml` from the working directory, or defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<EngineConfig>(&contents)?
        } else {
            Self::default()
        };

        env_override(&mut config.anthropic_api_key, "ANTHROPIC_API_KEY");
        env_override(&mut config.mistral_api_key, "MISTRAL_API_KEY");
        env_override(&mut config.supabase_url, "SUPABASE_URL");
        env_override(&mut config.supabase_key, "SUPABASE_KEY");
        env_override(&mut config.azure_container_url, "AZURE_STORAGE_CONTAINER_URL");
        env_override(&mut config.azure_sas_token, "AZURE_STORAGE_SAS_TOKEN");

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let polls = [
            ("classification", self.poll.classification),
            ("extraction", self.poll.extraction),
            ("processing", self.poll.processing),
            ("completion", self.poll.completion),
        ];
        for (name, secs) in polls {
            if !secs.is_finite() || secs <= 0.0 {
                bail!("poll.{name} must be a positive number of seconds, got {secs}");
            }
        }
        if self.ocr_text_limit == 0 {
            bail!("ocr_text_limit must be greater than zero");
        }
        if self.record_backend == RecordBackend::Supabase
            && (self.supabase_url.is_empty() || self.supabase_key.is_empty())
        {
            bail!("record_backend = \"supabase\" requires SUPABASE_URL and SUPABASE_KEY");
        }
        if self.artifact_backend == ArtifactBackend::Azure
            && (self.azure_container_url.is_empty() || self.azure_sas_token.is_empty())
        {
            bail!(
                "artifact_backend = \"azure\" requires AZURE_STORAGE_CONTAINER_URL and AZURE_STORAGE_SAS_TOKEN"
            );
        }
        Ok(())
    }

    pub fn config_ttl(&self) -> Duration {
        Duration::from_secs(self.config_ttl_secs)
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }
}
