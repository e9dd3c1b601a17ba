//! Prompt construction and answer validation for classification.

use crate::pipeline_config::{LobProcessPair, PipelineConfig};
use crate::provider::ExtractedPair;

/// System prompt: the configured LOB and process instructions.
pub fn build_system_prompt(config: &PipelineConfig) -> String {
    format!(
        "You classify insurance case documents.\n\n\
         Line of business instructions:\n{}\n\n\
         Process instructions:\n{}",
        config.lob_prompt.trim(),
        config.process_prompt.trim()
    )
}

/// User prompt: every allowed pair verbatim, the answer format, and the
/// document text.
pub fn build_user_prompt(config: &PipelineConfig, document_text: &str) -> String {
    let pairs = config
        .lob_process_pairs
        .iter()
        .map(|p| format!("- {{\"lob\": {}, \"process\": {}}}", json_str(&p.lob), json_str(&p.process)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Classify the document below. Respond with ONLY valid JSON, no other text.\n\
         Format: {{\"lob\": \"<lob>\", \"process\": \"<process>\"}}\n\
         \n\
         The pair must be exactly one of the following, copied verbatim:\n\
         {pairs}\n\
         \n\
         If none of them matches with confidence, respond with {{\"lob\": null, \"process\": null}}.\n\
         \n\
         Document:\n\
         {document_text}"
    )
}

fn json_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// First `limit` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Accept the model's answer only if it names a configured pair exactly.
pub fn validate_pair(
    config: &PipelineConfig,
    pair: &ExtractedPair,
) -> Result<LobProcessPair, String> {
    match (&pair.lob, &pair.process) {
        (None, None) => Err("model found no matching LOB-Process pair".into()),
        (Some(lob), Some(process)) if config.contains_pair(lob, process) => {
            Ok(LobProcessPair::new(lob.as_str(), process.as_str()))
        }
        (Some(lob), Some(process)) => Err(format!(
            "model returned a pair outside the configured list: {lob}|{process}"
        )),
        _ => Err("model returned an incomplete LOB-Process pair".into()),
    }
}
