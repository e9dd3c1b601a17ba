//! Classification service seams: OCR and language-model extraction.
//!
//! The classification processor only sees these traits; the concrete
//! clients live in [`crate::ocr`] and [`crate::anthropic`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::anthropic::AnthropicError;
use crate::ocr::OcrError;

/// Turns a document into page-ordered markdown.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Short provider name recorded in case history.
    fn name(&self) -> &str;

    async fn ocr(&self, document: &[u8], mime_type: &str) -> Result<Vec<String>, OcrError>;
}

/// Asks a language model for a single structured `{lob, process}` answer.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn extract(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ExtractedPair, AnthropicError>;
}

/// The model's answer. Both fields are `None` when it declined to pick a pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPair {
    #[serde(default)]
    pub lob: Option<String>,
    #[serde(default)]
    pub process: Option<String>,
}

impl ExtractedPair {
    pub fn is_null(&self) -> bool {
        self.lob.is_none() && self.process.is_none()
    }
}

/// Parse a model reply into an [`ExtractedPair`].
///
/// Tolerates markdown code fences and prose around a single JSON object.
pub fn parse_pair_response(text: &str) -> Result<ExtractedPair, String> {
    let trimmed = text.trim();
    let start = trimmed
        .find('{')
        .ok_or_else(|| "response contains no JSON object".to_string())?;
    let end = trimmed
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| "response contains no JSON object".to_string())?;

    let value: serde_json::Value = serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| format!("invalid JSON in response: {e}"))?;
    let object = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;
    if !object.contains_key("lob") || !object.contains_key("process") {
        return Err("response must contain both `lob` and `process`".into());
    }

    serde_json::from_value(value).map_err(|e| format!("malformed lob/process values: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_object() {
        let pair = parse_pair_response(r#"{"lob": "Motor", "process": "Claims"}"#).unwrap();
        assert_eq!(pair.lob.as_deref(), Some("Motor"));
        assert_eq!(pair.process.as_deref(), Some("Claims"));
    }

    #[test]
    fn parses_fenced_object_with_prose() {
        let text = "Here you go:\n```json\n{\"lob\": \"Home\", \"process\": \"Renewal\"}\n```";
        let pair = parse_pair_response(text).unwrap();
        assert_eq!(pair.lob.as_deref(), Some("Home"));
        assert_eq!(pair.process.as_deref(), Some("Renewal"));
    }

    #[test]
    fn parses_null_pair() {
        let pair = parse_pair_response(r#"{"lob": null, "process": null}"#).unwrap();
        assert!(pair.is_null());
    }

    #[test]
    fn rejects_missing_keys() {
        assert!(parse_pair_response(r#"{"lob": "Motor"}"#).is_err());
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_pair_response("I think it is motor claims").is_err());
        assert!(parse_pair_response("} nope {").is_err());
    }

    #[test]
    fn rejects_non_string_values() {
        assert!(parse_pair_response(r#"{"lob": 3, "process": ["x"]}"#).is_err());
    }
}
