use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;

use super::error::OcrError;
use super::types::{OcrDocument, OcrRequest, OcrResponse};
use crate::provider::OcrProvider;

pub const API_URL: &str = "https://api.mistral.ai/v1/ocr";
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

pub struct MistralOcrClient {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
}

impl MistralOcrClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "HTTP client build failed, using defaults without timeouts");
                Client::new()
            });
        Self {
            api_key,
            model,
            client,
            base_url,
        }
    }
}

#[async_trait]
impl OcrProvider for MistralOcrClient {
    fn name(&self) -> &str {
        "mistral-ocr"
    }

    async fn ocr(&self, document: &[u8], mime_type: &str) -> Result<Vec<String>, OcrError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(document);
        let data_url = format!("data:{mime_type};base64,{encoded}");
        let req = OcrRequest {
            model: self.model.clone(),
            document: OcrDocument::from_data_url(mime_type, data_url),
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(OcrError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json::<OcrResponse>().await?;
        tracing::info!(
            model = %self.model,
            pages = body.pages.len(),
            bytes = document.len(),
            elapsed_ms = %start.elapsed().as_millis(),
            "OCR complete"
        );
        Ok(body.into_markdown_pages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_base64_document_and_returns_pages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ocr"))
            .and(header("authorization", "Bearer key-1"))
            .and(body_partial_json(serde_json::json!({
                "model": "mistral-ocr-latest",
                "document": {
                    "type": "document_url",
                    "document_url": "data:application/pdf;base64,JVBERg=="
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pages": [
                    {"index": 1, "markdown": "page two"},
                    {"index": 0, "markdown": "page one"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MistralOcrClient::with_base_url(
            "key-1".into(),
            DEFAULT_MODEL.into(),
            format!("{}/v1/ocr", server.uri()),
        );
        let pages = client.ocr(b"%PDF", "application/pdf").await.unwrap();
        assert_eq!(pages, vec!["page one", "page two"]);
    }

    #[tokio::test]
    async fn error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client =
            MistralOcrClient::with_base_url("k".into(), DEFAULT_MODEL.into(), server.uri());
        let err = client.ocr(b"png", "image/png").await.unwrap_err();
        assert!(matches!(err, OcrError::ApiError { status: 503, .. }));
    }
}
