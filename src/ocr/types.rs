//! Request and response bodies for the Mistral `/v1/ocr` endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct OcrRequest {
    pub model: String,
    pub document: OcrDocument,
}

/// PDFs go in as `document_url`, images as `image_url`; both carry a base64 data URL.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OcrDocument {
    DocumentUrl { document_url: String },
    ImageUrl { image_url: String },
}

impl OcrDocument {
    pub fn from_data_url(mime_type: &str, data_url: String) -> Self {
        if mime_type.starts_with("image/") {
            OcrDocument::ImageUrl {
                image_url: data_url,
            }
        } else {
            OcrDocument::DocumentUrl {
                document_url: data_url,
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrPage {
    pub index: u32,
    #[serde(default)]
    pub markdown: String,
}

impl OcrResponse {
    /// Page markdown sorted by page index.
    pub fn into_markdown_pages(mut self) -> Vec<String> {
        self.pages.sort_by_key(|p| p.index);
        self.pages.into_iter().map(|p| p.markdown).collect()
    }
}
