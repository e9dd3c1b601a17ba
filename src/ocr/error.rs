use thiserror::Error;

/// Errors raised by the OCR provider.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The document type is not one OCR accepts; never sent to the provider.
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    #[error("OCR API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
