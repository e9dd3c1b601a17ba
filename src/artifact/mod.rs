//! Blob storage for uploaded case documents.

mod azure;
mod local;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use azure::AzureBlobStore;
pub use local::{FsArtifactStore, MemoryArtifactStore};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("blob service returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an uploaded blob landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub key: String,
    pub url: String,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `content` under a fresh key derived from `name`.
    async fn upload(&self, content: Vec<u8>, name: &str) -> Result<StoredArtifact, ArtifactError>;

    async fn download(&self, key: &str) -> Result<Vec<u8>, ArtifactError>;

    /// `Ok(false)` when there was nothing to delete.
    async fn delete(&self, key: &str) -> Result<bool, ArtifactError>;
}

/// Unique blob key that keeps the original extension: `<uuid>.pdf`.
pub fn blob_key(name: &str) -> String {
    let ext = std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{}{ext}", Uuid::new_v4())
}

/// Keys are flat names; anything that could escape a directory is refused.
pub(crate) fn validate_key(key: &str) -> Result<(), ArtifactError> {
    if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
        return Err(ArtifactError::InvalidKey(key.to_string()));
    }
    Ok(())
}
