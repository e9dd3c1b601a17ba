use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ArtifactError, ArtifactStore, StoredArtifact, blob_key, validate_key};

/// Blobs held in memory; URLs use a `memory://` scheme.
#[derive(Default)]
pub struct MemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a blob under a caller-chosen key.
    pub async fn insert(&self, key: impl Into<String>, content: Vec<u8>) {
        self.blobs.write().await.insert(key.into(), content);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn upload(&self, content: Vec<u8>, name: &str) -> Result<StoredArtifact, ArtifactError> {
        let key = blob_key(name);
        self.blobs.write().await.insert(key.clone(), content);
        Ok(StoredArtifact {
            url: format!("memory://case-documents/{key}"),
            key,
        })
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ArtifactError> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<bool, ArtifactError> {
        Ok(self.blobs.write().await.remove(key).is_some())
    }
}

/// Blobs stored as flat files in one directory.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn upload(&self, content: Vec<u8>, name: &str) -> Result<StoredArtifact, ArtifactError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let key = blob_key(name);
        let path = self.path_for(&key)?;
        tokio::fs::write(&path, content).await?;
        Ok(StoredArtifact {
            url: format!("file://{}", path.display()),
            key,
        })
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, ArtifactError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
