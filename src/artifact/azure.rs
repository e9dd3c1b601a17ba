use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{ArtifactError, ArtifactStore, StoredArtifact, blob_key, validate_key};
use crate::ocr::mime_for_extension;

const API_VERSION: &str = "2023-11-03";

/// Azure Blob Storage container addressed by URL plus a SAS token.
pub struct AzureBlobStore {
    client: Client,
    container_url: String,
    sas_token: String,
}

impl AzureBlobStore {
    /// `container_url` is e.g. `https://acct.blob.core.windows.net/case-documents`.
    pub fn new(container_url: &str, sas_token: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            container_url: container_url.trim_end_matches('/').to_string(),
            sas_token: sas_token.trim_start_matches('?').to_string(),
        }
    }

    fn blob_url(&self, key: &str) -> String {
        format!("{}/{key}", self.container_url)
    }

    fn signed_url(&self, key: &str) -> String {
        format!("{}?{}", self.blob_url(key), self.sas_token)
    }

    async fn error_for(response: reqwest::Response) -> ArtifactError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        ArtifactError::Http { status, message }
    }
}

#[async_trait]
impl ArtifactStore for AzureBlobStore {
    async fn upload(&self, content: Vec<u8>, name: &str) -> Result<StoredArtifact, ArtifactError> {
        let key = blob_key(name);
        let content_type = key
            .rsplit_once('.')
            .and_then(|(_, ext)| mime_for_extension(ext))
            .unwrap_or("application/octet-stream");

        let response = self
            .client
            .put(self.signed_url(&key))
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", API_VERSION)
            .header("content-type", content_type)
            .body(content)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(StoredArtifact {
            url: self.blob_url(&key),
            key,
        })
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, ArtifactError> {
        validate_key(key)?;
        let response = self
            .client
            .get(self.signed_url(key))
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ArtifactError::NotFound(key.to_string())),
            s if s.is_success() => Ok(response.bytes().await?.to_vec()),
            _ => Err(Self::error_for(response).await),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, ArtifactError> {
        validate_key(key)?;
        let response = self
            .client
            .delete(self.signed_url(key))
            .header("x-ms-version", API_VERSION)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(Self::error_for(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> AzureBlobStore {
        AzureBlobStore::new(&format!("{}/case-documents/", server.uri()), "?sv=2023&sig=abc")
    }

    #[tokio::test]
    async fn upload_puts_block_blob() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/case-documents/[0-9a-f-]{36}\.pdf$"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("content-type", "application/pdf"))
            .and(query_param("sig", "abc"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let stored = store(&server)
            .upload(b"%PDF".to_vec(), "claim.pdf")
            .await
            .unwrap();
        assert!(stored.url.ends_with(&stored.key));
        assert!(!stored.url.contains("sig="));
    }

    #[tokio::test]
    async fn download_missing_blob_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store(&server).download("gone.pdf").await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[tokio::test]
    async fn download_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/case-documents/a\.png$"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;

        assert_eq!(store(&server).download("a.png").await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn delete_reports_whether_blob_existed() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/case-documents/present\.pdf$"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/case-documents/absent\.pdf$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(store.delete("present.pdf").await.unwrap());
        assert!(!store.delete("absent.pdf").await.unwrap());
    }
}
