use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::{ConfigStore, RecordStore, StoreError};
use crate::pipeline_config::PipelineConfig;
use crate::state_machine::{ItemPatch, Stage, WorkItem};

pub const CASES_TABLE: &str = "cases";
pub const CONFIG_TABLE: &str = "pipeline_configs";

/// Thin PostgREST client shared by the Supabase stores.
#[derive(Clone)]
pub struct PostgrestClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PostgrestClient {
    /// `base_url` is the project URL, e.g. `https://xyz.supabase.co`.
    pub fn new(base_url: &str, api_key: String) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{table}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(StoreError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, StoreError> {
        let response = Self::check(request.send().await?).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Total from a `Content-Range: 0-24/318` (or `*/0`) header.
fn parse_content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.parse().ok()
}

pub struct SupabaseRecordStore {
    db: PostgrestClient,
    table: String,
}

impl SupabaseRecordStore {
    pub fn new(db: PostgrestClient) -> Self {
        Self {
            db,
            table: CASES_TABLE.to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for SupabaseRecordStore {
    async fn list_by_stage(
        &self,
        stage: Stage,
        limit: Option<usize>,
    ) -> Result<Vec<WorkItem>, StoreError> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("stage", format!("eq.{}", stage.as_str())),
            ("order", "created_at.asc,id.asc".to_string()),
        ];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        PostgrestClient::rows(self.db.request(Method::GET, &self.table).query(&query)).await
    }

    async fn get(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        let filter = format!("eq.{id}");
        let rows: Vec<WorkItem> = PostgrestClient::rows(
            self.db
                .request(Method::GET, &self.table)
                .query(&[("select", "*"), ("id", filter.as_str()), ("limit", "1")]),
        )
        .await?;
        Ok(rows.into_iter().next())
    }

    async fn patch(&self, id: &str, patch: &ItemPatch) -> Result<WorkItem, StoreError> {
        let mut body = serde_json::to_value(patch).map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert(
                "updated_at".into(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        let rows: Vec<WorkItem> = PostgrestClient::rows(
            self.db
                .request(Method::PATCH, &self.table)
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=representation")
                .json(&body),
        )
        .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create(&self, item: WorkItem) -> Result<WorkItem, StoreError> {
        let id = item.id.clone();
        let rows: Vec<WorkItem> = PostgrestClient::rows(
            self.db
                .request(Method::POST, &self.table)
                .header("Prefer", "return=representation")
                .json(&item),
        )
        .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert of {id} returned no row")))
    }

    async fn count_by_stage(&self, stage: Stage) -> Result<usize, StoreError> {
        let response = self
            .db
            .request(Method::HEAD, &self.table)
            .query(&[("stage", format!("eq.{}", stage.as_str()))])
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = PostgrestClient::check(response).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| StoreError::Decode("missing Content-Range count".into()))
    }
}

pub struct SupabaseConfigStore {
    db: PostgrestClient,
    table: String,
}

impl SupabaseConfigStore {
    pub fn new(db: PostgrestClient) -> Self {
        Self {
            db,
            table: CONFIG_TABLE.to_string(),
        }
    }
}

#[async_trait]
impl ConfigStore for SupabaseConfigStore {
    async fn latest(&self) -> Result<Option<PipelineConfig>, StoreError> {
        Ok(self.history(1).await?.into_iter().next())
    }

    async fn history(&self, limit: usize) -> Result<Vec<PipelineConfig>, StoreError> {
        PostgrestClient::rows(self.db.request(Method::GET, &self.table).query(&[
            ("select", "*".to_string()),
            ("order", "version.desc".to_string()),
            ("limit", limit.to_string()),
        ]))
        .await
    }

    async fn insert(&self, config: PipelineConfig) -> Result<PipelineConfig, StoreError> {
        let version = config.version;
        let rows: Vec<PipelineConfig> = PostgrestClient::rows(
            self.db
                .request(Method::POST, &self.table)
                .header("Prefer", "return=representation")
                .json(&config),
        )
        .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert of version {version} returned no row")))
    }

    async fn delete_all(&self) -> Result<usize, StoreError> {
        // PostgREST refuses an unfiltered DELETE.
        let rows: Vec<serde_json::Value> = PostgrestClient::rows(
            self.db
                .request(Method::DELETE, &self.table)
                .query(&[("version", "gte.0")])
                .header("Prefer", "return=representation"),
        )
        .await?;
        Ok(rows.len())
    }
}
