//! REST row backend.
//!
//! Speaks the PostgREST dialect used by hosted Postgres backends:
//! equality filters as `column=eq.value`, upserts as `POST` with
//! `on_conflict` and `Prefer: resolution=merge-duplicates`.

use super::store::{RemoteStore, RowMapping};
use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use tether_types::{OwnerId, StoreKey};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct DataRow {
    data: Value,
}

/// Remote store backed by a REST row API.
pub struct RestRemoteStore {
    config: RemoteConfig,
    mapping: RowMapping,
    client: Client,
    /// Computed once from the config.
    configured: bool,
    session: RwLock<Option<String>>,
}

impl RestRemoteStore {
    /// Creates a store for `config`, writing rows according to `mapping`.
    pub fn new(config: RemoteConfig, mapping: RowMapping) -> SyncResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        let configured = config.is_configured();
        if !configured {
            debug!("Remote backend not configured, running local-only");
        }

        Ok(Self {
            config,
            mapping,
            client,
            configured,
            session: RwLock::new(None),
        })
    }

    /// Sets the signed-in user's access token.
    pub fn set_session(&self, access_token: impl Into<String>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(access_token.into());
        info!("Remote session established");
    }

    /// Drops the access token; the store becomes unavailable.
    pub fn clear_session(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
        info!("Remote session cleared");
    }

    /// Returns whether an access token is set.
    pub fn has_session(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the row mapping.
    pub fn mapping(&self) -> &RowMapping {
        &self.mapping
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.schema_path.trim_matches('/'),
            self.mapping.table
        )
    }

    fn authorized(&self, request: RequestBuilder) -> SyncResult<RequestBuilder> {
        let token = self
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| SyncError::Auth("not signed in".to_string()))?;

        Ok(request
            .header("apikey", &self.config.api_key)
            .bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> SyncResult<Response> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("{action} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SyncError::Auth(format!("{action} rejected: {body}")));
        }
        Err(SyncError::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    fn provider_name(&self) -> &'static str {
        "rest"
    }

    fn is_available(&self) -> bool {
        self.configured && self.has_session()
    }

    async fn load(&self, owner: &OwnerId, key: &StoreKey) -> SyncResult<Option<Value>> {
        let mut query = vec![("select".to_string(), "data".to_string())];
        query.extend(self.mapping.filters(owner, key));
        query.push(("limit".to_string(), "1".to_string()));

        let request = self.client.get(self.endpoint()).query(&query);
        let response = self.send(request, "load").await?;

        let rows: Vec<DataRow> = response
            .json()
            .await
            .map_err(|e| SyncError::Network(format!("failed to parse rows: {e}")))?;

        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.data)
            .filter(|data| !data.is_null()))
    }

    async fn upsert(&self, owner: &OwnerId, key: &StoreKey, value: &Value) -> SyncResult<()> {
        let row = self.mapping.build_row(owner, key, value, Utc::now());
        let body = Value::Array(vec![self.mapping.to_json(&row)]);

        let request = self
            .client
            .post(self.endpoint())
            .query(&[("on_conflict", self.mapping.on_conflict())])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body);
        self.send(request, "upsert").await?;

        debug!(key = %key, table = %self.mapping.table, "Upserted row");
        Ok(())
    }

    async fn delete(&self, owner: &OwnerId, key: &StoreKey) -> SyncResult<()> {
        let request = self
            .client
            .delete(self.endpoint())
            .query(&self.mapping.filters(owner, key));
        self.send(request, "delete").await?;
        Ok(())
    }
}
