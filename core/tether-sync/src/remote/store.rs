//! Remote store abstraction and row shape.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tether_types::{OwnerId, StoreKey};

/// Abstract keyed backend with upsert/select/delete semantics.
///
/// Callers must check [`RemoteStore::is_available`] before every operation.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the name of the backend.
    fn provider_name(&self) -> &'static str;

    /// Returns whether the backend is configured and the caller is signed in.
    fn is_available(&self) -> bool;

    /// Loads the payload stored for `(owner, key)`, if any.
    async fn load(&self, owner: &OwnerId, key: &StoreKey) -> SyncResult<Option<Value>>;

    /// Writes the payload for `(owner, key)`. Repeated upserts of the same
    /// key overwrite one row rather than inserting another.
    async fn upsert(&self, owner: &OwnerId, key: &StoreKey, value: &Value) -> SyncResult<()>;

    /// Deletes the row for `(owner, key)`. Deleting a missing row succeeds.
    async fn delete(&self, owner: &OwnerId, key: &StoreKey) -> SyncResult<()>;
}

/// A backend that is never available. Routes the engine to local-only mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRemote;

#[async_trait]
impl RemoteStore for DisabledRemote {
    fn provider_name(&self) -> &'static str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn load(&self, _owner: &OwnerId, _key: &StoreKey) -> SyncResult<Option<Value>> {
        Err(SyncError::Unavailable)
    }

    async fn upsert(&self, _owner: &OwnerId, _key: &StoreKey, _value: &Value) -> SyncResult<()> {
        Err(SyncError::Unavailable)
    }

    async fn delete(&self, _owner: &OwnerId, _key: &StoreKey) -> SyncResult<()> {
        Err(SyncError::Unavailable)
    }
}

/// Which columns make a row unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictTarget {
    /// `(owner_id, <key column>)`: one row per owner per module.
    OwnerAndKey,
    /// `id`: one row per entity, the store key being the entity id.
    Id,
}

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    /// Primary key.
    pub id: String,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Module key or entity title, stored in the mapping's key column.
    pub key_or_title: String,
    /// Full entity payload.
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Describes how store keys map onto a backend table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMapping {
    /// Table name.
    pub table: String,
    /// Column holding the module key or entity title.
    pub key_column: String,
    /// Uniqueness rule for upserts.
    pub conflict: ConflictTarget,
    /// JSON pointer into the payload for the title, for per-entity tables.
    pub title_pointer: Option<String>,
}

impl Default for RowMapping {
    fn default() -> Self {
        Self::module_state()
    }
}

impl RowMapping {
    /// Per-module singleton state: one row per `(owner_id, module_key)`.
    pub fn module_state() -> Self {
        Self {
            table: "user_module_state".to_string(),
            key_column: "module_key".to_string(),
            conflict: ConflictTarget::OwnerAndKey,
            title_pointer: None,
        }
    }

    /// Per-entity rows keyed by id, with the entity's title copied into
    /// the `title` column.
    pub fn entity(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key_column: "title".to_string(),
            conflict: ConflictTarget::Id,
            title_pointer: Some("/data/title".to_string()),
        }
    }

    /// Column list for the backend's `on_conflict` parameter.
    pub fn on_conflict(&self) -> String {
        match self.conflict {
            ConflictTarget::OwnerAndKey => format!("owner_id,{}", self.key_column),
            ConflictTarget::Id => "id".to_string(),
        }
    }

    /// Primary key of the row holding `(owner, key)`.
    pub fn row_id(&self, owner: &OwnerId, key: &StoreKey) -> String {
        match self.conflict {
            ConflictTarget::OwnerAndKey => format!("{owner}:{key}"),
            ConflictTarget::Id => key.to_string(),
        }
    }

    /// Equality filters selecting the row for `(owner, key)`.
    pub fn filters(&self, owner: &OwnerId, key: &StoreKey) -> Vec<(String, String)> {
        let key_filter = match self.conflict {
            ConflictTarget::OwnerAndKey => (self.key_column.clone(), format!("eq.{key}")),
            ConflictTarget::Id => ("id".to_string(), format!("eq.{key}")),
        };
        vec![("owner_id".to_string(), format!("eq.{owner}")), key_filter]
    }

    /// Value for the key column: the module key, or the payload's title.
    pub fn key_value(&self, key: &StoreKey, data: &Value) -> String {
        self.title_pointer
            .as_deref()
            .and_then(|pointer| data.pointer(pointer))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| key.to_string())
    }

    /// Builds a fresh row for `(owner, key)` stamped with `now`.
    pub fn build_row(
        &self,
        owner: &OwnerId,
        key: &StoreKey,
        data: &Value,
        now: DateTime<Utc>,
    ) -> RemoteRow {
        RemoteRow {
            id: self.row_id(owner, key),
            owner_id: *owner,
            key_or_title: self.key_value(key, data),
            data: data.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Serializes a row for the upsert request body. `created_at` is left to
    /// the backend so that an overwrite keeps the original creation time.
    pub fn to_json(&self, row: &RemoteRow) -> Value {
        let mut body = Map::new();
        body.insert("id".to_string(), Value::String(row.id.clone()));
        body.insert("owner_id".to_string(), Value::String(row.owner_id.to_string()));
        body.insert(self.key_column.clone(), Value::String(row.key_or_title.clone()));
        body.insert("data".to_string(), row.data.clone());
        body.insert(
            "updated_at".to_string(),
            Value::String(row.updated_at.to_rfc3339()),
        );
        Value::Object(body)
    }
}
