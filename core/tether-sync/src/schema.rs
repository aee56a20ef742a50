//! Versioned payload envelope.
//!
//! Every value written to the local cache or the remote store is wrapped as
//! `{"schemaVersion": n, "data": <entity>}`. Payloads without the envelope
//! predate versioning and are read as version 0.

use crate::error::{SyncError, SyncResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

const VERSION_FIELD: &str = "schemaVersion";
const DATA_FIELD: &str = "data";

/// A type that can be persisted by a [`crate::SyncedStore`].
///
/// Override [`Entity::SCHEMA_VERSION`] and [`Entity::migrate`] when the
/// persisted shape changes.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Version written with every payload.
    const SCHEMA_VERSION: u32 = 1;

    /// Upgrades `value`, stored at `from_version`, to [`Entity::SCHEMA_VERSION`].
    ///
    /// The default accepts older payloads unchanged.
    fn migrate(from_version: u32, value: Value) -> SyncResult<Value> {
        let _ = from_version;
        Ok(value)
    }
}

impl Entity for Value {}

/// Wraps `entity` in the versioned envelope.
pub fn encode<T: Entity>(entity: &T) -> SyncResult<Value> {
    let mut envelope = Map::new();
    envelope.insert(VERSION_FIELD.to_string(), Value::from(T::SCHEMA_VERSION));
    envelope.insert(DATA_FIELD.to_string(), serde_json::to_value(entity)?);
    Ok(Value::Object(envelope))
}

/// Unwraps, migrates and deserializes a stored payload.
pub fn decode<T: Entity>(stored: Value) -> SyncResult<T> {
    let (version, data) = split_envelope(stored);

    if version > T::SCHEMA_VERSION {
        return Err(SyncError::Schema(format!(
            "payload version {version} is newer than supported version {}",
            T::SCHEMA_VERSION
        )));
    }

    let data = if version < T::SCHEMA_VERSION {
        T::migrate(version, data)?
    } else {
        data
    };

    Ok(serde_json::from_value(data)?)
}

fn split_envelope(stored: Value) -> (u32, Value) {
    match stored {
        Value::Object(mut map) if is_envelope(&map) => {
            let version = map
                .get(VERSION_FIELD)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0);
            let data = map.remove(DATA_FIELD).unwrap_or(Value::Null);
            (version, data)
        }
        other => (0, other),
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    map.len() == 2 && map.contains_key(DATA_FIELD) && map.get(VERSION_FIELD).is_some_and(Value::is_u64)
}
