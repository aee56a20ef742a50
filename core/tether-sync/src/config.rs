//! Engine and remote backend configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quiet period after the last change before a remote save fires.
pub const DEFAULT_DEBOUNCE_MS: u64 = 800;

/// Undo entries kept before the oldest is evicted.
pub const DEFAULT_UNDO_LIMIT: usize = 20;

/// Environment variable holding the remote backend URL.
pub const REMOTE_URL_ENV: &str = "TETHER_REMOTE_URL";

/// Environment variable holding the remote backend API key.
pub const REMOTE_KEY_ENV: &str = "TETHER_REMOTE_KEY";

/// Values shipped in sample env files; treated as "not configured".
const PLACEHOLDERS: &[&str] = &[
    "your-project-url",
    "your-anon-key",
    "your_supabase_url",
    "your_supabase_anon_key",
    "https://your-project.supabase.co",
    "changeme",
];

/// Configuration for the sync coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Debounce window for remote saves.
    pub debounce: Duration,
    /// Maximum undo entries per history-enabled store.
    pub undo_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            undo_limit: DEFAULT_UNDO_LIMIT,
        }
    }
}

/// Connection settings for a REST row backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the backend (e.g. `https://abc.supabase.co`).
    pub url: String,
    /// Public API key sent with every request.
    pub api_key: String,
    /// Path segment in front of table names.
    pub schema_path: String,
    /// Per-request timeout. `None` waits indefinitely.
    #[serde(default, with = "optional_millis")]
    pub timeout: Option<Duration>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            schema_path: "rest/v1".to_string(),
            timeout: None,
        }
    }
}

impl RemoteConfig {
    /// Creates a config for the given backend URL and API key.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Reads `TETHER_REMOTE_URL` and `TETHER_REMOTE_KEY`. Missing variables
    /// yield an unconfigured config rather than an error.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(REMOTE_URL_ENV).unwrap_or_default(),
            std::env::var(REMOTE_KEY_ENV).unwrap_or_default(),
        )
    }

    /// Returns true when both URL and key are present and not placeholders.
    pub fn is_configured(&self) -> bool {
        let url = self.url.trim();
        let has_scheme = url.starts_with("http://") || url.starts_with("https://");
        has_scheme && !is_placeholder(url) && !is_placeholder(&self.api_key)
    }
}

fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || PLACEHOLDERS
            .iter()
            .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
