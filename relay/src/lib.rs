//! Row API and in-memory state for the tether relay.
//!
//! Serves the subset of the PostgREST dialect that `RestRemoteStore` speaks:
//! equality filters (`column=eq.value`), `select`, `limit`, and upserts
//! driven by `on_conflict` plus `Prefer: resolution=merge-duplicates`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, warn};

/// One stored row: column name to JSON value.
pub type Row = Map<String, Value>;

/// Query parameters that are not column filters.
const RESERVED_PARAMS: &[&str] = &["select", "limit", "on_conflict", "order"];

/// Errors returned to API clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid apikey")]
    Unauthorized,

    #[error("unsupported filter on {column}: {filter}")]
    BadFilter { column: String, filter: String },

    #[error("invalid request body: {0}")]
    BadBody(String),

    #[error("duplicate key on ({0})")]
    Conflict(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadFilter { .. } | ApiError::BadBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub rows: usize,
}

/// Shared relay state: the expected API key and every table's rows.
#[derive(Debug)]
pub struct RelayState {
    api_key: String,
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl RelayState {
    /// Creates an empty relay accepting requests that carry `api_key`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Total rows across all tables.
    pub fn row_count(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    /// Returns a copy of the rows in `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.read().get(table).cloned().unwrap_or_default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Row>>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Row>>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let provided = headers.get("apikey").and_then(|v| v.to_str().ok());
        if provided == Some(self.api_key.as_str()) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Equality filters parsed from the query string.
struct Filters(Vec<(String, String)>);

impl Filters {
    fn parse(params: &[(String, String)]) -> Result<Self, ApiError> {
        let mut filters = Vec::new();
        for (column, filter) in params {
            if RESERVED_PARAMS.contains(&column.as_str()) {
                continue;
            }
            let Some(value) = filter.strip_prefix("eq.") else {
                return Err(ApiError::BadFilter {
                    column: column.clone(),
                    filter: filter.clone(),
                });
            };
            filters.push((column.clone(), value.to_string()));
        }
        Ok(Self(filters))
    }

    fn matches(&self, row: &Row) -> bool {
        self.0
            .iter()
            .all(|(column, expected)| row.get(column).is_some_and(|v| text(v) == *expected))
    }
}

/// Text form of a column value, as compared by `eq.` filters.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn project(row: &Row, select: Option<&str>) -> Row {
    match select {
        None | Some("*") => row.clone(),
        Some(columns) => columns
            .split(',')
            .map(str::trim)
            .filter_map(|column| row.get(column).map(|v| (column.to_string(), v.clone())))
            .collect(),
    }
}

async fn select_rows(
    State(state): State<Arc<RelayState>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Row>>, ApiError> {
    state.authorize(&headers)?;
    let filters = Filters::parse(&params)?;
    let limit = param(&params, "limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(usize::MAX);
    let select = param(&params, "select");

    let tables = state.read();
    let rows: Vec<Row> = tables
        .get(&table)
        .into_iter()
        .flatten()
        .filter(|row| filters.matches(row))
        .take(limit)
        .map(|row| project(row, select))
        .collect();

    debug!(table = %table, count = rows.len(), "Select");
    Ok(Json(rows))
}

async fn upsert_rows(
    State(state): State<Arc<RelayState>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    state.authorize(&headers)?;

    let incoming: Vec<Row> = match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(ApiError::BadBody(format!("expected object, got {other}"))),
            })
            .collect::<Result<_, _>>()?,
        Value::Object(row) => vec![row],
        other => return Err(ApiError::BadBody(format!("expected object or array, got {other}"))),
    };

    let prefer = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let merge = prefer.contains("resolution=merge-duplicates");
    let representation = prefer.contains("return=representation");
    let conflict_columns: Vec<String> = param(&params, "on_conflict")
        .unwrap_or("id")
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let now = Value::String(Utc::now().to_rfc3339());
    let mut tables = state.write();
    let rows = tables.entry(table.clone()).or_default();
    let mut written = Vec::with_capacity(incoming.len());

    for mut row in incoming {
        let existing = rows.iter_mut().find(|stored| {
            conflict_columns
                .iter()
                .all(|c| row.get(c).is_some() && stored.get(c) == row.get(c))
        });

        match existing {
            Some(stored) => {
                if !merge {
                    warn!(table = %table, "Duplicate key without merge preference");
                    return Err(ApiError::Conflict(conflict_columns.join(",")));
                }
                row.remove("created_at");
                row.entry("updated_at").or_insert_with(|| now.clone());
                stored.extend(row);
                written.push(stored.clone());
            }
            None => {
                row.entry("created_at").or_insert_with(|| now.clone());
                row.entry("updated_at").or_insert_with(|| now.clone());
                written.push(row.clone());
                rows.push(row);
            }
        }
    }

    debug!(table = %table, count = written.len(), "Upsert");
    if representation {
        Ok((StatusCode::CREATED, Json(written)).into_response())
    } else {
        Ok(StatusCode::CREATED.into_response())
    }
}

async fn delete_rows(
    State(state): State<Arc<RelayState>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.authorize(&headers)?;
    let filters = Filters::parse(&params)?;

    let mut tables = state.write();
    let removed = match tables.get_mut(&table) {
        Some(rows) => {
            let before = rows.len();
            rows.retain(|row| !filters.matches(row));
            before - rows.len()
        }
        None => 0,
    };

    debug!(table = %table, removed, "Delete");
    Ok(StatusCode::NO_CONTENT)
}

async fn health_handler(State(state): State<Arc<RelayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        rows: state.row_count(),
    })
}

/// Build the HTTP API router over the given state.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/rest/v1/{table}",
            get(select_rows).post(upsert_rows).delete(delete_rows),
        )
        .with_state(state)
}
