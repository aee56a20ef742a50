use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tether_relay::{build_router, HealthResponse, RelayState};

const KEY: &str = "test-key";

/// Spin up the HTTP server on an OS-assigned port, returning the base URL
/// and the shared state.
async fn spawn_test_server() -> (String, Arc<RelayState>) {
    let state = Arc::new(RelayState::new(KEY));
    let app = build_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://127.0.0.1:{}", port), state)
}

async fn upsert(base: &str, table: &str, on_conflict: &str, rows: Value) -> reqwest::Response {
    Client::new()
        .post(format!("{}/rest/v1/{}", base, table))
        .query(&[("on_conflict", on_conflict)])
        .header("apikey", KEY)
        .header("Prefer", "resolution=merge-duplicates,return=minimal")
        .json(&rows)
        .send()
        .await
        .unwrap()
}

async fn select(base: &str, table: &str, query: &[(&str, &str)]) -> Vec<Value> {
    let resp = Client::new()
        .get(format!("{}/rest/v1/{}", base, table))
        .query(query)
        .header("apikey", KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_row_count() {
    let (base, _) = spawn_test_server().await;
    upsert(&base, "notes", "id", json!([{"id": "a"}, {"id": "b"}])).await;

    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: HealthResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "ok");
    assert_eq!(body.rows, 2);
}

#[tokio::test]
async fn missing_apikey_is_unauthorized() {
    let (base, _) = spawn_test_server().await;

    let resp = reqwest::get(format!("{}/rest/v1/notes", base)).await.unwrap();
    assert_eq!(resp.status(), 401);

    let resp = Client::new()
        .get(format!("{}/rest/v1/notes", base))
        .header("apikey", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (base, _) = spawn_test_server().await;
    let resp = reqwest::get(format!("{}/api/v1/nonexistent", base))
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn upsert_then_select_with_filters() {
    let (base, _) = spawn_test_server().await;
    let resp = upsert(
        &base,
        "user_module_state",
        "owner_id,module_key",
        json!([
            {"owner_id": "u1", "module_key": "brand", "data": {"name": "Acme"}},
            {"owner_id": "u1", "module_key": "tasks", "data": []},
            {"owner_id": "u2", "module_key": "brand", "data": {"name": "Other"}},
        ]),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let rows = select(
        &base,
        "user_module_state",
        &[("select", "data"), ("owner_id", "eq.u1"), ("module_key", "eq.brand")],
    )
    .await;
    assert_eq!(rows, vec![json!({"data": {"name": "Acme"}})]);

    let rows = select(&base, "user_module_state", &[("module_key", "eq.brand"), ("limit", "1")]).await;
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn upsert_overwrites_and_preserves_created_at() {
    let (base, state) = spawn_test_server().await;
    upsert(&base, "projects", "id", json!([{"id": "p1", "title": "Draft"}])).await;
    let created = state.rows("projects")[0]["created_at"].clone();
    assert!(created.is_string());

    upsert(
        &base,
        "projects",
        "id",
        json!([{"id": "p1", "title": "Final", "created_at": "1999-01-01T00:00:00Z"}]),
    )
    .await;

    let rows = state.rows("projects");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "Final");
    assert_eq!(rows[0]["created_at"], created);
    assert!(rows[0]["updated_at"].is_string());
}

#[tokio::test]
async fn duplicate_without_merge_is_conflict() {
    let (base, _) = spawn_test_server().await;
    upsert(&base, "projects", "id", json!({"id": "p1"})).await;

    let resp = Client::new()
        .post(format!("{}/rest/v1/projects", base))
        .header("apikey", KEY)
        .json(&json!({"id": "p1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn representation_returns_written_rows() {
    let (base, _) = spawn_test_server().await;
    let resp = Client::new()
        .post(format!("{}/rest/v1/projects", base))
        .header("apikey", KEY)
        .header("Prefer", "return=representation")
        .json(&json!([{"id": "p1", "title": "Draft"}]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let rows: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(rows[0]["title"], "Draft");
    assert!(rows[0]["created_at"].is_string());
}

#[tokio::test]
async fn non_object_rows_are_rejected() {
    let (base, _) = spawn_test_server().await;
    let resp = upsert(&base, "projects", "id", json!([1, 2])).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unsupported_filter_is_bad_request() {
    let (base, _) = spawn_test_server().await;
    let resp = Client::new()
        .get(format!("{}/rest/v1/projects", base))
        .query(&[("title", "like.*song*")])
        .header("apikey", KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn delete_removes_matching_rows() {
    let (base, state) = spawn_test_server().await;
    upsert(
        &base,
        "user_module_state",
        "owner_id,module_key",
        json!([
            {"owner_id": "u1", "module_key": "brand", "data": 1},
            {"owner_id": "u1", "module_key": "tasks", "data": 2},
        ]),
    )
    .await;

    let resp = Client::new()
        .delete(format!("{}/rest/v1/user_module_state", base))
        .query(&[("owner_id", "eq.u1"), ("module_key", "eq.brand")])
        .header("apikey", KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let rows = state.rows("user_module_state");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["module_key"], "tasks");
}

#[tokio::test]
async fn select_from_unknown_table_is_empty() {
    let (base, _) = spawn_test_server().await;
    assert!(select(&base, "nothing", &[]).await.is_empty());
}
