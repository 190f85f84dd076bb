use axum::body::Body;
use axum::http::{Request, Response};
use chat_hub::{ChatHub, HubConfig};
use std::sync::Arc;

use crate::AppState;
use crate::db::Database;
use crate::metrics::ServerMetrics;
use crate::repository::ChatRepository;

/// Build a fully-wired `AppState` backed by an in-memory SQLite database.
/// Suitable for handler tests that exercise real SQL queries without I/O.
pub async fn test_app_state() -> AppState {
    test_app_state_with(HubConfig::default()).await
}

pub async fn test_app_state_with(chat: HubConfig) -> AppState {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");

    crate::db::run_migrations(&pool).await.expect("migrations");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .expect("pragma");

    let db = Arc::new(Database { pool: pool.clone() });
    let repository = Arc::new(ChatRepository::new(pool));
    let hub = Arc::new(ChatHub::new(chat, repository.clone()).expect("hub"));

    AppState {
        hub,
        repository,
        db,
        metrics: Arc::new(ServerMetrics::new()),
    }
}

/// `method uri` with a JSON body.
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
