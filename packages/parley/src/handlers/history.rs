use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chat_hub::PersistenceGateway;
use tracing::error;

use crate::AppState;
use crate::models::HistoryQuery;

const DEFAULT_HISTORY_LIMIT: i64 = 200;
const MAX_HISTORY_LIMIT: i64 = 1000;

/// Stored messages, oldest-first.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);

    match state.repository.list_messages(limit, query.before).await {
        Ok(messages) => Ok(Json(messages)),
        Err(e) => {
            error!("Failed to load history: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{body_json, empty_request, test_app_state};
    use axum::{Router, routing::get};
    use chat_hub::{Identity, NewMessage, utc_timestamp};
    use tower::ServiceExt;

    async fn seeded_router(count: usize) -> Router {
        let state = test_app_state().await;
        for i in 0..count {
            state
                .repository
                .insert_message(&NewMessage {
                    sender: Identity::new("alice").unwrap(),
                    recipient: "Chat General".to_string(),
                    body: format!("msg {}", i),
                    timestamp: utc_timestamp(),
                    is_group: false,
                })
                .await
                .unwrap();
        }
        Router::new()
            .route("/api/history", get(get_history))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_history_wire_shape() {
        let app = seeded_router(1).await;
        let resp = app
            .oneshot(empty_request("GET", "/api/history"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let first = &json[0];
        assert_eq!(first["sender"], "alice");
        assert_eq!(first["recipient"], "Chat General");
        assert_eq!(first["message"], "msg 0");
        assert_eq!(first["isGroup"], false);
        assert!(first["id"].is_i64());
    }

    #[tokio::test]
    async fn test_history_limit_and_before() {
        let app = seeded_router(5).await;

        let resp = app
            .clone()
            .oneshot(empty_request("GET", "/api/history?limit=2"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        let page = json.as_array().unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["message"], "msg 3");
        assert_eq!(page[1]["message"], "msg 4");

        let before = page[0]["id"].as_i64().unwrap();
        let resp = app
            .oneshot(empty_request("GET", &format!("/api/history?limit=10&before={}", before)))
            .await
            .unwrap();
        let json = body_json(resp).await;
        let older: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["message"].as_str().unwrap())
            .collect();
        assert_eq!(older, vec!["msg 0", "msg 1", "msg 2"]);
    }

    #[tokio::test]
    async fn test_history_limit_is_clamped() {
        let app = seeded_router(3).await;
        let resp = app
            .oneshot(empty_request("GET", "/api/history?limit=0"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
    }
}
