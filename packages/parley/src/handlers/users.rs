use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chat_hub::PersistenceGateway;
use tracing::error;

use crate::AppState;
use crate::models::AvatarUpdate;

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    match state.repository.list_users().await {
        Ok(users) => Ok(Json(users)),
        Err(e) => {
            error!("Failed to list users: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn update_avatar(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<AvatarUpdate>,
) -> StatusCode {
    match state.repository.update_avatar(&username, &req.avatar_url).await {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            error!("Failed to update avatar: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
