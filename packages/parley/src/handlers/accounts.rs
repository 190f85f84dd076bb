use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};

use crate::AppState;
use crate::models::{Credentials, LoginOutcome};

pub async fn signup_handler(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> StatusCode {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return StatusCode::BAD_REQUEST;
    }

    match state.repository.create_user(&req.username, &req.password).await {
        Ok(true) => {
            info!(username = %req.username, "User signed up");
            StatusCode::CREATED
        }
        Ok(false) => StatusCode::CONFLICT,
        Err(e) => {
            error!("Failed to create user: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<Credentials>,
) -> Result<impl IntoResponse, StatusCode> {
    match state
        .repository
        .verify_user_password(&req.username, &req.password)
        .await
    {
        Ok(LoginOutcome::Success(user)) => Ok(Json(user.summary())),
        Ok(LoginOutcome::UnknownUser) => Err(StatusCode::NOT_FOUND),
        Ok(LoginOutcome::WrongPassword) => Err(StatusCode::UNAUTHORIZED),
        Err(e) => {
            error!("Failed to verify password: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
