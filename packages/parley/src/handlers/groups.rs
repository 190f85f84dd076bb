//! Group CRUD. Membership changes here take effect on the next group
//! message; the hub re-reads the group every time.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chat_hub::{GroupDescriptor, Identity};
use std::collections::BTreeSet;
use tracing::{error, info};

use crate::AppState;
use crate::models::{AddMember, GroupListQuery, NewGroup, RemoveMemberQuery};

fn identity(raw: &str) -> Result<Identity, StatusCode> {
    Identity::new(raw).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn load_group(state: &AppState, name: &str) -> Result<GroupDescriptor, StatusCode> {
    match state.repository.get_group(name).await {
        Ok(Some(group)) => Ok(group),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to load group {}: {}", name, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<NewGroup>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let creator = identity(&req.creator)?;
    let members = req
        .members
        .iter()
        .map(|m| identity(m))
        .collect::<Result<BTreeSet<_>, _>>()?;

    match state.repository.create_group(&req.name, &creator, &members).await {
        Ok(Some(group)) => {
            info!(group = %group.name, creator = %creator, "Group created");
            Ok((StatusCode::CREATED, Json(group)))
        }
        Ok(None) => Err(StatusCode::CONFLICT),
        Err(e) => {
            error!("Failed to create group: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<GroupListQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    match state.repository.list_groups(query.member.as_deref()).await {
        Ok(groups) => Ok(Json(groups)),
        Err(e) => {
            error!("Failed to list groups: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    load_group(&state, &name).await.map(Json)
}

/// Only the creator may add members.
pub async fn add_member(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AddMember>,
) -> Result<impl IntoResponse, StatusCode> {
    let requester = identity(&req.requester)?;
    let member = identity(&req.member)?;
    let group = load_group(&state, &name).await?;

    if group.creator != requester {
        return Err(StatusCode::FORBIDDEN);
    }

    if let Err(e) = state.repository.add_group_member(&name, &member).await {
        error!("Failed to add member to {}: {}", name, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    info!(group = %name, member = %member, "Group member added");
    load_group(&state, &name).await.map(Json)
}

/// The creator may remove anyone; a member may remove themself.
pub async fn remove_member(
    State(state): State<AppState>,
    Path((name, member)): Path<(String, String)>,
    Query(query): Query<RemoveMemberQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let requester = identity(&query.requester)?;
    let member = identity(&member)?;
    let group = load_group(&state, &name).await?;

    if group.creator != requester && member != requester {
        return Err(StatusCode::FORBIDDEN);
    }
    if !group.is_member(&member) {
        return Err(StatusCode::NOT_FOUND);
    }

    if let Err(e) = state.repository.remove_group_member(&name, &member).await {
        error!("Failed to remove member from {}: {}", name, e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    info!(group = %name, member = %member, "Group member removed");
    load_group(&state, &name).await.map(Json)
}
