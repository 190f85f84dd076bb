use chat_hub::UserSummary;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    /// Empty when unset
    pub avatar_url: String,
    pub created_at: i64,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            username: self.username.clone(),
            avatar: self.avatar_url.clone(),
        }
    }
}

/// Result of a password check.
#[derive(Debug)]
pub enum LoginOutcome {
    UnknownUser,
    WrongPassword,
    Success(User),
}

// =============================================================================
// HTTP request/response bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUpdate {
    pub avatar_url: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NewGroup {
    #[serde(default)]
    pub name: String,
    pub creator: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupListQuery {
    pub member: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMember {
    pub requester: String,
    pub member: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveMemberQuery {
    pub requester: String,
}

/// Body returned by `/health`.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub online_users: usize,
}
