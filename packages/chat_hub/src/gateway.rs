//! Persistence Gateway contract.
//!
//! The hub never stores anything itself. Messages, users and groups live
//! behind this trait; the server implements it over SQLite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::identity::Identity;

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The backend cannot be reached right now
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
    /// The backend rejected or failed the operation
    #[error("persistence failure: {0}")]
    Backend(String),
}

impl GatewayError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        GatewayError::Backend(err.to_string())
    }
}

/// A chat message about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub sender: Identity,
    pub recipient: String,
    pub body: String,
    pub timestamp: String,
    pub is_group: bool,
}

/// A stored chat message, as listed in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub sender: String,
    pub recipient: String,
    #[serde(rename = "message")]
    pub body: String,
    pub timestamp: String,
    #[serde(rename = "isGroup")]
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    /// Avatar URL, empty when unset
    pub avatar: String,
}

/// A named group. Membership is owned by the gateway; the router only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    pub name: String,
    pub creator: Identity,
    pub members: BTreeSet<Identity>,
}

impl GroupDescriptor {
    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members.contains(identity)
    }
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Store a message and return its durable id.
    async fn save_message(&self, message: &NewMessage) -> Result<i64, GatewayError>;

    /// Delete message `id` only if `requester` sent it. `true` iff a row was removed.
    async fn delete_message(&self, id: i64, requester: &Identity) -> Result<bool, GatewayError>;

    /// Stored messages oldest-first, at most `limit`, optionally only those
    /// with an id below `before`.
    async fn list_messages(
        &self,
        limit: i64,
        before: Option<i64>,
    ) -> Result<Vec<StoredMessage>, GatewayError>;

    async fn list_users(&self) -> Result<Vec<UserSummary>, GatewayError>;

    async fn get_group(&self, name: &str) -> Result<Option<GroupDescriptor>, GatewayError>;

    /// Replace a group's member set.
    async fn set_group_members(
        &self,
        name: &str,
        members: &BTreeSet<Identity>,
    ) -> Result<(), GatewayError>;
}
