//! `PersistenceGateway` over the SQLite repository.

use async_trait::async_trait;
use chat_hub::{
    GatewayError, GroupDescriptor, Identity, NewMessage, PersistenceGateway, StoredMessage,
    UserSummary,
};
use std::collections::BTreeSet;

use super::ChatRepository;

/// Pool exhaustion and I/O failures are transient; anything else is a backend failure.
fn gateway_error(err: anyhow::Error) -> GatewayError {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
            GatewayError::Unavailable(err.to_string())
        }
        _ => GatewayError::backend(format!("{:#}", err)),
    }
}

#[async_trait]
impl PersistenceGateway for ChatRepository {
    async fn save_message(&self, message: &NewMessage) -> Result<i64, GatewayError> {
        self.insert_message(message).await.map_err(gateway_error)
    }

    async fn delete_message(&self, id: i64, requester: &Identity) -> Result<bool, GatewayError> {
        self.delete_message_by_sender(id, requester.as_str())
            .await
            .map_err(gateway_error)
    }

    async fn list_messages(
        &self,
        limit: i64,
        before: Option<i64>,
    ) -> Result<Vec<StoredMessage>, GatewayError> {
        self.get_history(before, limit).await.map_err(gateway_error)
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, GatewayError> {
        self.list_user_summaries().await.map_err(gateway_error)
    }

    async fn get_group(&self, name: &str) -> Result<Option<GroupDescriptor>, GatewayError> {
        ChatRepository::get_group(self, name)
            .await
            .map_err(gateway_error)
    }

    async fn set_group_members(
        &self,
        name: &str,
        members: &BTreeSet<Identity>,
    ) -> Result<(), GatewayError> {
        self.replace_group_members(name, members)
            .await
            .map_err(gateway_error)
    }
}
