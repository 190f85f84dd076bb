use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::connection::{CLOSE_SHUTDOWN, ConnectionHandle, OutboundReceiver, connection_channel};
use crate::error::HubError;
use crate::gateway::PersistenceGateway;
use crate::identity::Identity;
use crate::registry::{ReconnectPolicy, SessionRegistry};
use crate::router::MessageRouter;

/// Chat behaviour settings (the `[chat]` config section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Recipient name that means "everyone"
    pub broadcast_recipient: String,
    /// Sender name on join/leave notices
    pub system_sender: String,
    pub announce_join: bool,
    pub announce_leave: bool,
    pub reconnect_policy: ReconnectPolicy,
    /// Per-connection outbound queue bound
    pub outbound_queue_capacity: usize,
    /// Send `ERROR` envelopes back to clients that send malformed frames
    pub report_protocol_errors: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_recipient: "Chat General".to_string(),
            system_sender: "System".to_string(),
            announce_join: true,
            announce_leave: true,
            reconnect_policy: ReconnectPolicy::Replace,
            outbound_queue_capacity: 256,
            report_protocol_errors: false,
        }
    }
}

/// Registry, router and policy bundled together. Built once by the server
/// and shared through its application state.
pub struct ChatHub {
    config: HubConfig,
    registry: Arc<SessionRegistry>,
    router: MessageRouter,
}

impl ChatHub {
    pub fn new(config: HubConfig, gateway: Arc<dyn PersistenceGateway>) -> Result<Self, HubError> {
        let system_sender = Identity::new(config.system_sender.clone())?;
        let registry = Arc::new(SessionRegistry::new(config.reconnect_policy));
        let router = MessageRouter::new(
            registry.clone(),
            gateway,
            config.broadcast_recipient.clone(),
            system_sender,
        );

        Ok(Self {
            config,
            registry,
            router,
        })
    }

    /// A fresh connection handle sized by `outbound_queue_capacity`.
    pub fn open_connection(&self) -> (ConnectionHandle, OutboundReceiver) {
        connection_channel(self.config.outbound_queue_capacity)
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Close every session. Returns how many were open.
    pub async fn shutdown(&self) -> usize {
        let closed = self.registry.close_all(CLOSE_SHUTDOWN, "server shutting down").await;
        info!(closed = closed, "Chat hub shut down");
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::InMemoryGateway;

    #[test]
    fn blank_system_sender_is_rejected() {
        let config = HubConfig {
            system_sender: "  ".to_string(),
            ..HubConfig::default()
        };
        let result = ChatHub::new(config, Arc::new(InMemoryGateway::default()));
        assert!(matches!(result, Err(HubError::EmptyIdentity)));
    }

    #[test]
    fn config_section_parses_partial_json() {
        let config: HubConfig =
            serde_json::from_str(r#"{"reconnect_policy":"reject","announce_join":false}"#).unwrap();
        assert_eq!(config.reconnect_policy, ReconnectPolicy::Reject);
        assert!(!config.announce_join);
        assert_eq!(config.broadcast_recipient, "Chat General");
        assert_eq!(config.outbound_queue_capacity, 256);
    }

    #[tokio::test]
    async fn open_connection_uses_configured_capacity() {
        let hub = ChatHub::new(
            HubConfig {
                outbound_queue_capacity: 3,
                ..HubConfig::default()
            },
            Arc::new(InMemoryGateway::default()),
        )
        .unwrap();
        let (handle, _rx) = hub.open_connection();
        hub.registry().connect(Identity::new("a").unwrap(), handle).await.unwrap();

        // One slot holds the presence snapshot.
        let delete = || Arc::new(crate::envelope::Envelope::Delete { id: 1 });
        assert_eq!(hub.registry().broadcast(delete()).await, 1);
        assert_eq!(hub.registry().broadcast(delete()).await, 1);
        assert_eq!(hub.registry().broadcast(delete()).await, 0);
        assert_eq!(hub.registry().stats().dropped_full, 1);
    }
}
