//! Message Router
//!
//! Turns one client action into a persisted message (or deletion) and its
//! fan-out. A message is persisted before any delivery; if persisting fails,
//! nothing is delivered.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::envelope::{ClientAction, Envelope, RecipientTarget, utc_timestamp};
use crate::error::HubError;
use crate::gateway::{NewMessage, PersistenceGateway};
use crate::identity::{ConnectionId, Identity};
use crate::registry::SessionRegistry;

/// What the router did with one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Message persisted as `id` and handed to `deliveries` connections
    Delivered {
        id: i64,
        target: RecipientTarget,
        deliveries: usize,
    },
    /// Message `id` deleted; every connection was told
    Deleted { id: i64, deliveries: usize },
    /// Not found, or not owned by the requester
    DeleteIgnored { id: i64 },
}

pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn PersistenceGateway>,
    broadcast_recipient: String,
    system_sender: Identity,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        gateway: Arc<dyn PersistenceGateway>,
        broadcast_recipient: impl Into<String>,
        system_sender: Identity,
    ) -> Self {
        Self {
            registry,
            gateway,
            broadcast_recipient: broadcast_recipient.into(),
            system_sender,
        }
    }

    pub fn broadcast_recipient(&self) -> &str {
        &self.broadcast_recipient
    }

    pub fn classify(&self, recipient: &str, is_group: bool) -> Result<RecipientTarget, HubError> {
        Ok(RecipientTarget::classify(
            recipient,
            is_group,
            &self.broadcast_recipient,
        )?)
    }

    /// Parse and route one inbound text frame. `origin` is the connection the
    /// frame arrived on, when there is one.
    pub async fn handle_frame(
        &self,
        sender: &Identity,
        origin: Option<ConnectionId>,
        text: &str,
    ) -> Result<RouteOutcome, HubError> {
        let action = ClientAction::parse(text)?;
        self.dispatch(sender, origin, action).await
    }

    pub async fn dispatch(
        &self,
        sender: &Identity,
        origin: Option<ConnectionId>,
        action: ClientAction,
    ) -> Result<RouteOutcome, HubError> {
        match action {
            ClientAction::Send {
                recipient,
                body,
                is_group,
            } => {
                self.route_message(sender, origin, recipient, body, is_group)
                    .await
            }
            ClientAction::Delete { id } => self.route_delete(sender, id).await,
        }
    }

    /// Persist a chat message, then deliver it to its target.
    ///
    /// The sender's echo of a private message goes to `origin` only, so a
    /// session replaced mid-frame never echoes into its successor. Without an
    /// origin the echo goes to whichever connection holds the sender.
    pub async fn route_message(
        &self,
        sender: &Identity,
        origin: Option<ConnectionId>,
        recipient: String,
        body: String,
        is_group: bool,
    ) -> Result<RouteOutcome, HubError> {
        let target = self.classify(&recipient, is_group)?;

        let message = NewMessage {
            sender: sender.clone(),
            recipient,
            body,
            timestamp: utc_timestamp(),
            is_group: target.is_group(),
        };
        let id = self.gateway.save_message(&message).await?;

        let envelope = Arc::new(Envelope::Chat {
            id: Some(id),
            sender: message.sender,
            recipient: message.recipient,
            body: message.body,
            timestamp: message.timestamp,
            is_group: message.is_group,
        });

        let deliveries = match &target {
            RecipientTarget::BroadcastAll => self.registry.broadcast(envelope).await,
            RecipientTarget::Group(name) => self.deliver_to_group(name, envelope).await,
            RecipientTarget::SingleUser(recipient) => {
                let mut delivered = usize::from(self.registry.send_to(recipient, envelope.clone()).await);
                if recipient != sender {
                    let echoed = match origin {
                        Some(connection_id) => {
                            self.registry
                                .send_to_connection(sender, connection_id, envelope)
                                .await
                        }
                        None => self.registry.send_to(sender, envelope).await,
                    };
                    delivered += usize::from(echoed);
                }
                delivered
            }
        };

        debug!(sender = %sender, id = id, target = ?target, deliveries = deliveries, "Message routed");
        Ok(RouteOutcome::Delivered {
            id,
            target,
            deliveries,
        })
    }

    /// Membership is read per message, never cached.
    async fn deliver_to_group(&self, name: &str, envelope: Arc<Envelope>) -> usize {
        match self.gateway.get_group(name).await {
            Ok(Some(group)) => self.registry.send_to_many(&group.members, envelope).await,
            Ok(None) => {
                debug!(group = %name, "Message to unknown group, nothing delivered");
                0
            }
            Err(e) => {
                error!(group = %name, error = %e, "Failed to resolve group members");
                0
            }
        }
    }

    /// Delete a message owned by `sender` and tell every connection. A
    /// request for someone else's (or a missing) message is a silent no-op.
    pub async fn route_delete(&self, sender: &Identity, id: i64) -> Result<RouteOutcome, HubError> {
        if !self.gateway.delete_message(id, sender).await? {
            debug!(sender = %sender, id = id, "Delete ignored: not found or not owner");
            return Ok(RouteOutcome::DeleteIgnored { id });
        }

        let deliveries = self.registry.broadcast(Arc::new(Envelope::Delete { id })).await;
        info!(sender = %sender, id = id, deliveries = deliveries, "Message deleted");
        Ok(RouteOutcome::Deleted { id, deliveries })
    }

    pub async fn announce_join(&self, identity: &Identity) -> usize {
        self.announce(format!("{} joined", identity)).await
    }

    pub async fn announce_leave(&self, identity: &Identity) -> usize {
        self.announce(format!("{} left", identity)).await
    }

    /// System notices go to everyone and are never persisted.
    async fn announce(&self, body: String) -> usize {
        let envelope = Arc::new(Envelope::Chat {
            id: None,
            sender: self.system_sender.clone(),
            recipient: self.broadcast_recipient.clone(),
            body,
            timestamp: utc_timestamp(),
            is_group: false,
        });
        self.registry.broadcast(envelope).await
    }
}
