//! Chat Hub - session registry and message routing for a multi-user chat service
//!
//! This crate owns the in-memory state of who is online and decides where each
//! chat event goes. It has no HTTP dependencies and no storage of its own: the
//! transport hands it a stream of inbound text frames per connection, and
//! persistence is reached through the [`PersistenceGateway`] trait.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_hub::{ChatHub, HubConfig, Identity, Outbound, PersistenceGateway};
//!
//! async fn serve_one(gateway: Arc<dyn PersistenceGateway>) {
//!     let hub = ChatHub::new(HubConfig::default(), gateway).unwrap();
//!
//!     let (handle, mut outbound) = hub.open_connection();
//!     let identity = Identity::new("alice").unwrap();
//!
//!     // The transport's writer drains the outbound queue into the socket.
//!     tokio::spawn(async move {
//!         while let Some(item) = outbound.recv().await {
//!             if let Outbound::Envelope(envelope) = item {
//!                 println!("{}", envelope.to_json().unwrap());
//!             }
//!         }
//!     });
//!
//!     // Inbound frames as they arrive from the client.
//!     let frames = futures::stream::iter(vec![Ok::<_, std::io::Error>(
//!         r#"{"recipient":"Chat General","message":"hi"}"#.to_string(),
//!     )]);
//!     chat_hub::run_session(&hub, identity, handle, frames).await;
//! }
//! ```

mod connection;
mod envelope;
mod error;
mod gateway;
mod hub;
mod identity;
mod presence;
pub mod registry;
pub mod router;
mod session;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use connection::{
    CLOSE_IDENTITY_IN_USE, CLOSE_REPLACED, CLOSE_SHUTDOWN, ConnectionHandle, Outbound,
    OutboundReceiver, connection_channel,
};
pub use envelope::{ClientAction, Envelope, RecipientTarget, utc_timestamp};
pub use error::{HubError, ProtocolError};
pub use gateway::{
    GatewayError, GroupDescriptor, NewMessage, PersistenceGateway, StoredMessage, UserSummary,
};
pub use hub::{ChatHub, HubConfig};
pub use identity::{ConnectionId, Identity};
pub use registry::{Connected, DeliverySnapshot, ReconnectPolicy, SessionRegistry};
pub use router::{MessageRouter, RouteOutcome};
pub use session::{SessionEnd, run_session};
