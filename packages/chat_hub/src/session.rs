//! Per-connection session driver.
//!
//! Transport-agnostic: the caller supplies the stream of inbound text frames
//! and the connection handle; the driver registers, reads frames one at a
//! time until the stream ends or the handle is cancelled, then releases.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionHandle;
use crate::envelope::Envelope;
use crate::error::HubError;
use crate::hub::ChatHub;
use crate::identity::{ConnectionId, Identity};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed, or the inbound stream ended
    Closed,
    /// Reading from the transport failed
    TransportError,
    /// Evicted by a newer connection, or the hub shut down
    Cancelled,
    /// Refused at registration (identity in use under the reject policy)
    Rejected,
}

/// Drive one connection from registration to release.
///
/// Each frame is fully persisted and fanned out before the next is read.
pub async fn run_session<S, E>(
    hub: &ChatHub,
    identity: Identity,
    handle: ConnectionHandle,
    mut inbound: S,
) -> SessionEnd
where
    S: Stream<Item = Result<String, E>> + Unpin,
    E: Display,
{
    let connection_id = handle.id();
    let cancel = handle.cancellation();
    let registry = hub.registry();
    let router = hub.router();
    let config = hub.config();

    match registry.connect(identity.clone(), handle).await {
        Ok(connected) => {
            info!(identity = %identity, conn_id = %connection_id, replaced = ?connected.replaced, "Session started");
        }
        Err(e) => {
            warn!(identity = %identity, conn_id = %connection_id, error = %e, "Session refused");
            return SessionEnd::Rejected;
        }
    }

    if config.announce_join {
        router.announce_join(&identity).await;
    }

    let end = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break SessionEnd::Cancelled,

            frame = inbound.next() => match frame {
                None => break SessionEnd::Closed,
                Some(Err(e)) => {
                    debug!(identity = %identity, conn_id = %connection_id, error = %e, "Transport read failed");
                    break SessionEnd::TransportError;
                }
                Some(Ok(text)) => {
                    if let Err(e) = router.handle_frame(&identity, Some(connection_id), &text).await {
                        report(hub, &identity, connection_id, e).await;
                    }
                }
            },
        }
    };

    let removed = registry.release(&identity, connection_id).await;
    if removed && config.announce_leave {
        router.announce_leave(&identity).await;
    }

    info!(identity = %identity, conn_id = %connection_id, end = ?end, removed = removed, "Session ended");
    end
}

/// A failed frame never ends the session.
async fn report(
    hub: &ChatHub,
    identity: &Identity,
    connection_id: ConnectionId,
    err: HubError,
) {
    match &err {
        HubError::Protocol(e) => {
            warn!(identity = %identity, conn_id = %connection_id, error = %e, "Skipping malformed frame");
        }
        other => {
            error!(identity = %identity, conn_id = %connection_id, error = %other, "Failed to handle frame");
        }
    }

    if hub.config().report_protocol_errors {
        let envelope = Arc::new(Envelope::Error {
            message: err.to_string(),
        });
        hub.registry()
            .send_to_connection(identity, connection_id, envelope)
            .await;
    }
}
