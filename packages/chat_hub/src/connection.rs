use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::envelope::Envelope;
use crate::identity::ConnectionId;

/// Close code sent to a session evicted by a newer connection for the same identity.
pub const CLOSE_REPLACED: u16 = 4000;

/// Close code sent to a connection refused because its identity is already online.
pub const CLOSE_IDENTITY_IN_USE: u16 = 4009;

/// Close code ("going away") sent to every session on shutdown.
pub const CLOSE_SHUTDOWN: u16 = 1001;

/// Item in a connection's outbound queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    Envelope(Arc<Envelope>),
    /// Write a close frame and stop.
    Close { code: u16, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryFailure {
    /// The recipient is not draining its queue fast enough
    Full,
    /// The writer side is gone
    Closed,
}

/// Exclusive handle to one live connection.
///
/// Not `Clone`: the registry owns it for exactly as long as the session is
/// live. Dropping it closes the outbound queue, which ends the transport's
/// writer once the queue drains.
///
/// A full queue drops envelopes for this connection only, `STATUS`
/// snapshots included, and the handle stays registered. Presence is
/// corrected by the next snapshot that fits, which happens on the next
/// registry change. The close frame has a slot of its own and is never
/// dropped.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    close_tx: oneshot::Sender<Outbound>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Token cancelled when the registry evicts this connection or the hub
    /// shuts down. The session driver watches it.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Non-blocking enqueue.
    pub(crate) fn try_deliver(&self, envelope: Arc<Envelope>) -> Result<(), DeliveryFailure> {
        match self.tx.try_send(Outbound::Envelope(envelope)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryFailure::Full),
            Err(TrySendError::Closed(_)) => Err(DeliveryFailure::Closed),
        }
    }

    /// Queue a close frame behind whatever is already queued, cancel the
    /// session and drop the handle.
    pub(crate) fn close(self, code: u16, reason: &str) {
        let item = Outbound::Close {
            code,
            reason: reason.to_string(),
        };
        if self.close_tx.send(item).is_err() {
            debug!(conn_id = %self.id, code = code, "Writer already gone, close frame not queued");
        }
        self.cancel.cancel();
    }
}

/// Receiving half of a connection's outbound queue, drained by the
/// transport's writer task.
///
/// Yields queued envelopes in order, then the close frame (if the handle
/// was closed rather than dropped), then `None`.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<Outbound>,
    close_rx: Option<oneshot::Receiver<Outbound>>,
}

impl OutboundReceiver {
    pub async fn recv(&mut self) -> Option<Outbound> {
        if let Some(item) = self.rx.recv().await {
            return Some(item);
        }
        self.close_rx.take()?.await.ok()
    }

    pub fn try_recv(&mut self) -> Option<Outbound> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.close_rx.take()?.try_recv().ok(),
        }
    }
}

/// Create a handle and the receiver its writer task drains.
pub fn connection_channel(capacity: usize) -> (ConnectionHandle, OutboundReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (close_tx, close_rx) = oneshot::channel();
    let handle = ConnectionHandle {
        id: ConnectionId::new(),
        tx,
        close_tx,
        cancel: CancellationToken::new(),
    };
    (
        handle,
        OutboundReceiver {
            rx,
            close_rx: Some(close_rx),
        },
    )
}
