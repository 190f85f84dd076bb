//! Session Registry
//!
//! Authoritative map of who is reachable right now: identity → connection
//! handle. Every mutation publishes a presence snapshot before the write lock
//! is released. Deliveries never await while the lock is held.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::connection::{
    CLOSE_IDENTITY_IN_USE, CLOSE_REPLACED, ConnectionHandle, DeliveryFailure,
};
use crate::envelope::Envelope;
use crate::error::HubError;
use crate::identity::{ConnectionId, Identity};
use crate::presence;

/// What to do when an identity connects while already online.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// Refuse the new connection; the live one keeps the identity
    Reject,
    /// Close the live connection, then install the new one
    #[default]
    Replace,
}

/// Result of a successful [`SessionRegistry::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connected {
    pub connection_id: ConnectionId,
    /// The connection that was evicted to make room, if any
    pub replaced: Option<ConnectionId>,
}

/// Delivery counters shared by every fan-out path.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    dropped_full: AtomicU64,
    dropped_closed: AtomicU64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub delivered: u64,
    /// Envelopes skipped because the recipient's queue was full
    pub dropped_full: u64,
    /// Envelopes skipped because the recipient's writer was gone
    pub dropped_closed: u64,
}

/// Enqueue to one handle, counting the outcome. A failure only means this
/// recipient is no longer reachable.
pub(crate) fn deliver(
    identity: &Identity,
    handle: &ConnectionHandle,
    envelope: Arc<Envelope>,
    stats: &DeliveryStats,
) -> bool {
    match handle.try_deliver(envelope) {
        Ok(()) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(DeliveryFailure::Full) => {
            stats.dropped_full.fetch_add(1, Ordering::Relaxed);
            warn!(identity = %identity, conn_id = %handle.id(), "Outbound queue full, dropping envelope");
            false
        }
        Err(DeliveryFailure::Closed) => {
            stats.dropped_closed.fetch_add(1, Ordering::Relaxed);
            debug!(identity = %identity, conn_id = %handle.id(), "Outbound queue closed, skipping");
            false
        }
    }
}

/// Identity → live connection map.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Identity, ConnectionHandle>>,
    policy: ReconnectPolicy,
    stats: DeliveryStats,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

impl SessionRegistry {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            policy,
            stats: DeliveryStats::default(),
        }
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Register a connection and publish presence.
    ///
    /// If the identity is already online the reconnect policy decides: the
    /// new handle is closed and `IdentityInUse` returned (`Reject`), or the
    /// old handle is closed before the new one is installed (`Replace`).
    pub async fn connect(
        &self,
        identity: Identity,
        handle: ConnectionHandle,
    ) -> Result<Connected, HubError> {
        let connection_id = handle.id();
        let mut sessions = self.sessions.write().await;

        if self.policy == ReconnectPolicy::Reject && sessions.contains_key(&identity) {
            handle.close(CLOSE_IDENTITY_IN_USE, "identity already connected");
            warn!(identity = %identity, conn_id = %connection_id, "Rejected duplicate connection");
            return Err(HubError::IdentityInUse(identity));
        }

        let replaced = sessions.remove(&identity).map(|old| {
            let old_id = old.id();
            old.close(CLOSE_REPLACED, "replaced by a newer connection");
            info!(identity = %identity, old_conn = %old_id, new_conn = %connection_id, "Replaced existing session");
            old_id
        });

        sessions.insert(identity.clone(), handle);
        debug!(identity = %identity, conn_id = %connection_id, online = sessions.len(), "Session registered");
        presence::publish(&sessions, &self.stats);

        Ok(Connected {
            connection_id,
            replaced,
        })
    }

    /// Remove an identity if present. Idempotent; publishes presence only
    /// when something was removed.
    pub async fn disconnect(&self, identity: &Identity) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(identity) {
            Some(handle) => {
                debug!(identity = %identity, conn_id = %handle.id(), "Session removed");
                drop(handle);
                presence::publish(&sessions, &self.stats);
                true
            }
            None => false,
        }
    }

    /// Like [`disconnect`](Self::disconnect), but only if the registered
    /// handle is still `connection_id`. A replaced session calls this on its
    /// way out and must not remove its successor.
    pub async fn release(&self, identity: &Identity, connection_id: ConnectionId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.get(identity).map(|h| h.id()) != Some(connection_id) {
            return false;
        }
        sessions.remove(identity);
        debug!(identity = %identity, conn_id = %connection_id, "Session released");
        presence::publish(&sessions, &self.stats);
        true
    }

    /// Connection id registered for an identity, if online.
    pub async fn lookup(&self, identity: &Identity) -> Option<ConnectionId> {
        self.sessions.read().await.get(identity).map(|h| h.id())
    }

    pub async fn is_online(&self, identity: &Identity) -> bool {
        self.sessions.read().await.contains_key(identity)
    }

    /// Sorted copy of the online set, taken under the lock.
    pub async fn snapshot(&self) -> Vec<Identity> {
        presence::online_users(&*self.sessions.read().await)
    }

    /// Deliver to one identity. `false` when offline or unreachable; messages
    /// to offline users are dropped, never queued.
    pub async fn send_to(&self, identity: &Identity, envelope: Arc<Envelope>) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(identity) {
            Some(handle) => deliver(identity, handle, envelope, &self.stats),
            None => false,
        }
    }

    /// Deliver to one specific connection, only while it still holds `identity`.
    pub(crate) async fn send_to_connection(
        &self,
        identity: &Identity,
        connection_id: ConnectionId,
        envelope: Arc<Envelope>,
    ) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(identity) {
            Some(handle) if handle.id() == connection_id => {
                deliver(identity, handle, envelope, &self.stats)
            }
            _ => false,
        }
    }

    /// Deliver to each listed identity that is online. Returns the delivery count.
    pub async fn send_to_many<'a, I>(&self, identities: I, envelope: Arc<Envelope>) -> usize
    where
        I: IntoIterator<Item = &'a Identity>,
    {
        let sessions = self.sessions.read().await;
        identities
            .into_iter()
            .filter_map(|identity| sessions.get_key_value(identity))
            .filter(|(identity, handle)| deliver(identity, handle, envelope.clone(), &self.stats))
            .count()
    }

    /// Deliver to every live connection. Returns the delivery count.
    pub async fn broadcast(&self, envelope: Arc<Envelope>) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .filter(|(identity, handle)| deliver(identity, handle, envelope.clone(), &self.stats))
            .count()
    }

    /// Close every connection and empty the registry. Does not wait for any
    /// session to finish. Returns how many were closed.
    pub async fn close_all(&self, code: u16, reason: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for (identity, handle) in sessions.drain() {
            debug!(identity = %identity, conn_id = %handle.id(), "Closing session");
            handle.close(code, reason);
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }
}
