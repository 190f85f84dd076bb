//! Presence Broadcaster
//!
//! Sends the online-user snapshot to every live connection. The registry
//! calls [`publish`] while still holding its write lock, right after a
//! mutation, so every client sees snapshots in mutation order.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::envelope::Envelope;
use crate::identity::Identity;
use crate::registry::{DeliveryStats, deliver};

/// Sorted identities of a session map.
pub(crate) fn online_users(sessions: &HashMap<Identity, ConnectionHandle>) -> Vec<Identity> {
    let mut users: Vec<Identity> = sessions.keys().cloned().collect();
    users.sort();
    users
}

/// Build the `STATUS` envelope for a session map and enqueue it to every
/// handle. Returns how many connections received it.
pub(crate) fn publish(
    sessions: &HashMap<Identity, ConnectionHandle>,
    stats: &DeliveryStats,
) -> usize {
    let envelope = Arc::new(Envelope::Status {
        online_users: online_users(sessions),
    });

    let delivered = sessions
        .iter()
        .filter(|(identity, handle)| deliver(identity, handle, envelope.clone(), stats))
        .count();

    debug!(
        online = sessions.len(),
        delivered = delivered,
        "Presence snapshot published"
    );
    delivered
}
