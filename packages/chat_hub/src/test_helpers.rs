//! Shared fixtures for the hub's unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::connection::{Outbound, OutboundReceiver};
use crate::envelope::Envelope;
use crate::gateway::{
    GatewayError, GroupDescriptor, NewMessage, PersistenceGateway, StoredMessage, UserSummary,
};
use crate::identity::Identity;

pub(crate) fn identity(name: &str) -> Identity {
    Identity::new(name).unwrap()
}

/// Everything currently queued, close frames included.
pub(crate) fn drain_all(rx: &mut OutboundReceiver) -> Vec<Outbound> {
    std::iter::from_fn(|| rx.try_recv()).collect()
}

/// Queued envelopes only.
pub(crate) fn drain(rx: &mut OutboundReceiver) -> Vec<Envelope> {
    drain_all(rx)
        .into_iter()
        .filter_map(|item| match item {
            Outbound::Envelope(envelope) => Some((*envelope).clone()),
            Outbound::Close { .. } => None,
        })
        .collect()
}

/// Gateway backed by plain maps.
#[derive(Default)]
pub(crate) struct InMemoryGateway {
    messages: Mutex<BTreeMap<i64, StoredMessage>>,
    groups: Mutex<BTreeMap<String, GroupDescriptor>>,
    next_id: Mutex<i64>,
    fail_saves: AtomicBool,
}

impl InMemoryGateway {
    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn insert_group(&self, name: &str, creator: &str, members: &[&str]) {
        let group = GroupDescriptor {
            name: name.to_string(),
            creator: identity(creator),
            members: members.iter().map(|m| identity(m)).collect(),
        };
        self.groups.lock().unwrap().insert(name.to_string(), group);
    }

    pub(crate) fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub(crate) fn contains(&self, id: i64) -> bool {
        self.messages.lock().unwrap().contains_key(&id)
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn save_message(&self, message: &NewMessage) -> Result<i64, GatewayError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("save disabled".to_string()));
        }
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        let stored = StoredMessage {
            id,
            sender: message.sender.to_string(),
            recipient: message.recipient.clone(),
            body: message.body.clone(),
            timestamp: message.timestamp.clone(),
            is_group: message.is_group,
        };
        self.messages.lock().unwrap().insert(id, stored);
        Ok(id)
    }

    async fn delete_message(&self, id: i64, requester: &Identity) -> Result<bool, GatewayError> {
        let mut messages = self.messages.lock().unwrap();
        match messages.get(&id) {
            Some(stored) if *requester == *stored.sender => {
                messages.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_messages(
        &self,
        limit: i64,
        before: Option<i64>,
    ) -> Result<Vec<StoredMessage>, GatewayError> {
        let messages = self.messages.lock().unwrap();
        let mut newest: Vec<StoredMessage> = messages
            .values()
            .rev()
            .filter(|m| before.is_none_or(|b| m.id < b))
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        newest.reverse();
        Ok(newest)
    }

    async fn list_users(&self) -> Result<Vec<UserSummary>, GatewayError> {
        Ok(Vec::new())
    }

    async fn get_group(&self, name: &str) -> Result<Option<GroupDescriptor>, GatewayError> {
        Ok(self.groups.lock().unwrap().get(name).cloned())
    }

    async fn set_group_members(
        &self,
        name: &str,
        members: &BTreeSet<Identity>,
    ) -> Result<(), GatewayError> {
        match self.groups.lock().unwrap().get_mut(name) {
            Some(group) => {
                group.members = members.clone();
                Ok(())
            }
            None => Err(GatewayError::Backend(format!("no such group: {}", name))),
        }
    }
}
