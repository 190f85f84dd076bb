//! Wire types: outbound envelopes, inbound client actions, and recipient
//! classification.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::identity::Identity;

/// One routed message unit sent to clients.
///
/// Serialized as `{"type": "CHAT" | "DELETE" | "STATUS" | "ERROR", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Envelope {
    Chat {
        /// Persisted message id; absent for system notices
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        sender: Identity,
        recipient: String,
        #[serde(rename = "message")]
        body: String,
        timestamp: String,
        #[serde(rename = "isGroup", default)]
        is_group: bool,
    },
    Delete {
        id: i64,
    },
    Status {
        #[serde(rename = "onlineUsers")]
        online_users: Vec<Identity>,
    },
    /// Sent only to the offending client, and only when protocol error
    /// reporting is enabled.
    Error {
        message: String,
    },
}

impl Envelope {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Envelope::Chat { id, .. } => *id,
            Envelope::Delete { id } => Some(*id),
            _ => None,
        }
    }
}

/// Current UTC time as sortable ISO-8601 with millisecond precision and a
/// trailing `Z`, e.g. `2024-05-01T09:30:00.125Z`.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Raw inbound frame, every field optional. Validation happens in
/// [`ClientAction::parse`].
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "isGroup", default)]
    is_group: Option<bool>,
}

/// A validated client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Send {
        recipient: String,
        body: String,
        is_group: bool,
    },
    Delete {
        id: i64,
    },
}

impl ClientAction {
    /// Parse one inbound text frame. `action` defaults to `"message"`.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let frame: InboundFrame =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        match frame.action.as_deref().unwrap_or("message") {
            "message" => {
                let recipient = frame
                    .recipient
                    .ok_or(ProtocolError::MissingField("recipient"))?;
                if recipient.trim().is_empty() {
                    return Err(ProtocolError::EmptyField("recipient"));
                }
                let body = frame.message.ok_or(ProtocolError::MissingField("message"))?;
                Ok(ClientAction::Send {
                    recipient,
                    body,
                    is_group: frame.is_group.unwrap_or(false),
                })
            }
            "delete" => {
                let raw = frame.id.ok_or(ProtocolError::MissingField("id"))?;
                Ok(ClientAction::Delete {
                    id: parse_message_id(&raw)?,
                })
            }
            other => Err(ProtocolError::UnknownAction(other.to_string())),
        }
    }
}

/// Accepts a JSON integer or a string holding one; clients that keep ids as
/// DOM attribute values send strings.
fn parse_message_id(raw: &Value) -> Result<i64, ProtocolError> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| ProtocolError::InvalidId(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ProtocolError::InvalidId(s.clone())),
        other => Err(ProtocolError::InvalidId(other.to_string())),
    }
}

/// Where a chat message fans out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientTarget {
    /// Every live connection
    BroadcastAll,
    /// One user, plus an echo to the sender
    SingleUser(Identity),
    /// Currently online members of the named group
    Group(String),
}

impl RecipientTarget {
    /// Classify a literal recipient. The broadcast sentinel wins over
    /// `is_group`.
    pub fn classify(
        recipient: &str,
        is_group: bool,
        broadcast_recipient: &str,
    ) -> Result<Self, ProtocolError> {
        if recipient == broadcast_recipient {
            return Ok(RecipientTarget::BroadcastAll);
        }
        if is_group {
            return Ok(RecipientTarget::Group(recipient.to_string()));
        }
        Identity::new(recipient)
            .map(RecipientTarget::SingleUser)
            .map_err(|_| ProtocolError::EmptyField("recipient"))
    }

    pub fn is_group(&self) -> bool {
        matches!(self, RecipientTarget::Group(_))
    }
}
