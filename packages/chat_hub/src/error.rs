use crate::gateway::GatewayError;
use crate::identity::Identity;

/// Errors surfaced by the hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// An identity string was empty or whitespace-only
    #[error("identity must not be empty")]
    EmptyIdentity,

    /// Another live connection already holds this identity (reject policy)
    #[error("identity already connected: {0}")]
    IdentityInUse(Identity),

    /// The client sent a frame that could not be interpreted
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The persistence collaborator failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Malformed inbound event. Skips one frame, never closes the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field must not be empty: {0}")]
    EmptyField(&'static str),

    #[error("invalid message id: {0}")]
    InvalidId(String),
}
