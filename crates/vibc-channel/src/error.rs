use thiserror::Error;

use crate::capability::CapabilityError;
use crate::client::ClientStatus;
use crate::connection::ConnectionError;

/// Errors reported by channel handshake and packet operations.
///
/// Every variant except [`ChannelError::InvariantViolation`] is a caller error:
/// the step did not happen and the relayer must correct its input and resubmit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("channel not found: port ID ({port_id}) channel ID ({channel_id})")]
    ChannelNotFound { port_id: String, channel_id: String },

    #[error("client not found: clientID ({0})")]
    ClientNotFound(String),

    #[error("consensus state not found for client ({client_id}) at height {height}")]
    ConsensusStateNotFound { client_id: String, height: String },

    #[error("capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("invalid channel state: {0}")]
    InvalidChannelState(String),

    #[error("invalid connection state: {0}")]
    InvalidConnectionState(String),

    #[error("invalid connection version: {0}")]
    InvalidVersion(String),

    #[error("client ({client_id}) status is {status}")]
    ClientNotActive { client_id: String, status: ClientStatus },

    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),

    #[error("proof verification failed: {0}")]
    ProofVerificationFailed(String),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("packet sequence ({sequence}) already exists on port ({port_id}) channel ({channel_id})")]
    PacketAlreadyExists {
        port_id: String,
        channel_id: String,
        sequence: u64,
    },

    #[error("packet timeout: {0}")]
    PacketTimeout(String),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Internal state is corrupted. The enclosing transaction must be aborted.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl ChannelError {
    pub fn channel_not_found(port_id: &str, channel_id: &str) -> Self {
        ChannelError::ChannelNotFound {
            port_id: port_id.to_string(),
            channel_id: channel_id.to_string(),
        }
    }

    /// True for errors that signal a bug rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChannelError::InvariantViolation(_))
    }
}

impl From<ConnectionError> for ChannelError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::NotFound(id) => ChannelError::ConnectionNotFound(id),
            ConnectionError::VerificationFailed(reason) => ChannelError::ProofVerificationFailed(reason),
            ConnectionError::InvalidProof(reason) => ChannelError::InvalidProof(reason),
            ConnectionError::ConsensusStateNotFound { client_id, height } => {
                ChannelError::ConsensusStateNotFound {
                    client_id,
                    height: height.to_string(),
                }
            }
        }
    }
}
