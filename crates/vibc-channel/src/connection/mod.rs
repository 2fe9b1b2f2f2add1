//! Connection layer facade.
//!
//! Connections are established elsewhere; the channel keeper only reads them
//! and delegates every proof check to an implementation of [`ConnectionKeeper`].

use thiserror::Error;

use crate::channel::multihop::MultihopProofs;
use crate::channel::{ChannelEnd, Height};

pub mod types;

pub use types::{ConnectionEnd, Counterparty, MerklePrefix, State, Version};

/// Errors surfaced by the connection layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection not found: {0}")]
    NotFound(String),

    #[error("membership verification failed: {0}")]
    VerificationFailed(String),

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    #[error("consensus state not found for client ({client_id}) at height {height}")]
    ConsensusStateNotFound { client_id: String, height: Height },
}

/// Read access to connections plus the proof primitives they anchor.
pub trait ConnectionKeeper {
    fn get_connection(&self, connection_id: &str) -> Option<ConnectionEnd>;

    /// Verify a single-hop proof that the counterparty stores `channel` under
    /// `(port_id, channel_id)` at `height`.
    fn verify_channel_state(
        &self,
        connection: &ConnectionEnd,
        height: &Height,
        proof: &[u8],
        port_id: &str,
        channel_id: &str,
        channel: &ChannelEnd,
    ) -> Result<(), ConnectionError>;

    /// Verify that `value` is stored under `key` at the far end of
    /// `connection_hops`, chaining the per-hop proofs back to `connection`.
    fn verify_multihop_membership(
        &self,
        connection: &ConnectionEnd,
        height: &Height,
        proofs: &MultihopProofs,
        connection_hops: &[String],
        key: &str,
        value: &[u8],
    ) -> Result<(), ConnectionError>;

    /// Verify that nothing is stored under `key` at the far end of `connection_hops`.
    fn verify_multihop_non_membership(
        &self,
        connection: &ConnectionEnd,
        height: &Height,
        proofs: &MultihopProofs,
        connection_hops: &[String],
        key: &str,
    ) -> Result<(), ConnectionError>;

    /// Timestamp, in nanoseconds, of the consensus state at `height` of the
    /// connection's client.
    fn get_timestamp_at_height(
        &self,
        connection: &ConnectionEnd,
        height: &Height,
    ) -> Result<u64, ConnectionError>;
}
