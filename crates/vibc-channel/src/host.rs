//! Canonical store paths and identifier rules.
//!
//! Counterparties generate proofs against these exact keys, so the formats
//! here must not drift.

use crate::error::ChannelError;

pub const KEY_NEXT_CHANNEL_SEQUENCE: &str = "nextChannelSequence";

const VALID_ID_SPECIAL_CHARS: &str = "._+-#[]<>";

pub fn channel_path(port_id: &str, channel_id: &str) -> String {
    format!("channels/ports/{}/channels/{}", port_id, channel_id)
}

pub fn next_sequence_send_path(port_id: &str, channel_id: &str) -> String {
    format!("nextSequenceSend/ports/{}/channels/{}", port_id, channel_id)
}

pub fn next_sequence_recv_path(port_id: &str, channel_id: &str) -> String {
    format!("nextSequenceRecv/ports/{}/channels/{}", port_id, channel_id)
}

pub fn next_sequence_ack_path(port_id: &str, channel_id: &str) -> String {
    format!("nextSequenceAck/ports/{}/channels/{}", port_id, channel_id)
}

/// Replay marker for a virtual send of `sequence`.
pub fn send_seq_processed_path(port_id: &str, channel_id: &str, sequence: u64) -> String {
    format!("nextSeqSendProcessed/{}/{}/{}", port_id, channel_id, sequence)
}

pub fn packet_commitment_path(port_id: &str, channel_id: &str, sequence: u64) -> String {
    format!(
        "commitments/ports/{}/channels/{}/sequences/{}",
        port_id, channel_id, sequence
    )
}

pub fn packet_receipt_path(port_id: &str, channel_id: &str, sequence: u64) -> String {
    format!(
        "receipts/ports/{}/channels/{}/sequences/{}",
        port_id, channel_id, sequence
    )
}

pub fn client_state_path(client_id: &str) -> String {
    format!("clients/{}/clientState", client_id)
}

pub fn port_capability_name(port_id: &str) -> String {
    format!("ports/{}", port_id)
}

pub fn channel_capability_name(port_id: &str, channel_id: &str) -> String {
    format!("capabilities/ports/{}/channels/{}", port_id, channel_id)
}

pub fn format_channel_identifier(prefix: &str, sequence: u64) -> String {
    format!("{}-{}", prefix, sequence)
}

/// Shared ICS-24 identifier check: bounded length, alphanumerics plus a
/// small set of separators, never a path separator.
pub fn validate_identifier(id: &str, min: usize, max: usize) -> Result<(), ChannelError> {
    if id.trim().is_empty() {
        return Err(ChannelError::InvalidIdentifier("identifier cannot be blank".to_string()));
    }
    if id.contains('/') {
        return Err(ChannelError::InvalidIdentifier(format!(
            "identifier {} cannot contain separator '/'",
            id
        )));
    }
    if id.len() < min || id.len() > max {
        return Err(ChannelError::InvalidIdentifier(format!(
            "identifier {} has invalid length: {}, must be between {}-{} characters",
            id,
            id.len(),
            min,
            max
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || VALID_ID_SPECIAL_CHARS.contains(c))
    {
        return Err(ChannelError::InvalidIdentifier(format!(
            "identifier {} must contain only alphanumeric or the following characters: {}",
            id, VALID_ID_SPECIAL_CHARS
        )));
    }
    Ok(())
}

pub fn validate_port_identifier(id: &str) -> Result<(), ChannelError> {
    validate_identifier(id, 2, 128)
}

pub fn validate_channel_identifier(id: &str) -> Result<(), ChannelError> {
    validate_identifier(id, 8, 64)
}

pub fn validate_connection_identifier(id: &str) -> Result<(), ChannelError> {
    validate_identifier(id, 10, 64)
}
