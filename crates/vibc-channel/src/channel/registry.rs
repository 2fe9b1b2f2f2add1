use crate::error::ChannelError;
use crate::host;
use crate::store::KvStore;

use super::types::{ChannelEnd, PacketCommitment};

/// Typed view over the channel keys of a store.
///
/// This is the only write path for channel ends. It refuses writes that would
/// move a channel backwards through the handshake or change its hops.
pub struct ChannelRegistry<'s> {
    store: &'s mut dyn KvStore,
}

impl<'s> ChannelRegistry<'s> {
    pub fn new(store: &'s mut dyn KvStore) -> Self {
        Self { store }
    }

    pub fn get_channel(&self, port_id: &str, channel_id: &str) -> Result<Option<ChannelEnd>, ChannelError> {
        match self.store.get(host::channel_path(port_id, channel_id).as_bytes()) {
            Some(bytes) => ChannelEnd::decode(&bytes).map(Some).map_err(|e| {
                ChannelError::InvariantViolation(format!(
                    "stored channel end for port ID ({}) channel ID ({}) is corrupt: {}",
                    port_id, channel_id, e
                ))
            }),
            None => Ok(None),
        }
    }

    /// Channel that must exist for the step to proceed.
    pub fn expect_channel(&self, port_id: &str, channel_id: &str) -> Result<ChannelEnd, ChannelError> {
        self.get_channel(port_id, channel_id)?
            .ok_or_else(|| ChannelError::channel_not_found(port_id, channel_id))
    }

    pub fn has_channel(&self, port_id: &str, channel_id: &str) -> bool {
        self.store.has(host::channel_path(port_id, channel_id).as_bytes())
    }

    /// Persist `channel`, enforcing that state only advances and hops never change.
    pub fn set_channel(&mut self, port_id: &str, channel_id: &str, channel: &ChannelEnd) -> Result<(), ChannelError> {
        if channel.connection_hops.is_empty() {
            return Err(ChannelError::InvariantViolation(format!(
                "channel end for port ID ({}) channel ID ({}) has no connection hops",
                port_id, channel_id
            )));
        }

        if let Some(existing) = self.get_channel(port_id, channel_id)? {
            if channel.state.rank() < existing.state.rank() {
                return Err(ChannelError::InvariantViolation(format!(
                    "channel state cannot regress from {} to {} on port ID ({}) channel ID ({})",
                    existing.state, channel.state, port_id, channel_id
                )));
            }
            if existing.state.is_terminal() && channel.state != existing.state {
                return Err(ChannelError::InvariantViolation(format!(
                    "channel on port ID ({}) channel ID ({}) is terminal in state {}",
                    port_id, channel_id, existing.state
                )));
            }
            if channel.connection_hops != existing.connection_hops {
                return Err(ChannelError::InvariantViolation(format!(
                    "connection hops of port ID ({}) channel ID ({}) are immutable",
                    port_id, channel_id
                )));
            }
        }

        self.store.set(
            host::channel_path(port_id, channel_id).as_bytes(),
            channel.encode_vec(),
        );
        Ok(())
    }

    pub fn get_next_sequence_send(&self, port_id: &str, channel_id: &str) -> Option<u64> {
        self.get_u64(&host::next_sequence_send_path(port_id, channel_id))
    }

    pub fn set_next_sequence_send(&mut self, port_id: &str, channel_id: &str, sequence: u64) {
        self.set_u64(&host::next_sequence_send_path(port_id, channel_id), sequence);
    }

    pub fn get_next_sequence_recv(&self, port_id: &str, channel_id: &str) -> Option<u64> {
        self.get_u64(&host::next_sequence_recv_path(port_id, channel_id))
    }

    pub fn set_next_sequence_recv(&mut self, port_id: &str, channel_id: &str, sequence: u64) {
        self.set_u64(&host::next_sequence_recv_path(port_id, channel_id), sequence);
    }

    pub fn get_next_sequence_ack(&self, port_id: &str, channel_id: &str) -> Option<u64> {
        self.get_u64(&host::next_sequence_ack_path(port_id, channel_id))
    }

    pub fn set_next_sequence_ack(&mut self, port_id: &str, channel_id: &str, sequence: u64) {
        self.set_u64(&host::next_sequence_ack_path(port_id, channel_id), sequence);
    }

    /// Start all three counters of a new channel at 1.
    pub fn init_sequences(&mut self, port_id: &str, channel_id: &str) {
        self.set_next_sequence_send(port_id, channel_id, 1);
        self.set_next_sequence_recv(port_id, channel_id, 1);
        self.set_next_sequence_ack(port_id, channel_id, 1);
    }

    /// Whether a virtual send with `sequence` was already accepted. Markers are never removed.
    pub fn has_packet_send_seq_processed(&self, port_id: &str, channel_id: &str, sequence: u64) -> bool {
        self.store
            .has(host::send_seq_processed_path(port_id, channel_id, sequence).as_bytes())
    }

    pub fn set_packet_send_seq_processed(&mut self, port_id: &str, channel_id: &str, sequence: u64) {
        self.store.set(
            host::send_seq_processed_path(port_id, channel_id, sequence).as_bytes(),
            vec![1],
        );
    }

    pub fn get_packet_commitment(&self, port_id: &str, channel_id: &str, sequence: u64) -> Option<PacketCommitment> {
        self.store
            .get(host::packet_commitment_path(port_id, channel_id, sequence).as_bytes())
            .map(PacketCommitment::new)
    }

    pub fn set_packet_commitment(
        &mut self,
        port_id: &str,
        channel_id: &str,
        sequence: u64,
        commitment: &PacketCommitment,
    ) {
        self.store.set(
            host::packet_commitment_path(port_id, channel_id, sequence).as_bytes(),
            commitment.data.clone(),
        );
    }

    pub fn next_channel_sequence(&self) -> u64 {
        self.get_u64(host::KEY_NEXT_CHANNEL_SEQUENCE).unwrap_or(0)
    }

    /// Allocate the next channel identifier, e.g. `channel-0`.
    pub fn generate_channel_identifier(&mut self, prefix: &str) -> String {
        let sequence = self.next_channel_sequence();
        self.set_u64(host::KEY_NEXT_CHANNEL_SEQUENCE, sequence + 1);
        host::format_channel_identifier(prefix, sequence)
    }

    fn get_u64(&self, path: &str) -> Option<u64> {
        let bytes = self.store.get(path.as_bytes())?;
        let array: [u8; 8] = bytes.as_slice().try_into().ok()?;
        Some(u64::from_be_bytes(array))
    }

    fn set_u64(&mut self, path: &str, value: u64) {
        self.store.set(path.as_bytes(), value.to_be_bytes().to_vec());
    }
}
