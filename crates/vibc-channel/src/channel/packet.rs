//! Virtual packet sends and multi-hop receipt absence.
//!
//! Virtual packets carry a sequence chosen on the virtual chain, so the
//! keeper never advances `nextSequenceSend` for them. A per-sequence replay
//! marker stops the same sequence from being committed twice.

use tracing::info;

use crate::capability::{Capability, CapabilityKeeper};
use crate::client::{ClientKeeper, ClientStatus};
use crate::connection::ConnectionKeeper;
use crate::context::Context;
use crate::error::ChannelError;
use crate::host;

use super::events;
use super::types::{Height, Packet, PacketCommitment, State};
use super::ChannelKeeper;

impl<C, L, K> ChannelKeeper<C, L, K>
where
    C: ClientKeeper,
    L: ConnectionKeeper,
    K: CapabilityKeeper,
{
    /// Commit a packet sent from a virtual chain
    ///
    /// # Arguments
    /// * `chan_cap` - Capability for the source channel
    /// * `source_port` / `source_channel` - Sending end; must be OPEN
    /// * `timeout_height` - Zero disables the height timeout
    /// * `timeout_timestamp` - Nanoseconds; zero disables the timestamp timeout
    /// * `data` - Opaque application payload
    /// * `sequence` - Sequence assigned by the virtual chain
    ///
    /// # Returns
    /// * The committed sequence
    #[allow(clippy::too_many_arguments)]
    pub fn send_virtual_packet(
        &self,
        ctx: &mut Context<'_>,
        chan_cap: &Capability,
        source_port: &str,
        source_channel: &str,
        timeout_height: Height,
        timeout_timestamp: u64,
        data: Vec<u8>,
        sequence: u64,
    ) -> Result<u64, ChannelError> {
        let channel = ctx.registry().expect_channel(source_port, source_channel)?;
        if channel.state != State::Open {
            return Err(ChannelError::InvalidChannelState(format!(
                "channel is not OPEN (got {})",
                channel.state
            )));
        }

        self.authenticate_channel(chan_cap, source_port, source_channel)?;

        if ctx
            .registry()
            .has_packet_send_seq_processed(source_port, source_channel, sequence)
        {
            return Err(ChannelError::PacketAlreadyExists {
                port_id: source_port.to_string(),
                channel_id: source_channel.to_string(),
                sequence,
            });
        }

        let packet = Packet::new(
            sequence,
            source_port.to_string(),
            source_channel.to_string(),
            channel.counterparty.port_id.clone(),
            channel.counterparty.channel_id.clone(),
            data,
            timeout_height,
            timeout_timestamp,
        );
        packet.validate_basic()?;

        // Past the first hop the receiving chain's client is unknown here.
        if let [connection_id] = channel.connection_hops.as_slice() {
            self.check_receiving_chain_timeout(connection_id, &packet)?;
        }

        let commitment = PacketCommitment::from_packet(&packet);

        let mut registry = ctx.registry();
        registry.set_packet_send_seq_processed(source_port, source_channel, sequence);
        registry.set_packet_commitment(source_port, source_channel, sequence, &commitment);

        ctx.emit(events::send_packet(&packet, &channel));

        info!(
            sequence = packet.sequence,
            src_port = %packet.source_port,
            src_channel = %packet.source_channel,
            dst_port = %packet.destination_port,
            dst_channel = %packet.destination_channel,
            "packet sent"
        );
        self.record_virtual_packet();

        Ok(packet.sequence)
    }

    /// Prove that the counterparty has no receipt for `sequence`, across any
    /// number of hops.
    pub fn verify_multihop_receipt_absence(
        &self,
        ctx: &mut Context<'_>,
        port_id: &str,
        channel_id: &str,
        sequence: u64,
        proof: &[u8],
        proof_height: &Height,
    ) -> Result<(), ChannelError> {
        let channel = ctx.registry().expect_channel(port_id, channel_id)?;
        let connection_id = channel
            .connection_hops
            .first()
            .ok_or_else(|| ChannelError::InvariantViolation("channel has no connection hops".to_string()))?;
        let connection = self.get_connection(connection_id)?;

        let key = host::packet_receipt_path(
            &channel.counterparty.port_id,
            &channel.counterparty.channel_id,
            sequence,
        );
        self.assembler()
            .verify_non_membership(&connection, proof_height, proof, &channel.connection_hops, &key)
    }

    fn check_receiving_chain_timeout(&self, connection_id: &str, packet: &Packet) -> Result<(), ChannelError> {
        let connection = self.get_connection(connection_id)?;

        let client_state = self
            .clients
            .get_client_state(&connection.client_id)
            .ok_or_else(|| ChannelError::ClientNotFound(connection.client_id.clone()))?;

        let status = self.clients.get_client_status(&client_state, &connection.client_id);
        if status != ClientStatus::Active {
            return Err(ChannelError::ClientNotActive {
                client_id: connection.client_id.clone(),
                status,
            });
        }

        let latest_height = client_state.latest_height().ok_or_else(|| {
            ChannelError::UnsupportedOperation(format!(
                "client type {} has no latest height",
                client_state.client_type()
            ))
        })?;
        if packet.is_timed_out_on_height(&latest_height) {
            return Err(ChannelError::PacketTimeout(format!(
                "receiving chain block height >= packet timeout height ({} >= {})",
                latest_height, packet.timeout_height
            )));
        }

        let latest_timestamp = self
            .connections
            .get_timestamp_at_height(&connection, &latest_height)?;
        if packet.is_timed_out_on_timestamp(latest_timestamp) {
            return Err(ChannelError::PacketTimeout(format!(
                "receiving chain block timestamp >= packet timeout timestamp ({} >= {})",
                latest_timestamp, packet.timeout_timestamp
            )));
        }
        Ok(())
    }
}
