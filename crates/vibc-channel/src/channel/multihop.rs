//! Multi-hop proof assembly.
//!
//! For an N-hop channel only the first hop's connection can be checked
//! directly. The rest is carried in a proof bundle whose entries run from the
//! furthest hop inward; the connection layer chains them back to a trusted
//! root. This module decodes that bundle, derives what the far end must have
//! stored, and hands the claim to [`ConnectionKeeper`].

use prost::Message;
use tracing::debug;

use crate::client::ClientState;
use crate::connection::{ConnectionEnd, ConnectionKeeper};
use crate::error::ChannelError;
use crate::host;
use crate::proto::{RawMerklePath, RawMsgMultihopProofs, RawMultihopProof};

use super::handshake::verify_connection_ordering;
use super::types::{ChannelEnd, Counterparty, Height, Order, State};

/// One hop's existence proof together with the value it proves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultihopProof {
    pub proof: Vec<u8>,
    pub value: Vec<u8>,
    pub prefixed_key: Vec<String>,
}

impl From<RawMultihopProof> for MultihopProof {
    fn from(raw: RawMultihopProof) -> Self {
        Self {
            proof: raw.proof,
            value: raw.value,
            prefixed_key: raw.prefixed_key.map(|p| p.key_path).unwrap_or_default(),
        }
    }
}

impl From<MultihopProof> for RawMultihopProof {
    fn from(proof: MultihopProof) -> Self {
        RawMultihopProof {
            proof: proof.proof,
            value: proof.value,
            prefixed_key: if proof.prefixed_key.is_empty() {
                None
            } else {
                Some(RawMerklePath {
                    key_path: proof.prefixed_key,
                })
            },
        }
    }
}

/// Decoded `MsgMultihopProofs` bundle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultihopProofs {
    pub key_proof: Option<MultihopProof>,
    /// Values are encoded connection ends, furthest hop first
    pub connection_proofs: Vec<MultihopProof>,
    pub consensus_proofs: Vec<MultihopProof>,
}

impl MultihopProofs {
    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        let raw = RawMsgMultihopProofs::decode(bytes)
            .map_err(|e| ChannelError::InvalidProof(format!("cannot unmarshal proof: {}", e)))?;
        Ok(Self {
            key_proof: raw.key_proof.map(MultihopProof::from),
            connection_proofs: raw.connection_proofs.into_iter().map(MultihopProof::from).collect(),
            consensus_proofs: raw.consensus_proofs.into_iter().map(MultihopProof::from).collect(),
        })
    }

    pub fn encode_vec(&self) -> Vec<u8> {
        RawMsgMultihopProofs {
            key_proof: self.key_proof.clone().map(RawMultihopProof::from),
            connection_proofs: self
                .connection_proofs
                .iter()
                .cloned()
                .map(RawMultihopProof::from)
                .collect(),
            consensus_proofs: self
                .consensus_proofs
                .iter()
                .cloned()
                .map(RawMultihopProof::from)
                .collect(),
        }
        .encode_to_vec()
    }

    /// Connection hops as seen from the far end: each proven connection's
    /// counterparty, furthest first, then the counterparty of `last_connection`.
    pub fn counterparty_hops(&self, last_connection: &ConnectionEnd) -> Result<Vec<String>, ChannelError> {
        let mut hops = Vec::with_capacity(self.connection_proofs.len() + 1);
        for connection_proof in &self.connection_proofs {
            let connection = ConnectionEnd::decode(&connection_proof.value)?;
            hops.push(connection.counterparty.connection_id.unwrap_or_default());
        }
        hops.push(
            last_connection
                .counterparty_connection_id()
                .unwrap_or_default()
                .to_string(),
        );
        Ok(hops)
    }

    /// The connection end terminating at the far chain.
    pub fn far_end_connection(&self) -> Result<ConnectionEnd, ChannelError> {
        let connection_proof = self
            .connection_proofs
            .first()
            .ok_or_else(|| ChannelError::InvalidProof("multihop proof has no connection proofs".to_string()))?;
        ConnectionEnd::decode(&connection_proof.value)
    }
}

/// Handshake steps that prove a counterparty channel end
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeStep {
    OpenTry,
    OpenAck,
    OpenConfirm,
    CloseConfirm,
}

impl HandshakeStep {
    /// State the counterparty must be in for this step to proceed.
    pub fn expected_counterparty_state(&self) -> State {
        match self {
            HandshakeStep::OpenTry => State::Init,
            HandshakeStep::OpenAck => State::TryOpen,
            HandshakeStep::OpenConfirm => State::Open,
            HandshakeStep::CloseConfirm => State::Closed,
        }
    }
}

/// What the counterparty must have stored for a handshake step.
///
/// The same value drives both the single-hop and the multi-hop check; only
/// the counterparty hops differ.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedChannel {
    step: HandshakeStep,
    ordering: Order,
    port_id: String,
    channel_id: String,
    counterparty_port_id: String,
    counterparty_channel_id: String,
    version: String,
}

impl ExpectedChannel {
    /// The counterparty ran Init and does not know our channel id yet.
    pub fn open_try(
        ordering: Order,
        port_id: &str,
        counterparty: &Counterparty,
        counterparty_version: &str,
    ) -> Self {
        Self {
            step: HandshakeStep::OpenTry,
            ordering,
            port_id: port_id.to_string(),
            channel_id: String::new(),
            counterparty_port_id: counterparty.port_id.clone(),
            counterparty_channel_id: counterparty.channel_id.clone(),
            version: counterparty_version.to_string(),
        }
    }

    pub fn open_ack(
        channel: &ChannelEnd,
        port_id: &str,
        channel_id: &str,
        counterparty_channel_id: &str,
        counterparty_version: &str,
    ) -> Self {
        Self {
            step: HandshakeStep::OpenAck,
            ordering: channel.ordering,
            port_id: port_id.to_string(),
            channel_id: channel_id.to_string(),
            counterparty_port_id: channel.counterparty.port_id.clone(),
            counterparty_channel_id: counterparty_channel_id.to_string(),
            version: counterparty_version.to_string(),
        }
    }

    pub fn open_confirm(channel: &ChannelEnd, port_id: &str, channel_id: &str) -> Self {
        Self::from_channel(HandshakeStep::OpenConfirm, channel, port_id, channel_id)
    }

    pub fn close_confirm(channel: &ChannelEnd, port_id: &str, channel_id: &str) -> Self {
        Self::from_channel(HandshakeStep::CloseConfirm, channel, port_id, channel_id)
    }

    fn from_channel(step: HandshakeStep, channel: &ChannelEnd, port_id: &str, channel_id: &str) -> Self {
        Self {
            step,
            ordering: channel.ordering,
            port_id: port_id.to_string(),
            channel_id: channel_id.to_string(),
            counterparty_port_id: channel.counterparty.port_id.clone(),
            counterparty_channel_id: channel.counterparty.channel_id.clone(),
            version: channel.version.clone(),
        }
    }

    pub fn step(&self) -> HandshakeStep {
        self.step
    }

    pub fn ordering(&self) -> Order {
        self.ordering
    }

    pub fn counterparty_port_id(&self) -> &str {
        &self.counterparty_port_id
    }

    pub fn counterparty_channel_id(&self) -> &str {
        &self.counterparty_channel_id
    }

    /// Store path of the counterparty's channel end.
    pub fn key(&self) -> String {
        host::channel_path(&self.counterparty_port_id, &self.counterparty_channel_id)
    }

    /// The counterparty's channel end, with us as its counterparty.
    pub fn channel_end(&self, counterparty_hops: Vec<String>) -> ChannelEnd {
        ChannelEnd::new(
            self.step.expected_counterparty_state(),
            self.ordering,
            Counterparty::new(self.port_id.clone(), self.channel_id.clone()),
            counterparty_hops,
            self.version.clone(),
        )
    }

    pub fn value(&self, counterparty_hops: Vec<String>) -> Vec<u8> {
        self.channel_end(counterparty_hops).encode_vec()
    }

    /// Only Try re-checks that the connection supports the ordering.
    pub fn requires_version_check(&self) -> bool {
        self.step == HandshakeStep::OpenTry
    }
}

/// Threads expected key/value claims through the connection layer's multi-hop verifier.
pub struct MultihopProofAssembler<'k, L: ConnectionKeeper + ?Sized> {
    connections: &'k L,
}

impl<'k, L: ConnectionKeeper + ?Sized> MultihopProofAssembler<'k, L> {
    pub fn new(connections: &'k L) -> Self {
        Self { connections }
    }

    /// Prove the counterparty channel end described by `expected` exists at
    /// the far end of `connection_hops`.
    ///
    /// # Arguments
    /// * `connection` - First hop connection, terminating on this chain
    /// * `proof_height` - Height of this chain's client the proof is anchored at
    /// * `proof` - Encoded `MsgMultihopProofs`
    /// * `connection_hops` - The local channel's hops
    /// * `expected` - Per-step expected channel value
    pub fn verify_channel_membership(
        &self,
        connection: &ConnectionEnd,
        proof_height: &Height,
        proof: &[u8],
        connection_hops: &[String],
        expected: &ExpectedChannel,
    ) -> Result<(), ChannelError> {
        let proofs = MultihopProofs::decode(proof)?;
        if proofs.connection_proofs.len() + 1 != connection_hops.len() {
            return Err(ChannelError::InvalidProof(format!(
                "expected {} connection proofs for {} hops, got {}",
                connection_hops.len().saturating_sub(1),
                connection_hops.len(),
                proofs.connection_proofs.len()
            )));
        }

        if expected.requires_version_check() {
            let far_end = proofs.far_end_connection()?;
            verify_connection_ordering(&far_end, expected.ordering())?;
        }

        let counterparty_hops = proofs.counterparty_hops(connection)?;
        let key = expected.key();
        let value = expected.value(counterparty_hops);

        debug!(
            step = ?expected.step(),
            key = %key,
            hops = connection_hops.len(),
            "verifying multihop channel membership"
        );

        self.connections
            .verify_multihop_membership(connection, proof_height, &proofs, connection_hops, &key, &value)?;
        Ok(())
    }

    /// Prove that a client on the channel path is frozen on the chain that tracks it.
    ///
    /// Only the hops covered by the bundle's connection proofs take part.
    pub fn verify_frozen_client(
        &self,
        connection: &ConnectionEnd,
        proof_height: &Height,
        proof: &[u8],
        connection_hops: &[String],
    ) -> Result<(), ChannelError> {
        let proofs = MultihopProofs::decode(proof)?;
        let proven_hops = proofs.connection_proofs.len();
        if proven_hops == 0 || proven_hops > connection_hops.len() {
            return Err(ChannelError::InvalidProof(format!(
                "frozen proof covers {} connections of a {} hop channel",
                proven_hops,
                connection_hops.len()
            )));
        }
        let truncated_hops = &connection_hops[..proven_hops];

        let key_proof = proofs
            .key_proof
            .as_ref()
            .ok_or_else(|| ChannelError::InvalidProof("frozen proof has no key proof".to_string()))?;

        let client_state = ClientState::decode_any_bytes(&key_proof.value)?;
        if !client_state.is_frozen()? {
            return Err(ChannelError::ProofVerificationFailed(
                "cannot close channel, client is not frozen".to_string(),
            ));
        }

        let far_end = proofs.far_end_connection()?;
        let key = host::client_state_path(&far_end.client_id);

        debug!(key = %key, hops = proven_hops, "verifying frozen client membership");

        self.connections.verify_multihop_membership(
            connection,
            proof_height,
            &proofs,
            truncated_hops,
            &key,
            &key_proof.value,
        )?;
        Ok(())
    }

    /// Prove nothing is stored under `key` at the far end of `connection_hops`.
    pub fn verify_non_membership(
        &self,
        connection: &ConnectionEnd,
        proof_height: &Height,
        proof: &[u8],
        connection_hops: &[String],
        key: &str,
    ) -> Result<(), ChannelError> {
        let proofs = MultihopProofs::decode(proof)?;
        if proofs.connection_proofs.len() + 1 != connection_hops.len() {
            return Err(ChannelError::InvalidProof(format!(
                "expected {} connection proofs for {} hops, got {}",
                connection_hops.len().saturating_sub(1),
                connection_hops.len(),
                proofs.connection_proofs.len()
            )));
        }

        self.connections
            .verify_multihop_non_membership(connection, proof_height, &proofs, connection_hops, key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::open_connection;

    fn connection_proof(connection: &ConnectionEnd) -> MultihopProof {
        MultihopProof {
            proof: vec![0xaa],
            value: connection.encode_vec(),
            prefixed_key: vec!["ibc".to_string(), "connections/connection-1".to_string()],
        }
    }

    #[test]
    fn test_counterparty_hops_order() {
        let proofs = MultihopProofs {
            key_proof: None,
            connection_proofs: vec![
                connection_proof(&open_connection("07-tendermint-5", "07-tendermint-6", "connection-30")),
                connection_proof(&open_connection("07-tendermint-3", "07-tendermint-4", "connection-20")),
            ],
            consensus_proofs: vec![],
        };
        let last = open_connection("07-tendermint-0", "07-tendermint-1", "connection-10");

        assert_eq!(
            proofs.counterparty_hops(&last).unwrap(),
            vec!["connection-30", "connection-20", "connection-10"]
        );
        assert_eq!(proofs.far_end_connection().unwrap().client_id, "07-tendermint-5");
    }

    #[test]
    fn test_bundle_wire_encoding() {
        let proofs = MultihopProofs {
            key_proof: Some(MultihopProof {
                proof: vec![1, 2],
                value: vec![3],
                prefixed_key: vec![],
            }),
            connection_proofs: vec![connection_proof(&open_connection("a-client", "b-client", "connection-1"))],
            consensus_proofs: vec![MultihopProof::default()],
        };
        assert_eq!(MultihopProofs::decode(&proofs.encode_vec()).unwrap(), proofs);
        assert!(matches!(
            MultihopProofs::decode(&[0xff, 0x01]),
            Err(ChannelError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_expected_channel_per_step() {
        let counterparty = Counterparty::new("transfer", "channel-0");
        let expected = ExpectedChannel::open_try(Order::Unordered, "transfer", &counterparty, "ics20-1");
        assert_eq!(expected.key(), "channels/ports/transfer/channels/channel-0");
        assert!(expected.requires_version_check());

        let end = expected.channel_end(vec!["connection-7".to_string()]);
        assert_eq!(end.state, State::Init);
        assert_eq!(end.counterparty, Counterparty::new("transfer", ""));
        assert_eq!(end.version, "ics20-1");

        let local = ChannelEnd::new(
            State::TryOpen,
            Order::Ordered,
            Counterparty::new("oracle", "channel-4"),
            vec!["connection-0".to_string()],
            "oracle-1".to_string(),
        );
        let expected = ExpectedChannel::open_confirm(&local, "oracle", "channel-2");
        assert!(!expected.requires_version_check());
        assert_eq!(expected.key(), "channels/ports/oracle/channels/channel-4");
        let end = expected.channel_end(vec!["connection-3".to_string()]);
        assert_eq!(end.state, State::Open);
        assert_eq!(end.counterparty, Counterparty::new("oracle", "channel-2"));
        assert_eq!(end.ordering, Order::Ordered);
        assert_eq!(end.version, "oracle-1");

        let expected = ExpectedChannel::open_ack(&local, "oracle", "channel-2", "channel-8", "oracle-2");
        assert_eq!(expected.key(), "channels/ports/oracle/channels/channel-8");
        assert_eq!(expected.channel_end(vec![]).state, State::TryOpen);

        let expected = ExpectedChannel::close_confirm(&local, "oracle", "channel-2");
        assert_eq!(expected.channel_end(vec![]).state, State::Closed);
    }
}
