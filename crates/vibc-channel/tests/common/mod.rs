// Shared fixtures for the channel integration tests
#![allow(dead_code)]

use prost::Message;
use vibc_channel::channel::{ChannelEnd, Counterparty, Height, MultihopProof, MultihopProofs, Order, State};
use vibc_channel::host;
use vibc_channel::testing::{frozen_tendermint_client, open_connection, tendermint_client, MockChannelKeeper, MockClientKeeper, MockConnectionKeeper};
use vibc_channel::{Capability, CapabilityKeeper, ChannelError, ChannelKeeper, Context, CoreConfig, MemoryCapabilityKeeper, MemoryStore};

pub const PORT: &str = "transfer";
pub const VERSION: &str = "ics20-1";
pub const VIRTUAL_CLIENT: &str = "polymer-0";

/// Connection layout:
/// * `connection-0` regular single hop, counterparty `connection-7`
/// * `connection-1`, `connection-2` virtual pair
/// * `connection-3`, `connection-4` regular two-hop path
pub struct Harness {
    pub store: MemoryStore,
    pub keeper: MockChannelKeeper,
    pub port_cap: Capability,
}

impl Harness {
    pub fn new() -> Self {
        let clients = MockClientKeeper::new();
        clients.insert_client("07-tendermint-0", tendermint_client("chain-b", Height::new(1, 100)));
        clients.insert_client("07-tendermint-3", tendermint_client("chain-c", Height::new(1, 100)));
        clients.insert_client(VIRTUAL_CLIENT, tendermint_client("virtual", Height::new(1, 100)));

        let connections = MockConnectionKeeper::new();
        connections.insert_connection("connection-0", open_connection("07-tendermint-0", "07-tendermint-1", "connection-7"));
        connections.insert_connection("connection-1", open_connection(VIRTUAL_CLIENT, "07-tendermint-8", "connection-5"));
        connections.insert_connection("connection-2", open_connection("07-tendermint-6", VIRTUAL_CLIENT, "connection-6"));
        connections.insert_connection("connection-3", open_connection("07-tendermint-3", "07-tendermint-7", "connection-11"));
        connections.insert_connection("connection-4", open_connection("07-tendermint-4", "07-tendermint-8", "connection-12"));

        let mut keeper = ChannelKeeper::new(CoreConfig::default(), clients, connections, MemoryCapabilityKeeper::new());
        let port_cap = keeper.bind_port(PORT).expect("bind port");

        Self {
            store: MemoryStore::new(),
            keeper,
            port_cap,
        }
    }

    pub fn connections(&self) -> &MockConnectionKeeper {
        self.keeper.connections()
    }

    pub fn clients(&self) -> &MockClientKeeper {
        self.keeper.clients()
    }

    pub fn channel(&mut self, channel_id: &str) -> ChannelEnd {
        let mut ctx = Context::new(&mut self.store);
        self.keeper
            .get_channel(&mut ctx, PORT, channel_id)
            .expect("decode channel")
            .expect("channel exists")
    }

    pub fn state(&mut self, channel_id: &str) -> State {
        self.channel(channel_id).state
    }

    pub fn chan_cap(&self, channel_id: &str) -> Capability {
        self.keeper
            .capabilities()
            .get_capability(&host::channel_capability_name(PORT, channel_id))
            .expect("channel capability")
    }

    pub fn sequences(&mut self, channel_id: &str) -> (Option<u64>, Option<u64>, Option<u64>) {
        let mut ctx = Context::new(&mut self.store);
        let registry = ctx.registry();
        (
            registry.get_next_sequence_send(PORT, channel_id),
            registry.get_next_sequence_recv(PORT, channel_id),
            registry.get_next_sequence_ack(PORT, channel_id),
        )
    }

    pub fn open_init(&mut self, connection_hops: &[String], ordering: Order) -> Result<String, ChannelError> {
        let mut ctx = Context::new(&mut self.store);
        let counterparty = Counterparty::new(PORT, "");
        let channel_id = self
            .keeper
            .chan_open_init(&mut ctx, ordering, connection_hops, PORT, &self.port_cap)?;
        self.keeper.write_open_init_channel(
            &mut ctx,
            PORT,
            &channel_id,
            ordering,
            connection_hops,
            &counterparty,
            VERSION,
        )?;
        self.keeper.claim_channel_capability(PORT, &channel_id)?;
        Ok(channel_id)
    }

    pub fn open_try(
        &mut self,
        connection_hops: &[String],
        previous_channel_id: Option<&str>,
        counterparty_channel_id: &str,
        proof: &[u8],
    ) -> Result<String, ChannelError> {
        let mut ctx = Context::new(&mut self.store);
        let counterparty = Counterparty::new(PORT, counterparty_channel_id);
        let channel_id = self.keeper.chan_open_try(
            &mut ctx,
            Order::Unordered,
            connection_hops,
            PORT,
            &self.port_cap,
            previous_channel_id,
            &counterparty,
            VERSION,
            proof,
            &Height::new(1, 50),
        )?;
        self.keeper.write_open_try_channel(
            &mut ctx,
            PORT,
            &channel_id,
            Order::Unordered,
            connection_hops,
            &counterparty,
            VERSION,
        )?;
        self.keeper.claim_channel_capability(PORT, &channel_id)?;
        Ok(channel_id)
    }

    pub fn open_ack(&mut self, channel_id: &str, counterparty_channel_id: &str, proof: &[u8]) -> Result<(), ChannelError> {
        let cap = self.chan_cap(channel_id);
        let mut ctx = Context::new(&mut self.store);
        self.keeper.chan_open_ack(
            &mut ctx,
            PORT,
            channel_id,
            &cap,
            VERSION,
            counterparty_channel_id,
            proof,
            &Height::new(1, 51),
        )?;
        self.keeper
            .write_open_ack_channel(&mut ctx, PORT, channel_id, VERSION, counterparty_channel_id)
    }

    pub fn open_confirm(&mut self, channel_id: &str, proof: &[u8]) -> Result<(), ChannelError> {
        let cap = self.chan_cap(channel_id);
        let mut ctx = Context::new(&mut self.store);
        self.keeper
            .chan_open_confirm(&mut ctx, PORT, channel_id, &cap, proof, &Height::new(1, 52))?;
        self.keeper.write_open_confirm_channel(&mut ctx, PORT, channel_id)
    }

    pub fn close_init(&mut self, channel_id: &str) -> Result<(), ChannelError> {
        let cap = self.chan_cap(channel_id);
        let mut ctx = Context::new(&mut self.store);
        self.keeper.chan_close_init(&mut ctx, PORT, channel_id, &cap)
    }

    pub fn close_confirm(&mut self, channel_id: &str, proof: &[u8]) -> Result<(), ChannelError> {
        let cap = self.chan_cap(channel_id);
        let mut ctx = Context::new(&mut self.store);
        self.keeper
            .chan_close_confirm(&mut ctx, PORT, channel_id, &cap, proof, &Height::new(1, 53))
    }

    pub fn close_frozen(&mut self, channel_id: &str, proof: &[u8]) -> Result<(), ChannelError> {
        let cap = self.chan_cap(channel_id);
        let mut ctx = Context::new(&mut self.store);
        self.keeper
            .chan_close_frozen(&mut ctx, PORT, channel_id, &cap, proof, &Height::new(1, 54))
    }

    pub fn resolve(&mut self, channel_id: &str) -> Result<State, ChannelError> {
        let cap = self.chan_cap(channel_id);
        let mut ctx = Context::new(&mut self.store);
        self.keeper.resolve_pending_channel(&mut ctx, PORT, channel_id, &cap)
    }
}

pub fn hops(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// A two-hop proof bundle whose single connection proof carries `middle`.
pub fn two_hop_proof(middle: &vibc_channel::ConnectionEnd, key_value: Vec<u8>) -> Vec<u8> {
    MultihopProofs {
        key_proof: Some(MultihopProof {
            proof: b"key-proof".to_vec(),
            value: key_value,
            prefixed_key: vec!["ibc".to_string()],
        }),
        connection_proofs: vec![MultihopProof {
            proof: b"connection-proof".to_vec(),
            value: middle.encode_vec(),
            prefixed_key: vec!["ibc".to_string()],
        }],
        consensus_proofs: vec![MultihopProof::default()],
    }
    .encode_vec()
}

pub fn middle_connection() -> vibc_channel::ConnectionEnd {
    open_connection("07-tendermint-20", "07-tendermint-21", "connection-13")
}

/// A two-hop proof bundle whose key proof carries a far-end client state.
/// A zero `frozen_height` yields a healthy client.
pub fn frozen_client_proof(frozen_height: Height) -> Vec<u8> {
    let client = frozen_tendermint_client("chain-far", Height::new(1, 200), frozen_height);
    two_hop_proof(&middle_connection(), client.to_any().encode_to_vec())
}
