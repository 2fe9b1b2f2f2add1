//! In-memory collaborators for tests and the `vibc-sim` binary.
//!
//! The mocks use interior mutability so a test can keep configuring them
//! after they have been moved into a [`ChannelKeeper`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::capability::MemoryCapabilityKeeper;
use crate::channel::multihop::MultihopProofs;
use crate::channel::{ChannelEnd, ChannelKeeper, Height};
use crate::client::{ClientKeeper, ClientState, ClientStatus, TendermintClientState};
use crate::connection::{
    ConnectionEnd, ConnectionError, ConnectionKeeper, Counterparty, MerklePrefix, State, Version,
};

pub type MockChannelKeeper = ChannelKeeper<MockClientKeeper, MockConnectionKeeper, MemoryCapabilityKeeper>;

/// An OPEN connection negotiated on the default version.
pub fn open_connection(client_id: &str, counterparty_client_id: &str, counterparty_connection_id: &str) -> ConnectionEnd {
    ConnectionEnd::new(
        State::Open,
        client_id.to_string(),
        Counterparty::new(
            counterparty_client_id.to_string(),
            Some(counterparty_connection_id.to_string()),
            MerklePrefix::default(),
        ),
        vec![Version::default()],
        0,
    )
}

pub fn tendermint_client(chain_id: &str, latest_height: Height) -> ClientState {
    ClientState::Tendermint(TendermintClientState {
        chain_id: chain_id.to_string(),
        latest_height,
        frozen_height: Height::zero(),
    })
}

pub fn frozen_tendermint_client(chain_id: &str, latest_height: Height, frozen_height: Height) -> ClientState {
    ClientState::Tendermint(TendermintClientState {
        chain_id: chain_id.to_string(),
        latest_height,
        frozen_height,
    })
}

/// A proof check the keeper delegated to the connection layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationCall {
    ChannelState {
        height: Height,
        port_id: String,
        channel_id: String,
        channel: ChannelEnd,
    },
    MultihopMembership {
        height: Height,
        connection_hops: Vec<String>,
        key: String,
        value: Vec<u8>,
    },
    MultihopNonMembership {
        height: Height,
        connection_hops: Vec<String>,
        key: String,
    },
}

/// Connection layer double that accepts every proof unless told otherwise
/// and records what it was asked to verify.
#[derive(Debug, Default)]
pub struct MockConnectionKeeper {
    connections: RefCell<BTreeMap<String, ConnectionEnd>>,
    calls: RefCell<Vec<VerificationCall>>,
    reject_proofs: Cell<bool>,
    timestamp: Cell<u64>,
}

impl MockConnectionKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_connection(&self, connection_id: &str, connection: ConnectionEnd) {
        self.connections
            .borrow_mut()
            .insert(connection_id.to_string(), connection);
    }

    /// Make every subsequent proof check fail.
    pub fn set_reject_proofs(&self, reject: bool) {
        self.reject_proofs.set(reject);
    }

    /// Consensus timestamp returned for any height, in nanoseconds.
    pub fn set_timestamp(&self, timestamp: u64) {
        self.timestamp.set(timestamp);
    }

    pub fn calls(&self) -> Vec<VerificationCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn check(&self, call: VerificationCall) -> Result<(), ConnectionError> {
        self.calls.borrow_mut().push(call);
        if self.reject_proofs.get() {
            return Err(ConnectionError::VerificationFailed("proof rejected".to_string()));
        }
        Ok(())
    }
}

impl ConnectionKeeper for MockConnectionKeeper {
    fn get_connection(&self, connection_id: &str) -> Option<ConnectionEnd> {
        self.connections.borrow().get(connection_id).cloned()
    }

    fn verify_channel_state(
        &self,
        _connection: &ConnectionEnd,
        height: &Height,
        _proof: &[u8],
        port_id: &str,
        channel_id: &str,
        channel: &ChannelEnd,
    ) -> Result<(), ConnectionError> {
        self.check(VerificationCall::ChannelState {
            height: *height,
            port_id: port_id.to_string(),
            channel_id: channel_id.to_string(),
            channel: channel.clone(),
        })
    }

    fn verify_multihop_membership(
        &self,
        _connection: &ConnectionEnd,
        height: &Height,
        _proofs: &MultihopProofs,
        connection_hops: &[String],
        key: &str,
        value: &[u8],
    ) -> Result<(), ConnectionError> {
        self.check(VerificationCall::MultihopMembership {
            height: *height,
            connection_hops: connection_hops.to_vec(),
            key: key.to_string(),
            value: value.to_vec(),
        })
    }

    fn verify_multihop_non_membership(
        &self,
        _connection: &ConnectionEnd,
        height: &Height,
        _proofs: &MultihopProofs,
        connection_hops: &[String],
        key: &str,
    ) -> Result<(), ConnectionError> {
        self.check(VerificationCall::MultihopNonMembership {
            height: *height,
            connection_hops: connection_hops.to_vec(),
            key: key.to_string(),
        })
    }

    fn get_timestamp_at_height(&self, _connection: &ConnectionEnd, _height: &Height) -> Result<u64, ConnectionError> {
        Ok(self.timestamp.get())
    }
}

/// Client keeper double. Status is derived from the stored state unless overridden.
#[derive(Debug, Default)]
pub struct MockClientKeeper {
    clients: RefCell<BTreeMap<String, ClientState>>,
    statuses: RefCell<BTreeMap<String, ClientStatus>>,
}

impl MockClientKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_client(&self, client_id: &str, client_state: ClientState) {
        self.clients
            .borrow_mut()
            .insert(client_id.to_string(), client_state);
    }

    pub fn set_status(&self, client_id: &str, status: ClientStatus) {
        self.statuses
            .borrow_mut()
            .insert(client_id.to_string(), status);
    }
}

impl ClientKeeper for MockClientKeeper {
    fn get_client_state(&self, client_id: &str) -> Option<ClientState> {
        self.clients.borrow().get(client_id).cloned()
    }

    fn get_client_status(&self, client_state: &ClientState, client_id: &str) -> ClientStatus {
        if let Some(status) = self.statuses.borrow().get(client_id) {
            return *status;
        }
        match client_state.is_frozen() {
            Ok(false) => ClientStatus::Active,
            Ok(true) => ClientStatus::Frozen,
            Err(_) => ClientStatus::Unknown,
        }
    }
}
