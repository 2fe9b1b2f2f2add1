use std::fmt;

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::proto::{RawConnectionCounterparty, RawConnectionEnd, RawMerklePrefix, RawVersion};

/// Connection state enumeration following ICS-03
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Uninitialized connection
    Uninitialized,
    /// Connection initialized (ConnOpenInit called)
    Init,
    /// Connection in try open state (ConnOpenTry called)
    TryOpen,
    /// Connection established and open
    Open,
}

impl State {
    fn from_i32(value: i32) -> Result<Self, ChannelError> {
        match value {
            0 => Ok(State::Uninitialized),
            1 => Ok(State::Init),
            2 => Ok(State::TryOpen),
            3 => Ok(State::Open),
            other => Err(ChannelError::InvalidConnectionState(format!(
                "unknown connection state {}",
                other
            ))),
        }
    }

    fn to_i32(self) -> i32 {
        match self {
            State::Uninitialized => 0,
            State::Init => 1,
            State::TryOpen => 2,
            State::Open => 3,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Uninitialized => "UNINITIALIZED",
            State::Init => "INIT",
            State::TryOpen => "TRYOPEN",
            State::Open => "OPEN",
        };
        f.write_str(name)
    }
}

/// Connection version information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Version {
    /// Version identifier string
    pub identifier: String,
    /// Supported features for this version
    pub features: Vec<String>,
}

impl Version {
    /// Create a new version
    pub fn new(identifier: String, features: Vec<String>) -> Self {
        Self {
            identifier,
            features,
        }
    }

    /// Whether a channel feature such as an ordering is allowed by this version.
    pub fn supports_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

impl Default for Version {
    /// Default IBC connection version
    fn default() -> Self {
        Self {
            identifier: "1".to_string(),
            features: vec!["ORDER_ORDERED".to_string(), "ORDER_UNORDERED".to_string()],
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.identifier, self.features.join(","))
    }
}

/// Counterparty connection information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Counterparty {
    /// Client ID on the counterparty chain
    pub client_id: String,
    /// Connection ID on the counterparty chain (if established)
    pub connection_id: Option<String>,
    /// Commitment prefix used by the counterparty chain
    pub prefix: MerklePrefix,
}

impl Counterparty {
    /// Create a new counterparty
    pub fn new(client_id: String, connection_id: Option<String>, prefix: MerklePrefix) -> Self {
        Self {
            client_id,
            connection_id,
            prefix,
        }
    }
}

/// Merkle prefix for commitment proofs
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MerklePrefix {
    /// The key prefix used for commitment proofs
    pub key_prefix: Vec<u8>,
}

impl MerklePrefix {
    /// Create a new merkle prefix
    pub fn new(key_prefix: Vec<u8>) -> Self {
        Self { key_prefix }
    }
}

impl Default for MerklePrefix {
    /// Default IBC commitment prefix
    fn default() -> Self {
        Self {
            key_prefix: b"ibc".to_vec(),
        }
    }
}

/// Connection end as owned by the connection layer. Read-only to this crate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectionEnd {
    /// Current state of the connection
    pub state: State,
    /// Client ID for this connection
    pub client_id: String,
    /// Counterparty connection information
    pub counterparty: Counterparty,
    /// Supported/negotiated versions
    pub versions: Vec<Version>,
    /// Delay period for this connection
    pub delay_period: u64,
}

impl ConnectionEnd {
    /// Create a new connection end
    pub fn new(
        state: State,
        client_id: String,
        counterparty: Counterparty,
        versions: Vec<Version>,
        delay_period: u64,
    ) -> Self {
        Self {
            state,
            client_id,
            counterparty,
            versions,
            delay_period,
        }
    }

    /// Check if connection is open
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Get the counterparty client ID
    pub fn counterparty_client_id(&self) -> &str {
        &self.counterparty.client_id
    }

    /// Get the counterparty connection ID if available
    pub fn counterparty_connection_id(&self) -> Option<&str> {
        self.counterparty.connection_id.as_deref()
    }

    pub fn encode_vec(&self) -> Vec<u8> {
        RawConnectionEnd::from(self.clone()).encode_to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        let raw = RawConnectionEnd::decode(bytes)
            .map_err(|e| ChannelError::InvalidProof(format!("cannot decode connection end: {}", e)))?;
        Self::try_from(raw)
    }
}

impl From<ConnectionEnd> for RawConnectionEnd {
    fn from(connection: ConnectionEnd) -> Self {
        RawConnectionEnd {
            client_id: connection.client_id,
            versions: connection
                .versions
                .into_iter()
                .map(|v| RawVersion {
                    identifier: v.identifier,
                    features: v.features,
                })
                .collect(),
            state: connection.state.to_i32(),
            counterparty: Some(RawConnectionCounterparty {
                client_id: connection.counterparty.client_id,
                connection_id: connection.counterparty.connection_id.unwrap_or_default(),
                prefix: Some(RawMerklePrefix {
                    key_prefix: connection.counterparty.prefix.key_prefix,
                }),
            }),
            delay_period: connection.delay_period,
        }
    }
}

impl TryFrom<RawConnectionEnd> for ConnectionEnd {
    type Error = ChannelError;

    fn try_from(raw: RawConnectionEnd) -> Result<Self, Self::Error> {
        let counterparty = raw
            .counterparty
            .ok_or_else(|| ChannelError::InvalidProof("connection end has no counterparty".to_string()))?;
        let connection_id = if counterparty.connection_id.is_empty() {
            None
        } else {
            Some(counterparty.connection_id)
        };
        Ok(ConnectionEnd {
            state: State::from_i32(raw.state)?,
            client_id: raw.client_id,
            counterparty: Counterparty::new(
                counterparty.client_id,
                connection_id,
                MerklePrefix::new(counterparty.prefix.map(|p| p.key_prefix).unwrap_or_default()),
            ),
            versions: raw
                .versions
                .into_iter()
                .map(|v| Version::new(v.identifier, v.features))
                .collect(),
            delay_period: raw.delay_period,
        })
    }
}
