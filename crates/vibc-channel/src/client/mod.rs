//! Light client collaborator.
//!
//! Client tracking (updates, misbehaviour, expiry) happens elsewhere. Channels
//! only ask whether a client is usable and, for frozen closure, whether a
//! counterparty-held client state is frozen.

use std::fmt;

use prost::Message;
use prost_types::Any;
use serde::{Deserialize, Serialize};

use crate::channel::Height;
use crate::error::ChannelError;
use crate::proto::{RawLocalhostClientState, RawTendermintClientState};

pub const TENDERMINT_CLIENT_STATE_TYPE_URL: &str = "/ibc.lightclients.tendermint.v1.ClientState";
pub const LOCALHOST_CLIENT_STATE_TYPE_URL: &str = "/ibc.lightclients.localhost.v2.ClientState";

/// Client status as reported by the client keeper
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientStatus {
    Active,
    Frozen,
    Expired,
    Unknown,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            ClientStatus::Active => "Active",
            ClientStatus::Frozen => "Frozen",
            ClientStatus::Expired => "Expired",
            ClientStatus::Unknown => "Unknown",
        };
        f.write_str(status)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TendermintClientState {
    pub chain_id: String,
    pub latest_height: Height,
    /// Zero while the client is healthy
    pub frozen_height: Height,
}

/// Client states this crate knows how to interpret.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ClientState {
    Tendermint(TendermintClientState),
    Localhost { latest_height: Height },
    /// Anything else. Carried so callers can report it, never trusted.
    Unsupported { type_url: String },
}

impl ClientState {
    pub fn client_type(&self) -> &str {
        match self {
            ClientState::Tendermint(_) => "07-tendermint",
            ClientState::Localhost { .. } => "09-localhost",
            ClientState::Unsupported { type_url } => type_url,
        }
    }

    pub fn latest_height(&self) -> Option<Height> {
        match self {
            ClientState::Tendermint(state) => Some(state.latest_height),
            ClientState::Localhost { latest_height } => Some(*latest_height),
            ClientState::Unsupported { .. } => None,
        }
    }

    /// Frozen predicate. Unknown client kinds fail closed.
    pub fn is_frozen(&self) -> Result<bool, ChannelError> {
        match self {
            ClientState::Tendermint(state) => Ok(!state.frozen_height.is_zero()),
            ClientState::Localhost { .. } => Ok(false),
            ClientState::Unsupported { type_url } => Err(ChannelError::InvalidProof(format!(
                "unsupported client state type {}",
                type_url
            ))),
        }
    }

    pub fn decode_any(any: &Any) -> Result<Self, ChannelError> {
        match any.type_url.as_str() {
            TENDERMINT_CLIENT_STATE_TYPE_URL => {
                let raw = RawTendermintClientState::decode(any.value.as_slice()).map_err(|e| {
                    ChannelError::InvalidProof(format!("cannot decode tendermint client state: {}", e))
                })?;
                Ok(ClientState::Tendermint(TendermintClientState {
                    chain_id: raw.chain_id,
                    latest_height: raw.latest_height.map(Height::from).unwrap_or_default(),
                    frozen_height: raw.frozen_height.map(Height::from).unwrap_or_default(),
                }))
            }
            LOCALHOST_CLIENT_STATE_TYPE_URL => {
                let raw = RawLocalhostClientState::decode(any.value.as_slice()).map_err(|e| {
                    ChannelError::InvalidProof(format!("cannot decode localhost client state: {}", e))
                })?;
                Ok(ClientState::Localhost {
                    latest_height: raw.latest_height.map(Height::from).unwrap_or_default(),
                })
            }
            other => Ok(ClientState::Unsupported {
                type_url: other.to_string(),
            }),
        }
    }

    /// Decode the `Any`-wrapped bytes a counterparty stores under `clients/{id}/clientState`.
    pub fn decode_any_bytes(bytes: &[u8]) -> Result<Self, ChannelError> {
        let any = Any::decode(bytes)
            .map_err(|e| ChannelError::InvalidProof(format!("cannot decode client state: {}", e)))?;
        Self::decode_any(&any)
    }

    pub fn to_any(&self) -> Any {
        match self {
            ClientState::Tendermint(state) => Any {
                type_url: TENDERMINT_CLIENT_STATE_TYPE_URL.to_string(),
                value: RawTendermintClientState {
                    chain_id: state.chain_id.clone(),
                    frozen_height: Some(raw_height(state.frozen_height)),
                    latest_height: Some(raw_height(state.latest_height)),
                }
                .encode_to_vec(),
            },
            ClientState::Localhost { latest_height } => Any {
                type_url: LOCALHOST_CLIENT_STATE_TYPE_URL.to_string(),
                value: RawLocalhostClientState {
                    latest_height: Some(raw_height(*latest_height)),
                }
                .encode_to_vec(),
            },
            ClientState::Unsupported { type_url } => Any {
                type_url: type_url.clone(),
                value: Vec::new(),
            },
        }
    }
}

fn raw_height(height: Height) -> crate::proto::RawHeight {
    crate::proto::RawHeight {
        revision_number: height.revision_number,
        revision_height: height.revision_height,
    }
}

/// Read access to locally tracked light clients.
pub trait ClientKeeper {
    fn get_client_state(&self, client_id: &str) -> Option<ClientState>;

    fn get_client_status(&self, client_state: &ClientState, client_id: &str) -> ClientStatus;

    /// Status of `client_id`, or `ClientNotFound` if it is not tracked.
    fn client_status(&self, client_id: &str) -> Result<ClientStatus, ChannelError> {
        let client_state = self
            .get_client_state(client_id)
            .ok_or_else(|| ChannelError::ClientNotFound(client_id.to_string()))?;
        Ok(self.get_client_status(&client_state, client_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tendermint(frozen_height: Height) -> ClientState {
        ClientState::Tendermint(TendermintClientState {
            chain_id: "polymer-devnet".to_string(),
            latest_height: Height::new(1, 42),
            frozen_height,
        })
    }

    #[test]
    fn test_tendermint_frozen_predicate() {
        assert!(!tendermint(Height::zero()).is_frozen().unwrap());
        assert!(tendermint(Height::new(0, 1)).is_frozen().unwrap());
        assert!(tendermint(Height::new(1, 0)).is_frozen().unwrap());
    }

    #[test]
    fn test_localhost_is_never_frozen() {
        let state = ClientState::Localhost {
            latest_height: Height::new(0, 7),
        };
        assert!(!state.is_frozen().unwrap());
        assert_eq!(state.latest_height(), Some(Height::new(0, 7)));
    }

    #[test]
    fn test_unsupported_client_fails_closed() {
        let any = Any {
            type_url: "/ibc.lightclients.solomachine.v3.ClientState".to_string(),
            value: vec![1, 2, 3],
        };
        let state = ClientState::decode_any(&any).unwrap();
        assert!(state.is_frozen().is_err());
        assert_eq!(state.latest_height(), None);
    }

    #[test]
    fn test_any_encoding_preserves_frozen_height() {
        let state = tendermint(Height::new(1, 9));
        let bytes = state.to_any().encode_to_vec();
        assert_eq!(ClientState::decode_any_bytes(&bytes).unwrap(), state);
    }
}
