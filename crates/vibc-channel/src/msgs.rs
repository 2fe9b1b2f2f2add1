//! Relayer-submitted channel messages.
//!
//! Messages arrive as `(type_url, bytes)` pairs and are decoded from JSON.
//! `validate_basic` runs stateless checks only; everything that needs the
//! store happens in the keeper.

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelEnd, Height, State};
use crate::error::ChannelError;
use crate::host;

pub mod type_urls {
    pub const MSG_CHANNEL_OPEN_INIT: &str = "/ibc.core.channel.v1.MsgChannelOpenInit";
    pub const MSG_CHANNEL_OPEN_TRY: &str = "/ibc.core.channel.v1.MsgChannelOpenTry";
    pub const MSG_CHANNEL_OPEN_ACK: &str = "/ibc.core.channel.v1.MsgChannelOpenAck";
    pub const MSG_CHANNEL_OPEN_CONFIRM: &str = "/ibc.core.channel.v1.MsgChannelOpenConfirm";
    pub const MSG_CHANNEL_CLOSE_INIT: &str = "/ibc.core.channel.v1.MsgChannelCloseInit";
    pub const MSG_CHANNEL_CLOSE_CONFIRM: &str = "/ibc.core.channel.v1.MsgChannelCloseConfirm";
    pub const MSG_CHANNEL_CLOSE_FROZEN: &str = "/ibc.core.channel.v1.MsgChannelCloseFrozen";
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenInit {
    pub port_id: String,
    /// Proposed channel; state must be INIT and the counterparty channel ID empty
    pub channel: ChannelEnd,
    pub signer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenInitResponse {
    pub channel_id: String,
    pub version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenTry {
    pub port_id: String,
    /// Set when retrying a Try that already created the channel
    #[serde(default)]
    pub previous_channel_id: Option<String>,
    /// Proposed channel; state must be TRYOPEN
    pub channel: ChannelEnd,
    pub counterparty_version: String,
    pub proof_init: Vec<u8>,
    pub proof_height: Height,
    pub signer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenTryResponse {
    pub channel_id: String,
    pub version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenAck {
    pub port_id: String,
    pub channel_id: String,
    pub counterparty_channel_id: String,
    pub counterparty_version: String,
    pub proof_try: Vec<u8>,
    pub proof_height: Height,
    pub signer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelOpenConfirm {
    pub port_id: String,
    pub channel_id: String,
    pub proof_ack: Vec<u8>,
    pub proof_height: Height,
    pub signer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelCloseInit {
    pub port_id: String,
    pub channel_id: String,
    pub signer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelCloseConfirm {
    pub port_id: String,
    pub channel_id: String,
    pub proof_init: Vec<u8>,
    pub proof_height: Height,
    pub signer: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MsgChannelCloseFrozen {
    pub port_id: String,
    pub channel_id: String,
    pub proof_frozen: Vec<u8>,
    pub proof_height: Height,
    pub signer: String,
}

/// Any channel message, tagged by its type URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelMsg {
    OpenInit(MsgChannelOpenInit),
    OpenTry(MsgChannelOpenTry),
    OpenAck(MsgChannelOpenAck),
    OpenConfirm(MsgChannelOpenConfirm),
    CloseInit(MsgChannelCloseInit),
    CloseConfirm(MsgChannelCloseConfirm),
    CloseFrozen(MsgChannelCloseFrozen),
}

impl ChannelMsg {
    pub fn decode(type_url: &str, data: &[u8]) -> Result<Self, ChannelError> {
        let msg = match type_url {
            type_urls::MSG_CHANNEL_OPEN_INIT => ChannelMsg::OpenInit(decode_json(data)?),
            type_urls::MSG_CHANNEL_OPEN_TRY => ChannelMsg::OpenTry(decode_json(data)?),
            type_urls::MSG_CHANNEL_OPEN_ACK => ChannelMsg::OpenAck(decode_json(data)?),
            type_urls::MSG_CHANNEL_OPEN_CONFIRM => ChannelMsg::OpenConfirm(decode_json(data)?),
            type_urls::MSG_CHANNEL_CLOSE_INIT => ChannelMsg::CloseInit(decode_json(data)?),
            type_urls::MSG_CHANNEL_CLOSE_CONFIRM => ChannelMsg::CloseConfirm(decode_json(data)?),
            type_urls::MSG_CHANNEL_CLOSE_FROZEN => ChannelMsg::CloseFrozen(decode_json(data)?),
            other => {
                return Err(ChannelError::InvalidMessage(format!("unknown message type: {}", other)))
            }
        };
        Ok(msg)
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            ChannelMsg::OpenInit(_) => type_urls::MSG_CHANNEL_OPEN_INIT,
            ChannelMsg::OpenTry(_) => type_urls::MSG_CHANNEL_OPEN_TRY,
            ChannelMsg::OpenAck(_) => type_urls::MSG_CHANNEL_OPEN_ACK,
            ChannelMsg::OpenConfirm(_) => type_urls::MSG_CHANNEL_OPEN_CONFIRM,
            ChannelMsg::CloseInit(_) => type_urls::MSG_CHANNEL_CLOSE_INIT,
            ChannelMsg::CloseConfirm(_) => type_urls::MSG_CHANNEL_CLOSE_CONFIRM,
            ChannelMsg::CloseFrozen(_) => type_urls::MSG_CHANNEL_CLOSE_FROZEN,
        }
    }
}

fn decode_json<T>(data: &[u8]) -> Result<T, ChannelError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_slice(data).map_err(|e| ChannelError::InvalidMessage(format!("JSON decode error: {}", e)))
}

pub(crate) fn encode_json<T: Serialize>(response: &T) -> Result<Vec<u8>, ChannelError> {
    serde_json::to_vec(response).map_err(|e| ChannelError::InvalidMessage(format!("JSON encode error: {}", e)))
}

fn validate_signer(signer: &str) -> Result<(), ChannelError> {
    if signer.trim().is_empty() {
        return Err(ChannelError::InvalidMessage("missing signer address".to_string()));
    }
    Ok(())
}

fn validate_proof(proof: &[u8], name: &str) -> Result<(), ChannelError> {
    if proof.is_empty() {
        return Err(ChannelError::InvalidMessage(format!("cannot submit an empty {}", name)));
    }
    Ok(())
}

fn validate_port_and_channel(port_id: &str, channel_id: &str) -> Result<(), ChannelError> {
    host::validate_port_identifier(port_id)?;
    host::validate_channel_identifier(channel_id)
}

/// Fields shared by the channels proposed in Init and Try.
fn validate_proposed_channel(channel: &ChannelEnd, expected_state: State) -> Result<(), ChannelError> {
    if channel.state != expected_state {
        return Err(ChannelError::InvalidChannelState(format!(
            "channel state must be {} (got {})",
            expected_state, channel.state
        )));
    }
    if channel.connection_hops.is_empty() {
        return Err(ChannelError::InvalidMessage("connection hops cannot be empty".to_string()));
    }
    for connection_id in &channel.connection_hops {
        host::validate_connection_identifier(connection_id)?;
    }
    host::validate_port_identifier(&channel.counterparty.port_id)
}

impl MsgChannelOpenInit {
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        host::validate_port_identifier(&self.port_id)?;
        validate_proposed_channel(&self.channel, State::Init)?;
        if !self.channel.counterparty.channel_id.is_empty() {
            return Err(ChannelError::InvalidMessage(
                "counterparty channel identifier must be empty".to_string(),
            ));
        }
        validate_signer(&self.signer)
    }
}

impl MsgChannelOpenTry {
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        host::validate_port_identifier(&self.port_id)?;
        if let Some(previous_channel_id) = &self.previous_channel_id {
            host::validate_channel_identifier(previous_channel_id)?;
        }
        validate_proposed_channel(&self.channel, State::TryOpen)?;
        host::validate_channel_identifier(&self.channel.counterparty.channel_id)?;
        validate_proof(&self.proof_init, "proof init")?;
        validate_signer(&self.signer)
    }
}

impl MsgChannelOpenAck {
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        validate_port_and_channel(&self.port_id, &self.channel_id)?;
        host::validate_channel_identifier(&self.counterparty_channel_id)?;
        validate_proof(&self.proof_try, "proof try")?;
        validate_signer(&self.signer)
    }
}

impl MsgChannelOpenConfirm {
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        validate_port_and_channel(&self.port_id, &self.channel_id)?;
        validate_proof(&self.proof_ack, "proof ack")?;
        validate_signer(&self.signer)
    }
}

impl MsgChannelCloseInit {
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        validate_port_and_channel(&self.port_id, &self.channel_id)?;
        validate_signer(&self.signer)
    }
}

impl MsgChannelCloseConfirm {
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        validate_port_and_channel(&self.port_id, &self.channel_id)?;
        validate_proof(&self.proof_init, "proof init")?;
        validate_signer(&self.signer)
    }
}

impl MsgChannelCloseFrozen {
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        validate_port_and_channel(&self.port_id, &self.channel_id)?;
        validate_proof(&self.proof_frozen, "proof frozen")?;
        validate_signer(&self.signer)
    }
}
