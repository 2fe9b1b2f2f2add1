// Channel lifecycle events

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{ChannelEnd, Packet, State};

pub const ATTRIBUTE_KEY_PORT_ID: &str = "port_id";
pub const ATTRIBUTE_KEY_CHANNEL_ID: &str = "channel_id";
pub const ATTRIBUTE_KEY_CONNECTION_ID: &str = "connection_id";
pub const ATTRIBUTE_COUNTERPARTY_PORT_ID: &str = "counterparty_port_id";
pub const ATTRIBUTE_COUNTERPARTY_CHANNEL_ID: &str = "counterparty_channel_id";
pub const ATTRIBUTE_VERSION: &str = "version";
pub const ATTRIBUTE_ORDERING: &str = "ordering";
pub const ATTRIBUTE_STATE: &str = "state";

pub const ATTRIBUTE_KEY_DATA_HEX: &str = "packet_data_hex";
pub const ATTRIBUTE_KEY_TIMEOUT_HEIGHT: &str = "packet_timeout_height";
pub const ATTRIBUTE_KEY_TIMEOUT_TIMESTAMP: &str = "packet_timeout_timestamp";
pub const ATTRIBUTE_KEY_SEQUENCE: &str = "packet_sequence";
pub const ATTRIBUTE_KEY_SRC_PORT: &str = "packet_src_port";
pub const ATTRIBUTE_KEY_SRC_CHANNEL: &str = "packet_src_channel";
pub const ATTRIBUTE_KEY_DST_PORT: &str = "packet_dst_port";
pub const ATTRIBUTE_KEY_DST_CHANNEL: &str = "packet_dst_channel";
pub const ATTRIBUTE_KEY_CHANNEL_ORDERING: &str = "packet_channel_ordering";

/// Event types emitted by channel handshake and packet operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IbcEventType {
    ChannelOpenInit,
    ChannelOpenTry,
    ChannelOpenTryPending,
    ChannelOpenAck,
    ChannelOpenAckPending,
    ChannelOpenConfirm,
    ChannelOpenConfirmPending,
    ChannelCloseInit,
    ChannelCloseConfirm,
    ChannelCloseConfirmPending,
    SendPacket,
}

impl IbcEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IbcEventType::ChannelOpenInit => "channel_open_init",
            IbcEventType::ChannelOpenTry => "channel_open_try",
            IbcEventType::ChannelOpenTryPending => "channel_open_try_pending",
            IbcEventType::ChannelOpenAck => "channel_open_ack",
            IbcEventType::ChannelOpenAckPending => "channel_open_ack_pending",
            IbcEventType::ChannelOpenConfirm => "channel_open_confirm",
            IbcEventType::ChannelOpenConfirmPending => "channel_open_confirm_pending",
            IbcEventType::ChannelCloseInit => "channel_close_init",
            IbcEventType::ChannelCloseConfirm => "channel_close_confirm",
            IbcEventType::ChannelCloseConfirmPending => "channel_close_confirm_pending",
            IbcEventType::SendPacket => "send_packet",
        }
    }
}

impl fmt::Display for IbcEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event handed to the host's event manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbcEvent {
    pub event_type: IbcEventType,
    pub attributes: BTreeMap<String, String>,
}

impl IbcEvent {
    pub fn new(event_type: IbcEventType) -> Self {
        Self {
            event_type,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Hops rendered the way relayers expect them in the `connection_id` attribute.
pub fn format_connection_id(connection_hops: &[String]) -> String {
    connection_hops.join("/")
}

fn channel_event(
    event_type: IbcEventType,
    port_id: &str,
    channel_id: &str,
    channel: &ChannelEnd,
) -> IbcEvent {
    IbcEvent::new(event_type)
        .with_attribute(ATTRIBUTE_KEY_PORT_ID, port_id)
        .with_attribute(ATTRIBUTE_KEY_CHANNEL_ID, channel_id)
        .with_attribute(ATTRIBUTE_COUNTERPARTY_PORT_ID, channel.counterparty.port_id.as_str())
        .with_attribute(ATTRIBUTE_COUNTERPARTY_CHANNEL_ID, channel.counterparty.channel_id.as_str())
        .with_attribute(
            ATTRIBUTE_KEY_CONNECTION_ID,
            format_connection_id(&channel.connection_hops),
        )
}

pub fn channel_open_init(port_id: &str, channel_id: &str, channel: &ChannelEnd) -> IbcEvent {
    channel_event(IbcEventType::ChannelOpenInit, port_id, channel_id, channel)
        .with_attribute(ATTRIBUTE_VERSION, channel.version.as_str())
}

pub fn channel_open_try(port_id: &str, channel_id: &str, channel: &ChannelEnd) -> IbcEvent {
    if channel.state == State::TryPending {
        channel_event(IbcEventType::ChannelOpenTryPending, port_id, channel_id, channel)
            .with_attribute(ATTRIBUTE_VERSION, channel.version.as_str())
            .with_attribute(ATTRIBUTE_ORDERING, channel.ordering.as_str())
    } else {
        channel_event(IbcEventType::ChannelOpenTry, port_id, channel_id, channel)
            .with_attribute(ATTRIBUTE_VERSION, channel.version.as_str())
    }
}

pub fn channel_open_ack(port_id: &str, channel_id: &str, channel: &ChannelEnd) -> IbcEvent {
    if channel.state == State::AckPending {
        channel_event(IbcEventType::ChannelOpenAckPending, port_id, channel_id, channel)
            .with_attribute(ATTRIBUTE_VERSION, channel.version.as_str())
            .with_attribute(ATTRIBUTE_ORDERING, channel.ordering.as_str())
    } else {
        channel_event(IbcEventType::ChannelOpenAck, port_id, channel_id, channel)
    }
}

pub fn channel_open_confirm(port_id: &str, channel_id: &str, channel: &ChannelEnd) -> IbcEvent {
    if channel.state == State::ConfirmPending {
        channel_event(IbcEventType::ChannelOpenConfirmPending, port_id, channel_id, channel)
            .with_attribute(ATTRIBUTE_VERSION, channel.version.as_str())
            .with_attribute(ATTRIBUTE_ORDERING, channel.ordering.as_str())
    } else {
        channel_event(IbcEventType::ChannelOpenConfirm, port_id, channel_id, channel)
    }
}

pub fn channel_close_init(port_id: &str, channel_id: &str, channel: &ChannelEnd) -> IbcEvent {
    channel_event(IbcEventType::ChannelCloseInit, port_id, channel_id, channel)
}

/// Also used for frozen closure; the `state` attribute tells the two apart.
pub fn channel_close_confirm(port_id: &str, channel_id: &str, channel: &ChannelEnd) -> IbcEvent {
    let event_type = if channel.state == State::CloseConfirmPending {
        IbcEventType::ChannelCloseConfirmPending
    } else {
        IbcEventType::ChannelCloseConfirm
    };
    channel_event(event_type, port_id, channel_id, channel)
        .with_attribute(ATTRIBUTE_STATE, channel.state.as_str())
}

pub fn send_packet(packet: &Packet, channel: &ChannelEnd) -> IbcEvent {
    IbcEvent::new(IbcEventType::SendPacket)
        .with_attribute(ATTRIBUTE_KEY_DATA_HEX, hex::encode(&packet.data))
        .with_attribute(ATTRIBUTE_KEY_TIMEOUT_HEIGHT, packet.timeout_height.to_string())
        .with_attribute(
            ATTRIBUTE_KEY_TIMEOUT_TIMESTAMP,
            packet.timeout_timestamp.to_string(),
        )
        .with_attribute(ATTRIBUTE_KEY_SEQUENCE, packet.sequence.to_string())
        .with_attribute(ATTRIBUTE_KEY_SRC_PORT, packet.source_port.as_str())
        .with_attribute(ATTRIBUTE_KEY_SRC_CHANNEL, packet.source_channel.as_str())
        .with_attribute(ATTRIBUTE_KEY_DST_PORT, packet.destination_port.as_str())
        .with_attribute(ATTRIBUTE_KEY_DST_CHANNEL, packet.destination_channel.as_str())
        .with_attribute(ATTRIBUTE_KEY_CHANNEL_ORDERING, channel.ordering.as_str())
        .with_attribute(
            ATTRIBUTE_KEY_CONNECTION_ID,
            format_connection_id(&channel.connection_hops),
        )
}
