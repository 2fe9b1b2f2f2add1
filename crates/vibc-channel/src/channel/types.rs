use std::fmt;

use prost::Message;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ChannelError;
use crate::host;
use crate::proto::{RawChannel, RawCounterparty, RawHeight};

/// Channel state enumeration following ICS-04, extended with the virtual
/// pending sub-states and the multi-hop FROZEN state.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Uninitialized channel
    Uninitialized,
    /// Channel initialized (ChanOpenInit called)
    Init,
    /// Channel in try open state (ChanOpenTry called)
    TryOpen,
    /// Channel established and open
    Open,
    /// Channel closed
    Closed,
    /// Channel terminated through a frozen client on its path
    Frozen,
    /// TRYOPEN reached over a virtual first hop, awaiting confirmation
    TryPending,
    /// OPEN reached through ChanOpenAck over a virtual first hop
    AckPending,
    /// OPEN reached through ChanOpenConfirm over a virtual first hop
    ConfirmPending,
    /// CLOSED reached through ChanCloseConfirm over a virtual first hop
    CloseConfirmPending,
}

impl State {
    /// Position in the handshake lattice. A channel never moves to a lower rank.
    pub fn rank(&self) -> u8 {
        match self {
            State::Uninitialized => 0,
            State::Init => 1,
            State::TryOpen | State::TryPending => 2,
            State::Open | State::AckPending | State::ConfirmPending => 3,
            State::CloseConfirmPending => 4,
            State::Closed | State::Frozen => 5,
        }
    }

    /// Closed and frozen channels accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Closed | State::Frozen)
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            State::TryPending | State::AckPending | State::ConfirmPending | State::CloseConfirmPending
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Uninitialized => "UNINITIALIZED",
            State::Init => "INIT",
            State::TryOpen => "TRYOPEN",
            State::Open => "OPEN",
            State::Closed => "CLOSED",
            State::Frozen => "FROZEN",
            State::TryPending => "TRY_PENDING",
            State::AckPending => "ACK_PENDING",
            State::ConfirmPending => "CONFIRM_PENDING",
            State::CloseConfirmPending => "CLOSE_CONFIRM_PENDING",
        }
    }

    pub(crate) fn to_i32(self) -> i32 {
        match self {
            State::Uninitialized => 0,
            State::Init => 1,
            State::TryOpen => 2,
            State::Open => 3,
            State::Closed => 4,
            State::Frozen => 5,
            State::TryPending => 6,
            State::AckPending => 7,
            State::ConfirmPending => 8,
            State::CloseConfirmPending => 9,
        }
    }

    pub(crate) fn from_i32(value: i32) -> Result<Self, ChannelError> {
        let state = match value {
            0 => State::Uninitialized,
            1 => State::Init,
            2 => State::TryOpen,
            3 => State::Open,
            4 => State::Closed,
            5 => State::Frozen,
            6 => State::TryPending,
            7 => State::AckPending,
            8 => State::ConfirmPending,
            9 => State::CloseConfirmPending,
            other => {
                return Err(ChannelError::InvalidChannelState(format!(
                    "unknown channel state {}",
                    other
                )))
            }
        };
        Ok(state)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel ordering enumeration
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    /// No ordering - packets can arrive in any order
    Unordered,
    /// Ordered - packets must arrive in order
    Ordered,
}

impl Order {
    /// Feature string a connection version must advertise to carry this ordering.
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Unordered => "ORDER_UNORDERED",
            Order::Ordered => "ORDER_ORDERED",
        }
    }

    pub(crate) fn to_i32(self) -> i32 {
        match self {
            Order::Unordered => 1,
            Order::Ordered => 2,
        }
    }

    pub(crate) fn from_i32(value: i32) -> Result<Self, ChannelError> {
        match value {
            1 => Ok(Order::Unordered),
            2 => Ok(Order::Ordered),
            other => Err(ChannelError::InvalidMessage(format!(
                "unknown channel ordering {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel end data structure following ICS-04
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChannelEnd {
    /// Current state of the channel
    pub state: State,
    /// Ordering of packets in this channel
    pub ordering: Order,
    /// Counterparty channel information
    pub counterparty: Counterparty,
    /// Connection IDs this channel is routed over, nearest first
    pub connection_hops: Vec<String>,
    /// Channel version for application-specific data
    pub version: String,
}

impl ChannelEnd {
    /// Create a new channel end
    pub fn new(
        state: State,
        ordering: Order,
        counterparty: Counterparty,
        connection_hops: Vec<String>,
        version: String,
    ) -> Self {
        Self {
            state,
            ordering,
            counterparty,
            connection_hops,
            version,
        }
    }

    /// Check if channel is open
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    pub fn is_multihop(&self) -> bool {
        self.connection_hops.len() > 1
    }

    /// Get the counterparty port ID
    pub fn counterparty_port_id(&self) -> &str {
        &self.counterparty.port_id
    }

    /// Get the counterparty channel ID if available
    pub fn counterparty_channel_id(&self) -> Option<&str> {
        self.counterparty.channel_id()
    }

    /// Canonical wire encoding, the exact bytes committed in the store and proven by counterparties.
    pub fn encode_vec(&self) -> Vec<u8> {
        RawChannel::from(self.clone()).encode_to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelError> {
        let raw = RawChannel::decode(bytes)
            .map_err(|e| ChannelError::InvalidMessage(format!("cannot decode channel end: {}", e)))?;
        Self::try_from(raw)
    }
}

impl From<ChannelEnd> for RawChannel {
    fn from(channel: ChannelEnd) -> Self {
        RawChannel {
            state: channel.state.to_i32(),
            ordering: channel.ordering.to_i32(),
            counterparty: Some(RawCounterparty {
                port_id: channel.counterparty.port_id,
                channel_id: channel.counterparty.channel_id,
            }),
            connection_hops: channel.connection_hops,
            version: channel.version,
        }
    }
}

impl TryFrom<RawChannel> for ChannelEnd {
    type Error = ChannelError;

    fn try_from(raw: RawChannel) -> Result<Self, Self::Error> {
        let counterparty = raw
            .counterparty
            .ok_or_else(|| ChannelError::InvalidMessage("channel end has no counterparty".to_string()))?;
        Ok(ChannelEnd {
            state: State::from_i32(raw.state)?,
            ordering: Order::from_i32(raw.ordering)?,
            counterparty: Counterparty::new(counterparty.port_id, counterparty.channel_id),
            connection_hops: raw.connection_hops,
            version: raw.version,
        })
    }
}

/// Counterparty channel information
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Counterparty {
    /// Port ID on the counterparty chain
    pub port_id: String,
    /// Channel ID on the counterparty chain, empty until the counterparty has one
    pub channel_id: String,
}

impl Counterparty {
    /// Create a new counterparty
    pub fn new(port_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            port_id: port_id.into(),
            channel_id: channel_id.into(),
        }
    }

    pub fn channel_id(&self) -> Option<&str> {
        if self.channel_id.is_empty() {
            None
        } else {
            Some(&self.channel_id)
        }
    }
}

/// IBC packet for cross-chain communication
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number of the packet
    pub sequence: u64,
    /// Source port identifier
    pub source_port: String,
    /// Source channel identifier
    pub source_channel: String,
    /// Destination port identifier
    pub destination_port: String,
    /// Destination channel identifier
    pub destination_channel: String,
    /// Packet data payload
    pub data: Vec<u8>,
    /// Timeout height for the packet
    pub timeout_height: Height,
    /// Timeout timestamp for the packet, in nanoseconds
    pub timeout_timestamp: u64,
}

impl Packet {
    /// Create a new packet
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        source_port: String,
        source_channel: String,
        destination_port: String,
        destination_channel: String,
        data: Vec<u8>,
        timeout_height: Height,
        timeout_timestamp: u64,
    ) -> Self {
        Self {
            sequence,
            source_port,
            source_channel,
            destination_port,
            destination_channel,
            data,
            timeout_height,
            timeout_timestamp,
        }
    }

    /// Structural checks every packet must pass before it is committed.
    pub fn validate_basic(&self) -> Result<(), ChannelError> {
        host::validate_port_identifier(&self.source_port)?;
        host::validate_port_identifier(&self.destination_port)?;
        host::validate_channel_identifier(&self.source_channel)?;
        host::validate_channel_identifier(&self.destination_channel)?;
        if self.sequence == 0 {
            return Err(ChannelError::InvalidPacket("packet sequence cannot be 0".to_string()));
        }
        if self.timeout_height.is_zero() && self.timeout_timestamp == 0 {
            return Err(ChannelError::InvalidPacket(
                "packet timeout height and packet timeout timestamp cannot both be 0".to_string(),
            ));
        }
        if self.data.is_empty() {
            return Err(ChannelError::InvalidPacket("packet data bytes cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Check if packet has timed out based on height
    pub fn is_timed_out_on_height(&self, current_height: &Height) -> bool {
        if self.timeout_height.is_zero() {
            return false; // No height timeout
        }
        current_height >= &self.timeout_height
    }

    /// Check if packet has timed out based on timestamp
    pub fn is_timed_out_on_timestamp(&self, current_timestamp: u64) -> bool {
        if self.timeout_timestamp == 0 {
            return false; // No timestamp timeout
        }
        current_timestamp >= self.timeout_timestamp
    }
}

/// Height represents a monotonically increasing height
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct Height {
    /// Revision number (for chain upgrades)
    pub revision_number: u64,
    /// Revision height (block height within revision)
    pub revision_height: u64,
}

impl Height {
    /// Create a new height
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self {
            revision_number,
            revision_height,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Check if height is zero
    pub fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

impl From<RawHeight> for Height {
    fn from(raw: RawHeight) -> Self {
        Height::new(raw.revision_number, raw.revision_height)
    }
}

/// Packet commitment for proving packet transmission
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PacketCommitment {
    /// Hash of the packet fields
    pub data: Vec<u8>,
}

impl PacketCommitment {
    /// Create a new packet commitment
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Create commitment from packet
    pub fn from_packet(packet: &Packet) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(packet.sequence.to_be_bytes());
        hasher.update(packet.source_port.as_bytes());
        hasher.update(packet.source_channel.as_bytes());
        hasher.update(packet.destination_port.as_bytes());
        hasher.update(packet.destination_channel.as_bytes());
        hasher.update(Sha256::digest(&packet.data));
        hasher.update(packet.timeout_height.revision_number.to_be_bytes());
        hasher.update(packet.timeout_height.revision_height.to_be_bytes());
        hasher.update(packet.timeout_timestamp.to_be_bytes());

        Self {
            data: hasher.finalize().to_vec(),
        }
    }
}
