// vIBC Channel Library
// ICS-04 channel handshake with multi-hop proofs and virtual channel ends

pub mod capability;
pub mod channel;
pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod host;
pub mod logging;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod msg_server;
pub mod msgs;
pub mod proto;
pub mod store;
pub mod testing;

// Re-export commonly used types for convenience
pub use capability::{Capability, CapabilityError, CapabilityKeeper, MemoryCapabilityKeeper};
pub use channel::{
    ChannelEnd, ChannelKeeper, ChannelRegistry, Counterparty, ExpectedChannel, Height, IbcEvent, IbcEventType,
    MultihopProof, MultihopProofs, Order, Packet, PacketCommitment, State, VirtualityClassifier,
};
pub use client::{ClientKeeper, ClientState, ClientStatus};
pub use config::CoreConfig;
pub use connection::{ConnectionEnd, ConnectionError, ConnectionKeeper};
pub use context::Context;
pub use error::ChannelError;
#[cfg(feature = "metrics")]
pub use metrics::ChannelMetrics;
pub use msg_server::MsgServer;
pub use store::{CacheStore, KvStore, MemoryStore};
