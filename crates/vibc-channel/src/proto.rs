//! Protobuf wire types for the values this crate commits to the store or
//! expects counterparties to have committed.
//!
//! Field numbers follow `ibc.core.channel.v1`, `ibc.core.connection.v1`,
//! `ibc.core.client.v1` and `ibc.lightclients.*`. Only the fields this crate
//! reads are declared on the light client messages; prost skips the rest.

/// Height is a monotonically increasing data type that can be compared against
/// another Height for the purposes of updating and freezing clients.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawHeight {
    #[prost(uint64, tag = "1")]
    pub revision_number: u64,
    #[prost(uint64, tag = "2")]
    pub revision_height: u64,
}

/// Counterparty defines a channel end counterparty
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawCounterparty {
    /// port on the counterparty chain which owns the other end of the channel.
    #[prost(string, tag = "1")]
    pub port_id: ::prost::alloc::string::String,
    /// channel end on the counterparty chain
    #[prost(string, tag = "2")]
    pub channel_id: ::prost::alloc::string::String,
}

/// Channel defines pipeline for exactly-once packet delivery between specific
/// modules on separate blockchains.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawChannel {
    #[prost(int32, tag = "1")]
    pub state: i32,
    #[prost(int32, tag = "2")]
    pub ordering: i32,
    #[prost(message, optional, tag = "3")]
    pub counterparty: ::core::option::Option<RawCounterparty>,
    /// list of connection identifiers, in order, along which packets sent on
    /// this channel will travel
    #[prost(string, repeated, tag = "4")]
    pub connection_hops: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, tag = "5")]
    pub version: ::prost::alloc::string::String,
}

/// Version defines the versioning scheme used to negotiate the IBC version in
/// the connection handshake.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawVersion {
    #[prost(string, tag = "1")]
    pub identifier: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub features: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawMerklePrefix {
    #[prost(bytes = "vec", tag = "1")]
    pub key_prefix: ::prost::alloc::vec::Vec<u8>,
}

/// Counterparty defines the counterparty chain associated with a connection end.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawConnectionCounterparty {
    #[prost(string, tag = "1")]
    pub client_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub connection_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub prefix: ::core::option::Option<RawMerklePrefix>,
}

/// ConnectionEnd defines a stateful object on a chain connected to another
/// separate one.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawConnectionEnd {
    #[prost(string, tag = "1")]
    pub client_id: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub versions: ::prost::alloc::vec::Vec<RawVersion>,
    #[prost(int32, tag = "3")]
    pub state: i32,
    #[prost(message, optional, tag = "4")]
    pub counterparty: ::core::option::Option<RawConnectionCounterparty>,
    #[prost(uint64, tag = "5")]
    pub delay_period: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawMerklePath {
    #[prost(string, repeated, tag = "1")]
    pub key_path: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

/// One hop's existence proof together with the value it proves.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawMultihopProof {
    #[prost(bytes = "vec", tag = "1")]
    pub proof: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub prefixed_key: ::core::option::Option<RawMerklePath>,
}

/// Proof bundle carried by multi-hop handshake messages. Connection and
/// consensus proofs are ordered from the furthest hop inward.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawMsgMultihopProofs {
    #[prost(message, optional, tag = "1")]
    pub key_proof: ::core::option::Option<RawMultihopProof>,
    #[prost(message, repeated, tag = "2")]
    pub connection_proofs: ::prost::alloc::vec::Vec<RawMultihopProof>,
    #[prost(message, repeated, tag = "3")]
    pub consensus_proofs: ::prost::alloc::vec::Vec<RawMultihopProof>,
}

/// Subset of `ibc.lightclients.tendermint.v1.ClientState`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawTendermintClientState {
    #[prost(string, tag = "1")]
    pub chain_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "6")]
    pub frozen_height: ::core::option::Option<RawHeight>,
    #[prost(message, optional, tag = "7")]
    pub latest_height: ::core::option::Option<RawHeight>,
}

/// `ibc.lightclients.localhost.v2.ClientState`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RawLocalhostClientState {
    #[prost(message, optional, tag = "1")]
    pub latest_height: ::core::option::Option<RawHeight>,
}
