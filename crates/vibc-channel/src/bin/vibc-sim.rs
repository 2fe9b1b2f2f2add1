use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use vibc_channel::channel::{ChannelEnd, Counterparty, Height, MultihopProof, MultihopProofs, Order, State};
use vibc_channel::msgs::{MsgChannelOpenAck, MsgChannelOpenConfirm, MsgChannelOpenInit, MsgChannelOpenTry};
use vibc_channel::testing::{open_connection, tendermint_client, MockClientKeeper, MockConnectionKeeper};
use vibc_channel::{logging, ChannelKeeper, CoreConfig, MemoryCapabilityKeeper, MemoryStore, MsgServer};

type SimServer = MsgServer<MemoryStore, MockClientKeeper, MockConnectionKeeper, MemoryCapabilityKeeper>;

const PORT: &str = "transfer";
const VERSION: &str = "ics20-1";

#[derive(Parser)]
#[command(name = "vibc-sim")]
#[command(about = "Drive channel handshakes against in-memory collaborators")]
#[command(version)]
pub struct Cli {
    /// Configuration file path; defaults are used when it does not exist
    #[arg(short, long, default_value = "config/vibc.toml")]
    pub config: String,

    /// Log level, overrides the configured one
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a channel opening handshake
    Handshake {
        #[arg(long, value_enum, default_value_t = Topology::Direct)]
        topology: Topology,
    },
    /// Open a direct channel and send virtual packets over it
    SendPacket {
        /// First sequence to send
        #[arg(long, default_value_t = 1)]
        sequence: u64,
        /// Number of packets
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
    /// Write the default configuration file
    InitConfig,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Topology {
    /// One hop to a regular chain
    Direct,
    /// Two virtual hops; proofs are skipped
    Virtual,
    /// Two regular hops proven through a multi-hop bundle
    Multihop,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if Path::new(&cli.config).exists() {
        CoreConfig::load(&cli.config)?
    } else {
        CoreConfig::default()
    };
    logging::init(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Commands::Handshake { topology } => {
            info!(?topology, "running channel handshake");
            let mut server = build_server(config)?;
            let state = match topology {
                Topology::Direct => direct_handshake(&mut server)?,
                Topology::Virtual => virtual_handshake(&mut server)?,
                Topology::Multihop => multihop_handshake(&mut server)?,
            };
            println!("final channel state: {}", state);
            print_events(&mut server);
        }
        Commands::SendPacket { sequence, count } => {
            let mut server = build_server(config)?;
            direct_handshake(&mut server)?;
            for sequence in sequence..sequence.saturating_add(count) {
                let sent = server.send_virtual_packet(
                    PORT,
                    "channel-0",
                    Height::zero(),
                    u64::MAX,
                    format!("packet {}", sequence).into_bytes(),
                    sequence,
                )?;
                println!("committed packet sequence {}", sent);
            }
            print_events(&mut server);
        }
        Commands::InitConfig => {
            if let Some(parent) = Path::new(&cli.config).parent() {
                std::fs::create_dir_all(parent)?;
            }
            config.save(&cli.config)?;
            println!("wrote {}", cli.config);
        }
    }

    Ok(())
}

/// connection-0: regular single hop; connection-1/connection-2: virtual pair;
/// connection-3/connection-4: regular two-hop path.
fn build_server(config: CoreConfig) -> anyhow::Result<SimServer> {
    let virtual_client = config.virtual_client_id.clone();

    let clients = MockClientKeeper::new();
    clients.insert_client("07-tendermint-0", tendermint_client("chain-b", Height::new(1, 100)));
    clients.insert_client("07-tendermint-3", tendermint_client("chain-c", Height::new(1, 100)));
    clients.insert_client(&virtual_client, tendermint_client("virtual", Height::new(1, 100)));

    let connections = MockConnectionKeeper::new();
    connections.insert_connection("connection-0", open_connection("07-tendermint-0", "07-tendermint-9", "connection-7"));
    connections.insert_connection("connection-1", open_connection(&virtual_client, "07-tendermint-8", "connection-5"));
    connections.insert_connection("connection-2", open_connection("07-tendermint-6", &virtual_client, "connection-6"));
    connections.insert_connection("connection-3", open_connection("07-tendermint-3", "07-tendermint-7", "connection-11"));
    connections.insert_connection("connection-4", open_connection("07-tendermint-4", "07-tendermint-8", "connection-12"));

    #[allow(unused_mut)]
    let mut keeper = ChannelKeeper::new(config, clients, connections, MemoryCapabilityKeeper::new());
    #[cfg(feature = "metrics")]
    {
        keeper = keeper.with_metrics(std::sync::Arc::new(vibc_channel::ChannelMetrics::new()?));
    }

    let mut server = MsgServer::new(MemoryStore::new(), keeper);
    server.bind_port(PORT)?;
    Ok(server)
}

fn hops(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn channel_state(server: &mut SimServer, channel_id: &str) -> anyhow::Result<State> {
    let state = server
        .execute("QueryChannel", |keeper, ctx| keeper.get_channel(ctx, PORT, channel_id))?
        .map(|channel| channel.state)
        .unwrap_or(State::Uninitialized);
    Ok(state)
}

fn direct_handshake(server: &mut SimServer) -> anyhow::Result<State> {
    let init = server.channel_open_init(&MsgChannelOpenInit {
        port_id: PORT.to_string(),
        channel: ChannelEnd::new(
            State::Init,
            Order::Unordered,
            Counterparty::new(PORT, ""),
            hops(&["connection-0"]),
            VERSION.to_string(),
        ),
        signer: "sim-relayer".to_string(),
    })?;
    info!(channel_id = %init.channel_id, "channel initialised");

    server.channel_open_ack(&MsgChannelOpenAck {
        port_id: PORT.to_string(),
        channel_id: init.channel_id.clone(),
        counterparty_channel_id: "channel-42".to_string(),
        counterparty_version: VERSION.to_string(),
        proof_try: b"proof-try".to_vec(),
        proof_height: Height::new(1, 90),
        signer: "sim-relayer".to_string(),
    })?;

    channel_state(server, &init.channel_id)
}

fn virtual_handshake(server: &mut SimServer) -> anyhow::Result<State> {
    // Relayers may not drive virtual channels, so this goes through the unchecked entry point.
    let try_response = server.channel_open_try_unchecked(&MsgChannelOpenTry {
        port_id: PORT.to_string(),
        previous_channel_id: None,
        channel: ChannelEnd::new(
            State::TryOpen,
            Order::Unordered,
            Counterparty::new(PORT, "channel-9"),
            hops(&["connection-1", "connection-2"]),
            VERSION.to_string(),
        ),
        counterparty_version: VERSION.to_string(),
        proof_init: b"unchecked".to_vec(),
        proof_height: Height::new(1, 90),
        signer: "virtual-chain".to_string(),
    })?;
    info!(
        channel_id = %try_response.channel_id,
        state = %channel_state(server, &try_response.channel_id)?,
        "virtual try accepted"
    );

    let state = server.resolve_pending_channel(PORT, &try_response.channel_id)?;
    info!(state = %state, "pending try resolved");

    server.channel_open_confirm_unchecked(&MsgChannelOpenConfirm {
        port_id: PORT.to_string(),
        channel_id: try_response.channel_id.clone(),
        proof_ack: b"unchecked".to_vec(),
        proof_height: Height::new(1, 91),
        signer: "virtual-chain".to_string(),
    })?;
    server.resolve_pending_channel(PORT, &try_response.channel_id)?;

    channel_state(server, &try_response.channel_id)
}

fn multihop_handshake(server: &mut SimServer) -> anyhow::Result<State> {
    let middle = open_connection("07-tendermint-20", "07-tendermint-21", "connection-13");
    let proof = MultihopProofs {
        key_proof: Some(MultihopProof {
            proof: b"key".to_vec(),
            value: Vec::new(),
            prefixed_key: Vec::new(),
        }),
        connection_proofs: vec![MultihopProof {
            proof: b"connection".to_vec(),
            value: middle.encode_vec(),
            prefixed_key: Vec::new(),
        }],
        consensus_proofs: vec![MultihopProof::default()],
    }
    .encode_vec();

    let try_response = server.channel_open_try(&MsgChannelOpenTry {
        port_id: PORT.to_string(),
        previous_channel_id: None,
        channel: ChannelEnd::new(
            State::TryOpen,
            Order::Ordered,
            Counterparty::new(PORT, "channel-3"),
            hops(&["connection-3", "connection-4"]),
            VERSION.to_string(),
        ),
        counterparty_version: VERSION.to_string(),
        proof_init: proof.clone(),
        proof_height: Height::new(1, 95),
        signer: "sim-relayer".to_string(),
    })?;

    server.channel_open_confirm(&MsgChannelOpenConfirm {
        port_id: PORT.to_string(),
        channel_id: try_response.channel_id.clone(),
        proof_ack: proof,
        proof_height: Height::new(1, 96),
        signer: "sim-relayer".to_string(),
    })?;

    channel_state(server, &try_response.channel_id)
}

fn print_events(server: &mut SimServer) {
    for event in server.take_events() {
        let attributes: Vec<String> = event
            .attributes
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        println!("{} {}", event.event_type, attributes.join(" "));
    }
}
