// Single-hop channel handshake tests against the in-memory collaborators

mod common;

use common::{hops, Harness, PORT, VERSION};
use vibc_channel::channel::{ChannelEnd, Counterparty, Height, Order, State};
use vibc_channel::testing::VerificationCall;
use vibc_channel::{host, CapabilityKeeper, ChannelError, ClientStatus, Context, IbcEventType};

/// Helper function to run Init and Ack over `connection-0`
fn open_direct_channel(harness: &mut Harness) -> String {
    let channel_id = harness
        .open_init(&hops(&["connection-0"]), Order::Unordered)
        .expect("init");
    harness
        .open_ack(&channel_id, "channel-42", b"proof-try")
        .expect("ack");
    channel_id
}

#[test]
fn test_open_init_allocates_distinct_identifiers() {
    let mut harness = Harness::new();

    let first = harness.open_init(&hops(&["connection-0"]), Order::Unordered).unwrap();
    let second = harness.open_init(&hops(&["connection-0"]), Order::Ordered).unwrap();

    assert_eq!(first, "channel-0");
    assert_eq!(second, "channel-1");

    let channel = harness.channel(&first);
    assert_eq!(channel.state, State::Init);
    assert_eq!(channel.counterparty, Counterparty::new(PORT, ""));
    assert_eq!(channel.version, VERSION);
    assert_eq!(harness.sequences(&first), (Some(1), Some(1), Some(1)));

    // Init proves nothing about the counterparty.
    assert!(harness.connections().calls().is_empty());
}

#[test]
fn test_open_init_requires_active_client() {
    let mut harness = Harness::new();
    harness.clients().set_status("07-tendermint-0", ClientStatus::Frozen);

    let err = harness
        .open_init(&hops(&["connection-0"]), Order::Unordered)
        .unwrap_err();
    assert!(matches!(
        err,
        ChannelError::ClientNotActive {
            status: ClientStatus::Frozen,
            ..
        }
    ));
}

#[test]
fn test_open_init_unknown_connection() {
    let mut harness = Harness::new();
    let err = harness
        .open_init(&hops(&["connection-99"]), Order::Unordered)
        .unwrap_err();
    assert!(matches!(err, ChannelError::ConnectionNotFound(id) if id == "connection-99"));
}

#[test]
fn test_open_init_wrong_port_capability() {
    let mut harness = Harness::new();
    let other_port = harness.keeper.bind_port("oracle").unwrap();

    let mut ctx = Context::new(&mut harness.store);
    let err = harness
        .keeper
        .chan_open_init(&mut ctx, Order::Unordered, &hops(&["connection-0"]), PORT, &other_port)
        .unwrap_err();
    assert!(matches!(err, ChannelError::CapabilityMismatch(_)));
}

#[test]
fn test_open_try_proves_counterparty_init() {
    let mut harness = Harness::new();

    let channel_id = harness
        .open_try(&hops(&["connection-0"]), None, "channel-0", b"proof-init")
        .unwrap();

    assert_eq!(harness.state(&channel_id), State::TryOpen);
    assert_eq!(harness.sequences(&channel_id), (Some(1), Some(1), Some(1)));

    let expected = ChannelEnd::new(
        State::Init,
        Order::Unordered,
        Counterparty::new(PORT, ""),
        hops(&["connection-7"]),
        VERSION.to_string(),
    );
    assert_eq!(
        harness.connections().calls(),
        vec![VerificationCall::ChannelState {
            height: Height::new(1, 50),
            port_id: PORT.to_string(),
            channel_id: "channel-0".to_string(),
            channel: expected,
        }]
    );
}

#[test]
fn test_open_try_rejected_proof_writes_nothing() {
    let mut harness = Harness::new();
    harness.connections().set_reject_proofs(true);

    let err = harness
        .open_try(&hops(&["connection-0"]), None, "channel-0", b"proof-init")
        .unwrap_err();
    assert!(matches!(err, ChannelError::ProofVerificationFailed(_)));

    let mut ctx = Context::new(&mut harness.store);
    assert!(!ctx.registry().has_channel(PORT, "channel-0"));
    assert_eq!(ctx.registry().next_channel_sequence(), 0);
}

#[test]
fn test_open_try_retry_keeps_sequences() {
    let mut harness = Harness::new();

    let channel_id = harness
        .open_try(&hops(&["connection-0"]), None, "channel-3", b"proof-init")
        .unwrap();
    {
        let mut ctx = Context::new(&mut harness.store);
        ctx.registry().set_next_sequence_send(PORT, &channel_id, 5);
    }

    let retried = harness
        .open_try(&hops(&["connection-0"]), Some(&channel_id), "channel-3", b"proof-init")
        .unwrap();

    assert_eq!(retried, channel_id);
    assert_eq!(harness.state(&channel_id), State::TryOpen);
    assert_eq!(harness.sequences(&channel_id), (Some(5), Some(1), Some(1)));

    let mut ctx = Context::new(&mut harness.store);
    assert_eq!(ctx.registry().next_channel_sequence(), 1);
}

#[test]
fn test_open_try_retry_requires_matching_previous_channel() {
    let mut harness = Harness::new();

    let init_id = harness.open_init(&hops(&["connection-0"]), Order::Unordered).unwrap();
    let err = harness
        .open_try(&hops(&["connection-0"]), Some(&init_id), "channel-3", b"proof-init")
        .unwrap_err();
    assert!(matches!(err, ChannelError::InvalidChannelState(_)));

    let err = harness
        .open_try(&hops(&["connection-0"]), Some("channel-77"), "channel-3", b"proof-init")
        .unwrap_err();
    assert!(matches!(err, ChannelError::ChannelNotFound { .. }));
}

#[test]
fn test_open_ack_proves_counterparty_try() {
    let mut harness = Harness::new();
    let channel_id = open_direct_channel(&mut harness);

    let channel = harness.channel(&channel_id);
    assert_eq!(channel.state, State::Open);
    assert_eq!(channel.counterparty, Counterparty::new(PORT, "channel-42"));

    let expected = ChannelEnd::new(
        State::TryOpen,
        Order::Unordered,
        Counterparty::new(PORT, channel_id.as_str()),
        hops(&["connection-7"]),
        VERSION.to_string(),
    );
    assert_eq!(
        harness.connections().calls(),
        vec![VerificationCall::ChannelState {
            height: Height::new(1, 51),
            port_id: PORT.to_string(),
            channel_id: "channel-42".to_string(),
            channel: expected,
        }]
    );
}

#[test]
fn test_open_ack_requires_init_state() {
    let mut harness = Harness::new();
    let channel_id = harness
        .open_try(&hops(&["connection-0"]), None, "channel-0", b"proof-init")
        .unwrap();

    let err = harness.open_ack(&channel_id, "channel-0", b"proof-try").unwrap_err();
    assert!(matches!(err, ChannelError::InvalidChannelState(_)));
}

#[test]
fn test_open_confirm_opens_try_channel() {
    let mut harness = Harness::new();
    let channel_id = harness
        .open_try(&hops(&["connection-0"]), None, "channel-8", b"proof-init")
        .unwrap();
    harness.connections().clear_calls();

    harness.open_confirm(&channel_id, b"proof-ack").unwrap();
    assert_eq!(harness.state(&channel_id), State::Open);

    match harness.connections().calls().as_slice() {
        [VerificationCall::ChannelState { channel_id: proven, channel, .. }] => {
            assert_eq!(proven, "channel-8");
            assert_eq!(channel.state, State::Open);
            assert_eq!(channel.counterparty, Counterparty::new(PORT, channel_id.as_str()));
        }
        calls => panic!("unexpected verification calls: {:?}", calls),
    }
}

#[test]
fn test_channel_capability_mismatch() {
    let mut harness = Harness::new();
    let channel_id = harness.open_init(&hops(&["connection-0"]), Order::Unordered).unwrap();

    let port_cap = harness.port_cap;
    let mut ctx = Context::new(&mut harness.store);
    let err = harness
        .keeper
        .chan_close_init(&mut ctx, PORT, &channel_id, &port_cap)
        .unwrap_err();
    assert!(matches!(err, ChannelError::CapabilityMismatch(_)));
}

#[test]
fn test_close_init_is_terminal() {
    let mut harness = Harness::new();
    let channel_id = open_direct_channel(&mut harness);

    harness.close_init(&channel_id).unwrap();
    assert_eq!(harness.state(&channel_id), State::Closed);

    assert!(matches!(
        harness.close_init(&channel_id),
        Err(ChannelError::InvalidChannelState(_))
    ));
    assert!(matches!(
        harness.close_confirm(&channel_id, b"proof-init"),
        Err(ChannelError::InvalidChannelState(_))
    ));
    assert!(matches!(
        harness.open_ack(&channel_id, "channel-42", b"proof-try"),
        Err(ChannelError::InvalidChannelState(_))
    ));
    assert!(matches!(
        harness.open_confirm(&channel_id, b"proof-ack"),
        Err(ChannelError::InvalidChannelState(_))
    ));

    let mut reopened = harness.channel(&channel_id);
    reopened.state = State::Open;
    let mut ctx = Context::new(&mut harness.store);
    assert!(matches!(
        ctx.registry().set_channel(PORT, &channel_id, &reopened),
        Err(ChannelError::InvariantViolation(_))
    ));
}

#[test]
fn test_close_confirm_proves_counterparty_closed() {
    let mut harness = Harness::new();
    let channel_id = open_direct_channel(&mut harness);
    harness.connections().clear_calls();

    harness.close_confirm(&channel_id, b"proof-init").unwrap();
    assert_eq!(harness.state(&channel_id), State::Closed);

    let expected = ChannelEnd::new(
        State::Closed,
        Order::Unordered,
        Counterparty::new(PORT, channel_id.as_str()),
        hops(&["connection-7"]),
        VERSION.to_string(),
    );
    assert_eq!(
        harness.connections().calls(),
        vec![VerificationCall::ChannelState {
            height: Height::new(1, 53),
            port_id: PORT.to_string(),
            channel_id: "channel-42".to_string(),
            channel: expected,
        }]
    );
}

#[test]
fn test_close_frozen_requires_multihop_channel() {
    let mut harness = Harness::new();
    let channel_id = open_direct_channel(&mut harness);

    let err = harness.close_frozen(&channel_id, b"proof-frozen").unwrap_err();
    assert!(matches!(err, ChannelError::UnsupportedOperation(_)));
    assert_eq!(harness.state(&channel_id), State::Open);
}

#[test]
fn test_handshake_emits_events() {
    let mut harness = Harness::new();
    let channel_id = harness.open_init(&hops(&["connection-0"]), Order::Unordered).unwrap();

    let cap = harness.chan_cap(&channel_id);
    let mut ctx = Context::new(&mut harness.store);
    harness
        .keeper
        .chan_open_ack(&mut ctx, PORT, &channel_id, &cap, VERSION, "channel-42", b"proof", &Height::new(1, 5))
        .unwrap();
    assert!(ctx.events().is_empty());

    harness
        .keeper
        .write_open_ack_channel(&mut ctx, PORT, &channel_id, VERSION, "channel-42")
        .unwrap();
    let events = ctx.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, IbcEventType::ChannelOpenAck);
    assert_eq!(events[0].attribute("port_id"), Some("transfer"));
    assert_eq!(events[0].attribute("counterparty_channel_id"), Some("channel-42"));
}

#[test]
fn test_channel_capability_claimed_after_write() {
    let mut harness = Harness::new();
    let capability_name = host::channel_capability_name(PORT, "channel-0");

    let mut ctx = Context::new(&mut harness.store);
    let channel_id = harness
        .keeper
        .chan_open_init(&mut ctx, Order::Unordered, &hops(&["connection-0"]), PORT, &harness.port_cap)
        .unwrap();
    assert_eq!(channel_id, "channel-0");
    assert_eq!(harness.keeper.capabilities().get_capability(&capability_name), None);

    let claimed = harness.keeper.claim_channel_capability(PORT, &channel_id).unwrap();
    assert_eq!(harness.keeper.capabilities().get_capability(&capability_name), Some(claimed));
    assert_eq!(harness.keeper.claim_channel_capability(PORT, &channel_id).unwrap(), claimed);
}
