// Virtual channel tests: proof bypass between two virtual hops and the
// pending sub-states entered over a virtual first hop

mod common;

use common::{frozen_client_proof, hops, middle_connection, two_hop_proof, Harness, PORT};
use vibc_channel::channel::{Height, Order, State};
use vibc_channel::testing::VerificationCall;
use vibc_channel::{ChannelError, Context, IbcEventType};

const GARBAGE: &[u8] = b"not a proof";

/// Helper function to open the `connection-1`/`connection-2` pair from our side
fn open_virtual_channel(harness: &mut Harness) -> String {
    let channel_id = harness
        .open_init(&hops(&["connection-1", "connection-2"]), Order::Unordered)
        .expect("init");
    harness.open_ack(&channel_id, "channel-9", GARBAGE).expect("ack");
    assert_eq!(harness.resolve(&channel_id).expect("resolve"), State::Open);
    channel_id
}

#[test]
fn test_virtual_end_to_end_skips_every_proof() {
    let mut harness = Harness::new();
    harness.connections().set_reject_proofs(true);
    let virtual_hops = hops(&["connection-1", "connection-2"]);

    // Init, Ack
    let initiated = harness.open_init(&virtual_hops, Order::Unordered).unwrap();
    assert_eq!(harness.state(&initiated), State::Init);
    harness.open_ack(&initiated, "channel-9", GARBAGE).unwrap();
    assert_eq!(harness.state(&initiated), State::AckPending);
    assert_eq!(harness.resolve(&initiated).unwrap(), State::Open);

    // Try, Confirm
    let responded = harness.open_try(&virtual_hops, None, "channel-4", GARBAGE).unwrap();
    assert_eq!(harness.state(&responded), State::TryPending);
    assert_eq!(harness.resolve(&responded).unwrap(), State::TryOpen);
    harness.open_confirm(&responded, GARBAGE).unwrap();
    assert_eq!(harness.state(&responded), State::ConfirmPending);
    assert_eq!(harness.resolve(&responded).unwrap(), State::Open);

    // CloseInit, CloseConfirm
    harness.close_init(&initiated).unwrap();
    assert_eq!(harness.state(&initiated), State::Closed);
    harness.close_confirm(&responded, GARBAGE).unwrap();
    assert_eq!(harness.state(&responded), State::CloseConfirmPending);
    assert_eq!(harness.resolve(&responded).unwrap(), State::Closed);

    assert!(harness.connections().calls().is_empty());
}

#[test]
fn test_pending_try_must_resolve_before_confirm() {
    let mut harness = Harness::new();
    let channel_id = harness
        .open_try(&hops(&["connection-1", "connection-2"]), None, "channel-4", GARBAGE)
        .unwrap();

    let err = harness.open_confirm(&channel_id, GARBAGE).unwrap_err();
    assert!(matches!(err, ChannelError::InvalidChannelState(_)));
    assert_eq!(harness.state(&channel_id), State::TryPending);
}

#[test]
fn test_resolve_requires_pending_state() {
    let mut harness = Harness::new();
    let channel_id = harness
        .open_init(&hops(&["connection-0"]), Order::Unordered)
        .unwrap();

    let err = harness.resolve(&channel_id).unwrap_err();
    assert!(matches!(err, ChannelError::InvalidChannelState(_)));
    assert_eq!(harness.state(&channel_id), State::Init);
}

#[test]
fn test_resolve_pending_emits_final_event() {
    let mut harness = Harness::new();
    let channel_id = harness
        .open_try(&hops(&["connection-1", "connection-2"]), None, "channel-4", GARBAGE)
        .unwrap();

    let cap = harness.chan_cap(&channel_id);
    let mut ctx = Context::new(&mut harness.store);
    harness
        .keeper
        .resolve_pending_channel(&mut ctx, PORT, &channel_id, &cap)
        .unwrap();
    let events = ctx.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, IbcEventType::ChannelOpenTry);
}

#[test]
fn test_single_virtual_hop_still_verifies() {
    let mut harness = Harness::new();

    let channel_id = harness
        .open_try(&hops(&["connection-1"]), None, "channel-4", b"proof-init")
        .unwrap();
    assert_eq!(harness.state(&channel_id), State::TryPending);

    match harness.connections().calls().as_slice() {
        [VerificationCall::ChannelState { channel, .. }] => {
            assert_eq!(channel.connection_hops, hops(&["connection-5"]));
            assert_eq!(channel.state, State::Init);
        }
        calls => panic!("unexpected verification calls: {:?}", calls),
    }

    harness.connections().set_reject_proofs(true);
    let err = harness
        .open_try(&hops(&["connection-1"]), None, "channel-5", b"proof-init")
        .unwrap_err();
    assert!(matches!(err, ChannelError::ProofVerificationFailed(_)));
}

#[test]
fn test_virtual_first_hop_over_regular_path_is_proven() {
    let mut harness = Harness::new();
    let path = hops(&["connection-1", "connection-3"]);
    let proof = two_hop_proof(&middle_connection(), Vec::new());

    let channel_id = harness.open_try(&path, None, "channel-4", &proof).unwrap();
    assert_eq!(harness.state(&channel_id), State::TryPending);

    match harness.connections().calls().as_slice() {
        [VerificationCall::MultihopMembership { connection_hops, key, .. }] => {
            assert_eq!(connection_hops, &path);
            assert_eq!(key, "channels/ports/transfer/channels/channel-4");
        }
        calls => panic!("unexpected verification calls: {:?}", calls),
    }
}

#[test]
fn test_close_frozen_is_never_bypassed() {
    let mut harness = Harness::new();
    let channel_id = open_virtual_channel(&mut harness);
    assert!(harness.connections().calls().is_empty());

    let healthy = frozen_client_proof(Height::zero());
    let err = harness.close_frozen(&channel_id, &healthy).unwrap_err();
    assert!(matches!(err, ChannelError::ProofVerificationFailed(_)));
    assert_eq!(harness.state(&channel_id), State::Open);

    harness.close_frozen(&channel_id, &frozen_client_proof(Height::new(1, 7))).unwrap();
    assert_eq!(harness.state(&channel_id), State::Frozen);
    assert_eq!(harness.connections().calls().len(), 1);
}
