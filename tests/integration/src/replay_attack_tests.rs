//! Replay and forgery tests
//!
//! Frames captured from live routers are replayed, tampered with or
//! re-signed, and must be rejected before any routing or trust state moves.

use crate::test_utils::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use vanetsec_crypto::{AuthenticatorConfig, MacKey, MessageAuthenticator, SecureMessage};
use vanetsec_mesh::{RoutingMessage, SecureRouter};

fn beacon_frame(router: &mut SecureRouter, now: u64) -> Vec<u8> {
    router.send_beacon(now).unwrap();
    router.drain_outbox().remove(0)
}

#[test]
fn test_replayed_beacon_rejected() {
    init_test_logging();
    let mut a = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut b = router_at("vehicle_b", 50.0, 0.0, 2);

    let frame = beacon_frame(&mut a, 100);
    assert!(b.receive_message(&frame, 100));
    assert_eq!(b.neighbors().get("vehicle_a").unwrap().last_seen, 100);

    // Same frame one second later, well inside the freshness tolerance
    assert!(!b.receive_message(&frame, 1_100));
    assert_eq!(b.authenticator().metrics().replays, 1);
    assert_eq!(b.neighbors().get("vehicle_a").unwrap().last_seen, 100);
    assert_eq!(b.trust_score("vehicle_a"), 1.0);
}

#[test]
fn test_stale_frame_rejected_before_replay_check() {
    let mut a = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut b = router_at("vehicle_b", 50.0, 0.0, 2);

    let frame = beacon_frame(&mut a, 100);
    assert!(!b.receive_message(&frame, 5_101));

    let metrics = b.authenticator().metrics();
    assert_eq!(metrics.stale, 1);
    assert_eq!(metrics.replays, 0);
    assert!(b.neighbors().is_empty());

    // Exactly at the tolerance boundary the frame is still fresh
    let mut c = router_at("vehicle_c", 60.0, 0.0, 3);
    assert!(c.receive_message(&frame, 5_100));
}

#[test]
fn test_out_of_order_sequence_rejected() {
    let mut a = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut b = router_at("vehicle_b", 50.0, 0.0, 2);

    a.send_beacon(100).unwrap();
    a.send_beacon(200).unwrap();
    let frames = a.drain_outbox();

    assert!(b.receive_message(&frames[1], 200));
    assert!(!b.receive_message(&frames[0], 200));
    assert_eq!(b.authenticator().metrics().replays, 1);
}

#[test]
fn test_tampered_payload_rejected_and_original_still_accepted() {
    let mut a = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut b = router_at("vehicle_b", 50.0, 0.0, 2);

    let frame = beacon_frame(&mut a, 100);
    let mut tampered = SecureMessage::from_bytes(&frame).unwrap();
    let last = tampered.payload.len() - 2;
    tampered.payload[last] ^= 0x01;

    assert!(!b.receive_message(&tampered.to_bytes().unwrap(), 100));
    assert_eq!(b.authenticator().metrics().bad_signature, 1);

    // A rejected copy does not poison the replay window
    assert!(b.receive_message(&frame, 100));
}

#[test]
fn test_forged_sender_cannot_frame_honest_node() {
    let mut a = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut b = router_at("vehicle_b", 50.0, 0.0, 2);
    let attacker = authenticator("vehicle_x", 9);

    // Re-sign a captured beacon with a teleporting position
    let frame = beacon_frame(&mut a, 100);
    let mut forged = SecureMessage::from_bytes(&frame).unwrap();
    let mut beacon = a.beacon();
    beacon.position.x = 900.0;
    forged.payload = RoutingMessage::Hello(beacon).encode().unwrap();
    forged.signature = attacker.sign(&forged.signed_blob());

    assert!(!b.receive_message(&forged.to_bytes().unwrap(), 100));
    assert_eq!(b.authenticator().metrics().bad_signature, 1);
    assert!(b.neighbors().is_empty());
    assert_eq!(b.trust_score("vehicle_a"), 1.0);

    // Claiming the identity under the attacker's own certificate fails too
    let mut impostor = attacker;
    let mut envelope = impostor
        .create_secure_message(forged.payload.clone(), 200)
        .unwrap();
    envelope.sender = "vehicle_a".to_string();
    assert!(!b.receive_message(&envelope.to_bytes().unwrap(), 200));
    assert_eq!(b.authenticator().metrics().certificate_invalid, 1);
}

#[test]
fn test_expired_certificate_rejected() {
    let config = AuthenticatorConfig {
        certificate_lifetime_ms: 1_000,
        ..AuthenticatorConfig::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut auth = MessageAuthenticator::new("vehicle_a", config, &mut rng);
    auth.issue_certificate(0);
    let mut a = router_with(auth, 0.0, 0.0);
    let mut b = router_at("vehicle_b", 50.0, 0.0, 2);

    let fresh = beacon_frame(&mut a, 1_000);
    assert!(b.receive_message(&fresh, 1_000));

    let late = beacon_frame(&mut a, 2_000);
    assert!(!b.receive_message(&late, 2_000));
    assert_eq!(b.authenticator().metrics().certificate_invalid, 1);
}

#[test]
fn test_group_mac_excludes_outsiders() {
    let key = MacKey::derive("vanetsec group key v1", b"fleet-1");
    let mut member = router_with(group_authenticator("vehicle_a", 1, &key), 0.0, 0.0);
    let mut receiver = router_with(group_authenticator("vehicle_b", 2, &key), 50.0, 0.0);
    let mut outsider = router_at("vehicle_x", 20.0, 0.0, 9);

    outsider.send_beacon(100).unwrap();
    assert_eq!(broadcast(&mut outsider, &mut [&mut receiver], 100), 0);
    assert_eq!(receiver.authenticator().metrics().bad_mac, 1);

    member.send_beacon(100).unwrap();
    assert_eq!(broadcast(&mut member, &mut [&mut receiver], 100), 1);
    assert!(receiver.neighbors().contains("vehicle_a"));
    assert!(!receiver.neighbors().contains("vehicle_x"));
}

