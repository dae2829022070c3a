//! Trust scenarios across live routers
//!
//! # Test Scenarios
//!
//! 1. **Falsified Position**: a neighbor reporting a teleport is quarantined,
//!    then recovers through consistent beacons
//! 2. **Sybil Cluster**: two identities beaconing from one spot are both
//!    penalized while a distant honest neighbor is not
//! 3. **Black Hole Isolation**: a node swallowing relayed traffic loses
//!    trust and its later route replies are ignored

use crate::test_utils::*;
use vanetsec_core::{Position, Timestamp};
use vanetsec_crypto::MessageAuthenticator;
use vanetsec_mesh::{Beacon, RoutingMessage, SecureRouter};
use vanetsec_sim::BlackHole;
use vanetsec_trust_mesh::TrustLevel;

/// Refresh the router's position timestamp in place, then beacon.
fn beacon_at(router: &mut SecureRouter, now: Timestamp) {
    let here = *router.position();
    router
        .update_position(Position::new(here.x, here.y, here.z, now))
        .unwrap();
    router.send_beacon(now).unwrap();
}

fn sybil_beacon(sybil: &mut MessageAuthenticator, x: f64, now: Timestamp) -> Vec<u8> {
    let beacon = Beacon {
        id: sybil.node_id().to_string(),
        position: Position::new(x, 0.0, 0.0, now),
        speed_kmh: 0.0,
        heading: 0.0,
    };
    let payload = RoutingMessage::Hello(beacon).encode().unwrap();
    sybil
        .create_secure_message(payload, now)
        .unwrap()
        .to_bytes()
        .unwrap()
}

#[test]
fn test_falsified_position_quarantines_then_recovers() {
    init_test_logging();
    let mut a = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut b = router_at("vehicle_b", 50.0, 0.0, 2);

    beacon_at(&mut a, 1_000);
    broadcast(&mut a, &mut [&mut b], 1_000);
    assert_eq!(b.trust_level("vehicle_a"), TrustLevel::Healthy);

    let mut lie = a.beacon();
    lie.position = Position::new(900.0, 0.0, 0.0, 2_000);
    a.emit(&RoutingMessage::Hello(lie), 2_000).unwrap();
    broadcast(&mut a, &mut [&mut b], 2_000);

    assert!(b.suspicion("vehicle_a").position_falsified);
    assert!((b.trust_score("vehicle_a") - 0.35).abs() < 1e-9);
    assert_eq!(b.trust_level("vehicle_a"), TrustLevel::Quarantined);
    assert_eq!(b.metrics().attacks_detected, 1);

    // The lie was never adopted, so the true position is still consistent
    beacon_at(&mut a, 3_000);
    broadcast(&mut a, &mut [&mut b], 3_000);
    assert!(!b.suspicion("vehicle_a").position_falsified);
    assert!((b.trust_score("vehicle_a") - 0.79).abs() < 1e-9);
    assert_eq!(b.trust_level("vehicle_a"), TrustLevel::Suspect);

    for now in [4_000, 5_000, 6_000] {
        beacon_at(&mut a, now);
        broadcast(&mut a, &mut [&mut b], now);
    }
    assert!(b.trust_score("vehicle_a") > 0.9);
    assert_eq!(b.trust_level("vehicle_a"), TrustLevel::Healthy);
}

#[test]
fn test_sybil_cluster_penalized() {
    let mut attacker = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut sybil = authenticator("vehicle_a_sybil_0", 11);
    let mut honest = router_at("vehicle_c", 80.0, 0.0, 3);
    let mut observer = router_at("vehicle_b", 40.0, 0.0, 2);

    for round in 1..=3u64 {
        let now = round * 1_000;
        beacon_at(&mut attacker, now);
        beacon_at(&mut honest, now);
        broadcast(&mut attacker, &mut [&mut observer], now);
        broadcast(&mut honest, &mut [&mut observer], now);
        assert!(observer.receive_message(&sybil_beacon(&mut sybil, 0.4, now), now));
    }

    assert!(observer.suspicion("vehicle_a").sybil);
    assert!(observer.suspicion("vehicle_a_sybil_0").sybil);
    assert!(!observer.suspicion("vehicle_c").sybil);
    assert_eq!(observer.trust_score("vehicle_a"), 0.5);
    assert_eq!(observer.trust_level("vehicle_a_sybil_0"), TrustLevel::Suspect);
    assert_eq!(observer.trust_score("vehicle_c"), 1.0);
    assert_eq!(observer.metrics().attacks_detected, 2);
}

#[test]
fn test_black_hole_isolated_and_bypassed() {
    let mut a = router_at("vehicle_a", 0.0, 0.0, 1);
    let mut hole = router_at("vehicle_h", 100.0, 0.0, 2).with_behavior(Box::new(BlackHole));
    let mut c = router_at("vehicle_c", 120.0, 0.0, 3);
    let mut d = router_at("vehicle_d", 250.0, 0.0, 4);

    // The black hole claims a one-hop route to everything
    for destination in ["vehicle_x", "vehicle_y", "vehicle_z"] {
        a.find_route(destination, 100).unwrap();
    }
    broadcast(&mut a, &mut [&mut hole], 100);
    assert_eq!(broadcast(&mut hole, &mut [&mut a], 200), 3);
    assert_eq!(hole.metrics().replies_overridden, 3);

    a.send_data("vehicle_x", b"one".to_vec(), 300).unwrap();
    a.send_data("vehicle_y", b"two".to_vec(), 300).unwrap();
    broadcast(&mut a, &mut [&mut hole], 300);
    assert_eq!(hole.metrics().relays_withheld, 2);
    assert!(hole.outbox().is_empty());

    a.prune(2_300);
    assert!(a.suspicion("vehicle_h").black_hole);
    assert!(!a.is_trusted("vehicle_h"));
    assert_eq!(a.trust_level("vehicle_h"), TrustLevel::Quarantined);

    // C is next to D and answers honestly; the hole's reply is ignored
    beacon_at(&mut d, 2_300);
    broadcast(&mut d, &mut [&mut c], 2_300);
    a.find_route("vehicle_d", 2_400).unwrap();
    broadcast(&mut a, &mut [&mut hole, &mut c], 2_400);
    broadcast(&mut hole, &mut [&mut a], 2_500);
    broadcast(&mut c, &mut [&mut a], 2_500);

    let route = a.routes().lookup("vehicle_d", 2_500).unwrap();
    assert_eq!(route.next_hop, "vehicle_c");
    assert_eq!(route.hop_count, 2);

    a.send_data("vehicle_d", b"three".to_vec(), 2_600).unwrap();
    broadcast(&mut a, &mut [&mut hole, &mut c], 2_600);
    broadcast(&mut c, &mut [&mut a, &mut d], 2_700);

    let delivered = d.drain_delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload, b"three".to_vec());
    assert_eq!(a.forwarding().record("vehicle_c").unwrap().confirmed, 1);
}
