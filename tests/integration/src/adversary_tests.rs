//! Adversary models against honest fleets
//!
//! Each scenario enables one attack in isolation on a small, dense area so
//! that every honest vehicle hears the attacker most of the time.

use crate::test_utils::*;
use vanetsec_core::{AdversaryConfig, Config};
use vanetsec_sim::{sybil_id, vehicle_id, Simulation};

/// Every rate off; scenarios switch on what they test.
fn quiet() -> AdversaryConfig {
    AdversaryConfig {
        falsification_rate: 0.0,
        drop_rate: 0.0,
        replay_rate: 0.0,
        tamper_rate: 0.0,
        black_hole: false,
        sybil_identities: 0,
    }
}

fn dense(vehicles: usize, malicious: usize, adversary: AdversaryConfig) -> Config {
    let mut config = sim_config(vehicles, malicious, 10.0, 5);
    config.simulation.area_size = 150.0;
    config.simulation.adversary = adversary;
    config
}

fn honest_ids(sim: &Simulation) -> Vec<String> {
    sim.vehicles()
        .iter()
        .filter(|v| !v.is_malicious())
        .map(|v| v.id().to_string())
        .collect()
}

#[test]
fn test_replay_and_tamper_rejected() {
    init_test_logging();
    let adversary = AdversaryConfig {
        replay_rate: 1.0,
        tamper_rate: 1.0,
        ..quiet()
    };
    let mut sim = Simulation::new(dense(6, 1, adversary)).unwrap();
    sim.run();

    let stats = sim.stats();
    assert!(stats.total_attacks_attempted() > 0);
    assert!(stats.total_attacks_detected() > 0);

    let rejected: u64 = honest_ids(&sim)
        .iter()
        .map(|id| sim.router(id).unwrap().metrics().auth_failures)
        .sum();
    assert!(rejected > 0);

    // Forged copies never frame the vehicles they were captured from
    for observer in honest_ids(&sim) {
        for subject in honest_ids(&sim) {
            if observer != subject {
                let router = sim.router(&observer).unwrap();
                assert!(!router.suspicion(&subject).position_falsified);
            }
        }
    }
}

#[test]
fn test_falsified_positions_quarantine_attacker() {
    let adversary = AdversaryConfig {
        falsification_rate: 1.0,
        ..quiet()
    };
    let mut sim = Simulation::new(dense(5, 1, adversary)).unwrap();
    sim.run();

    let attacker = vehicle_id(4);
    let quarantined = honest_ids(&sim)
        .iter()
        .filter(|id| sim.trust_score(id, &attacker).unwrap() < 0.5)
        .count();
    assert!(quarantined > 0);
    assert!(sim.stats().total_attacks_detected() > 0);
}

#[test]
fn test_sybil_identities_flagged() {
    let adversary = AdversaryConfig {
        sybil_identities: 2,
        ..quiet()
    };
    let mut sim = Simulation::new(dense(5, 1, adversary)).unwrap();
    sim.run();

    let fake = sybil_id(4, 0);
    let flagged = honest_ids(&sim)
        .iter()
        .filter(|id| sim.router(id).unwrap().suspicion(&fake).sybil)
        .count();
    assert!(flagged > 0);

    // Fabricated identities are not vehicles
    assert!(sim.router(&fake).is_none());
    assert_eq!(sim.vehicles().len(), 5);
}

#[test]
fn test_silent_attacker_never_becomes_neighbor() {
    let adversary = AdversaryConfig {
        drop_rate: 1.0,
        ..quiet()
    };
    let mut sim = Simulation::new(dense(4, 1, adversary)).unwrap();
    sim.run();

    let attacker = vehicle_id(3);
    for id in honest_ids(&sim) {
        assert!(!sim.router(&id).unwrap().neighbors().contains(&attacker));
    }
    assert!(sim.router(&attacker).unwrap().neighbors().is_empty());
}
