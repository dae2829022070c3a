//! End-to-end simulation runs
//!
//! Validates statistics bookkeeping over full runs, range-limited delivery
//! with explicit placements, reproducibility, and config file loading.

use crate::test_utils::*;
use std::io::Write;
use vanetsec_core::Config;
use vanetsec_sim::{SimError, Simulation};

#[test]
fn test_honest_fleet_statistics() {
    init_test_logging();
    let mut sim = Simulation::new(sim_config(10, 0, 60.0, 42)).unwrap();
    let stats = sim.run();

    assert_eq!(stats.samples().len(), 600);
    assert_eq!(stats.total_attacks_attempted(), 0);
    assert!(stats.total_sent() > 0);

    let mut sent = 0u64;
    let mut received = 0u64;
    for sample in stats.samples() {
        sent += sample.messages_sent;
        received += sample.messages_received;
        assert!(sample.messages_received <= sample.messages_sent);
        let expected = if sent == 0 {
            0.0
        } else {
            received as f64 / sent as f64
        };
        assert_eq!(sample.packet_delivery_ratio, expected);
        assert!(
            sample.mean_trust_score >= 0.9,
            "tick {} mean trust {}",
            sample.tick,
            sample.mean_trust_score
        );
    }
    assert_eq!(sent, stats.total_sent());
    assert_eq!(received, stats.total_received());
    assert_eq!(
        stats.packet_delivery_ratio(),
        received as f64 / sent as f64
    );
}

#[test]
fn test_hello_delivered_only_within_range() {
    let mut config = sim_config(3, 0, 1.0, 1);
    config.simulation.traffic.data_rate = 0.0;
    let placements = vec![
        placement(100.0, 100.0, 30.0),
        placement(150.0, 100.0, 30.0),
        placement(100.0, 350.0, 30.0),
    ];
    let mut sim = Simulation::with_placements(config, placements).unwrap();
    sim.step();

    let near = sim.router("vehicle_0").unwrap();
    assert!(near.neighbors().contains("vehicle_1"));
    assert!(!near.neighbors().contains("vehicle_2"));
    assert!(sim.router("vehicle_1").unwrap().neighbors().contains("vehicle_0"));
    assert!(sim.router("vehicle_2").unwrap().neighbors().is_empty());

    let sample = sim.stats().last().unwrap();
    assert_eq!(sample.messages_sent, 2);
    assert_eq!(sample.messages_received, 2);
    assert_eq!(sample.packet_delivery_ratio, 1.0);
    assert_eq!(sample.mean_trust_score, 1.0);
}

#[test]
fn test_runs_reproducible_per_seed() {
    let mut first = Simulation::new(sim_config(12, 2, 5.0, 99)).unwrap();
    let mut second = Simulation::new(sim_config(12, 2, 5.0, 99)).unwrap();
    let mut other = Simulation::new(sim_config(12, 2, 5.0, 100)).unwrap();
    first.run();
    second.run();
    other.run();

    assert_eq!(first.stats().samples(), second.stats().samples());
    assert_eq!(first.snapshot(), second.snapshot());
    assert_ne!(first.snapshot(), other.snapshot());
}

#[test]
fn test_snapshot_marks_malicious_and_stays_in_area() {
    let mut sim = Simulation::new(sim_config(6, 2, 3.0, 8)).unwrap();
    sim.run();

    let snapshot = sim.snapshot();
    assert_eq!(snapshot.len(), 6);
    assert_eq!(snapshot.iter().filter(|n| n.is_malicious).count(), 2);
    for node in &snapshot {
        assert!((0.0..=1000.0).contains(&node.position.x));
        assert!((0.0..=1000.0).contains(&node.position.y));
        assert_eq!(node.position.timestamp, 3_000);
    }
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"is_malicious\":true"));
}

#[test]
fn test_config_file_drives_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[simulation]
num_vehicles = 4
num_malicious = 1
sim_time_secs = 1.0
seed = 7

[simulation.adversary]
sybil_identities = 1

[protocol]
trust_threshold = 0.6
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.protocol.trust_threshold, 0.6);
    assert_eq!(config.simulation.area_size, 1000.0);

    let mut sim = Simulation::new(config).unwrap();
    assert_eq!(sim.run().samples().len(), 10);
    assert!(sim.vehicles()[3].adversary().unwrap().sybil_ids().count() == 1);
}

#[test]
fn test_invalid_config_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[simulation]\nnum_vehicles = 2\nnum_malicious = 3").unwrap();
    assert!(Config::from_file(file.path()).is_err());

    let mut config = sim_config(2, 0, 1.0, 1);
    config.simulation.tick_secs = 0.0;
    assert!(matches!(Simulation::new(config), Err(SimError::Config(_))));
}
