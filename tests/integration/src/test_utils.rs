//! Shared fixtures for scenario tests

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;
use vanetsec_core::{Config, MotionState, Position, SimulationConfig, Timestamp};
use vanetsec_crypto::{AuthenticatorConfig, MacKey, MessageAuthenticator};
use vanetsec_mesh::{RouterConfig, SecureRouter};
use vanetsec_sim::Placement;

/// Route test output through the harness so it only shows on failure.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Authenticator with a certificate issued at time zero.
pub fn authenticator(id: &str, seed: u64) -> MessageAuthenticator {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut auth = MessageAuthenticator::new(id, AuthenticatorConfig::default(), &mut rng);
    auth.issue_certificate(0);
    auth
}

/// Authenticator sharing `group_key` with its peers.
pub fn group_authenticator(id: &str, seed: u64, group_key: &MacKey) -> MessageAuthenticator {
    authenticator(id, seed).with_group_key(group_key.clone())
}

/// Stationary router at `(x, y)`.
pub fn router_at(id: &str, x: f64, y: f64, seed: u64) -> SecureRouter {
    router_with(authenticator(id, seed), x, y)
}

pub fn router_with(auth: MessageAuthenticator, x: f64, y: f64) -> SecureRouter {
    SecureRouter::new(
        auth,
        MotionState::new(Position::new(x, y, 0.0, 0), 0.0),
        RouterConfig::default(),
    )
}

/// Broadcast everything `from` has queued to `receivers`. Returns the
/// number of accepted deliveries.
pub fn broadcast(
    from: &mut SecureRouter,
    receivers: &mut [&mut SecureRouter],
    now: Timestamp,
) -> usize {
    let frames = from.drain_outbox();
    let mut accepted = 0;
    for receiver in receivers.iter_mut() {
        for frame in &frames {
            if receiver.receive_message(frame, now) {
                accepted += 1;
            }
        }
    }
    accepted
}

/// Simulation config with the given fleet and duration, other values default.
pub fn sim_config(vehicles: usize, malicious: usize, secs: f64, seed: u64) -> Config {
    Config {
        simulation: SimulationConfig {
            num_vehicles: vehicles,
            num_malicious: malicious,
            sim_time_secs: secs,
            seed,
            ..SimulationConfig::default()
        },
        ..Config::default()
    }
}

/// Placement at `(x, y)` heading along +x.
pub fn placement(x: f64, y: f64, speed_kmh: f64) -> Placement {
    Placement {
        x,
        y,
        speed_kmh,
        heading: 0.0,
    }
}
