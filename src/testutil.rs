//! Test utilities for beamswarm.
//!
//! Small worlds, ready-made agents and a helper for tests that need to
//! change the current working directory. Since Rust's test runner executes
//! tests in parallel, directory changes are serialized through a global
//! mutex.

#[cfg(test)]
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(test)]
use tempfile::TempDir;

use crate::agent::{create_strategy, Agent, StrategyKind};
use crate::beam::BeamId;
use crate::config::Config;
use crate::geometry::{coord, Coord};
use crate::structure::Structure;

/// A 10 x 10 x 10 domain with unit cells, home in one corner and the
/// construction site in the middle.
pub fn small_config() -> Config {
    Config {
        domain_size: coord(10.0, 10.0, 10.0),
        domain_cells: [10, 10, 10],
        home_location: coord(0.0, 0.0, 0.0),
        home_size: coord(2.0, 2.0, 0.0),
        site_location: coord(4.0, 4.0, 0.0),
        site_size: coord(2.0, 2.0, 0.0),
        agents_count: 3,
        timesteps: 5,
        seed: Some(7),
        ..Config::default()
    }
}

/// A builder standing at `location` with a fixed seed.
pub fn agent_at(location: Coord) -> Agent {
    Agent::new(
        "Aaron",
        location,
        create_strategy(StrategyKind::Builder),
        StdRng::seed_from_u64(1),
        &small_config(),
    )
}

/// A walker standing at `location` with a fixed seed.
pub fn walker_at(location: Coord) -> Agent {
    Agent::new(
        "Betty",
        location,
        create_strategy(StrategyKind::Walker),
        StdRng::seed_from_u64(2),
        &small_config(),
    )
}

/// A structure holding `segments`, numbered from `B0` in order.
///
/// # Panics
///
/// Panics if a segment cannot be indexed.
pub fn structure_with(config: &Config, segments: &[(Coord, Coord)]) -> Structure {
    let mut structure = Structure::new(config);
    for (n, (p1, p2)) in segments.iter().enumerate() {
        let cells = structure.add_beam(*p1, *p2, BeamId(n as u64));
        assert!(cells > 0, "segment {} could not be indexed", n);
    }
    structure
}

/// Global mutex for tests that change the current working directory.
#[cfg(test)]
pub static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Execute a closure in a fresh temporary directory, returning to the
/// original directory afterward.
///
/// # Panics
///
/// Panics if the current directory cannot be determined, the temp directory
/// cannot be created, or the directory changes fail.
#[cfg(test)]
pub fn with_temp_cwd<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let original = std::env::current_dir().expect("failed to get current directory");
    let temp = TempDir::new().expect("failed to create temp directory");
    std::env::set_current_dir(temp.path()).expect("failed to change to temp directory");
    let result = f();
    std::env::set_current_dir(original).expect("failed to restore original directory");
    result
}
