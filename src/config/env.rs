use std::env;

use super::types::{Config, OracleType};

pub(super) fn apply_env(config: &mut Config) {
    apply_env_from(config, |key| env::var(key).ok());
}

/// Apply `BEAMSWARM_*` overrides fetched through `lookup`.
///
/// Values that fail to parse are ignored.
pub(super) fn apply_env_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(n) = lookup("BEAMSWARM_ROBOTS").and_then(|v| v.parse().ok()) {
        config.agents_count = n;
    }
    if let Some(n) = lookup("BEAMSWARM_WALKERS").and_then(|v| v.parse().ok()) {
        config.agents_walkers = n;
    }
    if let Some(n) = lookup("BEAMSWARM_TIMESTEPS").and_then(|v| v.parse().ok()) {
        config.timesteps = n;
    }
    if let Some(seed) = lookup("BEAMSWARM_SEED").and_then(|v| v.parse().ok()) {
        config.seed = Some(seed);
    }
    if let Some(oracle) = lookup("BEAMSWARM_ORACLE").and_then(|v| OracleType::parse(&v)) {
        config.oracle = oracle;
    }
    if let Some(dir) = lookup("BEAMSWARM_OUTPUT_DIR") {
        config.output_dir = dir;
    }
    if let Some(length) = lookup("BEAMSWARM_BEAM_LENGTH").and_then(|v| v.parse().ok()) {
        config.beam_length = length;
    }
    if let Some(step) = lookup("BEAMSWARM_STEP_LENGTH").and_then(|v| v.parse().ok()) {
        config.step_length = step;
    }
}
