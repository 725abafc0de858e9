use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::geometry::Coord;

use super::types::{Config, ConfigError, OracleType};

/// On-disk layout of beamswarm.toml. Every key is optional; missing keys
/// keep their defaults and unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    epsilon: Option<f64>,
    domain: DomainSection,
    beam: BeamSection,
    agents: AgentsSection,
    sites: SitesSection,
    analysis: AnalysisSection,
    run: RunSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DomainSection {
    size: Option<[f64; 3]>,
    cells: Option<[usize; 3]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BeamSection {
    length: Option<f64>,
    weight: Option<f64>,
    angle_constraint: Option<f64>,
    vertical_dir: Option<[f64; 3]>,
    vertical_probability: Option<f64>,
    beam_limit: Option<f64>,
    joint_limit: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentsSection {
    count: Option<usize>,
    walkers: Option<usize>,
    weight: Option<f64>,
    step_length: Option<f64>,
    capacity: Option<u32>,
    local_radius: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SitesSection {
    home: Option<[f64; 3]>,
    home_size: Option<[f64; 3]>,
    construction: Option<[f64; 3]>,
    construction_size: Option<[f64; 3]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisSection {
    oracle: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunSection {
    timesteps: Option<usize>,
    seed: Option<u64>,
    output_dir: Option<String>,
    report_every: Option<usize>,
}

pub(super) fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(&path).map_err(|e| {
        ConfigError::Io(format!("{}: {}", path.as_ref().display(), e))
    })?;
    parse_toml(&content)
}

pub(super) fn parse_toml(content: &str) -> Result<Config, ConfigError> {
    let file: FileConfig =
        ::toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let mut config = Config::default();

    set(&mut config.epsilon, file.epsilon);

    set_coord(&mut config.domain_size, file.domain.size);
    set(&mut config.domain_cells, file.domain.cells);

    let beam = file.beam;
    set(&mut config.beam_length, beam.length);
    set(&mut config.beam_weight, beam.weight);
    set(&mut config.angle_constraint, beam.angle_constraint);
    set_coord(&mut config.vertical_dir, beam.vertical_dir);
    set(&mut config.vertical_probability, beam.vertical_probability);
    set(&mut config.beam_limit, beam.beam_limit);
    set(&mut config.joint_limit, beam.joint_limit);

    let agents = file.agents;
    set(&mut config.agents_count, agents.count);
    set(&mut config.agents_walkers, agents.walkers);
    set(&mut config.agents_weight, agents.weight);
    set(&mut config.step_length, agents.step_length);
    set(&mut config.beam_capacity, agents.capacity);
    set(&mut config.local_radius, agents.local_radius);

    let sites = file.sites;
    set_coord(&mut config.home_location, sites.home);
    set_coord(&mut config.home_size, sites.home_size);
    set_coord(&mut config.site_location, sites.construction);
    set_coord(&mut config.site_size, sites.construction_size);

    if let Some(oracle) = file.analysis.oracle {
        config.oracle = OracleType::parse(&oracle)
            .ok_or_else(|| ConfigError::Parse(format!("invalid analysis.oracle: {}", oracle)))?;
    }

    let run = file.run;
    set(&mut config.timesteps, run.timesteps);
    if run.seed.is_some() {
        config.seed = run.seed;
    }
    set(&mut config.output_dir, run.output_dir);
    set(&mut config.report_every, run.report_every);

    Ok(config)
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn set_coord(field: &mut Coord, value: Option<[f64; 3]>) {
    if let Some([x, y, z]) = value {
        *field = Coord::new(x, y, z);
    }
}
