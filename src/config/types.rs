use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{coord, Coord};

use super::cli::CliArgs;
use super::{env, toml};

/// Structural analysis backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleType {
    /// In-process cantilever estimate.
    #[default]
    Stub,
    /// No analysis; agents never filter on feasibility.
    None,
}

impl OracleType {
    /// Parse oracle type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stub" => Some(Self::Stub),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::None => "none",
        }
    }
}

/// Default probability that a fallback beam goes up exactly vertical.
pub const DEFAULT_VERTICAL_PROBABILITY: f64 = 1.0 / 11.0;

/// Simulation configuration.
///
/// Built once before a run and passed by reference to every component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Extent of the build volume along x, y and z (origin at the corner).
    pub domain_size: Coord,
    /// Number of index cells along x, y and z.
    pub domain_cells: [usize; 3],
    /// Distance below which two coordinates are the same coordinate.
    pub epsilon: f64,
    /// Length of every beam.
    pub beam_length: f64,
    /// Load contributed by one carried or placed beam.
    pub beam_weight: f64,
    /// Maximum angle from vertical (degrees) for a connecting beam.
    pub angle_constraint: f64,
    /// Direction of a default (unconnected) beam.
    pub vertical_dir: Coord,
    /// Probability that a default beam is placed exactly along `vertical_dir`.
    pub vertical_probability: f64,
    /// Moment at or above which a member is considered broken.
    pub beam_limit: f64,
    /// Moment at or above which a joint crossing is considered broken.
    pub joint_limit: f64,
    /// Number of building agents.
    pub agents_count: usize,
    /// Number of non-building agents added after the builders.
    pub agents_walkers: usize,
    /// Load of an agent without beams.
    pub agents_weight: f64,
    /// Distance an agent covers in one tick.
    pub step_length: f64,
    /// Beams picked up per trip home.
    pub beam_capacity: u32,
    /// How far an agent senses structure around itself.
    pub local_radius: f64,
    /// Corner of the home (pickup) area.
    pub home_location: Coord,
    /// Extent of the home area.
    pub home_size: Coord,
    /// Corner of the construction site footprint.
    pub site_location: Coord,
    /// Extent of the construction site footprint.
    pub site_size: Coord,
    /// Structural analysis backend.
    pub oracle: OracleType,
    /// Ticks to run.
    pub timesteps: usize,
    /// Seed for reproducible runs.
    pub seed: Option<u64>,
    /// Directory receiving per-run output folders.
    pub output_dir: String,
    /// Write a snapshot every N ticks (0 disables per-tick data).
    pub report_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain_size: coord(50.0, 50.0, 50.0),
            domain_cells: [25, 25, 25],
            epsilon: 0.01,
            beam_length: 1.0,
            beam_weight: 0.05,
            angle_constraint: 45.0,
            vertical_dir: coord(0.0, 0.0, 1.0),
            vertical_probability: DEFAULT_VERTICAL_PROBABILITY,
            beam_limit: 0.5,
            joint_limit: 0.3,
            agents_count: 10,
            agents_walkers: 0,
            agents_weight: 0.1,
            step_length: 0.5,
            beam_capacity: 1,
            local_radius: 1.0,
            home_location: coord(0.0, 0.0, 0.0),
            home_size: coord(5.0, 5.0, 0.0),
            site_location: coord(5.0, 5.0, 0.0),
            site_size: coord(2.0, 2.0, 0.0),
            oracle: OracleType::Stub,
            timesteps: 10,
            seed: None,
            output_dir: "runs".to_string(),
            report_every: 1,
        }
    }
}

impl Config {
    /// Load configuration from all sources with proper precedence.
    ///
    /// Precedence: CLI args > env vars > config file > defaults.
    pub fn load(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = if let Some(ref path) = cli_args.config {
            Self::load_from_file(path)?
        } else if Path::new("beamswarm.toml").exists() {
            Self::load_from_file("beamswarm.toml")?
        } else {
            Self::default()
        };

        config.apply_env();
        config.apply_cli(cli_args);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        toml::load_from_file(path)
    }

    /// Parse TOML content into configuration.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        toml::parse_toml(content)
    }

    fn apply_env(&mut self) {
        env::apply_env(self);
    }

    /// Apply CLI arguments.
    pub(super) fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(n) = args.robots {
            self.agents_count = n;
        }
        if let Some(n) = args.walkers {
            self.agents_walkers = n;
        }
        if let Some(n) = args.timesteps {
            self.timesteps = n;
        }
        if let Some(seed) = args.seed {
            self.seed = Some(seed);
        }
        if let Some(ref oracle) = args.oracle {
            if let Some(oracle) = OracleType::parse(oracle) {
                self.oracle = oracle;
            }
        }
        if let Some(ref dir) = args.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(length) = args.beam_length {
            self.beam_length = length;
        }
        if let Some(step) = args.step_length {
            self.step_length = step;
        }
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("domain.size", self.domain_size.min()),
            ("epsilon", self.epsilon),
            ("beam.length", self.beam_length),
            ("agents.step_length", self.step_length),
            ("agents.local_radius", self.local_radius),
        ];
        for (name, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        if self.domain_cells.contains(&0) {
            return Err(ConfigError::Invalid("domain.cells must be non-zero".to_string()));
        }
        if !(self.angle_constraint > 0.0 && self.angle_constraint < 90.0) {
            return Err(ConfigError::Invalid(format!(
                "beam.angle_constraint must be between 0 and 90 degrees, got {}",
                self.angle_constraint
            )));
        }
        if self.vertical_dir.norm() < f64::EPSILON {
            return Err(ConfigError::Invalid("beam.vertical_dir must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.vertical_probability) {
            return Err(ConfigError::Invalid(
                "beam.vertical_probability must be within [0, 1]".to_string(),
            ));
        }
        if self.beam_limit < 0.0 || self.joint_limit < 0.0 {
            return Err(ConfigError::Invalid("moment limits must be non-negative".to_string()));
        }
        for (name, corner) in [("sites.home", self.home_location), ("sites.construction", self.site_location)] {
            if !self.in_domain(&corner) {
                return Err(ConfigError::Invalid(format!("{} lies outside the domain", name)));
            }
        }
        Ok(())
    }

    /// True if `p` lies inside the build volume.
    pub fn in_domain(&self, p: &Coord) -> bool {
        (0..3).all(|axis| p[axis] >= 0.0 && p[axis] <= self.domain_size[axis])
    }

    /// `tan(angle_constraint)`: the largest acceptable build ratio.
    pub fn max_ratio(&self) -> f64 {
        self.angle_constraint.to_radians().tan()
    }

    /// Bound on the lateral perturbation of a default beam.
    pub fn perturbation_limit(&self) -> f64 {
        self.max_ratio() * self.beam_length / 3.0
    }

    /// Generate default beamswarm.toml content.
    pub fn default_toml() -> String {
        let d = Self::default();
        format!(
            r#"# beamswarm configuration

# Coordinates closer than this are the same coordinate.
epsilon = {epsilon}

[domain]
size = [{dx:.1}, {dy:.1}, {dz:.1}]
cells = [{cx}, {cy}, {cz}]

[beam]
length = {length:.1}
weight = {weight}
angle_constraint = {angle:.1}  # degrees from vertical
vertical_dir = [0.0, 0.0, 1.0]
vertical_probability = {probability}
beam_limit = {beam_limit}
joint_limit = {joint_limit}

[agents]
count = {count}
walkers = {walkers}
weight = {agent_weight}
step_length = {step}
capacity = {capacity}
local_radius = {radius:.1}

[sites]
home = [0.0, 0.0, 0.0]
home_size = [5.0, 5.0, 0.0]
construction = [5.0, 5.0, 0.0]
construction_size = [2.0, 2.0, 0.0]

[analysis]
oracle = "{oracle}"

[run]
timesteps = {timesteps}
output_dir = "{output_dir}"
report_every = {report_every}
"#,
            epsilon = d.epsilon,
            dx = d.domain_size.x,
            dy = d.domain_size.y,
            dz = d.domain_size.z,
            cx = d.domain_cells[0],
            cy = d.domain_cells[1],
            cz = d.domain_cells[2],
            length = d.beam_length,
            weight = d.beam_weight,
            angle = d.angle_constraint,
            probability = d.vertical_probability,
            beam_limit = d.beam_limit,
            joint_limit = d.joint_limit,
            count = d.agents_count,
            walkers = d.agents_walkers,
            agent_weight = d.agents_weight,
            step = d.step_length,
            capacity = d.beam_capacity,
            radius = d.local_radius,
            oracle = d.oracle.as_str(),
            timesteps = d.timesteps,
            output_dir = d.output_dir,
            report_every = d.report_every,
        )
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading config file.
    #[error("config I/O error: {0}")]
    Io(String),
    /// Parse error in config file.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Values that parse but cannot drive a simulation.
    #[error("invalid config: {0}")]
    Invalid(String),
}
