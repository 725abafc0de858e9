//! Configuration loading for beamswarm.
//!
//! Supports beamswarm.toml, CLI flags, and environment variables.
//! Precedence (highest to lowest): CLI flags > env vars > config file > defaults.

mod cli;
mod env;
mod toml;
mod types;

pub use cli::{parse_args, CliArgs, Command};
pub use types::{Config, ConfigError, OracleType, DEFAULT_VERTICAL_PROBABILITY};
