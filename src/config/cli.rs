use clap::{Parser, Subcommand};

/// CLI arguments parsed from command line.
#[derive(Debug, Default, Parser)]
#[command(
    name = "beamswarm",
    version,
    about = "Decentralized swarm construction of beam lattices"
)]
pub struct CliArgs {
    /// Subcommand to execute (defaults to `run`).
    #[command(subcommand)]
    pub command: Option<Command>,
    /// Path to config file (default: beamswarm.toml if present).
    #[arg(short, long, global = true)]
    pub config: Option<String>,
    /// Number of building agents.
    #[arg(long, global = true)]
    pub robots: Option<usize>,
    /// Number of non-building agents.
    #[arg(long, global = true)]
    pub walkers: Option<usize>,
    /// Ticks to simulate.
    #[arg(short, long, global = true)]
    pub timesteps: Option<usize>,
    /// Seed for a reproducible run.
    #[arg(long, global = true)]
    pub seed: Option<u64>,
    /// Analysis backend: stub, none.
    #[arg(long, global = true)]
    pub oracle: Option<String>,
    /// Directory receiving run output.
    #[arg(short, long, global = true)]
    pub output_dir: Option<String>,
    /// Length of every beam.
    #[arg(long, global = true)]
    pub beam_length: Option<f64>,
    /// Distance an agent moves per tick.
    #[arg(long, global = true)]
    pub step_length: Option<f64>,
}

/// beamswarm subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the simulation and write its data files.
    Run,
    /// Print the default configuration as TOML.
    DefaultConfig,
    /// List the agents a run would create.
    Agents,
}

/// Parse CLI arguments from an iterator (first item is the program name).
pub fn parse_args<I>(args: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = String>,
{
    CliArgs::try_parse_from(args)
}
