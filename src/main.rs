use std::env;
use std::process;

use tracing_subscriber::EnvFilter;

use beamswarm::config::{self, Command, Config};
use beamswarm::shutdown;

mod commands;

use commands::{cmd_agents, cmd_default_config, cmd_run};

fn main() {
    let cli = match config::parse_args(env::args()) {
        Ok(cli) => cli,
        // clap renders help, version and usage errors itself.
        Err(e) => e.exit(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beamswarm=info")))
        .with_target(false)
        .init();

    // Default command is Run if none specified
    let command = cli.command.clone().unwrap_or(Command::Run);

    // Printing the defaults must work even when the local config is broken.
    if command == Command::DefaultConfig {
        cmd_default_config();
        return;
    }

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    if command == Command::Run {
        if let Err(e) = shutdown::register_handler() {
            eprintln!("warning: {}", e);
        }
    }

    let result = match command {
        Command::Run => cmd_run(&config),
        Command::Agents => cmd_agents(&config),
        Command::DefaultConfig => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}
