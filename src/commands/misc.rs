use beamswarm::config::Config;

/// Print the default configuration as TOML.
pub fn cmd_default_config() {
    print!("{}", Config::default_toml());
}
