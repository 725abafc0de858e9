use beamswarm::agent::names;
use beamswarm::config::Config;

/// List the agents a run with this configuration would create.
pub fn cmd_agents(config: &Config) -> anyhow::Result<()> {
    println!("Agents:");
    let total = config.agents_count + config.agents_walkers;
    for (i, name) in names::get_names(total).iter().enumerate() {
        let role = if i < config.agents_count { "builder" } else { "walker" };
        println!("  {:>3}  {:<10} {}", i, name, role);
    }
    Ok(())
}
