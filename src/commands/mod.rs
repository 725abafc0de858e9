pub mod agents;
pub mod misc;
pub mod run;

pub use agents::cmd_agents;
pub use misc::cmd_default_config;
pub use run::cmd_run;
