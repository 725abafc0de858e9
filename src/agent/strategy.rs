//! Agent behaviours.
//!
//! Every agent runs the same decide/act machinery. A strategy supplies the
//! policy on top: when to build, where to head when wandering, and whether
//! to climb up or down the structure.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::geometry::{coord, Coord};

use super::Agent;

/// Which behaviour an agent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Carries beams from home to the site and builds.
    Builder,
    /// Walks the structure without ever building.
    Walker,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Walker => "walker",
        }
    }
}

/// Policy hooks consulted by [`Agent::decide`] and [`Agent::act`].
pub trait Strategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StrategyKind;

    /// Whether the agent is in position and equipped to build. Where on the
    /// structure it builds is up to [`Agent::decide`].
    fn construct(&self, agent: &Agent, config: &Config) -> bool;

    /// Where a wandering agent heads.
    fn goal(&self, agent: &Agent, config: &Config) -> Coord;

    /// Whether the agent wants to be on the structure. An agent that does
    /// not steps off once it reaches the ground.
    fn climbs(&self, agent: &Agent) -> bool;

    /// Whether the agent prefers upward directions on the structure.
    fn ascending(&self, agent: &Agent) -> bool;

    /// Whether the agent collects beams at home.
    fn picks_up(&self) -> bool;
}

/// Centre of a site rectangle at ground level.
pub fn region_center(origin: &Coord, size: &Coord) -> Coord {
    coord(origin.x + size.x / 2.0, origin.y + size.y / 2.0, 0.0)
}

#[derive(Debug, Default)]
pub struct Builder;

impl Strategy for Builder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Builder
    }

    fn construct(&self, agent: &Agent, config: &Config) -> bool {
        agent.at_site(config) && agent.carried_beam_count() > 0 && !agent.memory().built
    }

    fn goal(&self, agent: &Agent, config: &Config) -> Coord {
        if agent.carried_beam_count() == 0 {
            region_center(&config.home_location, &config.home_size)
        } else {
            region_center(&config.site_location, &config.site_size)
        }
    }

    fn climbs(&self, agent: &Agent) -> bool {
        agent.carried_beam_count() > 0
    }

    fn ascending(&self, agent: &Agent) -> bool {
        agent.carried_beam_count() > 0
    }

    fn picks_up(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct Walker;

impl Strategy for Walker {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Walker
    }

    fn construct(&self, _agent: &Agent, _config: &Config) -> bool {
        false
    }

    fn goal(&self, _agent: &Agent, config: &Config) -> Coord {
        region_center(&config.site_location, &config.site_size)
    }

    fn climbs(&self, _agent: &Agent) -> bool {
        true
    }

    fn ascending(&self, _agent: &Agent) -> bool {
        true
    }

    fn picks_up(&self) -> bool {
        false
    }
}

/// Create a strategy of the given kind.
/// Returns Arc so agents can share one instance.
pub fn create_strategy(kind: StrategyKind) -> Arc<dyn Strategy> {
    match kind {
        StrategyKind::Builder => Arc::new(Builder),
        StrategyKind::Walker => Arc::new(Walker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{agent_at, small_config};

    #[test]
    fn test_create_strategy() {
        assert_eq!(create_strategy(StrategyKind::Builder).kind(), StrategyKind::Builder);
        assert_eq!(create_strategy(StrategyKind::Walker).kind(), StrategyKind::Walker);
        assert_eq!(StrategyKind::Walker.as_str(), "walker");
    }

    #[test]
    fn test_builder_goal_follows_inventory() {
        let config = small_config();
        let mut agent = agent_at(coord(0.5, 0.5, 0.0));
        assert_eq!(Builder.goal(&agent, &config), region_center(&config.home_location, &config.home_size));
        agent.set_carried_beams(1, &config);
        assert_eq!(Builder.goal(&agent, &config), region_center(&config.site_location, &config.site_size));
        assert!(Builder.climbs(&agent));
    }

    #[test]
    fn test_builder_constructs_only_at_site_with_beams() {
        let config = small_config();
        let site = region_center(&config.site_location, &config.site_size);
        let mut agent = agent_at(site);
        assert!(!Builder.construct(&agent, &config));
        agent.set_carried_beams(1, &config);
        assert!(Builder.construct(&agent, &config));

        let mut away = agent_at(coord(0.5, 0.5, 0.0));
        away.set_carried_beams(1, &config);
        assert!(!Builder.construct(&away, &config));
    }

    #[test]
    fn test_walker_never_builds() {
        let config = small_config();
        let site = region_center(&config.site_location, &config.site_size);
        let mut agent = agent_at(site);
        agent.set_carried_beams(1, &config);
        assert!(!Walker.construct(&agent, &config));
        assert!(!Walker.picks_up());
        assert!(Walker.climbs(&agent));
    }
}
