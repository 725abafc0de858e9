//! Swarm scheduler.
//!
//! Every tick runs in two phases. In the decide phase each agent reads the
//! structure and the fresh analysis and picks an action; nothing shared is
//! written. The oracle is then unlocked and every agent acts in turn, one
//! agent's changes landing completely before the next agent starts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::agent::{
    create_strategy, names, Agent, AgentSnapshot, DecideContext, Feasibility, Outcome, StrategyKind,
};
use crate::beam::BeamId;
use crate::config::Config;
use crate::error::SimError;
use crate::geometry::coord;
use crate::oracle::{create_oracle, Oracle};
use crate::shutdown::ShutdownSignal;
use crate::structure::{BeamSnapshot, Structure, StructureStats};

/// Which half of a tick the swarm is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPhase {
    /// Agents read; the structure and analysis are frozen.
    Decide,
    /// Agents write, one at a time.
    Act,
}

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: usize,
    /// Whether an analysis ran at the start of the tick.
    pub analyzed: bool,
    pub built: Vec<BeamId>,
    pub moved: usize,
    pub wandered: usize,
    pub held: usize,
    /// Agents whose decide or act failed this tick.
    pub failures: usize,
    pub beams: usize,
    pub height: f64,
}

/// Read-only view of the whole swarm for external logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwarmSnapshot {
    pub tick: usize,
    pub agents: Vec<AgentSnapshot>,
    pub beams: Vec<BeamSnapshot>,
}

/// How a call to [`Swarm::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks_run: usize,
    pub interrupted: bool,
}

/// Owns the agents, the shared structure and the oracle.
pub struct Swarm {
    config: Config,
    structure: Structure,
    oracle: Box<dyn Oracle>,
    agents: Vec<Agent>,
    phase: AnalysisPhase,
    tick: usize,
}

impl Swarm {
    /// Create a swarm with the oracle named in `config`.
    pub fn new(config: Config) -> Self {
        let oracle = create_oracle(config.oracle, &config);
        Self::with_oracle(config, oracle)
    }

    /// Create a swarm around a specific oracle.
    ///
    /// Builders come first, walkers after them. Every agent starts on the
    /// ground somewhere in the home area.
    pub fn with_oracle(config: Config, oracle: Box<dyn Oracle>) -> Self {
        let total = config.agents_count + config.agents_walkers;
        let agents = (0..total)
            .map(|index| {
                let mut rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
                    None => StdRng::from_entropy(),
                };
                let kind = if index < config.agents_count {
                    StrategyKind::Builder
                } else {
                    StrategyKind::Walker
                };
                let location = coord(
                    config.home_location.x + config.home_size.x * rng.gen::<f64>(),
                    config.home_location.y + config.home_size.y * rng.gen::<f64>(),
                    0.0,
                );
                Agent::new(names::name_for(index), location, create_strategy(kind), rng, &config)
            })
            .collect();

        Self {
            structure: Structure::new(&config),
            config,
            oracle,
            agents,
            phase: AnalysisPhase::Act,
            tick: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn oracle(&self) -> &dyn Oracle {
        self.oracle.as_ref()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Mutable access to agents, for setting up scenarios between ticks.
    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Mutable access to the structure, for setting up scenarios between ticks.
    pub fn structure_mut(&mut self) -> &mut Structure {
        &mut self.structure
    }

    pub fn phase(&self) -> AnalysisPhase {
        self.phase
    }

    /// Ticks completed so far.
    pub fn tick_count(&self) -> usize {
        self.tick
    }

    /// Number of agents standing on the structure.
    pub fn on_structure(&self) -> usize {
        self.agents.iter().filter(|agent| agent.on_structure()).count()
    }

    pub fn stats(&self) -> StructureStats {
        self.structure.stats()
    }

    pub fn snapshot(&self) -> SwarmSnapshot {
        SwarmSnapshot {
            tick: self.tick,
            agents: self.agents.iter().map(Agent::snapshot).collect(),
            beams: self.structure.snapshot(),
        }
    }

    /// Run one decide/act cycle.
    ///
    /// A failing agent loses its action for the tick. Errors that mean the
    /// structure can no longer be trusted abort the tick.
    pub fn tick(&mut self) -> Result<TickReport, SimError> {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        self.phase = AnalysisPhase::Decide;
        let feasibility = self.analyze();
        report.analyzed = feasibility == Feasibility::Analyzed;

        let ctx = DecideContext {
            structure: &self.structure,
            oracle: self.oracle.as_ref(),
            feasibility,
            config: &self.config,
        };
        for agent in &mut self.agents {
            if let Err(err) = agent.decide(&ctx) {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(agent = agent.name(), error = %err, "decide failed");
                report.failures += 1;
            }
        }

        self.oracle.unlock();
        self.phase = AnalysisPhase::Act;

        for agent in &mut self.agents {
            match agent.act(&mut self.structure, self.oracle.as_mut(), &self.config) {
                Ok(Outcome::Built(id)) => report.built.push(id),
                Ok(Outcome::Moved | Outcome::ClimbedOn(_) | Outcome::ClimbedOff) => report.moved += 1,
                Ok(Outcome::Wandered | Outcome::PickedUp) => report.wandered += 1,
                Ok(Outcome::Held | Outcome::NoFreeSegment) => report.held += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(agent = agent.name(), error = %err, "act failed");
                    report.failures += 1;
                }
            }
        }

        let stats = self.structure.stats();
        report.beams = stats.beams;
        report.height = stats.height;
        info!(
            tick = report.tick,
            built = report.built.len(),
            beams = report.beams,
            height = report.height,
            "tick complete"
        );
        Ok(report)
    }

    /// Run up to `ticks` ticks, stopping early once `signal` fires.
    ///
    /// `on_tick` sees the swarm after every completed tick.
    pub fn run<F, E>(&mut self, ticks: usize, signal: &ShutdownSignal, mut on_tick: F) -> Result<RunSummary, E>
    where
        F: FnMut(&Swarm, &TickReport) -> Result<(), E>,
        E: From<SimError>,
    {
        let mut summary = RunSummary {
            ticks_run: 0,
            interrupted: false,
        };
        for _ in 0..ticks {
            if signal.is_shutdown() {
                summary.interrupted = true;
                break;
            }
            let report = self.tick()?;
            summary.ticks_run += 1;
            on_tick(self, &report)?;
        }
        Ok(summary)
    }

    /// Run the structural analysis when anyone is standing on something.
    fn analyze(&mut self) -> Feasibility {
        if !self.oracle.provides_analysis() {
            return Feasibility::Skip;
        }
        if self.structure.is_empty() || !self.agents.iter().any(Agent::on_structure) {
            debug!(tick = self.tick, "analysis skipped");
            return Feasibility::Skip;
        }
        match self.oracle.run_analysis() {
            Ok(()) => Feasibility::Analyzed,
            Err(err) => {
                warn!(tick = self.tick, error = %err, "analysis failed");
                Feasibility::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{self, Coord};
    use crate::oracle::ScriptedOracle;
    use crate::testutil::small_config;

    #[test]
    fn test_spawns_named_agents_at_home() {
        let mut config = small_config();
        config.agents_walkers = 1;
        let swarm = Swarm::new(config.clone());
        assert_eq!(swarm.agents().len(), 4);
        assert_eq!(swarm.agents()[0].name(), "Aaron");
        assert_eq!(swarm.agents()[3].strategy_kind(), StrategyKind::Walker);
        for agent in swarm.agents() {
            assert!(agent.at_home(&config));
            assert_eq!(agent.carried_beam_count(), 0);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut swarm = Swarm::new(small_config());
            for _ in 0..40 {
                swarm.tick().unwrap();
            }
            swarm
                .agents()
                .iter()
                .map(|agent| agent.location())
                .collect::<Vec<Coord>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_no_analysis_without_structure() {
        let mut swarm = Swarm::with_oracle(small_config(), Box::new(ScriptedOracle::new()));
        let report = swarm.tick().unwrap();
        assert!(!report.analyzed);
        assert_eq!(swarm.phase(), AnalysisPhase::Act);
        assert!(!swarm.oracle().is_locked());
    }

    #[test]
    fn test_analysis_runs_when_an_agent_is_on_structure() {
        let config = small_config();
        let mut swarm = Swarm::with_oracle(config.clone(), Box::new(ScriptedOracle::new()));
        let (p1, p2) = (coord(1.0, 1.0, 0.0), coord(1.0, 1.0, 1.0));
        swarm.structure_mut().add_beam(p1, p2, BeamId(0));
        let endpoints = swarm.structure().get_endpoints(BeamId(0)).unwrap();
        swarm.agents_mut()[0].place_on(BeamId(0), endpoints, coord(1.0, 1.0, 0.5));

        let report = swarm.tick().unwrap();
        assert!(report.analyzed);
        // Unlocked again before anyone acted.
        assert!(!swarm.oracle().is_locked());
    }

    #[test]
    fn test_builders_eventually_build() {
        let mut config = small_config();
        config.agents_count = 4;
        let mut swarm = Swarm::new(config);
        let mut built = 0;
        for _ in 0..120 {
            built += swarm.tick().unwrap().built.len();
        }
        assert!(built > 0);
        assert_eq!(swarm.structure().beam_count(), built);
        assert!(swarm.stats().height > 0.0);
    }

    #[test]
    fn test_run_stops_on_signal() {
        let mut swarm = Swarm::new(small_config());
        let signal = ShutdownSignal::new();
        let summary = swarm
            .run(10, &signal, |swarm, _| {
                if swarm.tick_count() == 3 {
                    signal.trigger();
                }
                Ok::<(), SimError>(())
            })
            .unwrap();
        assert_eq!(summary.ticks_run, 3);
        assert!(summary.interrupted);
    }

    #[test]
    fn test_snapshot_covers_agents_and_beams() {
        let mut swarm = Swarm::new(small_config());
        swarm
            .structure_mut()
            .add_beam(coord(5.0, 5.0, 0.0), coord(5.0, 5.0, 1.0), BeamId(0));
        let snapshot = swarm.snapshot();
        assert_eq!(snapshot.agents.len(), 3);
        assert_eq!(snapshot.beams.len(), 1);
        assert!(geometry::same_point(&snapshot.beams[0].endpoints.j, &coord(5.0, 5.0, 1.0), 1e-12));
    }
}
