//! Agent decision engine.
//!
//! An agent decides against a frozen view of the structure and the last
//! analysis, stores what it intends to do, and carries that out later in
//! the act phase. Deciding never mutates shared state.

use std::collections::BTreeSet;
use std::f64::consts::TAU;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::beam::{BeamId, Endpoints};
use crate::config::Config;
use crate::error::SimError;
use crate::geometry::{self, coord, Coord};
use crate::oracle::Oracle;
use crate::structure::Structure;

pub mod build;
pub mod names;
pub mod strategy;

pub use build::{Candidate, MAX_PERTURBATIONS};
pub use strategy::{create_strategy, Builder, Strategy, StrategyKind, Walker};

/// Largest sideways deviation of a wander step, as a fraction of the step.
const WANDER_DEVIATION: f64 = 0.5;

/// Where the agent is in its per-tick state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    OffStructure,
    OnBeam,
    AtJoint,
    Building,
}

/// The beam an agent stands on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurrentBeam {
    pub id: BeamId,
    pub endpoints: Endpoints,
}

/// A member rejected during feasibility filtering. `moment` is `None` when
/// the oracle could not say.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BrokenMember {
    pub beam: BeamId,
    pub moment: Option<f64>,
}

/// The direction an agent last elected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Heading {
    pub beam: BeamId,
    pub direction: Coord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Memory {
    pub previous_direction: Option<Heading>,
    /// Set once the agent built this tick.
    pub built: bool,
    pub constructed: usize,
    /// Members rejected in the most recent decide phase.
    pub broken_members: Vec<BrokenMember>,
}

/// One way to move from the current location along a walkable beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    pub beam: BeamId,
    pub endpoints: Endpoints,
    /// The endpoint being walked toward.
    pub target: Coord,
    pub unit: Coord,
}

impl Direction {
    /// Whether following this direction gains height.
    pub fn rises(&self) -> bool {
        self.unit.z > f64::EPSILON
    }
}

/// What an agent will do in the act phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Build,
    Move(Direction),
    Wander,
    ClimbOff,
    Hold,
}

/// State of the analysis the decide phase runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    /// No analysis applies; every direction is feasible.
    Skip,
    /// Results are current and may be queried.
    Analyzed,
    /// An analysis was expected but failed; nothing is feasible.
    Unavailable,
}

/// Read-only view handed to every agent in the decide phase.
pub struct DecideContext<'a> {
    pub structure: &'a Structure,
    pub oracle: &'a dyn Oracle,
    pub feasibility: Feasibility,
    pub config: &'a Config,
}

/// What an act phase amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Built(BeamId),
    NoFreeSegment,
    Moved,
    ClimbedOn(BeamId),
    ClimbedOff,
    PickedUp,
    Wandered,
    Held,
}

/// Read-only view of one agent for external logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSnapshot {
    pub name: String,
    pub strategy: StrategyKind,
    pub location: Coord,
    pub carried_beam_count: u32,
    pub weight: f64,
    pub state: AgentState,
    pub current_beam: Option<BeamId>,
    pub memory: Memory,
}

/// A construction agent.
#[derive(Debug)]
pub struct Agent {
    name: String,
    location: Coord,
    carried_beam_count: u32,
    weight: f64,
    current_beam: Option<CurrentBeam>,
    state: AgentState,
    memory: Memory,
    action: Action,
    rng: StdRng,
    strategy: Arc<dyn Strategy>,
}

impl Agent {
    /// Create an agent on the ground at `location` carrying nothing.
    pub fn new(name: impl Into<String>, location: Coord, strategy: Arc<dyn Strategy>, rng: StdRng, config: &Config) -> Self {
        Self {
            name: name.into(),
            location,
            carried_beam_count: 0,
            weight: config.agents_weight,
            current_beam: None,
            state: AgentState::OffStructure,
            memory: Memory::default(),
            action: Action::Hold,
            rng,
            strategy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Coord {
        self.location
    }

    pub fn carried_beam_count(&self) -> u32 {
        self.carried_beam_count
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn current_beam(&self) -> Option<CurrentBeam> {
        self.current_beam
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn on_structure(&self) -> bool {
        self.current_beam.is_some()
    }

    /// On the ground inside the home rectangle.
    pub fn at_home(&self, config: &Config) -> bool {
        self.location.z.abs() < config.epsilon
            && geometry::within_footprint(&config.home_location, &config.home_size, &self.location, config.epsilon)
    }

    /// Anywhere in the column above the construction site.
    pub fn at_site(&self, config: &Config) -> bool {
        geometry::within_footprint(&config.site_location, &config.site_size, &self.location, config.epsilon)
    }

    /// Give the agent `count` beams, adjusting its weight. Does not touch
    /// the oracle.
    pub fn set_carried_beams(&mut self, count: u32, config: &Config) {
        self.carried_beam_count = count;
        self.weight = config.agents_weight + f64::from(count) * config.beam_weight;
    }

    /// Stand the agent on `beam` at `location`. Does not touch the oracle.
    pub fn place_on(&mut self, beam: BeamId, endpoints: Endpoints, location: Coord) {
        self.current_beam = Some(CurrentBeam { id: beam, endpoints });
        self.location = location;
        self.state = AgentState::OnBeam;
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            name: self.name.clone(),
            strategy: self.strategy.kind(),
            location: self.location,
            carried_beam_count: self.carried_beam_count,
            weight: self.weight,
            state: self.state,
            current_beam: self.current_beam.map(|beam| beam.id),
            memory: self.memory.clone(),
        }
    }

    /// Choose this tick's action from a consistent view of the world.
    ///
    /// A builder in position extends the structure rather than starting a
    /// new one: on the ground it climbs any structure in reach, and on the
    /// structure it builds once nothing walkable leads further up.
    pub fn decide(&mut self, ctx: &DecideContext<'_>) -> Result<(), SimError> {
        self.memory.built = false;
        self.memory.broken_members.clear();
        let strategy = Arc::clone(&self.strategy);
        let ready = strategy.construct(self, ctx.config);

        let Some(current) = self.current_beam else {
            if ready && self.ground_search(ctx.structure, ctx.config).is_none() {
                self.start_build();
            } else {
                self.state = AgentState::OffStructure;
                self.action = Action::Wander;
            }
            return Ok(());
        };

        let snapped = geometry::correct(&current.endpoints.i, &current.endpoints.j, &self.location);
        if geometry::distance(&snapped, &self.location) > f64::EPSILON {
            debug!(agent = %self.name, drift = geometry::distance(&snapped, &self.location), "re-snapped onto beam");
            self.location = snapped;
        }

        let at_joint = self.at_joint(ctx.structure, ctx.config)?;
        self.state = if at_joint { AgentState::AtJoint } else { AgentState::OnBeam };

        if self.location.z.abs() < ctx.config.epsilon && !strategy.climbs(self) {
            self.action = Action::ClimbOff;
            return Ok(());
        }

        let feasible = self.feasible_directions(at_joint, ctx)?;
        if ready && !feasible.iter().any(Direction::rises) {
            self.start_build();
            return Ok(());
        }

        self.action = match self.choose_direction(&feasible, at_joint) {
            Some(direction) => Action::Move(direction),
            None => Action::Hold,
        };
        debug!(agent = %self.name, action = ?self.action, "decided");
        Ok(())
    }

    fn start_build(&mut self) {
        self.state = AgentState::Building;
        self.action = Action::Build;
        debug!(agent = %self.name, "decided to build");
    }

    /// True if the agent stands on a joint of its current beam.
    pub fn at_joint(&self, structure: &Structure, config: &Config) -> Result<bool, SimError> {
        let Some(current) = self.current_beam else {
            return Ok(false);
        };
        let beam = structure.get_beam(current.id)?;
        Ok(beam.joint_at(&self.location, config.epsilon).is_some())
    }

    /// Enumerate, filter and elect the direction to move in.
    pub fn get_direction(&mut self, ctx: &DecideContext<'_>) -> Result<Option<Direction>, SimError> {
        let at_joint = self.at_joint(ctx.structure, ctx.config)?;
        let feasible = self.feasible_directions(at_joint, ctx)?;
        Ok(self.choose_direction(&feasible, at_joint))
    }

    fn feasible_directions(&mut self, at_joint: bool, ctx: &DecideContext<'_>) -> Result<Vec<Direction>, SimError> {
        let candidates = self.directions(ctx.structure, ctx.config)?;
        Ok(self.filter_feasible(candidates, at_joint, ctx))
    }

    fn choose_direction(&mut self, feasible: &[Direction], at_joint: bool) -> Option<Direction> {
        let biased = self.filter_directions(feasible);
        let pool = if biased.is_empty() { feasible } else { &biased[..] };
        self.elect_direction(pool, at_joint)
    }

    /// Directions toward every endpoint of every beam through the agent's
    /// location.
    pub fn directions(&self, structure: &Structure, config: &Config) -> Result<Vec<Direction>, SimError> {
        let mut walkable = structure.get_box(&self.location);
        walkable.retain(|_, endpoints| endpoints.contains(&self.location, config.epsilon));
        if let Some(current) = self.current_beam {
            walkable.insert(current.id, structure.get_endpoints(current.id)?);
        }

        let mut directions = Vec::new();
        for (beam, endpoints) in walkable {
            for target in [endpoints.i, endpoints.j] {
                if geometry::same_point(&target, &self.location, config.epsilon) {
                    continue;
                }
                directions.push(Direction {
                    beam,
                    endpoints,
                    target,
                    unit: geometry::make_unit(&(target - self.location))?,
                });
            }
        }
        Ok(directions)
    }

    /// Drop directions along members the analysis says cannot take the
    /// agent. Rejected members are recorded in `broken_members`.
    pub fn filter_feasible(&mut self, candidates: Vec<Direction>, at_joint: bool, ctx: &DecideContext<'_>) -> Vec<Direction> {
        let own = self.current_beam.map(|beam| beam.id);
        let mut rejected = BTreeSet::new();
        let mut accepted = BTreeSet::new();

        for beam in candidates.iter().map(|direction| direction.beam) {
            if rejected.contains(&beam) || accepted.contains(&beam) {
                continue;
            }
            let moment = match ctx.feasibility {
                Feasibility::Skip => {
                    accepted.insert(beam);
                    continue;
                }
                Feasibility::Unavailable => None,
                Feasibility::Analyzed => match ctx.oracle.query_resultant_moment(beam, &self.location) {
                    Ok(moment) => {
                        let limit = if Some(beam) == own || !at_joint {
                            ctx.config.beam_limit
                        } else {
                            ctx.config.joint_limit
                        };
                        if moment < limit {
                            accepted.insert(beam);
                            continue;
                        }
                        Some(moment)
                    }
                    Err(err) => {
                        warn!(agent = %self.name, %beam, error = %err, "moment query failed");
                        None
                    }
                },
            };
            rejected.insert(beam);
            self.memory.broken_members.push(BrokenMember { beam, moment });
        }

        candidates
            .into_iter()
            .filter(|direction| accepted.contains(&direction.beam))
            .collect()
    }

    /// Keep upward directions for an ascending agent, downward otherwise.
    pub fn filter_directions(&self, candidates: &[Direction]) -> Vec<Direction> {
        let ascending = self.strategy.ascending(self);
        candidates
            .iter()
            .filter(|direction| {
                if ascending {
                    direction.rises()
                } else {
                    direction.unit.z < -f64::EPSILON
                }
            })
            .copied()
            .collect()
    }

    /// Pick one direction, preferring to keep going the way the agent went
    /// last unless it stands on a joint.
    pub fn elect_direction(&mut self, candidates: &[Direction], at_joint: bool) -> Option<Direction> {
        let continuing: Vec<Direction> = match self.memory.previous_direction {
            Some(previous) if !at_joint => candidates
                .iter()
                .filter(|direction| direction.beam == previous.beam && direction.unit.dot(&previous.direction) > 0.0)
                .copied()
                .collect(),
            _ => Vec::new(),
        };
        let chosen = match continuing.choose(&mut self.rng) {
            Some(direction) => *direction,
            None => *candidates.choose(&mut self.rng)?,
        };
        self.memory.previous_direction = Some(Heading {
            beam: chosen.beam,
            direction: chosen.unit,
        });
        Some(chosen)
    }

    /// Carry out the action chosen in the decide phase.
    pub fn act(&mut self, structure: &mut Structure, oracle: &mut dyn Oracle, config: &Config) -> Result<Outcome, SimError> {
        match std::mem::replace(&mut self.action, Action::Hold) {
            Action::Build => self.build(structure, oracle, config),
            Action::Move(direction) => Ok(self.move_along(direction, oracle, config)),
            Action::Wander => self.wander(structure, oracle, config),
            Action::ClimbOff => {
                self.climb_off(oracle);
                Ok(Outcome::ClimbedOff)
            }
            Action::Hold => Ok(Outcome::Held),
        }
    }

    /// Step along `direction`, moving the agent's load with it.
    fn move_along(&mut self, direction: Direction, oracle: &mut dyn Oracle, config: &Config) -> Outcome {
        let remaining = geometry::distance(&self.location, &direction.target);
        let next = if remaining <= config.step_length {
            direction.target
        } else {
            self.location + direction.unit * config.step_length
        };

        self.remove_load(oracle);
        self.location = next;
        self.current_beam = Some(CurrentBeam {
            id: direction.beam,
            endpoints: direction.endpoints,
        });
        self.apply_load(oracle);
        self.state = AgentState::OnBeam;
        Outcome::Moved
    }

    /// Leave the structure where the agent stands.
    fn climb_off(&mut self, oracle: &mut dyn Oracle) {
        self.remove_load(oracle);
        self.current_beam = None;
        self.location.z = 0.0;
        self.memory.previous_direction = None;
        self.state = AgentState::OffStructure;
        debug!(agent = %self.name, "climbed off the structure");
    }

    /// Move on the ground: collect beams at home, climb nearby structure,
    /// or take a step toward the strategy's goal.
    fn wander(&mut self, structure: &Structure, oracle: &mut dyn Oracle, config: &Config) -> Result<Outcome, SimError> {
        let strategy = Arc::clone(&self.strategy);
        if strategy.picks_up() && self.carried_beam_count == 0 && self.at_home(config) {
            self.set_carried_beams(config.beam_capacity, config);
            debug!(agent = %self.name, beams = self.carried_beam_count, "picked up beams");
            return Ok(Outcome::PickedUp);
        }

        let mut goal = strategy.goal(self, config);
        if strategy.climbs(self) {
            if let Some((beam, endpoints, contact)) = self.ground_search(structure, config) {
                if geometry::planar_distance(&self.location, &contact) <= config.step_length {
                    self.location = contact;
                    self.current_beam = Some(CurrentBeam { id: beam, endpoints });
                    self.memory.previous_direction = None;
                    self.state = AgentState::OnBeam;
                    self.apply_load(oracle);
                    debug!(agent = %self.name, %beam, "climbed onto the structure");
                    return Ok(Outcome::ClimbedOn(beam));
                }
                goal = contact;
            }
        }

        self.step_toward(&goal, config);
        Ok(Outcome::Wandered)
    }

    /// Nearest point within sensing range where a beam meets the ground.
    fn ground_search(&self, structure: &Structure, config: &Config) -> Option<(BeamId, Endpoints, Coord)> {
        structure
            .get_box(&self.location)
            .into_iter()
            .flat_map(|(beam, endpoints)| {
                [endpoints.i, endpoints.j]
                    .into_iter()
                    .filter(|end| end.z.abs() < config.epsilon)
                    .map(move |end| (beam, endpoints, end))
            })
            .map(|(beam, endpoints, end)| (geometry::planar_distance(&self.location, &end), beam, endpoints, end))
            .filter(|(gap, ..)| *gap <= config.local_radius)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, beam, endpoints, end)| (beam, endpoints, end))
    }

    /// One ground step toward `goal` with a random sideways deviation.
    fn step_toward(&mut self, goal: &Coord, config: &Config) {
        let mut heading = goal - self.location;
        heading.z = 0.0;
        let remaining = heading.norm();

        let (unit, length) = if remaining < config.epsilon {
            let angle = self.rng.gen_range(0.0..TAU);
            (coord(angle.cos(), angle.sin(), 0.0), config.step_length)
        } else {
            let forward = heading / remaining;
            let side = coord(-forward.y, forward.x, 0.0) * self.rng.gen_range(-WANDER_DEVIATION..=WANDER_DEVIATION);
            let unit = (forward + side).normalize();
            (unit, remaining.min(config.step_length))
        };

        let next = self.location + unit * length;
        self.location = coord(
            next.x.clamp(0.0, config.domain_size.x),
            next.y.clamp(0.0, config.domain_size.y),
            0.0,
        );
    }

    fn apply_load(&self, oracle: &mut dyn Oracle) {
        let Some(current) = self.current_beam else {
            return;
        };
        let distance = geometry::distance(&current.endpoints.i, &self.location);
        if let Err(err) = oracle.apply_point_load(current.id, distance, self.weight) {
            warn!(agent = %self.name, beam = %current.id, error = %err, "could not apply load");
        }
    }

    fn remove_load(&self, oracle: &mut dyn Oracle) {
        let Some(current) = self.current_beam else {
            return;
        };
        let distance = geometry::distance(&current.endpoints.i, &self.location);
        if let Err(err) = oracle.remove_loads_at(current.id, distance) {
            warn!(agent = %self.name, beam = %current.id, error = %err, "could not remove load");
        }
    }
}
