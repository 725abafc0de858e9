//! Beam placement.
//!
//! An agent building at a pivot wants its new beam as close to vertical as
//! possible while still bonding with structure nearby. Every nearby beam
//! offers connection points: where it passes closest to the vertical
//! through the pivot, and where it crosses the sphere of one beam length
//! around the pivot. Points are ranked by how far they lean per unit of
//! height gained and tried in order. When nothing usable remains the beam
//! goes up along the default direction, nudged sideways until it finds
//! free space.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, warn};

use crate::beam::{BeamId, Endpoints};
use crate::config::Config;
use crate::error::SimError;
use crate::geometry::{self, coord, Coord};
use crate::oracle::Oracle;
use crate::structure::Structure;

use super::{Agent, AgentState, Outcome};

/// Sideways re-tries of the default beam before giving up for this tick.
pub const MAX_PERTURBATIONS: usize = 32;

/// A point a new beam could connect to, with its lean ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub point: Coord,
    /// Distance from the pivot's vertical axis over height gained.
    pub ratio: f64,
}

/// Points closer than this are the same candidate found twice.
const DUPLICATE_TOLERANCE: f64 = 1e-9;

/// Lean of `point` relative to the z axis through `pivot`, with its
/// planar offset. `None` when the point gains no height.
fn lean_ratio(pivot: &Coord, point: &Coord, eps: f64) -> Option<(f64, f64)> {
    let height = point.z - pivot.z;
    if height < eps {
        return None;
    }
    let lateral = geometry::planar_distance(pivot, point);
    Some((lateral / height, lateral))
}

/// Connection candidates around `pivot`, sorted by ascending ratio.
///
/// `own` is the beam the agent stands on; it never offers candidates.
pub fn connection_candidates(
    structure: &Structure,
    pivot: &Coord,
    own: Option<BeamId>,
    config: &Config,
) -> Result<Vec<Candidate>, SimError> {
    let eps = config.epsilon;
    let length = config.beam_length;
    let vertical = (*pivot, pivot + coord(0.0, 0.0, length));

    let mut nearby = structure.get_box(pivot);
    nearby.extend(structure.get_box(&vertical.1));
    if let Some(own) = own {
        nearby.remove(&own);
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    let mut record = |point: Coord, ratio: f64| {
        match candidates
            .iter()
            .find(|c| geometry::same_point(&c.point, &point, DUPLICATE_TOLERANCE))
        {
            Some(existing) => debug_assert!(
                geometry::compare(existing.ratio, ratio, eps),
                "conflicting ratios {} and {} at {:?}",
                existing.ratio,
                ratio,
                point
            ),
            None => candidates.push(Candidate { point, ratio }),
        }
    };

    for endpoints in nearby.values() {
        if let Some((on_beam, _)) = geometry::closest_points(endpoints.segment(), vertical) {
            if geometry::distance(pivot, &on_beam) <= length + eps {
                if let Some((ratio, lateral)) = lean_ratio(pivot, &on_beam, eps) {
                    if lateral >= eps {
                        record(on_beam, ratio);
                    }
                }
            }
        }

        for point in geometry::sphere_intersection(endpoints.segment(), pivot, length, eps) {
            if let Some((ratio, _)) = lean_ratio(pivot, &point, eps) {
                record(point, ratio);
            }
        }
    }

    candidates.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));
    Ok(candidates)
}

/// Choose the far end of a new beam from `pivot`.
///
/// Walks `candidates` (sorted ascending) and takes the first whose beam is
/// free. A candidate leaning more than the angle constraint allows ends the
/// walk and becomes the fallback target; with no such candidate the default
/// direction is used. Returns `None` when no free segment turned up.
pub fn select_endpoint(
    structure: &Structure,
    pivot: &Coord,
    candidates: &[Candidate],
    config: &Config,
    rng: &mut StdRng,
) -> Result<Option<Coord>, SimError> {
    let length = config.beam_length;
    let limit = config.max_ratio();
    let mut steep = None;

    for candidate in candidates {
        if candidate.ratio > limit {
            steep = Some(candidate.point);
            break;
        }
        let end = pivot + geometry::make_unit(&(candidate.point - pivot))? * length;
        if structure.available(pivot, &end) {
            return Ok(Some(end));
        }
    }

    let up = geometry::make_unit(&config.vertical_dir)?;
    let default_end = pivot + up * length;
    let mut end = match steep {
        Some(point) => pivot + geometry::make_unit(&(point - pivot))? * length,
        None if rng.gen_bool(config.vertical_probability) => default_end,
        None => perturb(pivot, &default_end, config, rng)?,
    };

    for _ in 0..MAX_PERTURBATIONS {
        if structure.available(pivot, &end) {
            return Ok(Some(end));
        }
        end = perturb(pivot, &default_end, config, rng)?;
    }
    Ok(structure.available(pivot, &end).then_some(end))
}

/// The default end shifted sideways by a bounded random offset, rescaled
/// to one beam length from the pivot.
fn perturb(pivot: &Coord, default_end: &Coord, config: &Config, rng: &mut StdRng) -> Result<Coord, SimError> {
    let limit = config.perturbation_limit();
    let shifted = default_end + coord(rng.gen_range(-limit..=limit), rng.gen_range(-limit..=limit), 0.0);
    Ok(pivot + geometry::make_unit(&(shifted - pivot))? * config.beam_length)
}

impl Agent {
    /// Place one carried beam from the agent's location.
    ///
    /// A failed insertion leaves the inventory untouched and surfaces as
    /// [`SimError::IndexInsertionFailed`].
    pub(super) fn build(&mut self, structure: &mut Structure, oracle: &mut dyn Oracle, config: &Config) -> Result<Outcome, SimError> {
        if self.carried_beam_count == 0 {
            return Ok(Outcome::Held);
        }
        let pivot = self.location;
        let own = self.current_beam.map(|beam| beam.id);
        let candidates = connection_candidates(structure, &pivot, own, config)?;
        let Some(end) = select_endpoint(structure, &pivot, &candidates, config, &mut self.rng)? else {
            debug!(agent = %self.name, "no free segment to build");
            return Ok(Outcome::NoFreeSegment);
        };

        let id = structure.next_beam_id();
        if structure.add_beam(pivot, end, id) == 0 {
            return Err(SimError::IndexInsertionFailed { beam: id });
        }
        if let Err(err) = oracle.add_member(id, Endpoints::new(pivot, end)) {
            warn!(agent = %self.name, beam = %id, error = %err, "oracle rejected new member");
        }

        // The agent gets lighter; its load on the current beam follows.
        self.remove_load(oracle);
        self.set_carried_beams(self.carried_beam_count - 1, config);
        self.apply_load(oracle);

        self.memory.built = true;
        self.memory.constructed += 1;
        if self.current_beam.is_none() {
            self.state = AgentState::OffStructure;
        }
        debug!(agent = %self.name, beam = %id, "built beam");
        Ok(Outcome::Built(id))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::oracle::ScriptedOracle;
    use crate::testutil::{agent_at, small_config, structure_with};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn test_empty_neighbourhood_has_no_candidates() {
        let config = small_config();
        let structure = Structure::new(&config);
        let candidates = connection_candidates(&structure, &coord(5.0, 5.0, 0.0), None, &config).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_candidates_sorted_by_ratio() {
        let config = small_config();
        let structure = structure_with(
            &config,
            &[
                (coord(5.8, 4.0, 0.6), coord(5.8, 6.0, 0.6)),
                (coord(5.3, 4.0, 0.8), coord(5.3, 6.0, 0.8)),
            ],
        );
        let candidates = connection_candidates(&structure, &coord(5.0, 5.0, 0.0), None, &config).unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.windows(2).all(|w| w[0].ratio <= w[1].ratio));
        // Closest approach of the nearer beam: 0.3 sideways over 0.8 up.
        assert!((candidates[0].ratio - 0.375).abs() < 1e-9);
        assert!(geometry::same_point(&candidates[0].point, &coord(5.3, 5.0, 0.8), 1e-9));
    }

    #[test]
    fn test_nearby_crossings_from_different_beams_are_both_kept() {
        let config = small_config();
        let pivot = coord(5.0, 5.0, 0.0);
        let lean = |angle: f64| coord(angle.sin(), 0.0, angle.cos());
        let (u1, u2) = (lean(0.75f64.atan()), lean(0.75f64.atan() + 0.004));
        let structure = structure_with(
            &config,
            &[(pivot + u1 * 0.5, pivot + u1 * 1.5), (pivot + u2 * 0.5, pivot + u2 * 1.5)],
        );

        let candidates = connection_candidates(&structure, &pivot, None, &config).unwrap();
        assert!(candidates.windows(2).all(|w| w[0].ratio <= w[1].ratio));
        for end in [pivot + u1, pivot + u2] {
            assert!(
                candidates.iter().any(|c| geometry::same_point(&c.point, &end, 1e-6)),
                "missing crossing at {:?}",
                end
            );
        }
    }

    #[test]
    fn test_ranking_ignores_default_direction() {
        let mut config = small_config();
        config.vertical_dir = coord(1.0, 0.0, 1.0);
        let structure = structure_with(&config, &[(coord(5.3, 4.0, 2.8), coord(5.3, 6.0, 2.8))]);
        let candidates = connection_candidates(&structure, &coord(5.0, 5.0, 2.0), None, &config).unwrap();
        assert!((candidates[0].ratio - 0.375).abs() < 1e-9);
        assert!(geometry::same_point(&candidates[0].point, &coord(5.3, 5.0, 2.8), 1e-9));
    }

    #[test]
    fn test_own_beam_is_ignored() {
        let config = small_config();
        let structure = structure_with(&config, &[(coord(5.0, 5.0, 0.0), coord(5.5, 5.0, 0.9))]);
        let pivot = coord(5.0, 5.0, 0.0);
        assert!(!connection_candidates(&structure, &pivot, None, &config).unwrap().is_empty());
        assert!(connection_candidates(&structure, &pivot, Some(BeamId(0)), &config)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_select_takes_smallest_free_ratio() {
        let config = small_config();
        let pivot = coord(5.0, 5.0, 0.0);
        let low = Candidate {
            point: coord(5.3, 5.0, 1.0),
            ratio: 0.3,
        };
        let high = Candidate {
            point: coord(5.8, 5.0, 1.0),
            ratio: 0.8,
        };
        let free = Structure::new(&config);
        let end = select_endpoint(&free, &pivot, &[low, high], &config, &mut rng()).unwrap().unwrap();
        let expected = pivot + geometry::make_unit(&(low.point - pivot)).unwrap();
        assert!(geometry::same_point(&end, &expected, 1e-9));

        // Occupy the low candidate's segment: the high one is taken instead.
        let blocked = structure_with(&config, &[(pivot, expected)]);
        let end = select_endpoint(&blocked, &pivot, &[low, high], &config, &mut rng()).unwrap().unwrap();
        let expected_high = pivot + geometry::make_unit(&(high.point - pivot)).unwrap();
        assert!(geometry::same_point(&end, &expected_high, 1e-9));
    }

    #[test]
    fn test_steep_candidate_becomes_fallback_target() {
        let config = small_config();
        let pivot = coord(5.0, 5.0, 0.0);
        let steep = Candidate {
            point: coord(6.0, 5.0, 0.5),
            ratio: 2.0,
        };
        let structure = Structure::new(&config);
        let end = select_endpoint(&structure, &pivot, &[steep], &config, &mut rng()).unwrap().unwrap();
        let expected = pivot + geometry::make_unit(&(steep.point - pivot)).unwrap();
        assert!(geometry::same_point(&end, &expected, 1e-9));
    }

    #[test]
    fn test_fallback_stays_within_angle_constraint() {
        let mut config = small_config();
        config.vertical_probability = 0.0;
        let structure = Structure::new(&config);
        let pivot = coord(5.0, 5.0, 2.0);
        let mut rng = rng();
        for _ in 0..50 {
            let end = select_endpoint(&structure, &pivot, &[], &config, &mut rng).unwrap().unwrap();
            assert!((geometry::distance(&pivot, &end) - config.beam_length).abs() < 1e-9);
            let (ratio, _) = lean_ratio(&pivot, &end, config.epsilon).unwrap();
            assert!(ratio <= config.max_ratio() + 1e-9);
        }
    }

    #[test]
    fn test_fallback_avoids_occupied_vertical() {
        let mut config = small_config();
        config.vertical_probability = 1.0;
        let pivot = coord(5.0, 5.0, 0.0);
        let structure = structure_with(&config, &[(pivot, coord(5.0, 5.0, 1.0))]);
        let end = select_endpoint(&structure, &pivot, &[], &config, &mut rng()).unwrap().unwrap();
        assert!(structure.available(&pivot, &end));
        assert!(geometry::planar_distance(&pivot, &end) > 0.0);
    }

    #[test]
    fn test_build_decrements_inventory_and_registers_member() {
        let mut config = small_config();
        config.vertical_probability = 1.0;
        let mut structure = Structure::new(&config);
        let mut oracle = ScriptedOracle::new();
        let mut agent = agent_at(coord(5.0, 5.0, 0.0));
        agent.set_carried_beams(1, &config);

        let outcome = agent.build(&mut structure, &mut oracle, &config).unwrap();
        assert_eq!(outcome, Outcome::Built(BeamId(0)));
        assert_eq!(agent.carried_beam_count(), 0);
        assert_eq!(structure.beam_count(), 1);
        assert!(oracle.members.contains_key(&BeamId(0)));
        assert!(agent.memory().built);
        assert_eq!(agent.memory().constructed, 1);
        let endpoints = structure.get_endpoints(BeamId(0)).unwrap();
        assert!(geometry::same_point(&endpoints.j, &coord(5.0, 5.0, 1.0), 1e-9));
    }

    #[test]
    fn test_build_from_beam_links_joint_at_pivot() {
        let mut config = small_config();
        config.vertical_probability = 1.0;
        let mut structure = structure_with(&config, &[(coord(4.5, 5.0, 0.0), coord(5.5, 5.0, 0.5))]);
        let mut oracle = ScriptedOracle::new();
        let pivot = coord(5.0, 5.0, 0.25);
        let mut agent = agent_at(pivot);
        agent.set_carried_beams(1, &config);
        agent.place_on(BeamId(0), structure.get_endpoints(BeamId(0)).unwrap(), pivot);

        let outcome = agent.build(&mut structure, &mut oracle, &config).unwrap();
        let Outcome::Built(id) = outcome else {
            panic!("expected a build, got {:?}", outcome);
        };
        let new_beam = structure.get_beam(id).unwrap();
        let joint = new_beam.joint_at(&pivot, config.epsilon).expect("joint at pivot");
        assert!(joint.beams.contains(&BeamId(0)));
    }
}
