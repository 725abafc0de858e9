use std::collections::BTreeMap;

use crate::beam::{BeamId, Endpoints};
use crate::config::OracleType;
use crate::geometry::{self, Coord};

use super::{Oracle, OracleError};

/// Number of evenly spaced analysis stations along each member.
const STATIONS: usize = 5;

#[derive(Debug, Clone)]
struct Member {
    endpoints: Endpoints,
    /// (distance from i-end, magnitude)
    loads: Vec<(f64, f64)>,
}

impl Member {
    fn position(&self, distance: f64) -> Coord {
        let length = self.endpoints.length();
        if length < f64::EPSILON {
            return self.endpoints.i;
        }
        self.endpoints.i + (self.endpoints.j - self.endpoints.i) * (distance / length)
    }

    /// Moment at `station` for a member cantilevered from its i-end under
    /// gravity: point loads and self weight beyond the station, each times
    /// its horizontal lever arm.
    fn moment_at(&self, station: f64, self_weight: f64) -> f64 {
        let length = self.endpoints.length();
        if length < f64::EPSILON {
            return 0.0;
        }
        let here = self.position(station);
        let point_loads: f64 = self
            .loads
            .iter()
            .filter(|(distance, _)| *distance > station)
            .map(|(distance, magnitude)| {
                magnitude * geometry::planar_distance(&self.position(*distance), &here)
            })
            .sum();
        let horizontal_fraction = geometry::planar_distance(&self.endpoints.i, &self.endpoints.j) / length;
        let remaining = (length - station).max(0.0);
        let distributed = self_weight / length * horizontal_fraction * remaining * remaining / 2.0;
        point_loads + distributed
    }
}

/// Stub oracle for simulation without an external solver.
///
/// Treats every member as a cantilever fixed at the end it was built from.
/// Results are computed when the analysis runs and stay frozen until the
/// model is unlocked, so every agent in a decide phase sees the same
/// numbers.
#[derive(Debug)]
pub struct StubOracle {
    epsilon: f64,
    beam_weight: f64,
    members: BTreeMap<BeamId, Member>,
    /// Per member: (station distance, moment).
    results: BTreeMap<BeamId, Vec<(f64, f64)>>,
    locked: bool,
}

impl StubOracle {
    /// Create a new stub oracle.
    pub fn new(epsilon: f64, beam_weight: f64) -> Self {
        Self {
            epsilon,
            beam_weight,
            members: BTreeMap::new(),
            results: BTreeMap::new(),
            locked: false,
        }
    }

    /// Loads currently applied to a member.
    pub fn loads_on(&self, beam: BeamId) -> Vec<(f64, f64)> {
        self.members
            .get(&beam)
            .map(|member| member.loads.clone())
            .unwrap_or_default()
    }

    fn member_mut(&mut self, beam: BeamId) -> Result<&mut Member, OracleError> {
        if self.locked {
            return Err(OracleError::Failed("model is locked".to_string()));
        }
        self.members
            .get_mut(&beam)
            .ok_or(OracleError::UnknownMember(beam))
    }
}

impl Oracle for StubOracle {
    fn oracle_type(&self) -> OracleType {
        OracleType::Stub
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn add_member(&mut self, id: BeamId, endpoints: Endpoints) -> Result<(), OracleError> {
        if self.locked {
            return Err(OracleError::Failed("model is locked".to_string()));
        }
        self.members.insert(
            id,
            Member {
                endpoints,
                loads: Vec::new(),
            },
        );
        Ok(())
    }

    fn apply_point_load(&mut self, beam: BeamId, distance: f64, magnitude: f64) -> Result<(), OracleError> {
        let member = self.member_mut(beam)?;
        member.loads.push((distance, magnitude));
        Ok(())
    }

    fn remove_loads_at(&mut self, beam: BeamId, distance: f64) -> Result<(), OracleError> {
        let epsilon = self.epsilon;
        let member = self.member_mut(beam)?;
        member
            .loads
            .retain(|(at, _)| !geometry::compare(*at, distance, epsilon));
        Ok(())
    }

    fn run_analysis(&mut self) -> Result<(), OracleError> {
        self.results = self
            .members
            .iter()
            .map(|(id, member)| {
                let length = member.endpoints.length();
                let stations = (0..STATIONS)
                    .map(|k| {
                        let station = length * k as f64 / (STATIONS - 1) as f64;
                        (station, member.moment_at(station, self.beam_weight))
                    })
                    .collect();
                (*id, stations)
            })
            .collect();
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn query_resultant_moment(&self, beam: BeamId, near: &Coord) -> Result<f64, OracleError> {
        if !self.locked {
            return Err(OracleError::NotAnalyzed);
        }
        let member = self.members.get(&beam).ok_or(OracleError::UnknownMember(beam))?;
        let stations = self.results.get(&beam).ok_or(OracleError::NotAnalyzed)?;
        stations
            .iter()
            .min_by(|(a, _), (b, _)| {
                let da = geometry::distance(&member.position(*a), near);
                let db = geometry::distance(&member.position(*b), near);
                da.total_cmp(&db)
            })
            .map(|(_, moment)| moment.abs())
            .ok_or(OracleError::NotAnalyzed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::coord;

    const EPS: f64 = 0.01;

    fn horizontal() -> Endpoints {
        Endpoints::new(coord(0.0, 0.0, 1.0), coord(1.0, 0.0, 1.0))
    }

    #[test]
    fn test_query_requires_analysis() {
        let mut oracle = StubOracle::new(EPS, 0.0);
        oracle.add_member(BeamId(0), horizontal()).unwrap();
        assert_eq!(
            oracle.query_resultant_moment(BeamId(0), &coord(0.0, 0.0, 1.0)),
            Err(OracleError::NotAnalyzed)
        );
        oracle.run_analysis().unwrap();
        assert!(oracle.is_locked());
        assert!(oracle.query_resultant_moment(BeamId(0), &coord(0.0, 0.0, 1.0)).is_ok());
    }

    #[test]
    fn test_cantilever_point_load() {
        let mut oracle = StubOracle::new(EPS, 0.0);
        oracle.add_member(BeamId(0), horizontal()).unwrap();
        oracle.apply_point_load(BeamId(0), 1.0, 0.1).unwrap();
        oracle.run_analysis().unwrap();

        let root = oracle.query_resultant_moment(BeamId(0), &coord(0.0, 0.0, 1.0)).unwrap();
        assert!((root - 0.1).abs() < 1e-9);
        let tip = oracle.query_resultant_moment(BeamId(0), &coord(1.0, 0.0, 1.0)).unwrap();
        assert!(tip.abs() < 1e-9);
    }

    #[test]
    fn test_vertical_member_has_no_moment() {
        let mut oracle = StubOracle::new(EPS, 0.05);
        let vertical = Endpoints::new(coord(0.0, 0.0, 0.0), coord(0.0, 0.0, 1.0));
        oracle.add_member(BeamId(0), vertical).unwrap();
        oracle.apply_point_load(BeamId(0), 0.9, 0.1).unwrap();
        oracle.run_analysis().unwrap();
        let moment = oracle.query_resultant_moment(BeamId(0), &coord(0.0, 0.0, 0.0)).unwrap();
        assert!(moment.abs() < 1e-9);
    }

    #[test]
    fn test_results_frozen_until_unlock() {
        let mut oracle = StubOracle::new(EPS, 0.0);
        oracle.add_member(BeamId(0), horizontal()).unwrap();
        oracle.run_analysis().unwrap();
        assert!(oracle.apply_point_load(BeamId(0), 1.0, 0.1).is_err());

        oracle.unlock();
        oracle.apply_point_load(BeamId(0), 1.0, 0.1).unwrap();
        assert_eq!(
            oracle.query_resultant_moment(BeamId(0), &coord(0.0, 0.0, 1.0)),
            Err(OracleError::NotAnalyzed)
        );
    }

    #[test]
    fn test_remove_loads_at_distance() {
        let mut oracle = StubOracle::new(EPS, 0.0);
        oracle.add_member(BeamId(0), horizontal()).unwrap();
        oracle.apply_point_load(BeamId(0), 0.5, 0.1).unwrap();
        oracle.apply_point_load(BeamId(0), 0.75, 0.1).unwrap();
        oracle.remove_loads_at(BeamId(0), 0.504).unwrap();
        assert_eq!(oracle.loads_on(BeamId(0)), vec![(0.75, 0.1)]);
    }

    #[test]
    fn test_unknown_member() {
        let mut oracle = StubOracle::new(EPS, 0.0);
        assert_eq!(
            oracle.apply_point_load(BeamId(4), 0.0, 1.0),
            Err(OracleError::UnknownMember(BeamId(4)))
        );
    }
}
