use std::collections::{BTreeMap, BTreeSet};

use crate::beam::{BeamId, Endpoints};
use crate::config::OracleType;
use crate::geometry::Coord;

use super::{Oracle, OracleError};

/// Oracle returning fixed per-member moments.
///
/// Members without a scripted moment read as unloaded. Every member and
/// load handed to it is recorded so tests can inspect what agents did.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    moments: BTreeMap<BeamId, f64>,
    failures: BTreeSet<BeamId>,
    pub members: BTreeMap<BeamId, Endpoints>,
    /// (member, distance, magnitude) in application order.
    pub loads: Vec<(BeamId, f64, f64)>,
    pub analyses: usize,
    locked: bool,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `moment` for `beam` at every station.
    pub fn with_moment(mut self, beam: BeamId, moment: f64) -> Self {
        self.moments.insert(beam, moment);
        self
    }

    /// Fail every query against `beam`.
    pub fn with_failure(mut self, beam: BeamId) -> Self {
        self.failures.insert(beam);
        self
    }

    pub fn set_moment(&mut self, beam: BeamId, moment: f64) {
        self.moments.insert(beam, moment);
    }
}

impl Oracle for ScriptedOracle {
    fn oracle_type(&self) -> OracleType {
        OracleType::Stub
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn add_member(&mut self, id: BeamId, endpoints: Endpoints) -> Result<(), OracleError> {
        self.members.insert(id, endpoints);
        Ok(())
    }

    fn apply_point_load(&mut self, beam: BeamId, distance: f64, magnitude: f64) -> Result<(), OracleError> {
        self.loads.push((beam, distance, magnitude));
        Ok(())
    }

    fn remove_loads_at(&mut self, beam: BeamId, distance: f64) -> Result<(), OracleError> {
        self.loads
            .retain(|(id, at, _)| !(*id == beam && (at - distance).abs() < 1e-9));
        Ok(())
    }

    fn run_analysis(&mut self) -> Result<(), OracleError> {
        self.analyses += 1;
        self.locked = true;
        Ok(())
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn query_resultant_moment(&self, beam: BeamId, _near: &Coord) -> Result<f64, OracleError> {
        if self.failures.contains(&beam) {
            return Err(OracleError::Failed(format!("scripted failure on {}", beam)));
        }
        Ok(self.moments.get(&beam).copied().unwrap_or(0.0))
    }
}
