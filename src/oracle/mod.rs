//! Structural analysis abstraction.
//!
//! The swarm never computes forces itself. It hands member geometry and
//! agent loads to an oracle, asks it to run an analysis at the start of a
//! tick, and queries bending moments while agents decide.
//!
//! Supports multiple backends:
//! - `stub`: cantilever estimate computed in-process
//! - `none`: no analysis at all
//!
//! [`ScriptedOracle`] returns fixed moments for tests.

use thiserror::Error;

use crate::beam::{BeamId, Endpoints};
use crate::config::{Config, OracleType};
use crate::geometry::Coord;

mod scripted;
mod stub;

pub use scripted::ScriptedOracle;
pub use stub::StubOracle;

/// Failures reported by an oracle. None of them are fatal to a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// Results were requested before an analysis ran (or after unlocking).
    #[error("model has not been analyzed")]
    NotAnalyzed,
    /// The member was never registered with the oracle.
    #[error("unknown member {0}")]
    UnknownMember(BeamId),
    /// The backend reported a failure.
    #[error("analysis failed: {0}")]
    Failed(String),
}

/// Oracle trait for structural analysis backends.
pub trait Oracle: Send {
    /// Get the oracle type.
    fn oracle_type(&self) -> OracleType;

    /// Whether this backend produces moments at all.
    fn provides_analysis(&self) -> bool {
        true
    }

    /// True while analysis results are current and the model is frozen.
    fn is_locked(&self) -> bool;

    /// Register a newly built member.
    fn add_member(&mut self, id: BeamId, endpoints: Endpoints) -> Result<(), OracleError>;

    /// Apply a vertical point load `distance` along the member from its i-end.
    fn apply_point_load(&mut self, beam: BeamId, distance: f64, magnitude: f64) -> Result<(), OracleError>;

    /// Remove every load applied at `distance` along the member.
    fn remove_loads_at(&mut self, beam: BeamId, distance: f64) -> Result<(), OracleError>;

    /// Run the analysis and lock the model.
    fn run_analysis(&mut self) -> Result<(), OracleError>;

    /// Unlock the model so members and loads may change again.
    fn unlock(&mut self);

    /// Resultant bending moment (root-sum-square of both local moments) at
    /// the analysis station nearest `near`.
    fn query_resultant_moment(&self, beam: BeamId, near: &Coord) -> Result<f64, OracleError>;
}

/// Oracle that never analyzes. Agents move without feasibility checks.
#[derive(Debug, Default)]
pub struct NullOracle;

impl Oracle for NullOracle {
    fn oracle_type(&self) -> OracleType {
        OracleType::None
    }

    fn provides_analysis(&self) -> bool {
        false
    }

    fn is_locked(&self) -> bool {
        false
    }

    fn add_member(&mut self, _id: BeamId, _endpoints: Endpoints) -> Result<(), OracleError> {
        Ok(())
    }

    fn apply_point_load(&mut self, _beam: BeamId, _distance: f64, _magnitude: f64) -> Result<(), OracleError> {
        Ok(())
    }

    fn remove_loads_at(&mut self, _beam: BeamId, _distance: f64) -> Result<(), OracleError> {
        Ok(())
    }

    fn run_analysis(&mut self) -> Result<(), OracleError> {
        Ok(())
    }

    fn unlock(&mut self) {}

    fn query_resultant_moment(&self, _beam: BeamId, _near: &Coord) -> Result<f64, OracleError> {
        Err(OracleError::NotAnalyzed)
    }
}

/// Create an oracle from config.
pub fn create_oracle(oracle_type: OracleType, config: &Config) -> Box<dyn Oracle> {
    match oracle_type {
        OracleType::Stub => Box::new(StubOracle::new(config.epsilon, config.beam_weight)),
        OracleType::None => Box::new(NullOracle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_oracle_stub() {
        let oracle = create_oracle(OracleType::Stub, &Config::default());
        assert_eq!(oracle.oracle_type(), OracleType::Stub);
        assert!(oracle.provides_analysis());
        assert!(!oracle.is_locked());
    }

    #[test]
    fn test_create_oracle_none() {
        let mut oracle = create_oracle(OracleType::None, &Config::default());
        assert_eq!(oracle.oracle_type(), OracleType::None);
        assert!(!oracle.provides_analysis());
        oracle.run_analysis().unwrap();
        assert!(!oracle.is_locked());
        assert_eq!(
            oracle.query_resultant_moment(BeamId(0), &Coord::zeros()),
            Err(OracleError::NotAnalyzed)
        );
    }
}
