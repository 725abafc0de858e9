//! Error kinds raised by the simulation core.

use thiserror::Error;

use crate::beam::BeamId;
use crate::oracle::OracleError;

/// Errors surfaced by geometry, the spatial index, agents and the scheduler.
///
/// Only [`SimError::NotFound`] aborts a run; every other kind costs the
/// acting agent its action for the current tick.
#[derive(Debug, Error)]
pub enum SimError {
    /// Zero-length or otherwise ill-defined geometry.
    #[error("degenerate geometry: {0}")]
    GeometryDegenerate(String),

    /// The spatial index registered the beam in no cell.
    #[error("beam {beam} could not be indexed")]
    IndexInsertionFailed { beam: BeamId },

    /// The analysis oracle failed or was not ready.
    #[error("structural analysis unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    /// Lookup of a beam that was never inserted.
    #[error("beam {0} not found in the structure")]
    NotFound(BeamId),
}

impl SimError {
    /// True when the error means the shared structure can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_found_is_fatal() {
        assert!(SimError::NotFound(BeamId(3)).is_fatal());
        assert!(!SimError::GeometryDegenerate("zero".into()).is_fatal());
        assert!(!SimError::IndexInsertionFailed { beam: BeamId(1) }.is_fatal());
        assert!(!SimError::OracleUnavailable(OracleError::NotAnalyzed).is_fatal());
    }

    #[test]
    fn test_display_names_the_beam() {
        let err = SimError::NotFound(BeamId(7));
        assert_eq!(err.to_string(), "beam B7 not found in the structure");
    }
}
