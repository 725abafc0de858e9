//! Beams and the joints where they cross.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{self, Coord};

/// Identifier assigned to a beam when it is first indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeamId(pub u64);

impl fmt::Display for BeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// The fixed ends of a beam. `i` is the end the beam was built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    pub i: Coord,
    pub j: Coord,
}

impl Endpoints {
    pub fn new(i: Coord, j: Coord) -> Self {
        Self { i, j }
    }

    /// The endpoints as a segment tuple for the geometry kernel.
    pub fn segment(&self) -> (Coord, Coord) {
        (self.i, self.j)
    }

    pub fn length(&self) -> f64 {
        geometry::distance(&self.i, &self.j)
    }

    /// True if `p` lies on this segment.
    pub fn contains(&self, p: &Coord, eps: f64) -> bool {
        geometry::on_segment(&self.i, &self.j, p, eps)
    }
}

/// A coordinate on a beam together with every other beam crossing there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub coord: Coord,
    pub beams: BTreeSet<BeamId>,
}

/// A rigid member. Endpoints never change once built; joints only grow as
/// later beams are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam {
    pub id: BeamId,
    pub endpoints: Endpoints,
    pub joints: Vec<Joint>,
    pub weight: f64,
}

impl Beam {
    pub fn new(id: BeamId, endpoints: Endpoints, weight: f64) -> Self {
        Self {
            id,
            endpoints,
            joints: Vec::new(),
            weight,
        }
    }

    /// Record that `other` crosses this beam at `coord`.
    ///
    /// Returns false (and records nothing) when `coord` is not on the beam.
    /// Recording the same crossing twice is a no-op.
    pub fn add_joint(&mut self, coord: Coord, other: BeamId, eps: f64) -> bool {
        if !self.endpoints.contains(&coord, eps) {
            return false;
        }
        match self
            .joints
            .iter_mut()
            .find(|joint| geometry::same_point(&joint.coord, &coord, eps))
        {
            Some(joint) => {
                joint.beams.insert(other);
            }
            None => self.joints.push(Joint {
                coord,
                beams: BTreeSet::from([other]),
            }),
        }
        true
    }

    /// Remove `other` from the joint at `coord`, dropping the joint once no
    /// crossing beam remains. Returns whether anything was removed.
    pub fn remove_joint(&mut self, coord: &Coord, other: BeamId, eps: f64) -> bool {
        let Some(index) = self
            .joints
            .iter()
            .position(|joint| geometry::same_point(&joint.coord, coord, eps))
        else {
            return false;
        };
        if !self.joints[index].beams.remove(&other) {
            return false;
        }
        if self.joints[index].beams.is_empty() {
            self.joints.remove(index);
        }
        true
    }

    /// The joint at `p`, if there is one.
    pub fn joint_at(&self, p: &Coord, eps: f64) -> Option<&Joint> {
        self.joints
            .iter()
            .find(|joint| geometry::same_point(&joint.coord, p, eps))
    }
}
