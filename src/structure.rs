//! Spatial index over the build volume.
//!
//! The volume is split into a fixed grid of cells. Every beam is registered
//! in each cell its segment passes through, so an agent only ever has to
//! look at the handful of cells around it to discover nearby structure.
//! The index also owns the beams themselves; joints are kept on the beams
//! as id-keyed relations.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::beam::{Beam, BeamId, Endpoints, Joint};
use crate::config::Config;
use crate::error::SimError;
use crate::geometry::{self, Coord};

/// Grid coordinates of one index cell.
pub type CellKey = [usize; 3];

/// Read-only view of one beam for external logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeamSnapshot {
    pub id: BeamId,
    pub endpoints: Endpoints,
    pub joints: Vec<Joint>,
}

/// Aggregate figures reported after every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StructureStats {
    pub beams: usize,
    pub height: f64,
}

/// The shared structure: beams plus the cell index over them.
#[derive(Debug, Clone)]
pub struct Structure {
    domain_size: Coord,
    cells: [usize; 3],
    cell_size: Coord,
    epsilon: f64,
    local_radius: f64,
    beam_weight: f64,
    beams: BTreeMap<BeamId, Beam>,
    index: HashMap<CellKey, BTreeSet<BeamId>>,
    next_id: u64,
}

impl Structure {
    /// Create an empty structure for the configured domain.
    pub fn new(config: &Config) -> Self {
        let cells = config.domain_cells;
        let cell_size = Coord::from_fn(|axis, _| config.domain_size[axis] / cells[axis] as f64);
        Self {
            domain_size: config.domain_size,
            cells,
            cell_size,
            epsilon: config.epsilon,
            local_radius: config.local_radius,
            beam_weight: config.beam_weight,
            beams: BTreeMap::new(),
            index: HashMap::new(),
            next_id: 0,
        }
    }

    /// The cell containing `point`. Points outside the domain land in the
    /// nearest boundary cell.
    pub fn cell_of(&self, point: &Coord) -> CellKey {
        let mut key = [0usize; 3];
        for (axis, slot) in key.iter_mut().enumerate() {
            let raw = (point[axis] / self.cell_size[axis]).floor();
            let last = self.cells[axis] - 1;
            *slot = if raw.is_nan() || raw <= 0.0 {
                0
            } else {
                (raw as usize).min(last)
            };
        }
        key
    }

    /// Every beam registered in cells within the sensing radius of `point`.
    pub fn get_box(&self, point: &Coord) -> BTreeMap<BeamId, Endpoints> {
        let reach = Coord::repeat(self.local_radius);
        let lo = self.cell_of(&(point - reach));
        let hi = self.cell_of(&(point + reach));
        let mut found = BTreeMap::new();
        for key in cell_range(lo, hi) {
            let Some(ids) = self.index.get(&key) else {
                continue;
            };
            for id in ids {
                if let Some(beam) = self.beams.get(id) {
                    found.insert(*id, beam.endpoints);
                }
            }
        }
        found
    }

    /// False if an indexed beam already occupies any stretch of `p1`-`p2`.
    pub fn available(&self, p1: &Coord, p2: &Coord) -> bool {
        let candidate = (*p1, *p2);
        !self
            .beams_near_segment(p1, p2)
            .into_iter()
            .filter_map(|id| self.beams.get(&id))
            .any(|beam| geometry::collinear_overlap(beam.endpoints.segment(), candidate, self.epsilon))
    }

    /// Index a new beam from `p1` to `p2` under `id` and link it to every
    /// beam it touches.
    ///
    /// Returns the number of cells the beam was registered in. Zero means
    /// nothing was stored: the segment is degenerate or the id is taken.
    pub fn add_beam(&mut self, p1: Coord, p2: Coord, id: BeamId) -> usize {
        if geometry::distance(&p1, &p2) < self.epsilon || self.beams.contains_key(&id) {
            return 0;
        }
        let touched = self.segment_cells(&p1, &p2);
        if touched.is_empty() {
            return 0;
        }

        let mut beam = Beam::new(id, Endpoints::new(p1, p2), self.beam_weight);
        let neighbours: BTreeSet<BeamId> = touched
            .iter()
            .filter_map(|key| self.index.get(key))
            .flatten()
            .copied()
            .collect();
        for other_id in neighbours {
            let Some(other) = self.beams.get_mut(&other_id) else {
                continue;
            };
            let crossings =
                geometry::crossing_points(beam.endpoints.segment(), other.endpoints.segment(), self.epsilon);
            for point in crossings {
                if beam.endpoints.contains(&point, self.epsilon)
                    && other.endpoints.contains(&point, self.epsilon)
                {
                    beam.add_joint(point, other_id, self.epsilon);
                    other.add_joint(point, id, self.epsilon);
                }
            }
        }

        for key in &touched {
            self.index.entry(*key).or_default().insert(id);
        }
        self.beams.insert(id, beam);
        self.next_id = self.next_id.max(id.0 + 1);
        touched.len()
    }

    /// Look up a beam by id.
    pub fn get_beam(&self, id: BeamId) -> Result<&Beam, SimError> {
        self.beams.get(&id).ok_or(SimError::NotFound(id))
    }

    /// Look up the endpoints of a beam by id.
    pub fn get_endpoints(&self, id: BeamId) -> Result<Endpoints, SimError> {
        self.get_beam(id).map(|beam| beam.endpoints)
    }

    /// The id the next inserted beam should take.
    pub fn next_beam_id(&self) -> BeamId {
        BeamId(self.next_id)
    }

    pub fn beam_count(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Highest endpoint in the structure (0 when empty).
    pub fn height(&self) -> f64 {
        self.beams
            .values()
            .map(|beam| beam.endpoints.i.z.max(beam.endpoints.j.z))
            .fold(0.0, f64::max)
    }

    pub fn stats(&self) -> StructureStats {
        StructureStats {
            beams: self.beam_count(),
            height: self.height(),
        }
    }

    pub fn beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams.values()
    }

    /// Ids registered in one cell.
    pub fn cell_contents(&self, key: &CellKey) -> BTreeSet<BeamId> {
        self.index.get(key).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<BeamSnapshot> {
        self.beams
            .values()
            .map(|beam| BeamSnapshot {
                id: beam.id,
                endpoints: beam.endpoints,
                joints: beam.joints.clone(),
            })
            .collect()
    }

    pub fn domain_size(&self) -> Coord {
        self.domain_size
    }

    fn beams_near_segment(&self, p1: &Coord, p2: &Coord) -> BTreeSet<BeamId> {
        self.segment_cells(p1, p2)
            .iter()
            .filter_map(|key| self.index.get(key))
            .flatten()
            .copied()
            .collect()
    }

    /// Cells whose (slightly inflated) region the segment passes through.
    fn segment_cells(&self, p1: &Coord, p2: &Coord) -> Vec<CellKey> {
        let pad = Coord::repeat(self.epsilon);
        let lo = self.cell_of(&(p1.inf(p2) - pad));
        let hi = self.cell_of(&(p1.sup(p2) + pad));
        cell_range(lo, hi)
            .filter(|key| {
                let (min, max) = self.cell_bounds(key);
                segment_hits_box(p1, p2, &(min - pad), &(max + pad))
            })
            .collect()
    }

    /// Region covered by a cell. Boundary cells extend without limit so
    /// they also own everything clamped into them.
    fn cell_bounds(&self, key: &CellKey) -> (Coord, Coord) {
        let mut min = Coord::zeros();
        let mut max = Coord::zeros();
        for axis in 0..3 {
            let k = key[axis];
            min[axis] = if k == 0 {
                f64::NEG_INFINITY
            } else {
                k as f64 * self.cell_size[axis]
            };
            max[axis] = if k + 1 == self.cells[axis] {
                f64::INFINITY
            } else {
                (k + 1) as f64 * self.cell_size[axis]
            };
        }
        (min, max)
    }
}

fn cell_range(lo: CellKey, hi: CellKey) -> impl Iterator<Item = CellKey> {
    (lo[0]..=hi[0]).flat_map(move |x| (lo[1]..=hi[1]).flat_map(move |y| (lo[2]..=hi[2]).map(move |z| [x, y, z])))
}

/// Slab test: does segment `p`-`q` pass through the box `[min, max]`?
fn segment_hits_box(p: &Coord, q: &Coord, min: &Coord, max: &Coord) -> bool {
    let d = q - p;
    let (mut enter, mut exit) = (0.0f64, 1.0f64);
    for axis in 0..3 {
        if d[axis].abs() < f64::EPSILON {
            if p[axis] < min[axis] || p[axis] > max[axis] {
                return false;
            }
            continue;
        }
        let mut near = (min[axis] - p[axis]) / d[axis];
        let mut far = (max[axis] - p[axis]) / d[axis];
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        enter = enter.max(near);
        exit = exit.min(far);
        if enter > exit {
            return false;
        }
    }
    true
}
