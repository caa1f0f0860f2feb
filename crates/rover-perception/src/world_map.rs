//! Persistent world map and the stability gate that guards writes to it.
//!
//! The [`WorldMap`] is a square grid of integer evidence counters with one
//! independent plane per [`TerrainClass`].  Counters only grow: every time a
//! frame's projection lands on a cell, that cell's counter for the class is
//! incremented.  Repeated coordinates within a frame increment repeatedly.
//!
//! Writes are trusted only when the vehicle is level.  A pitched or rolled
//! camera breaks the flat-ground assumption behind the perspective
//! rectification, so [`StabilityGate`] rejects the whole frame (all three
//! classes together) when roll or pitch exceeds its epsilon.

use rover_types::{Pose, TerrainClass};
use serde::{Deserialize, Serialize};

use crate::color::PerClass;
use crate::transform::WorldPoints;

// ────────────────────────────────────────────────────────────────────────────
// StabilityGate
// ────────────────────────────────────────────────────────────────────────────

/// How roll and pitch are compared against the gate's epsilon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePolicy {
    /// Wrap both angles into `(-180, 180]` and compare magnitudes, so a tilt
    /// of -5° (or 355°) is rejected just like +5°.
    #[default]
    Absolute,
    /// Plain `roll < ε && pitch < ε` on the raw values.  Negative angles
    /// always pass; kept for compatibility with logs recorded that way.
    Signed,
}

/// Decides whether the current pose is stable enough to update the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityGate {
    pub epsilon_deg: f32,
    pub policy: GatePolicy,
}

impl StabilityGate {
    pub fn new(epsilon_deg: f32, policy: GatePolicy) -> Self {
        Self {
            epsilon_deg,
            policy,
        }
    }

    /// True when roll and pitch are both within the epsilon.
    pub fn is_open(&self, pose: &Pose) -> bool {
        match self.policy {
            GatePolicy::Absolute => {
                wrap_deg(pose.roll_deg).abs() < self.epsilon_deg
                    && wrap_deg(pose.pitch_deg).abs() < self.epsilon_deg
            }
            GatePolicy::Signed => {
                pose.roll_deg < self.epsilon_deg && pose.pitch_deg < self.epsilon_deg
            }
        }
    }
}

/// Wrap an angle in degrees into `(-180, 180]`.
fn wrap_deg(angle: f32) -> f32 {
    let w = angle.rem_euclid(360.0);
    if w > 180.0 { w - 360.0 } else { w }
}

// ────────────────────────────────────────────────────────────────────────────
// WorldMap
// ────────────────────────────────────────────────────────────────────────────

/// Mission-long evidence grid, indexed `[y][x][class]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldMap {
    size: usize,
    cells: Vec<u32>,
}

impl WorldMap {
    /// An empty `size x size` map.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![0; size * size * 3],
        }
    }

    /// Side length in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    fn offset(&self, class: TerrainClass, x: usize, y: usize) -> usize {
        (y * self.size + x) * 3 + class.index()
    }

    /// Evidence count for `class` at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when `(x, y)` is outside the grid.
    pub fn count(&self, class: TerrainClass, x: usize, y: usize) -> u32 {
        assert!(x < self.size && y < self.size, "cell ({x}, {y}) outside {0}x{0} map", self.size);
        self.cells[self.offset(class, x, y)]
    }

    /// Sum of all counters in one class plane.
    pub fn total(&self, class: TerrainClass) -> u64 {
        self.cells
            .iter()
            .skip(class.index())
            .step_by(3)
            .map(|&c| u64::from(c))
            .sum()
    }

    /// Number of cells with any evidence for `class`.
    pub fn occupied_cells(&self, class: TerrainClass) -> usize {
        self.cells
            .iter()
            .skip(class.index())
            .step_by(3)
            .filter(|&&c| c > 0)
            .count()
    }

    /// Add one observation of `class` at each listed coordinate.
    ///
    /// Coordinates past the edge are clamped to the last row or column, the
    /// same policy [`pix_to_world`][crate::transform::pix_to_world] applies.
    pub fn increment(&mut self, class: TerrainClass, points: &WorldPoints) {
        let Some(last) = self.size.checked_sub(1) else {
            return;
        };
        for (x, y) in points.iter() {
            let i = self.offset(class, x.min(last), y.min(last));
            self.cells[i] = self.cells[i].saturating_add(1);
        }
    }

    /// Gated update of all three planes.
    ///
    /// Returns `true` when the gate was open and the map was written.  When
    /// it is closed no plane is touched.
    pub fn accumulate(
        &mut self,
        gate: &StabilityGate,
        pose: &Pose,
        points: &PerClass<WorldPoints>,
    ) -> bool {
        if !gate.is_open(pose) {
            return false;
        }
        for (class, pts) in points.iter() {
            self.increment(class, pts);
        }
        true
    }

    /// Reset every counter.  Only for external reinitialisation between
    /// missions; the perception pipeline never calls it.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// RGB preview, one pixel per cell, `y` flipped so north is up.
    ///
    /// A channel is 255 where its class has any evidence.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.cells.len());
        for row in (0..self.size).rev() {
            let start = row * self.size * 3;
            out.extend(
                self.cells[start..start + self.size * 3]
                    .iter()
                    .map(|&c| if c > 0 { 255 } else { 0 }),
            );
        }
        out
    }
}
