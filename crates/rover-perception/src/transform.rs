//! World transform.
//!
//! Moves rover-centric pixels into the fixed-size world grid: rotate by the
//! vehicle's yaw, scale down from image pixels to world units, translate by
//! the vehicle's position, then quantize and clamp into
//! `[0, world_size - 1]`.
//!
//! Rotation is applied before translation; the two do not commute.
//!
//! Quantization **truncates** toward zero rather than rounding.  A point at
//! `12.9` lands in cell `12`.  Keep it that way: switching to rounding shifts
//! every accumulated observation by half a cell.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::projection::RoverPoints;
//! use rover_perception::transform::pix_to_world;
//!
//! // A pixel 10 px straight ahead of a rover at (50, 50) facing +Y.
//! let pts = RoverPoints { x: vec![10.0], y: vec![0.0] };
//! let world = pix_to_world(&pts, 50.0, 50.0, 90.0, 200, 10.0);
//! assert_eq!((world.x[0], world.y[0]), (50, 51));
//! ```

use serde::{Deserialize, Serialize};

use crate::projection::RoverPoints;

// ────────────────────────────────────────────────────────────────────────────
// Primitive steps
// ────────────────────────────────────────────────────────────────────────────

/// Rotate `(x, y)` counter-clockwise by `yaw_deg` degrees.
pub fn rotate_pix(x: f32, y: f32, yaw_deg: f32) -> (f32, f32) {
    let (sin, cos) = yaw_deg.to_radians().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// Scale rotated pixels down to world units and offset by the vehicle
/// position.
pub fn translate_pix(x_rot: f32, y_rot: f32, x_pos: f32, y_pos: f32, scale: f32) -> (f32, f32) {
    (x_rot / scale + x_pos, y_rot / scale + y_pos)
}

/// Truncate toward zero and clamp into `[0, world_size - 1]`.
///
/// Non-finite input clamps too: NaN lands on `0`, ±∞ on the nearest edge.
fn quantize(v: f32, world_size: usize) -> usize {
    let max = world_size.saturating_sub(1);
    let t = v.trunc();
    if t.is_nan() || t <= 0.0 {
        0
    } else if t >= max as f32 {
        max
    } else {
        t as usize
    }
}

// ────────────────────────────────────────────────────────────────────────────
// pix_to_world
// ────────────────────────────────────────────────────────────────────────────

/// Integer world-grid coordinates, one pair per input point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldPoints {
    pub x: Vec<usize>,
    pub y: Vec<usize>,
}

impl WorldPoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `(x, y)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}

/// Rotate, scale, translate, truncate and clamp rover-centric `points` into a
/// `world_size x world_size` grid.
///
/// `scale` is the number of rectified-image pixels per world unit.  Debug
/// builds panic when `points.x` and `points.y` differ in length.
pub fn pix_to_world(
    points: &RoverPoints,
    x_pos: f32,
    y_pos: f32,
    yaw_deg: f32,
    world_size: usize,
    scale: f32,
) -> WorldPoints {
    debug_assert_eq!(
        points.x.len(),
        points.y.len(),
        "x and y must be parallel sequences"
    );
    let (x, y) = points
        .x
        .iter()
        .zip(&points.y)
        .map(|(&px, &py)| {
            let (xr, yr) = rotate_pix(px, py, yaw_deg);
            let (xt, yt) = translate_pix(xr, yr, x_pos, y_pos, scale);
            (quantize(xt, world_size), quantize(yt, world_size))
        })
        .unzip();
    WorldPoints { x, y }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
