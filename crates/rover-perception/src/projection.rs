//! Frame projector: rectified image pixels → rover-centric Cartesian → polar.
//!
//! In the rover frame `x` points forward and `y` points left, with the
//! origin at the vehicle.  The bottom-centre of the rectified image is the
//! vehicle's position; rows further up the image are further ahead.

use serde::{Deserialize, Serialize};

use crate::image::Mask;

/// Rover-centric points, one entry per selected pixel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoverPoints {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
}

impl RoverPoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Polar form of these points.
    pub fn to_polar(&self) -> PolarPoints {
        to_polar_coords(&self.x, &self.y)
    }
}

/// Polar points: distance from the vehicle and bearing in radians,
/// counter-clockwise from the forward axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolarPoints {
    pub distances: Vec<f32>,
    pub angles: Vec<f32>,
}

impl PolarPoints {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Mean bearing in degrees, the usual steering cue for navigation.
    /// `None` when there are no points.
    pub fn mean_angle_deg(&self) -> Option<f32> {
        if self.angles.is_empty() {
            return None;
        }
        let sum: f32 = self.angles.iter().sum();
        Some((sum / self.angles.len() as f32).to_degrees())
    }

    /// Mean distance in pixels, `None` when there are no points.
    pub fn mean_distance(&self) -> Option<f32> {
        if self.distances.is_empty() {
            return None;
        }
        let sum: f32 = self.distances.iter().sum();
        Some(sum / self.distances.len() as f32)
    }
}

/// Convert every set pixel of `mask` to rover-centric coordinates:
/// `x = -(row - height)`, `y = -(col - width / 2)`.
pub fn rover_coords(mask: &Mask) -> RoverPoints {
    let height = mask.height() as f32;
    let half_width = mask.width() as f32 / 2.0;
    let (x, y) = mask
        .set_pixels()
        .map(|(row, col)| (-(row as f32 - height), -(col as f32 - half_width)))
        .unzip();
    RoverPoints { x, y }
}

/// Element-wise `distance = sqrt(x² + y²)`, `angle = atan2(y, x)`.
///
/// The origin maps to `(0, 0)`.  `x` and `y` must have the same length;
/// debug builds panic otherwise.
pub fn to_polar_coords(x: &[f32], y: &[f32]) -> PolarPoints {
    debug_assert_eq!(x.len(), y.len(), "x and y must be parallel sequences");
    let (distances, angles) = x
        .iter()
        .zip(y)
        .map(|(&x, &y)| (x.hypot(y), y.atan2(x)))
        .unzip();
    PolarPoints { distances, angles }
}
