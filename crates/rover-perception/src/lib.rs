//! `rover-perception` – single-camera ground perception and world mapping.
//!
//! Turns a forward-facing camera frame plus the vehicle's pose into a
//! classification of the ground ahead, a persistent world map of evidence,
//! and the polar description of navigable terrain that steering logic uses.
//!
//! # Modules
//!
//! - [`image`] – [`Image`][image::Image] and [`Mask`][image::Mask] buffers,
//!   plus the 8-bit HSV conversion.
//! - [`color`] – the color classifier: all-channel thresholds producing
//!   binary masks.
//! - [`rectify`] – [`PerspectiveRectifier`][rectify::PerspectiveRectifier]:
//!   the fixed homography from the camera's oblique view to an overhead view.
//! - [`projection`] – rectified pixels to rover-centric Cartesian and polar
//!   coordinates.
//! - [`transform`] – rotate, scale, translate and clamp rover points into
//!   the world grid.
//! - [`world_map`] – [`WorldMap`][world_map::WorldMap] evidence counters and
//!   the roll/pitch [`StabilityGate`][world_map::StabilityGate].
//! - [`config`] – [`PerceptionConfig`]: every tunable threshold and constant.
//! - [`pipeline`] – [`Perception`]: runs all of the above once per frame
//!   against a [`RoverState`].

pub mod color;
pub mod config;
pub mod image;
pub mod pipeline;
pub mod projection;
pub mod rectify;
pub mod transform;
pub mod world_map;

pub use config::PerceptionConfig;
pub use pipeline::{FrameReport, Perception, RoverState, VisionImage};
