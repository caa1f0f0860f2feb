//! Perception orchestrator.
//!
//! [`Perception::perception_step`] runs the whole per-frame pipeline against
//! an explicit [`RoverState`]:
//!
//! 1. convert the frame to HSV and rectify both the native and HSV images
//!    through the same calibration;
//! 2. classify obstacles and the target (HSV) and navigable ground (native);
//! 3. project each mask into rover-centric coordinates, then into the world
//!    grid;
//! 4. commit: overwrite the visualization buffer, update the world map when
//!    the stability gate is open, and replace the navigable polar set.
//!
//! Everything that can fail happens before step 4, so an error leaves the
//! state exactly as it was.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::{Perception, PerceptionConfig, RoverState};
//! use rover_perception::image::Image;
//! use rover_types::Pose;
//!
//! let perception = Perception::new(PerceptionConfig::default()).unwrap();
//! let frame = Image::filled(320, 160, [200, 180, 170]);
//! let mut state = RoverState::new(perception.config(), frame, Pose::level(100.0, 100.0, 0.0));
//!
//! let report = perception.perception_step(&mut state).unwrap();
//! assert!(report.map_updated);
//! assert!(!state.nav_dists.is_empty());
//! ```

use rover_types::{PerceptionError, Pose, TerrainClass};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::color::PerClass;
use crate::config::PerceptionConfig;
use crate::image::{ColorSpace, Image, Mask};
use crate::projection::{RoverPoints, rover_coords};
use crate::rectify::PerspectiveRectifier;
use crate::transform::{WorldPoints, pix_to_world};
use crate::world_map::{StabilityGate, WorldMap};

// ────────────────────────────────────────────────────────────────────────────
// VisionImage
// ────────────────────────────────────────────────────────────────────────────

/// Per-frame diagnostic view: the rectified classification of the latest
/// frame, one channel per [`TerrainClass`], `0` or `255`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl VisionImage {
    /// An all-black buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Interleaved RGB bytes (obstacle, target, navigable).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Value of `class`'s channel at `(col, row)`.
    pub fn get(&self, class: TerrainClass, col: usize, row: usize) -> u8 {
        self.data[(row * self.width + col) * 3 + class.index()]
    }

    /// Overwrite one channel with `mask * 255`.
    fn write_channel(&mut self, class: TerrainClass, mask: &Mask) {
        let c = class.index();
        for (px, &bit) in self.data.chunks_exact_mut(3).zip(mask.data()) {
            px[c] = if bit != 0 { 255 } else { 0 };
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RoverState
// ────────────────────────────────────────────────────────────────────────────

/// The vehicle-state record the pipeline reads from and writes to.
///
/// `pose` and `image` are inputs supplied by the data-acquisition side;
/// `vision_image`, `worldmap`, `nav_dists` and `nav_angles` are perception
/// outputs.  The world map persists for the whole mission; everything else is
/// replaced every frame.
#[derive(Debug, Clone)]
pub struct RoverState {
    pub pose: Pose,
    pub image: Image,
    pub vision_image: VisionImage,
    pub worldmap: WorldMap,
    /// Distances (pixels) to navigable terrain in the latest frame.
    pub nav_dists: Vec<f32>,
    /// Bearings (radians, CCW from forward) to navigable terrain.
    pub nav_angles: Vec<f32>,
}

impl RoverState {
    /// Fresh state sized from `config`, with an empty world map.
    pub fn new(config: &PerceptionConfig, image: Image, pose: Pose) -> Self {
        Self {
            pose,
            vision_image: VisionImage::new(image.width(), image.height()),
            image,
            worldmap: WorldMap::new(config.world_size),
            nav_dists: Vec::new(),
            nav_angles: Vec::new(),
        }
    }

    /// Hand the pipeline a new frame and pose, keeping the world map.
    pub fn observe(&mut self, image: Image, pose: Pose) {
        self.image = image;
        self.pose = pose;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FrameReport
// ────────────────────────────────────────────────────────────────────────────

/// Summary of one [`Perception::perception_step`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Rectified pixels selected per class.
    pub pixel_counts: PerClass<usize>,
    /// Whether the stability gate let this frame into the world map.
    pub map_updated: bool,
    /// Mean bearing to navigable terrain in degrees, if any was seen.
    pub mean_nav_angle_deg: Option<f32>,
}

// ────────────────────────────────────────────────────────────────────────────
// Perception
// ────────────────────────────────────────────────────────────────────────────

/// The per-frame pipeline, holding only immutable configuration and the
/// precomputed rectification.
#[derive(Debug, Clone)]
pub struct Perception {
    config: PerceptionConfig,
    rectifier: PerspectiveRectifier,
    gate: StabilityGate,
    /// Rectified footprint of the camera, used when
    /// `obstacles_in_view_only` is set.
    view: Mask,
}

impl Perception {
    /// Validate `config` and solve the rectification once.
    ///
    /// # Errors
    ///
    /// [`PerceptionError::InvalidConfig`] for bad scalars and
    /// [`PerceptionError::DegenerateGeometry`] for an unusable
    /// correspondence.
    pub fn new(config: PerceptionConfig) -> Result<Self, PerceptionError> {
        config.validate()?;
        let rectifier =
            PerspectiveRectifier::new(&config.correspondence, config.frame_width, config.frame_height)?;
        let view = rectifier.field_of_view();
        Ok(Self {
            gate: config.stability_gate(),
            rectifier,
            view,
            config,
        })
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    /// Classify the rectified frame, one mask per class.  `image` must be in
    /// the native capture space.
    pub fn classify(&self, image: &Image) -> Result<PerClass<Mask>, PerceptionError> {
        check_native(image)?;
        let hsv = image.to_hsv(self.config.hsv_order);
        let warped = self.rectifier.warp_image(image)?;
        let hsv_warped = self.rectifier.warp_image(&hsv)?;

        let mut obstacle = self.config.obstacle.apply(&hsv_warped);
        if self.config.obstacles_in_view_only {
            obstacle = obstacle.and(&self.view);
        }
        Ok(PerClass {
            obstacle,
            target: self.config.target.apply(&hsv_warped),
            navigable: self.config.navigable.apply(&warped),
        })
    }

    /// Run the full pipeline on `state.image` / `state.pose`.
    ///
    /// # Errors
    ///
    /// Fails the whole frame on a non-finite pose, a frame of the wrong size,
    /// a visualization buffer that does not match the frame, or a world map
    /// of the wrong size.  On error `state` is not modified.
    #[instrument(
        skip_all,
        fields(x = state.pose.x, y = state.pose.y, yaw = state.pose.yaw_deg)
    )]
    pub fn perception_step(&self, state: &mut RoverState) -> Result<FrameReport, PerceptionError> {
        self.check_inputs(state)?;
        let pose = state.pose;

        let masks = self.classify(&state.image)?;
        let rover: PerClass<RoverPoints> = masks.map(|_, m| rover_coords(m));
        let world: PerClass<WorldPoints> = rover.map(|_, pts| {
            pix_to_world(
                pts,
                pose.x,
                pose.y,
                pose.yaw_deg,
                self.config.world_size,
                self.config.scale,
            )
        });
        let nav = rover.navigable.to_polar();
        let pixel_counts = rover.map(|_, pts| pts.len());
        debug!(
            obstacle = pixel_counts.obstacle,
            target = pixel_counts.target,
            navigable = pixel_counts.navigable,
            "classified frame"
        );

        // Commit.
        for (class, mask) in masks.iter() {
            state.vision_image.write_channel(class, mask);
        }
        let map_updated = state.worldmap.accumulate(&self.gate, &pose, &world);
        if !map_updated {
            warn!(
                roll = pose.roll_deg,
                pitch = pose.pitch_deg,
                epsilon = self.gate.epsilon_deg,
                "vehicle not level; world map update skipped"
            );
        }
        let mean_nav_angle_deg = nav.mean_angle_deg();
        state.nav_dists = nav.distances;
        state.nav_angles = nav.angles;

        info!(
            navigable = pixel_counts.navigable,
            map_updated,
            mean_nav_angle_deg = mean_nav_angle_deg.unwrap_or(0.0),
            "perception step complete"
        );
        Ok(FrameReport {
            pixel_counts,
            map_updated,
            mean_nav_angle_deg,
        })
    }

    fn check_inputs(&self, state: &RoverState) -> Result<(), PerceptionError> {
        PerceptionError::check_pose(&state.pose)?;
        check_native(&state.image)?;

        let (w, h) = (state.image.width(), state.image.height());
        if (w, h) != (self.config.frame_width, self.config.frame_height) {
            return Err(PerceptionError::MalformedImage(format!(
                "frame is {w}x{h}, expected {}x{}",
                self.config.frame_width, self.config.frame_height
            )));
        }
        if (state.vision_image.width(), state.vision_image.height()) != (w, h) {
            return Err(PerceptionError::MalformedImage(format!(
                "visualization buffer is {}x{}, frame is {w}x{h}",
                state.vision_image.width(),
                state.vision_image.height()
            )));
        }
        if state.worldmap.size() != self.config.world_size {
            return Err(PerceptionError::GridMismatch {
                expected: self.config.world_size,
                actual: state.worldmap.size(),
            });
        }
        Ok(())
    }
}

fn check_native(image: &Image) -> Result<(), PerceptionError> {
    if image.space() != ColorSpace::Native {
        return Err(PerceptionError::MalformedImage(format!(
            "frame is tagged {:?}, expected native capture space",
            image.space()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rectify::Correspondence;

    const W: usize = 320;
    const H: usize = 160;

    fn perception() -> Perception {
        Perception::new(PerceptionConfig::default()).unwrap()
    }

    /// Bright ground in the lower half, dark rock wall above.
    fn terrain_frame() -> Image {
        Image::from_fn(W, H, |_, r| if r >= 90 { [210, 190, 180] } else { [60, 50, 40] })
    }

    fn state_with(perception: &Perception, image: Image, pose: Pose) -> RoverState {
        RoverState::new(perception.config(), image, pose)
    }

    #[test]
    fn black_frame_leaves_navigable_plane_untouched() {
        let p = perception();
        let mut state = state_with(&p, Image::filled(W, H, [0, 0, 0]), Pose::level(100.0, 100.0, 0.0));

        let report = p.perception_step(&mut state).unwrap();
        assert!(report.map_updated);
        assert_eq!(report.pixel_counts.navigable, 0);
        assert!(state.nav_dists.is_empty() && state.nav_angles.is_empty());
        assert_eq!(state.worldmap.total(TerrainClass::Navigable), 0);
        assert!((0..H).all(|r| (0..W).all(|c| state.vision_image.get(TerrainClass::Navigable, c, r) == 0)));
        assert_eq!(report.mean_nav_angle_deg, None);
    }

    #[test]
    fn ground_frame_populates_every_output() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::level(100.0, 100.0, 0.0));

        let report = p.perception_step(&mut state).unwrap();
        assert!(report.pixel_counts.navigable > 0);
        assert_eq!(state.nav_dists.len(), report.pixel_counts.navigable);
        assert_eq!(state.nav_angles.len(), report.pixel_counts.navigable);
        assert_eq!(
            state.worldmap.total(TerrainClass::Navigable),
            report.pixel_counts.navigable as u64
        );
        // Straight-ahead ground keeps the mean bearing near zero.
        assert!(report.mean_nav_angle_deg.unwrap().abs() < 5.0);
    }

    #[test]
    fn vision_image_channels_are_full_intensity() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::level(100.0, 100.0, 0.0));
        p.perception_step(&mut state).unwrap();
        assert!(state.vision_image.data().iter().all(|&b| b == 0 || b == 255));
        assert!(state.vision_image.data().contains(&255));
    }

    #[test]
    fn vision_image_is_overwritten_each_frame() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::level(100.0, 100.0, 0.0));
        p.perception_step(&mut state).unwrap();

        state.observe(Image::filled(W, H, [0, 0, 0]), Pose::level(100.0, 100.0, 0.0));
        p.perception_step(&mut state).unwrap();
        assert!((0..H).all(|r| (0..W).all(|c| state.vision_image.get(TerrainClass::Navigable, c, r) == 0)));
        assert!(state.nav_dists.is_empty());
    }

    #[test]
    fn tilted_frame_skips_map_but_still_updates_vision() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::new(100.0, 100.0, 0.0, 2.0, 0.0));
        let empty_map = state.worldmap.clone();

        let report = p.perception_step(&mut state).unwrap();
        assert!(!report.map_updated);
        assert_eq!(state.worldmap, empty_map);
        assert!(!state.nav_dists.is_empty());
    }

    #[test]
    fn evidence_accumulates_over_frames() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::level(100.0, 100.0, 0.0));
        p.perception_step(&mut state).unwrap();
        let after_one = state.worldmap.total(TerrainClass::Navigable);
        p.perception_step(&mut state).unwrap();
        assert_eq!(state.worldmap.total(TerrainClass::Navigable), 2 * after_one);
    }

    #[test]
    fn non_finite_pose_fails_without_side_effects() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::new(f32::NAN, 100.0, 0.0, 0.0, 0.0));
        state.nav_dists = vec![1.0];
        state.nav_angles = vec![0.5];
        let before_map = state.worldmap.clone();
        let before_vision = state.vision_image.clone();

        let err = p.perception_step(&mut state).unwrap_err();
        assert!(matches!(err, PerceptionError::NonFinitePose { .. }));
        assert_eq!(state.worldmap, before_map);
        assert_eq!(state.vision_image, before_vision);
        assert_eq!(state.nav_dists, vec![1.0]);
        assert_eq!(state.nav_angles, vec![0.5]);
    }

    #[test]
    fn wrong_frame_size_is_rejected() {
        let p = perception();
        let mut state = state_with(&p, Image::filled(64, 32, [200; 3]), Pose::default());
        assert!(matches!(
            p.perception_step(&mut state),
            Err(PerceptionError::MalformedImage(_))
        ));
        assert_eq!(state.worldmap.total(TerrainClass::Obstacle), 0);
    }

    #[test]
    fn hsv_tagged_frame_is_rejected() {
        let p = perception();
        let hsv = terrain_frame().to_hsv(p.config().hsv_order);
        let mut state = state_with(&p, hsv.clone(), Pose::default());
        match p.perception_step(&mut state) {
            Err(PerceptionError::MalformedImage(msg)) => assert!(msg.contains("Hsv")),
            other => panic!("expected MalformedImage, got {other:?}"),
        }
        assert_eq!(state.worldmap.total(TerrainClass::Navigable), 0);
        assert!(state.nav_dists.is_empty());
        assert!(p.classify(&hsv).is_err());
    }

    #[test]
    fn mismatched_vision_buffer_is_rejected() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::default());
        state.vision_image = VisionImage::new(10, 10);
        assert!(matches!(
            p.perception_step(&mut state),
            Err(PerceptionError::MalformedImage(_))
        ));
    }

    #[test]
    fn mismatched_world_map_is_rejected() {
        let p = perception();
        let mut state = state_with(&p, terrain_frame(), Pose::default());
        state.worldmap = WorldMap::new(50);
        assert_eq!(
            p.perception_step(&mut state).unwrap_err(),
            PerceptionError::GridMismatch {
                expected: 200,
                actual: 50
            }
        );
    }

    #[test]
    fn degenerate_calibration_fails_at_construction() {
        let cfg = PerceptionConfig {
            correspondence: Correspondence {
                source: [[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [0.0, 10.0]],
                destination: Correspondence::rover_default(W, H).destination,
            },
            ..PerceptionConfig::default()
        };
        assert!(matches!(
            Perception::new(cfg),
            Err(PerceptionError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn obstacles_can_be_limited_to_field_of_view() {
        let frame = Image::filled(W, H, [0, 0, 0]);
        let stock = perception().classify(&frame).unwrap();

        let cfg = PerceptionConfig {
            obstacles_in_view_only: true,
            ..PerceptionConfig::default()
        };
        let limited = Perception::new(cfg).unwrap().classify(&frame).unwrap();

        // A black frame is all obstacle; outside the footprint only the
        // stock pipeline reports it.
        assert_eq!(stock.obstacle.count(), W * H);
        assert!(limited.obstacle.count() < stock.obstacle.count());
        assert!(limited.obstacle.count() > 0);
    }

    #[test]
    fn target_patch_is_detected() {
        // A saturated yellow patch on the ground, in front of the rover.
        let frame = Image::from_fn(W, H, |c, r| {
            if (150..170).contains(&c) && (125..140).contains(&r) {
                [200, 180, 20]
            } else if r >= 90 {
                [210, 190, 180]
            } else {
                [60, 50, 40]
            }
        });
        let p = perception();
        let masks = p.classify(&frame).unwrap();
        assert!(masks.target.count() > 0);
    }
}
