//! In-process simulation drivers for running perception without hardware.
//!
//! [`SimCamera`] renders a synthetic terrain scene: a dark rock wall above a
//! horizon row, bright sand below it, and an optional yellow target patch on
//! the ground.  [`SimDrive`] produces a sequence of poses for a rover driving
//! at constant speed and turn rate, optionally rocking on its suspension.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::camera::Camera;
//! use rover_hal::sim::{SimCamera, SimDrive};
//!
//! let mut camera = SimCamera::new("front").with_target(150, 125, 20, 15);
//! let frame = camera.capture().expect("sim capture must succeed");
//! assert_eq!((frame.width, frame.height), (320, 160));
//!
//! let mut drive = SimDrive::new(100.0, 100.0, 0.0).with_speed(0.5);
//! let pose = drive.step();
//! assert!((pose.x - 100.5).abs() < 1e-5);
//! ```

use rover_types::{Pose, RoverError};
use tracing::debug;

use crate::camera::{Camera, CameraFrame};

// ────────────────────────────────────────────────────────────────────────────
// SimCamera
// ────────────────────────────────────────────────────────────────────────────

pub const SAND: [u8; 3] = [210, 190, 180];
pub const ROCK_WALL: [u8; 3] = [60, 50, 40];
pub const TARGET: [u8; 3] = [200, 180, 20];

/// A simulated forward camera.  Always succeeds.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    horizon_row: u32,
    /// `(col, row, width, height)` of the target patch in the raw frame.
    target: Option<(u32, u32, u32, u32)>,
    frames: u64,
}

impl SimCamera {
    /// A 320x160 camera looking at open ground below row 90.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            width: 320,
            height: 160,
            horizon_row: 90,
            target: None,
            frames: 0,
        }
    }

    /// Change the frame size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Rows above `row` show rock wall, rows at or below it show sand.
    pub fn with_horizon(mut self, row: u32) -> Self {
        self.horizon_row = row;
        self
    }

    /// Paint a target patch at `(col, row)` with the given size.
    pub fn with_target(mut self, col: u32, row: u32, width: u32, height: u32) -> Self {
        self.target = Some((col, row, width, height));
        self
    }

    /// Number of frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        self.frames
    }

    fn render(&self, col: u32, row: u32) -> [u8; 3] {
        if let Some((tc, tr, tw, th)) = self.target
            && (tc..tc + tw).contains(&col)
            && (tr..tr + th).contains(&row)
        {
            return TARGET;
        }
        if row >= self.horizon_row { SAND } else { ROCK_WALL }
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, RoverError> {
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for row in 0..self.height {
            for col in 0..self.width {
                data.extend_from_slice(&self.render(col, row));
            }
        }
        self.frames += 1;
        debug!(camera = %self.id, frame = self.frames, "sim frame rendered");
        Ok(CameraFrame::new(self.width, self.height, data))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimDrive
// ────────────────────────────────────────────────────────────────────────────

/// Dead-reckoned poses for a rover at constant speed and turn rate.
#[derive(Debug, Clone)]
pub struct SimDrive {
    pose: Pose,
    /// World units travelled per step.
    speed: f32,
    /// Degrees of yaw added per step.
    yaw_rate_deg: f32,
    /// Peak roll (degrees) of the rocking motion; alternates sign each step.
    rock_amplitude_deg: f32,
    steps: u64,
}

impl SimDrive {
    /// A stationary, level rover at `(x, y)` facing `yaw_deg`.
    pub fn new(x: f32, y: f32, yaw_deg: f32) -> Self {
        Self {
            pose: Pose::level(x, y, yaw_deg),
            speed: 0.0,
            yaw_rate_deg: 0.0,
            rock_amplitude_deg: 0.0,
            steps: 0,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_yaw_rate(mut self, yaw_rate_deg: f32) -> Self {
        self.yaw_rate_deg = yaw_rate_deg;
        self
    }

    /// Fixed roll and pitch reported with every pose.
    pub fn with_attitude(mut self, roll_deg: f32, pitch_deg: f32) -> Self {
        self.pose.roll_deg = roll_deg;
        self.pose.pitch_deg = pitch_deg;
        self
    }

    /// Rock the chassis by `amplitude_deg` of roll every other step.  Replaces
    /// any fixed roll from [`with_attitude`](Self::with_attitude), including in
    /// the starting pose.
    pub fn with_rocking(mut self, amplitude_deg: f32) -> Self {
        self.rock_amplitude_deg = amplitude_deg;
        self
    }

    /// Current pose without advancing.
    pub fn pose(&self) -> Pose {
        let mut pose = self.pose;
        if self.rock_amplitude_deg != 0.0 {
            pose.roll_deg = if self.steps > 0 && self.steps % 2 == 0 {
                (-self.rock_amplitude_deg).rem_euclid(360.0)
            } else {
                0.0
            };
        }
        pose
    }

    /// Advance one step and return the new pose.
    ///
    /// Yaw is kept in `[0, 360)`.  When rocking, roll alternates between `0`
    /// and the amplitude, reported the way an attitude sensor does (`360 - a`
    /// for a negative tilt); otherwise the attitude is left as set.
    pub fn step(&mut self) -> Pose {
        self.steps += 1;
        let (sin, cos) = self.pose.yaw_deg.to_radians().sin_cos();
        self.pose.x += self.speed * cos;
        self.pose.y += self.speed * sin;
        self.pose.yaw_deg = (self.pose.yaw_deg + self.yaw_rate_deg).rem_euclid(360.0);
        self.pose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &CameraFrame, col: u32, row: u32) -> [u8; 3] {
        let i = ((row * frame.width + col) * 3) as usize;
        [frame.data[i], frame.data[i + 1], frame.data[i + 2]]
    }

    #[test]
    fn sim_camera_renders_wall_and_ground() {
        let mut cam = SimCamera::new("front");
        let frame = cam.capture().unwrap();
        assert_eq!(frame.data.len(), 320 * 160 * 3);
        assert_eq!(pixel(&frame, 0, 0), ROCK_WALL);
        assert_eq!(pixel(&frame, 160, 150), SAND);
        assert_eq!(cam.frames_captured(), 1);
    }

    #[test]
    fn sim_camera_paints_target_patch() {
        let mut cam = SimCamera::new("front").with_target(10, 100, 5, 5);
        let frame = cam.capture().unwrap();
        assert_eq!(pixel(&frame, 12, 102), TARGET);
        assert_eq!(pixel(&frame, 15, 102), SAND);
    }

    #[test]
    fn sim_camera_custom_size_and_horizon() {
        let mut cam = SimCamera::new("small").with_size(8, 4).with_horizon(2);
        let frame = cam.capture().unwrap();
        assert_eq!(frame.data.len(), 8 * 4 * 3);
        assert_eq!(pixel(&frame, 0, 1), ROCK_WALL);
        assert_eq!(pixel(&frame, 0, 2), SAND);
    }

    #[test]
    fn sim_drive_moves_along_heading() {
        let mut drive = SimDrive::new(10.0, 10.0, 90.0).with_speed(2.0);
        let pose = drive.step();
        assert!((pose.x - 10.0).abs() < 1e-5);
        assert!((pose.y - 12.0).abs() < 1e-5);
    }

    #[test]
    fn sim_drive_wraps_yaw() {
        let mut drive = SimDrive::new(0.0, 0.0, 350.0).with_yaw_rate(20.0);
        let pose = drive.step();
        assert!((pose.yaw_deg - 10.0).abs() < 1e-4);
    }

    #[test]
    fn sim_drive_keeps_fixed_attitude() {
        let mut drive = SimDrive::new(0.0, 0.0, 0.0).with_attitude(0.5, 2.0);
        let pose = drive.step();
        assert_eq!((pose.roll_deg, pose.pitch_deg), (0.5, 2.0));
    }

    #[test]
    fn rocking_overrides_fixed_roll_from_the_start() {
        let mut drive = SimDrive::new(0.0, 0.0, 0.0)
            .with_attitude(0.5, 2.0)
            .with_rocking(3.0);
        assert_eq!(drive.pose().roll_deg, 0.0);
        assert_eq!(drive.pose().pitch_deg, 2.0);
        assert_eq!(drive.step().roll_deg, 0.0);
        assert!((drive.step().roll_deg - 357.0).abs() < 1e-4);
        assert!((drive.pose().roll_deg - 357.0).abs() < 1e-4);
    }

    #[test]
    fn sim_drive_rocking_reports_wrapped_roll() {
        let mut drive = SimDrive::new(0.0, 0.0, 0.0).with_rocking(3.0);
        assert_eq!(drive.step().roll_deg, 0.0);
        assert!((drive.step().roll_deg - 357.0).abs() < 1e-4);
        assert_eq!(drive.step().roll_deg, 0.0);
    }
}
