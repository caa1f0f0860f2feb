use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Vehicle pose at the moment a frame was captured.
///
/// Position is expressed in world-grid units; all angles are in degrees, as
/// reported by the vehicle's attitude source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub yaw_deg: f32,
    pub roll_deg: f32,
    pub pitch_deg: f32,
}

impl Pose {
    /// Create a pose from position, heading, and attitude.
    pub fn new(x: f32, y: f32, yaw_deg: f32, roll_deg: f32, pitch_deg: f32) -> Self {
        Self {
            x,
            y,
            yaw_deg,
            roll_deg,
            pitch_deg,
        }
    }

    /// A level pose at `(x, y)` facing `yaw_deg`.
    pub fn level(x: f32, y: f32, yaw_deg: f32) -> Self {
        Self::new(x, y, yaw_deg, 0.0, 0.0)
    }

    /// True when every field is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.yaw_deg.is_finite()
            && self.roll_deg.is_finite()
            && self.pitch_deg.is_finite()
    }
}

/// Semantic classes produced by the color classifier.
///
/// The discriminant doubles as the channel index in the visualization buffer
/// and the plane index in the world map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainClass {
    /// Dark, non-ground pixels (rock walls, sky, shadows).
    Obstacle = 0,
    /// The target object the rover is searching for (e.g. a rock sample).
    Target = 1,
    /// Bright ground the rover can drive over.
    Navigable = 2,
}

impl TerrainClass {
    pub const ALL: [TerrainClass; 3] = [
        TerrainClass::Obstacle,
        TerrainClass::Target,
        TerrainClass::Navigable,
    ];

    /// Channel / plane index for this class.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for TerrainClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerrainClass::Obstacle => write!(f, "obstacle"),
            TerrainClass::Target => write!(f, "target"),
            TerrainClass::Navigable => write!(f, "navigable"),
        }
    }
}

/// Failure of a whole per-frame perception call.
///
/// Every variant is raised before any output is written, so the caller's
/// world map and visualization buffer are unchanged when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PerceptionError {
    #[error("Malformed image: {0}")]
    MalformedImage(String),

    #[error("Non-finite pose field `{field}`: {value}")]
    NonFinitePose { field: String, value: f32 },

    #[error("Degenerate rectification geometry: {0}")]
    DegenerateGeometry(String),

    #[error("World grid is {actual}x{actual}, expected {expected}x{expected}")]
    GridMismatch { expected: usize, actual: usize },

    #[error("Invalid perception config: {0}")]
    InvalidConfig(String),
}

impl PerceptionError {
    /// Return [`PerceptionError::NonFinitePose`] for the first non-finite
    /// field of `pose`, or `Ok(())` when the pose is usable.
    pub fn check_pose(pose: &Pose) -> Result<(), PerceptionError> {
        let fields = [
            ("x", pose.x),
            ("y", pose.y),
            ("yaw_deg", pose.yaw_deg),
            ("roll_deg", pose.roll_deg),
            ("pitch_deg", pose.pitch_deg),
        ];
        match fields.iter().find(|(_, v)| !v.is_finite()) {
            Some((field, value)) => Err(PerceptionError::NonFinitePose {
                field: field.to_string(),
                value: *value,
            }),
            None => Ok(()),
        }
    }
}

/// Top-level error spanning camera faults, configuration problems and
/// failed perception steps.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Camera fault on {camera}: {details}")]
    CameraFault { camera: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Perception(#[from] PerceptionError),
}
