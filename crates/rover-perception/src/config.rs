//! Tunable parameters of the perception pipeline.
//!
//! Every field has a default matching the stock rover camera and terrain, and
//! every field may be overridden from a config file; missing fields keep
//! their defaults.
//!
//! | Field | Effect |
//! |---|---|
//! | `frame_width`, `frame_height` | Camera frame size the rectifier is calibrated for. |
//! | `correspondence` | Source trapezoid / destination rectangle of the ground-plane calibration. |
//! | `obstacle` | HSV threshold for obstacles (default: all channels below `(255, 255, 120)`). |
//! | `target` | HSV threshold for the target object (default: above `(20, 120, 120)`). |
//! | `navigable` | Native-color threshold for drivable ground (default: above `(0, 0, 160)`). |
//! | `hsv_order` | Byte order assumed when converting frames to HSV. |
//! | `obstacles_in_view_only` | Drop obstacle pixels outside the camera's rectified footprint. |
//! | `world_size` | Side length of the square world grid, in cells. |
//! | `scale` | Rectified-image pixels per world cell. |
//! | `stability_epsilon_deg` | Max roll / pitch (degrees) for which the map is updated. |
//! | `gate_policy` | How roll / pitch are compared against the epsilon. |

use rover_types::PerceptionError;
use serde::{Deserialize, Serialize};

use crate::color::ColorThreshold;
use crate::image::ChannelOrder;
use crate::rectify::Correspondence;
use crate::world_map::{GatePolicy, StabilityGate};

/// All perception parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionConfig {
    #[serde(default = "default_frame_width")]
    pub frame_width: usize,

    #[serde(default = "default_frame_height")]
    pub frame_height: usize,

    #[serde(default)]
    pub hsv_order: ChannelOrder,

    /// Off by default: the stock pipeline counts the blank area outside the
    /// camera's footprint as obstacle.
    #[serde(default)]
    pub obstacles_in_view_only: bool,

    #[serde(default = "default_world_size")]
    pub world_size: usize,

    #[serde(default = "default_scale")]
    pub scale: f32,

    #[serde(default = "default_stability_epsilon_deg")]
    pub stability_epsilon_deg: f32,

    #[serde(default)]
    pub gate_policy: GatePolicy,

    // Tables last so the struct serializes to valid TOML.
    #[serde(default = "default_correspondence")]
    pub correspondence: Correspondence,

    #[serde(default = "default_obstacle")]
    pub obstacle: ColorThreshold,

    #[serde(default = "default_target")]
    pub target: ColorThreshold,

    #[serde(default = "default_navigable")]
    pub navigable: ColorThreshold,
}

fn default_frame_width() -> usize {
    320
}
fn default_frame_height() -> usize {
    160
}
fn default_correspondence() -> Correspondence {
    Correspondence::rover_default(default_frame_width(), default_frame_height())
}
fn default_obstacle() -> ColorThreshold {
    ColorThreshold::below([255, 255, 120])
}
fn default_target() -> ColorThreshold {
    ColorThreshold::above([20, 120, 120])
}
fn default_navigable() -> ColorThreshold {
    ColorThreshold::above([0, 0, 160])
}
fn default_world_size() -> usize {
    200
}
fn default_scale() -> f32 {
    10.0
}
fn default_stability_epsilon_deg() -> f32 {
    1.0
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            correspondence: default_correspondence(),
            obstacle: default_obstacle(),
            target: default_target(),
            navigable: default_navigable(),
            hsv_order: ChannelOrder::default(),
            obstacles_in_view_only: false,
            world_size: default_world_size(),
            scale: default_scale(),
            stability_epsilon_deg: default_stability_epsilon_deg(),
            gate_policy: GatePolicy::default(),
        }
    }
}

impl PerceptionConfig {
    /// Check scalar parameters.  Geometry is checked when the rectifier is
    /// built.
    pub fn validate(&self) -> Result<(), PerceptionError> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(PerceptionError::InvalidConfig(format!(
                "frame size {}x{} must be non-zero",
                self.frame_width, self.frame_height
            )));
        }
        if self.world_size == 0 {
            return Err(PerceptionError::InvalidConfig("world_size must be at least 1".into()));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(PerceptionError::InvalidConfig(format!(
                "scale must be positive and finite, got {}",
                self.scale
            )));
        }
        if !(self.stability_epsilon_deg.is_finite() && self.stability_epsilon_deg >= 0.0) {
            return Err(PerceptionError::InvalidConfig(format!(
                "stability_epsilon_deg must be non-negative and finite, got {}",
                self.stability_epsilon_deg
            )));
        }
        Ok(())
    }

    /// The map-update gate described by this config.
    pub fn stability_gate(&self) -> StabilityGate {
        StabilityGate::new(self.stability_epsilon_deg, self.gate_policy)
    }
}
