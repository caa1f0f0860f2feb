//! Generic `Camera` trait and supporting types for image-capture hardware.

use chrono::{DateTime, TimeDelta, Utc};
use rover_types::RoverError;

/// A raw RGB24 frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Tightly packed RGB bytes, row-major.
    pub data: Vec<u8>,
    /// When the frame was captured.
    pub captured_at: DateTime<Utc>,
}

impl CameraFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }

    /// Time elapsed since capture.
    pub fn age(&self) -> TimeDelta {
        Utc::now() - self.captured_at
    }
}

/// A forward-facing camera or other image source.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"front"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::CameraFault`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the file is unreadable).
    fn capture(&mut self) -> Result<CameraFrame, RoverError>;
}
