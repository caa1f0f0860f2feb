//! A camera that replays a still image from disk.

use std::path::{Path, PathBuf};

use rover_types::RoverError;
use tracing::debug;

use crate::camera::{Camera, CameraFrame};

/// Returns the same decoded image on every capture.
///
/// The file is re-read on each call so edits on disk show up on the next
/// frame.  Any format the `image` crate decodes is accepted; the result is
/// flattened to RGB24.
pub struct ImageFileCamera {
    id: String,
    path: PathBuf,
}

impl ImageFileCamera {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Camera for ImageFileCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, RoverError> {
        let rgb = image::open(&self.path)
            .map_err(|e| RoverError::CameraFault {
                camera: self.id.clone(),
                details: format!("{}: {e}", self.path.display()),
            })?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        debug!(camera = %self.id, path = %self.path.display(), width, height, "image loaded");
        Ok(CameraFrame::new(width, height, rgb.into_raw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn loads_png_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut img = RgbImage::new(4, 3);
        img.put_pixel(1, 2, Rgb([10, 20, 30]));
        img.save(&path).unwrap();

        let mut cam = ImageFileCamera::new("file", &path);
        let frame = cam.capture().unwrap();
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(frame.data.len(), 4 * 3 * 3);
        let i = (2 * 4 + 1) * 3;
        assert_eq!(&frame.data[i..i + 3], &[10, 20, 30]);
    }

    #[test]
    fn missing_file_is_camera_fault() {
        let dir = tempfile::tempdir().unwrap();
        let mut cam = ImageFileCamera::new("file", dir.path().join("nope.png"));
        match cam.capture() {
            Err(RoverError::CameraFault { camera, details }) => {
                assert_eq!(camera, "file");
                assert!(details.contains("nope.png"));
            }
            other => panic!("expected camera fault, got {other:?}"),
        }
    }
}
