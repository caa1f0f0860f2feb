//! Perspective rectifier.
//!
//! Maps the camera's oblique view of the ground plane onto an overhead view.
//! A [`Correspondence`] pairs four points of the ground footprint in the raw
//! frame (a trapezoid) with four points of an axis-aligned rectangle directly
//! in front of the vehicle.  The projective transform between them is solved
//! once when the [`PerspectiveRectifier`] is built; afterwards every frame is
//! resampled through a precomputed lookup table.
//!
//! Resampling is nearest-neighbour, so thresholding then warping a mask gives
//! the same result as warping the image then thresholding it.  Output pixels
//! that map outside the input frame are zero.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::image::Image;
//! use rover_perception::rectify::{Correspondence, PerspectiveRectifier};
//!
//! let corr = Correspondence::rover_default(320, 160);
//! let rectifier = PerspectiveRectifier::new(&corr, 320, 160).unwrap();
//! let warped = rectifier.warp_image(&Image::filled(320, 160, [9, 9, 9])).unwrap();
//! assert_eq!((warped.width(), warped.height()), (320, 160));
//! ```

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use rover_types::PerceptionError;
use serde::{Deserialize, Serialize};

use crate::image::{Image, Mask};

const COLLINEAR_EPS: f64 = 1e-6;
const W_EPS: f64 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// Correspondence
// ────────────────────────────────────────────────────────────────────────────

/// Camera-to-ground calibration: four source points in the raw frame and the
/// four overhead-view points they map to, as `[x, y]` pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub source: [[f32; 2]; 4],
    pub destination: [[f32; 2]; 4],
}

impl Correspondence {
    /// Source trapezoid of a one-metre grid cell as seen by the rover's
    /// 320x160 forward camera.
    pub const ROVER_SOURCE: [[f32; 2]; 4] = [[14.0, 140.0], [301.0, 140.0], [200.0, 96.0], [118.0, 96.0]];

    /// The stock calibration: the source trapezoid mapped onto a
    /// 10x10-pixel square 6 pixels above the bottom centre of the frame.
    pub fn rover_default(width: usize, height: usize) -> Self {
        Self::with_footprint(Self::ROVER_SOURCE, width, height, 5.0, 6.0)
    }

    /// Map `source` onto a `2 * half_size` square centred horizontally,
    /// `bottom_offset` pixels above the bottom edge of a `width x height`
    /// frame.
    ///
    /// Destination corners follow the source order: bottom-left,
    /// bottom-right, top-right, top-left.
    pub fn with_footprint(
        source: [[f32; 2]; 4],
        width: usize,
        height: usize,
        half_size: f32,
        bottom_offset: f32,
    ) -> Self {
        let cx = width as f32 / 2.0;
        let bottom = height as f32 - bottom_offset;
        let top = bottom - 2.0 * half_size;
        Self {
            source,
            destination: [
                [cx - half_size, bottom],
                [cx + half_size, bottom],
                [cx + half_size, top],
                [cx - half_size, top],
            ],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Homography
// ────────────────────────────────────────────────────────────────────────────

/// A 3x3 projective transform with `h[2][2] = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    /// Solve the unique homography taking `src[i]` to `dst[i]`.
    ///
    /// # Errors
    ///
    /// [`PerceptionError::DegenerateGeometry`] when either point set contains
    /// non-finite coordinates or three collinear points, or the resulting
    /// linear system is singular.
    pub fn from_points(src: &[[f32; 2]; 4], dst: &[[f32; 2]; 4]) -> Result<Self, PerceptionError> {
        check_quad("source", src)?;
        check_quad("destination", dst)?;

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let (x, y) = (f64::from(src[i][0]), f64::from(src[i][1]));
            let (u, v) = (f64::from(dst[i][0]), f64::from(dst[i][1]));
            let r = 2 * i;
            a.row_mut(r)
                .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
            a.row_mut(r + 1)
                .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
            b[r] = u;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b).ok_or_else(|| {
            PerceptionError::DegenerateGeometry("point correspondence system is singular".into())
        })?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(PerceptionError::DegenerateGeometry(
                "homography has non-finite coefficients".into(),
            ));
        }

        Ok(Self(Matrix3::new(
            h[0], h[1], h[2], //
            h[3], h[4], h[5], //
            h[6], h[7], 1.0,
        )))
    }

    /// The inverse transform.
    pub fn inverse(&self) -> Result<Self, PerceptionError> {
        self.0.try_inverse().map(Self).ok_or_else(|| {
            PerceptionError::DegenerateGeometry("homography is not invertible".into())
        })
    }

    /// Map a point, or `None` when it lands on the line at infinity.
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.0 * Vector3::new(x, y, 1.0);
        let w = p[2];
        if !w.is_finite() || w.abs() <= W_EPS {
            return None;
        }
        let (px, py) = (p[0] / w, p[1] / w);
        (px.is_finite() && py.is_finite()).then_some((px, py))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }
}

fn check_quad(label: &str, pts: &[[f32; 2]; 4]) -> Result<(), PerceptionError> {
    if pts.iter().flatten().any(|v| !v.is_finite()) {
        return Err(PerceptionError::DegenerateGeometry(format!(
            "{label} points contain non-finite coordinates"
        )));
    }
    for (i, j, k) in [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)] {
        let (a, b, c) = (pts[i], pts[j], pts[k]);
        let cross = f64::from(b[0] - a[0]) * f64::from(c[1] - a[1])
            - f64::from(b[1] - a[1]) * f64::from(c[0] - a[0]);
        if cross.abs() < COLLINEAR_EPS {
            return Err(PerceptionError::DegenerateGeometry(format!(
                "{label} points {i}, {j}, {k} are collinear"
            )));
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// PerspectiveRectifier
// ────────────────────────────────────────────────────────────────────────────

/// Warps frames of a fixed size through a fixed [`Correspondence`].
#[derive(Debug, Clone)]
pub struct PerspectiveRectifier {
    homography: Homography,
    width: usize,
    height: usize,
    /// Source pixel index for each output pixel, `None` when it falls outside
    /// the input frame.
    lut: Vec<Option<usize>>,
}

impl PerspectiveRectifier {
    /// Solve the transform and build the lookup table for
    /// `width x height` frames.
    pub fn new(
        correspondence: &Correspondence,
        width: usize,
        height: usize,
    ) -> Result<Self, PerceptionError> {
        let homography = Homography::from_points(&correspondence.source, &correspondence.destination)?;
        let inverse = homography.inverse()?;

        let mut lut = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                let src = inverse
                    .apply(col as f64, row as f64)
                    .and_then(|(sx, sy)| nearest(sx, sy, width, height));
                lut.push(src);
            }
        }

        Ok(Self {
            homography,
            width,
            height,
            lut,
        })
    }

    /// The forward (raw → overhead) transform.
    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Resample a 3-channel image, keeping its color space.
    pub fn warp_image(&self, img: &Image) -> Result<Image, PerceptionError> {
        self.check_size(img.width(), img.height())?;
        let src = img.data();
        let mut out = vec![0u8; src.len()];
        for (dst, lut) in out.chunks_exact_mut(3).zip(&self.lut) {
            if let Some(i) = lut {
                dst.copy_from_slice(&src[i * 3..i * 3 + 3]);
            }
        }
        Ok(img.with_data(out))
    }

    /// Resample a binary mask.
    pub fn warp_mask(&self, mask: &Mask) -> Result<Mask, PerceptionError> {
        self.check_size(mask.width(), mask.height())?;
        let src = mask.data();
        let bits = self.lut.iter().map(|lut| lut.map_or(0, |i| src[i])).collect();
        Ok(Mask::from_bits(self.width, self.height, bits))
    }

    /// Mask of output pixels that have a source pixel in the input frame.
    pub fn field_of_view(&self) -> Mask {
        let bits = self.lut.iter().map(|lut| u8::from(lut.is_some())).collect();
        Mask::from_bits(self.width, self.height, bits)
    }

    fn check_size(&self, width: usize, height: usize) -> Result<(), PerceptionError> {
        if (width, height) != (self.width, self.height) {
            return Err(PerceptionError::MalformedImage(format!(
                "frame is {width}x{height}, rectifier calibrated for {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

fn nearest(x: f64, y: f64, width: usize, height: usize) -> Option<usize> {
    let (col, row) = (x.round(), y.round());
    if col < 0.0 || row < 0.0 || col >= width as f64 || row >= height as f64 {
        return None;
    }
    Some(row as usize * width + col as usize)
}
