//! Owned pixel buffers: 3-channel [`Image`]s and single-channel [`Mask`]s.
//!
//! Both are stored row-major with no padding.  Coordinates are `(col, row)`
//! with row 0 at the top of the frame.

use rover_types::PerceptionError;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Color spaces
// ────────────────────────────────────────────────────────────────────────────

/// The color space an [`Image`]'s three channels are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Whatever the camera captured (RGB for the rover's camera).
    Native,
    /// Hue / saturation / value, 8-bit: H in `[0, 180)`, S and V in `[0, 255]`.
    Hsv,
}

/// How the bytes of a native pixel are read when converting to HSV.
///
/// `Bgr` treats the first byte as blue.  The stock thresholds were tuned on
/// RGB frames converted as if they were BGR, so it is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    Rgb,
    #[default]
    Bgr,
}

// ────────────────────────────────────────────────────────────────────────────
// Image
// ────────────────────────────────────────────────────────────────────────────

/// An immutable 3-channel, 8-bit image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    space: ColorSpace,
    data: Vec<u8>,
}

impl Image {
    /// Wrap a tightly packed `width * height * 3` byte buffer captured by the
    /// camera.
    ///
    /// # Errors
    ///
    /// [`PerceptionError::MalformedImage`] when either dimension is zero or
    /// the buffer length does not match.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, PerceptionError> {
        if width == 0 || height == 0 {
            return Err(PerceptionError::MalformedImage(format!(
                "zero-sized frame {width}x{height}"
            )));
        }
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(PerceptionError::MalformedImage(format!(
                "{width}x{height} frame needs {expected} bytes (3 channels), got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            space: ColorSpace::Native,
            data,
        })
    }

    /// Build a native image by evaluating `f(col, row)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for row in 0..height {
            for col in 0..width {
                data.extend_from_slice(&f(col, row));
            }
        }
        Self {
            width,
            height,
            space: ColorSpace::Native,
            data,
        }
    }

    /// A native image where every pixel is `pixel`.
    pub fn filled(width: usize, height: usize, pixel: [u8; 3]) -> Self {
        Self::from_fn(width, height, |_, _| pixel)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn space(&self) -> ColorSpace {
        self.space
    }

    /// Raw row-major pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The three channels of the pixel at `(col, row)`.
    ///
    /// # Panics
    ///
    /// Panics when the coordinate lies outside the image.
    pub fn pixel(&self, col: usize, row: usize) -> [u8; 3] {
        assert!(col < self.width && row < self.height, "pixel ({col}, {row}) out of bounds");
        let i = (row * self.width + col) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Iterate over all pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }

    /// Convert a native image to 8-bit HSV.
    ///
    /// An image that is already HSV is returned unchanged.
    pub fn to_hsv(&self, order: ChannelOrder) -> Image {
        if self.space == ColorSpace::Hsv {
            return self.clone();
        }
        let mut data = Vec::with_capacity(self.data.len());
        for p in self.pixels() {
            let (r, g, b) = match order {
                ChannelOrder::Rgb => (p[0], p[1], p[2]),
                ChannelOrder::Bgr => (p[2], p[1], p[0]),
            };
            data.extend_from_slice(&rgb_to_hsv(r, g, b));
        }
        Image {
            width: self.width,
            height: self.height,
            space: ColorSpace::Hsv,
            data,
        }
    }

    /// Same dimensions and color space as `self`, with new pixel bytes.
    pub(crate) fn with_data(&self, data: Vec<u8>) -> Image {
        debug_assert_eq!(data.len(), self.data.len());
        Image {
            width: self.width,
            height: self.height,
            space: self.space,
            data,
        }
    }
}

/// 8-bit RGB → HSV using half-degree hue so it fits in a byte.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = f32::from(v - min);

    let s = if v == 0 {
        0.0
    } else {
        255.0 * diff / f32::from(v)
    };

    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let h = if diff == 0.0 {
        0.0
    } else if v as f32 == r {
        30.0 * (g - b) / diff
    } else if v as f32 == g {
        60.0 + 30.0 * (b - r) / diff
    } else {
        120.0 + 30.0 * (r - g) / diff
    };
    let mut h = h.round() as i32;
    if h < 0 {
        h += 180;
    }

    [h as u8, s.round() as u8, v]
}

// ────────────────────────────────────────────────────────────────────────────
// Mask
// ────────────────────────────────────────────────────────────────────────────

/// A binary mask: one byte per pixel, `1` where a predicate held, else `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Mask {
    /// An all-zero mask.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Build a mask by evaluating `f(col, row)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(u8::from(f(col, row)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub(crate) fn from_bits(width: usize, height: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw row-major bytes (`0` or `1`).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, col: usize, row: usize) -> bool {
        self.data[row * self.width + col] != 0
    }

    pub fn set(&mut self, col: usize, row: usize, value: bool) {
        self.data[row * self.width + col] = u8::from(value);
    }

    /// Number of set pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b != 0).count()
    }

    /// `(row, col)` of every set pixel in row-major order.
    pub fn set_pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.width;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, b)| **b != 0)
            .map(move |(i, _)| (i / width, i % width))
    }

    /// Pixel-wise AND with another mask of the same size.
    pub fn and(&self, other: &Mask) -> Mask {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| u8::from(*a != 0 && *b != 0))
            .collect();
        Mask::from_bits(self.width, self.height, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_wrong_length() {
        let err = Image::from_raw(4, 4, vec![0; 4 * 4]).unwrap_err();
        assert!(matches!(err, PerceptionError::MalformedImage(_)));
        assert!(err.to_string().contains("48 bytes"));
    }

    #[test]
    fn from_raw_rejects_zero_size() {
        assert!(Image::from_raw(0, 10, Vec::new()).is_err());
    }

    #[test]
    fn pixel_reads_row_major() {
        let img = Image::from_fn(3, 2, |c, r| [c as u8, r as u8, 7]);
        assert_eq!(img.pixel(2, 1), [2, 1, 7]);
        assert_eq!(img.pixels().count(), 6);
    }

    #[test]
    fn hsv_of_primaries() {
        let red = Image::filled(1, 1, [255, 0, 0]).to_hsv(ChannelOrder::Rgb);
        assert_eq!(red.pixel(0, 0), [0, 255, 255]);

        let green = Image::filled(1, 1, [0, 255, 0]).to_hsv(ChannelOrder::Rgb);
        assert_eq!(green.pixel(0, 0), [60, 255, 255]);

        let blue = Image::filled(1, 1, [0, 0, 255]).to_hsv(ChannelOrder::Rgb);
        assert_eq!(blue.pixel(0, 0), [120, 255, 255]);
        assert_eq!(blue.space(), ColorSpace::Hsv);
    }

    #[test]
    fn hsv_bgr_order_swaps_red_and_blue() {
        // Bytes (255, 0, 0) read as BGR are pure blue.
        let img = Image::filled(1, 1, [255, 0, 0]).to_hsv(ChannelOrder::Bgr);
        assert_eq!(img.pixel(0, 0), [120, 255, 255]);
    }

    #[test]
    fn hsv_of_grey_and_black() {
        let grey = Image::filled(1, 1, [128, 128, 128]).to_hsv(ChannelOrder::Rgb);
        assert_eq!(grey.pixel(0, 0), [0, 0, 128]);
        let black = Image::filled(1, 1, [0, 0, 0]).to_hsv(ChannelOrder::Rgb);
        assert_eq!(black.pixel(0, 0), [0, 0, 0]);
    }

    #[test]
    fn hsv_hue_wraps_below_zero() {
        // Magenta-leaning red: g < b gives a negative raw hue.
        let img = Image::filled(1, 1, [255, 0, 20]).to_hsv(ChannelOrder::Rgb);
        let [h, _, _] = img.pixel(0, 0);
        assert!(h > 170 && h < 180, "hue {h} should wrap near 180");
    }

    #[test]
    fn mask_set_pixels_are_row_col() {
        let mut mask = Mask::zeros(4, 3);
        mask.set(1, 2, true);
        mask.set(3, 0, true);
        let set: Vec<_> = mask.set_pixels().collect();
        assert_eq!(set, vec![(0, 3), (2, 1)]);
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn mask_and_intersects() {
        let a = Mask::from_fn(2, 2, |c, _| c == 0);
        let b = Mask::from_fn(2, 2, |_, r| r == 0);
        let both = a.and(&b);
        assert_eq!(both.count(), 1);
        assert!(both.get(0, 0));
    }
}
