//! Color classifier.
//!
//! Turns an [`Image`] into a binary [`Mask`] by comparing every channel of
//! every pixel against a threshold triple.  A pixel is selected only when
//! **all three** channels pass; there are no partial-channel matches.
//!
//! # Example
//!
//! ```rust
//! use rover_perception::color::{color_thresh, Direction};
//! use rover_perception::image::Image;
//!
//! let img = Image::from_fn(4, 4, |c, r| {
//!     if (c, r) == (2, 1) { [200, 200, 200] } else { [100, 100, 100] }
//! });
//! let mask = color_thresh(&img, [160, 160, 160], Direction::Above);
//! assert_eq!(mask.count(), 1);
//! assert!(mask.get(2, 1));
//! ```

use rover_types::TerrainClass;
use serde::{Deserialize, Serialize};

use crate::image::{Image, Mask};

/// Which side of the threshold a channel must fall on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `channel > threshold`
    Above,
    /// `channel < threshold`
    Below,
}

/// A configurable per-class threshold.
///
/// `upper`, when present, additionally requires every channel to be strictly
/// below it, turning an `Above` threshold into a narrow band (useful for
/// isolating a single hue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorThreshold {
    pub levels: [u8; 3],
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<[u8; 3]>,
}

impl ColorThreshold {
    pub fn above(levels: [u8; 3]) -> Self {
        Self {
            levels,
            direction: Direction::Above,
            upper: None,
        }
    }

    pub fn below(levels: [u8; 3]) -> Self {
        Self {
            levels,
            direction: Direction::Below,
            upper: None,
        }
    }

    /// Bound the selection from above as well.
    pub fn with_upper(mut self, upper: [u8; 3]) -> Self {
        self.upper = Some(upper);
        self
    }

    /// True when `pixel` satisfies this threshold on all three channels.
    pub fn matches(&self, pixel: [u8; 3]) -> bool {
        let primary = match self.direction {
            Direction::Above => (0..3).all(|c| pixel[c] > self.levels[c]),
            Direction::Below => (0..3).all(|c| pixel[c] < self.levels[c]),
        };
        primary
            && self
                .upper
                .is_none_or(|upper| (0..3).all(|c| pixel[c] < upper[c]))
    }

    /// Classify every pixel of `img`.
    pub fn apply(&self, img: &Image) -> Mask {
        let bits = img.pixels().map(|p| u8::from(self.matches(p))).collect();
        Mask::from_bits(img.width(), img.height(), bits)
    }
}

/// Threshold `img` on all three channels in `direction`.
///
/// An image with no qualifying pixels yields an all-zero mask.
pub fn color_thresh(img: &Image, levels: [u8; 3], direction: Direction) -> Mask {
    ColorThreshold {
        levels,
        direction,
        upper: None,
    }
    .apply(img)
}

// ────────────────────────────────────────────────────────────────────────────
// PerClass
// ────────────────────────────────────────────────────────────────────────────

/// One value per [`TerrainClass`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerClass<T> {
    pub obstacle: T,
    pub target: T,
    pub navigable: T,
}

impl<T> PerClass<T> {
    pub fn get(&self, class: TerrainClass) -> &T {
        match class {
            TerrainClass::Obstacle => &self.obstacle,
            TerrainClass::Target => &self.target,
            TerrainClass::Navigable => &self.navigable,
        }
    }

    /// Apply `f` to each entry, keeping the class association.
    pub fn map<U>(&self, mut f: impl FnMut(TerrainClass, &T) -> U) -> PerClass<U> {
        PerClass {
            obstacle: f(TerrainClass::Obstacle, &self.obstacle),
            target: f(TerrainClass::Target, &self.target),
            navigable: f(TerrainClass::Navigable, &self.navigable),
        }
    }

    /// `(class, value)` pairs in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (TerrainClass, &T)> {
        TerrainClass::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_bright_pixel() -> Image {
        Image::from_fn(5, 3, |c, r| {
            if c == 3 && r == 2 {
                [200, 200, 200]
            } else {
                [100, 100, 100]
            }
        })
    }

    #[test]
    fn above_selects_single_bright_pixel() {
        let mask = color_thresh(&one_bright_pixel(), [160, 160, 160], Direction::Above);
        assert_eq!(mask.count(), 1);
        assert!(mask.get(3, 2));
    }

    #[test]
    fn below_selects_complement() {
        let mask = color_thresh(&one_bright_pixel(), [160, 160, 160], Direction::Below);
        assert_eq!(mask.count(), 14);
        assert!(!mask.get(3, 2));
    }

    #[test]
    fn requires_all_channels() {
        let img = Image::filled(2, 2, [200, 200, 100]);
        let mask = color_thresh(&img, [160, 160, 160], Direction::Above);
        assert_eq!(mask.count(), 0);
    }

    #[test]
    fn comparison_is_strict() {
        let img = Image::filled(2, 2, [160, 160, 160]);
        assert_eq!(color_thresh(&img, [160, 160, 160], Direction::Above).count(), 0);
        assert_eq!(color_thresh(&img, [160, 160, 160], Direction::Below).count(), 0);
    }

    #[test]
    fn no_match_is_all_zero_not_error() {
        let img = Image::filled(8, 8, [0, 0, 0]);
        let mask = color_thresh(&img, [0, 0, 160], Direction::Above);
        assert_eq!(mask.count(), 0);
        assert_eq!(mask.data().len(), 64);
    }

    #[test]
    fn upper_bound_forms_a_band() {
        let t = ColorThreshold::above([20, 120, 120]).with_upper([40, 255, 255]);
        assert!(t.matches([30, 200, 200]));
        assert!(!t.matches([90, 200, 200]));
        assert!(!t.matches([10, 200, 200]));
    }

    #[test]
    fn threshold_deserializes_from_toml() {
        let t: ColorThreshold = toml::from_str(
            r#"
            levels = [255, 255, 120]
            direction = "below"
            "#,
        )
        .unwrap();
        assert_eq!(t, ColorThreshold::below([255, 255, 120]));
    }

    #[test]
    fn per_class_map_keeps_association() {
        let counts = PerClass {
            obstacle: 1,
            target: 2,
            navigable: 3,
        };
        let doubled = counts.map(|_, v| v * 2);
        assert_eq!(*doubled.get(TerrainClass::Navigable), 6);
        let order: Vec<_> = counts.iter().map(|(c, _)| c).collect();
        assert_eq!(order, TerrainClass::ALL.to_vec());
    }
}
