use serde::{Deserialize, Serialize};

use crate::types::SheetSize;

/// Inclusive hue/saturation/value bounds for one palette entry.
///
/// Hue is in degrees [0, 360) and may wrap around zero (`lo > hi` means the
/// range crosses red); saturation and value are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvRange {
    pub hue: (f32, f32),
    pub saturation: (f32, f32),
    pub value: (f32, f32),
}

impl HsvRange {
    pub const fn new(hue: (f32, f32), saturation: (f32, f32), value: (f32, f32)) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    pub fn contains(&self, h: f32, s: f32, v: f32) -> bool {
        let (h_lo, h_hi) = self.hue;
        let in_hue = if h_lo <= h_hi {
            h >= h_lo && h <= h_hi
        } else {
            h >= h_lo || h <= h_hi
        };
        in_hue
            && s >= self.saturation.0
            && s <= self.saturation.1
            && v >= self.value.0
            && v <= self.value.1
    }
}

/// Thinning algorithm used to reduce the object mask to a skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThinningMethod {
    /// Two-subiteration neighborhood thinning. Produces a connected,
    /// endpoint-preserving skeleton; the default because curvilinear length
    /// needs connectivity.
    #[default]
    ZhangSuen,
    /// Iterative erode/open/subtract skeleton. Cheaper per pass but may emit
    /// disconnected medial fragments.
    Morphological,
}

/// Tunable parameters for one pipeline instance.
///
/// Every empirical threshold lives here rather than inline in the stages.
/// The defaults reproduce the documented behavior; none of them is a hard
/// invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Physical reference sheet placed under the object.
    pub sheet: SheetSize,
    /// Reject scales at or below this many pixels per millimeter.
    pub min_scale_px_per_mm: f64,
    /// Candidate contours must cover at least this fraction of the sheet
    /// region's area.
    pub min_object_area_fraction: f64,
    /// Absolute area floor in px², used by the grayscale strategy which has
    /// no region-relative reference.
    pub min_object_area_px: f64,
    /// Minimum long/short side ratio of the rotated bounding box. Rejects
    /// round blobs such as shadows and specular reflections.
    pub min_elongation: f64,
    /// Ordered palette tried by the color-range segmenter.
    pub color_ranges: Vec<HsvRange>,
    /// Morphological cleanup kernel diameter in pixels.
    pub morph_kernel_size: u32,
    /// Thinning algorithm for skeleton-based length and curvature.
    pub thinning: ThinningMethod,
    /// Sample every Nth skeleton-path point when estimating curvature.
    pub curvature_sample_step: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sheet: SheetSize::A4,
            min_scale_px_per_mm: 0.5,
            min_object_area_fraction: 0.01,
            min_object_area_px: 500.0,
            min_elongation: 1.3,
            color_ranges: default_color_ranges(),
            morph_kernel_size: 5,
            thinning: ThinningMethod::default(),
            curvature_sample_step: 5,
        }
    }
}

/// Palette covering ripe green through unripe yellow-green, shadowed dark
/// green and washed-out low-saturation produce, tried in order.
pub fn default_color_ranges() -> Vec<HsvRange> {
    vec![
        HsvRange::new((70.0, 170.0), (0.25, 1.0), (0.15, 1.0)),
        HsvRange::new((40.0, 75.0), (0.20, 1.0), (0.25, 1.0)),
        HsvRange::new((60.0, 180.0), (0.10, 1.0), (0.04, 0.40)),
        HsvRange::new((50.0, 190.0), (0.05, 0.60), (0.08, 0.55)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_range_plain_interval() {
        let range = HsvRange::new((70.0, 170.0), (0.25, 1.0), (0.15, 1.0));
        assert!(range.contains(120.0, 0.6, 0.5));
        assert!(!range.contains(30.0, 0.6, 0.5));
        assert!(!range.contains(120.0, 0.1, 0.5));
        assert!(!range.contains(120.0, 0.6, 0.05));
    }

    #[test]
    fn hsv_range_wraps_around_red() {
        let range = HsvRange::new((340.0, 20.0), (0.0, 1.0), (0.0, 1.0));
        assert!(range.contains(350.0, 0.5, 0.5));
        assert!(range.contains(10.0, 0.5, 0.5));
        assert!(!range.contains(180.0, 0.5, 0.5));
    }

    #[test]
    fn default_config_is_sane() {
        let config = ProcessorConfig::default();
        assert_eq!(config.sheet, SheetSize::A4);
        assert!(config.min_elongation > 1.0);
        assert!(!config.color_ranges.is_empty());
        assert_eq!(config.thinning, ThinningMethod::ZhangSuen);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ProcessorConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ProcessorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
