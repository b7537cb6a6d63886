//! Object segmentation within the sheet region.
//!
//! Four interchangeable strategies are tried in order until one yields a
//! contour passing the shape filter: HSV color-range thresholding over an
//! ordered palette, grayscale Otsu thresholding, Canny edge detection, and a
//! brightness-scored fallback for low-contrast dark objects. Callers only see
//! the winning contour; the strategy name is logged for debugging.

use cucumeter_common::{HsvRange, ProcessorConfig};
use image::imageops;
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{adaptive_threshold, otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate, open};
use imageproc::point::Point;
use log::debug;
use palette::{Hsv, IntoColor, Srgb};

use crate::geometry::{bounding_rect, contour_area, fill_ratio, solidity, RotatedRect};

const CANNY_LOW: f32 = 20.0;
const CANNY_HIGH: f32 = 60.0;
const BRIGHTNESS_BLOCK_RADIUS: u32 = 12;
/// Candidates covering more of the region than this are the sheet itself
/// (or its shadow), not the object.
const MAX_OBJECT_AREA_FRACTION: f64 = 0.7;

/// Composite score weights for the brightness-based fallback.
const WEIGHT_ASPECT: f64 = 0.4;
const WEIGHT_FILL: f64 = 0.2;
const WEIGHT_SOLIDITY: f64 = 0.2;
const WEIGHT_DARKNESS: f64 = 0.2;

/// A successful segmentation and the strategy that produced it.
/// Contour points are in region (cropped sheet) coordinates.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub contour: Vec<Point<i32>>,
    pub strategy: &'static str,
}

/// Isolate the target object's silhouette within the sheet region.
/// Returns `None` when no strategy yields a plausible contour.
pub fn segment(region: &RgbImage, config: &ProcessorConfig) -> Option<Segmentation> {
    let region_area = region.width() as f64 * region.height() as f64;
    let min_area = config.min_object_area_fraction * region_area;

    if let Some(contour) = segment_color_range(region, config, min_area) {
        debug!("object found by color-range ({} points)", contour.len());
        return Some(Segmentation {
            contour,
            strategy: "color-range",
        });
    }
    if let Some(contour) = segment_otsu(region, config) {
        debug!("object found by grayscale-otsu ({} points)", contour.len());
        return Some(Segmentation {
            contour,
            strategy: "grayscale-otsu",
        });
    }
    if let Some(contour) = segment_edges(region, config, min_area) {
        debug!("object found by canny-edges ({} points)", contour.len());
        return Some(Segmentation {
            contour,
            strategy: "canny-edges",
        });
    }
    if let Some(contour) = segment_brightness(region, config, min_area) {
        debug!("object found by brightness-score ({} points)", contour.len());
        return Some(Segmentation {
            contour,
            strategy: "brightness-score",
        });
    }
    None
}

fn morph_radius(config: &ProcessorConfig) -> u8 {
    (config.morph_kernel_size.max(3) / 2).min(u8::MAX as u32) as u8
}

/// Binary mask of pixels whose HSV value falls inside `range`.
fn hsv_in_range_mask(region: &RgbImage, range: &HsvRange) -> GrayImage {
    let mut mask = GrayImage::new(region.width(), region.height());
    for (x, y, px) in region.enumerate_pixels() {
        let rgb = Srgb::new(
            px[0] as f32 / 255.0,
            px[1] as f32 / 255.0,
            px[2] as f32 / 255.0,
        );
        let hsv: Hsv = rgb.into_color();
        let hue = hsv.hue.into_positive_degrees();
        if range.contains(hue, hsv.saturation, hsv.value) {
            mask.put_pixel(x, y, Luma([255u8]));
        }
    }
    mask
}

/// Largest external contour of the mask passing the area and elongation
/// filters. The elongation filter rejects round artifacts such as shadows
/// and reflections that are never the target shape; the upper area bound
/// rejects the sheet background itself.
fn largest_passing_contour(
    mask: &GrayImage,
    min_area: f64,
    min_elongation: f64,
) -> Option<Vec<Point<i32>>> {
    let max_area = MAX_OBJECT_AREA_FRACTION * mask.width() as f64 * mask.height() as f64;
    let contours: Vec<Contour<i32>> = find_contours(mask);
    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| c.points)
        .filter(|points| {
            points.len() >= 3 && {
                let area = contour_area(points);
                area >= min_area && area <= max_area
            }
        })
        .filter(|points| match RotatedRect::from_points(points) {
            Some(rect) => rect.elongation() >= min_elongation,
            None => false,
        })
        .max_by(|a, b| {
            contour_area(a)
                .partial_cmp(&contour_area(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// HSV in-range thresholding over the configured palette, cleaned with
/// close/open and a final dilation to recover thin edges.
pub fn segment_color_range(
    region: &RgbImage,
    config: &ProcessorConfig,
    min_area: f64,
) -> Option<Vec<Point<i32>>> {
    let k = morph_radius(config);
    for (i, range) in config.color_ranges.iter().enumerate() {
        let mask = hsv_in_range_mask(region, range);
        let cleaned = open(&close(&mask, Norm::L1, k), Norm::L1, k);
        let dilated = dilate(&cleaned, Norm::L1, 1);
        if let Some(contour) = largest_passing_contour(&dilated, min_area, config.min_elongation) {
            debug!("palette entry {i} matched");
            return Some(contour);
        }
    }
    None
}

/// Otsu-thresholded grayscale, inverted because the object is darker than
/// the sheet. Filters by absolute area only.
pub fn segment_otsu(region: &RgbImage, config: &ProcessorConfig) -> Option<Vec<Point<i32>>> {
    let gray = imageops::grayscale(region);
    let level = otsu_level(&gray);
    let binary = threshold(&gray, level, ThresholdType::BinaryInverted);
    let k = morph_radius(config);
    let cleaned = open(&close(&binary, Norm::L1, k), Norm::L1, k);
    largest_passing_contour(&cleaned, config.min_object_area_px, 1.0)
}

/// Gaussian blur, Canny, then dilation to close small gaps before contour
/// extraction. Filtered by area and elongation like the color strategy.
pub fn segment_edges(
    region: &RgbImage,
    config: &ProcessorConfig,
    min_area: f64,
) -> Option<Vec<Point<i32>>> {
    let gray = imageops::grayscale(region);
    let blurred = gaussian_blur_f32(&gray, 1.5);
    let edges = canny(&blurred, CANNY_LOW, CANNY_HIGH);
    let dilated = dilate(&edges, Norm::L1, 2);
    largest_passing_contour(&dilated, min_area, config.min_elongation)
}

/// Fallback for low-contrast dark objects: inverse adaptive threshold with a
/// wide kernel, then a composite plausibility score over all candidates
/// combining aspect ratio, fill ratio, solidity and darkness.
pub fn segment_brightness(
    region: &RgbImage,
    config: &ProcessorConfig,
    min_area: f64,
) -> Option<Vec<Point<i32>>> {
    let gray = imageops::grayscale(region);
    let mut binary = adaptive_threshold(&gray, BRIGHTNESS_BLOCK_RADIUS);
    imageops::invert(&mut binary);
    let k = morph_radius(config).saturating_add(2);
    let closed = close(&binary, Norm::L1, k);

    let max_area = MAX_OBJECT_AREA_FRACTION * region.width() as f64 * region.height() as f64;
    let contours: Vec<Contour<i32>> = find_contours(&closed);
    let mut best: Option<(f64, Vec<Point<i32>>)> = None;
    for contour in contours {
        if contour.border_type != BorderType::Outer || contour.points.len() < 3 {
            continue;
        }
        let area = contour_area(&contour.points);
        if area < min_area || area > max_area {
            continue;
        }
        let score = plausibility_score(&contour.points, region);
        debug!(
            "brightness candidate: {} points, score {score:.3}",
            contour.points.len()
        );
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, contour.points));
        }
    }
    best.map(|(_, points)| points)
}

/// Weighted sum of shape plausibility metrics, each normalized to [0, 1].
fn plausibility_score(points: &[Point<i32>], region: &RgbImage) -> f64 {
    let aspect = match RotatedRect::from_points(points) {
        Some(rect) => ((rect.elongation() - 1.0) / 3.0).clamp(0.0, 1.0),
        None => 0.0,
    };
    let fill = fill_ratio(points).clamp(0.0, 1.0);
    let solid = solidity(points);
    let darkness = 1.0 - mean_value_brightness(points, region);
    WEIGHT_ASPECT * aspect + WEIGHT_FILL * fill + WEIGHT_SOLIDITY * solid + WEIGHT_DARKNESS * darkness
}

/// Mean HSV value channel (max RGB component) inside the contour's bounding
/// box, normalized to [0, 1].
fn mean_value_brightness(points: &[Point<i32>], region: &RgbImage) -> f64 {
    let bbox = bounding_rect(points).clamped(region.width(), region.height());
    if !bbox.is_valid() {
        return 1.0;
    }
    let mut sum = 0u64;
    let mut count = 0u64;
    for y in bbox.y..bbox.y + bbox.height {
        for x in bbox.x..bbox.x + bbox.width {
            let px = region.get_pixel(x as u32, y as u32);
            sum += px[0].max(px[1]).max(px[2]) as u64;
            count += 1;
        }
    }
    if count == 0 {
        return 1.0;
    }
    sum as f64 / count as f64 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use cucumeter_common::PixelRect;
    use image::Rgb;

    const SHEET_WHITE: Rgb<u8> = Rgb([235u8, 235, 235]);

    fn white_region(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, SHEET_WHITE)
    }

    fn paint_rect(img: &mut RgbImage, rect: PixelRect, color: Rgb<u8>) {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    fn paint_disc(img: &mut RgbImage, cx: i32, cy: i32, r: i32, color: Rgb<u8>) {
        for y in cy - r..=cy + r {
            for x in cx - r..=cx + r {
                if (x - cx).pow(2) + (y - cy).pow(2) <= r * r {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    fn assert_bbox_close(points: &[Point<i32>], expected: PixelRect, slack: i32) {
        let bbox = bounding_rect(points);
        assert!(
            (bbox.x - expected.x).abs() <= slack
                && (bbox.y - expected.y).abs() <= slack
                && (bbox.width - expected.width).abs() <= slack
                && (bbox.height - expected.height).abs() <= slack,
            "bbox {bbox:?} vs expected {expected:?}"
        );
    }

    #[test]
    fn color_range_finds_green_blob() {
        let blob = PixelRect::new(150, 250, 500, 120);
        let mut region = white_region(800, 1131);
        paint_rect(&mut region, blob, Rgb([40u8, 130, 45]));
        let config = ProcessorConfig::default();
        let seg = segment(&region, &config).expect("blob not segmented");
        assert_eq!(seg.strategy, "color-range");
        assert_bbox_close(&seg.contour, blob, 12);
    }

    #[test]
    fn color_range_rejects_round_blob() {
        let mut region = white_region(800, 1131);
        paint_disc(&mut region, 400, 500, 100, Rgb([40u8, 130, 45]));
        let config = ProcessorConfig::default();
        let min_area = config.min_object_area_fraction * 800.0 * 1131.0;
        assert!(segment_color_range(&region, &config, min_area).is_none());
    }

    #[test]
    fn otsu_finds_neutral_gray_blob() {
        let blob = PixelRect::new(100, 300, 400, 90);
        let mut region = white_region(700, 900);
        paint_rect(&mut region, blob, Rgb([80u8, 80, 80]));
        let config = ProcessorConfig::default();
        let contour = segment_otsu(&region, &config).expect("blob not segmented");
        assert_bbox_close(&contour, blob, 12);
    }

    #[test]
    fn edges_find_midtone_blob() {
        let blob = PixelRect::new(120, 200, 350, 80);
        let mut region = white_region(600, 800);
        paint_rect(&mut region, blob, Rgb([150u8, 150, 150]));
        let config = ProcessorConfig::default();
        let min_area = config.min_object_area_fraction * 600.0 * 800.0;
        let contour = segment_edges(&region, &config, min_area).expect("blob not segmented");
        assert_bbox_close(&contour, blob, 15);
    }

    #[test]
    fn brightness_score_finds_dark_blob() {
        let blob = PixelRect::new(90, 150, 380, 100);
        let mut region = white_region(600, 800);
        paint_rect(&mut region, blob, Rgb([60u8, 50, 45]));
        let config = ProcessorConfig::default();
        let min_area = config.min_object_area_fraction * 600.0 * 800.0;
        let contour =
            segment_brightness(&region, &config, min_area).expect("blob not segmented");
        assert_bbox_close(&contour, blob, 20);
    }

    #[test]
    fn blank_region_segments_nothing() {
        let region = white_region(400, 500);
        assert!(segment(&region, &ProcessorConfig::default()).is_none());
    }

    #[test]
    fn speck_below_area_floor_is_ignored() {
        let mut region = white_region(400, 500);
        paint_rect(&mut region, PixelRect::new(200, 200, 12, 4), Rgb([40u8, 130, 45]));
        assert!(segment(&region, &ProcessorConfig::default()).is_none());
    }
}
