//! Reference-sheet detection.
//!
//! Three strategies, tried from most to least discriminating: adaptive
//! polygon approximation, largest-contour-on-binary, and a fixed-margin
//! fallback that only assumes the sheet roughly fills the frame. The first
//! strategy to return a valid rectangle wins.

use cucumeter_common::PixelRect;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{adaptive_threshold, equalize_histogram, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::close;
use imageproc::point::Point;
use log::debug;

use crate::geometry::{bounding_rect, contour_area};

/// Grayscale level above which a pixel counts as sheet-white for the
/// fixed-threshold strategy.
const BINARY_SHEET_THRESHOLD: u8 = 170;
/// Longest image dimension the adaptive strategy works at; larger inputs are
/// downscaled first and the result rescaled back.
const ADAPTIVE_MAX_DIM: u32 = 800;
const ADAPTIVE_BLOCK_RADIUS: u32 = 5;
const ADAPTIVE_BLUR_SIGMA: f32 = 1.0;
/// The margin heuristic assumes the sheet is inset by 1/20 of each dimension.
const MARGIN_DIVISOR: i32 = 20;

/// A successful sheet detection and the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetDetection {
    pub rect: PixelRect,
    pub strategy: &'static str,
}

/// Locate the reference sheet in the source image.
///
/// Returns `None` only when every strategy fails, including the margin
/// fallback (which can only fail on degenerate, near-empty images).
pub fn detect_sheet(image: &RgbImage) -> Option<SheetDetection> {
    let gray = imageops::grayscale(image);

    if let Some(rect) = detect_adaptive_polygon(&gray) {
        debug!("sheet found by adaptive-polygon: {rect:?}");
        return Some(SheetDetection {
            rect,
            strategy: "adaptive-polygon",
        });
    }
    if let Some(rect) = detect_largest_binary_contour(&gray) {
        debug!("sheet found by binary-contour: {rect:?}");
        return Some(SheetDetection {
            rect,
            strategy: "binary-contour",
        });
    }
    let rect = margin_heuristic(image.width(), image.height())?;
    debug!("sheet assumed by margin fallback: {rect:?}");
    Some(SheetDetection {
        rect,
        strategy: "margin-fallback",
    })
}

/// Downscale, normalize brightness, blur, inverse adaptive threshold, close,
/// then approximate the dominant contour to a polygon and take its bounding
/// box, rescaled to source resolution.
///
/// The inverse threshold marks the band *around* the bright sheet rather
/// than the sheet itself; when that band encloses a dominant hole border,
/// the hole hugs the true paper boundary and is preferred over the band's
/// outer border.
pub fn detect_adaptive_polygon(gray: &GrayImage) -> Option<PixelRect> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let max_dim = w.max(h);
    let scale = if max_dim > ADAPTIVE_MAX_DIM {
        ADAPTIVE_MAX_DIM as f64 / max_dim as f64
    } else {
        1.0
    };
    let small = if scale < 1.0 {
        let sw = ((w as f64 * scale).round() as u32).max(1);
        let sh = ((h as f64 * scale).round() as u32).max(1);
        imageops::resize(gray, sw, sh, FilterType::Triangle)
    } else {
        gray.clone()
    };

    let normalized = equalize_histogram(&small);
    let blurred = gaussian_blur_f32(&normalized, ADAPTIVE_BLUR_SIGMA);
    let mut binary = adaptive_threshold(&blurred, ADAPTIVE_BLOCK_RADIUS);
    imageops::invert(&mut binary);
    let closed = close(&binary, Norm::L1, 2);

    let contours: Vec<Contour<i32>> = find_contours(&closed);
    let (outer_idx, outer) = contours
        .iter()
        .enumerate()
        .filter(|(_, c)| c.border_type == BorderType::Outer)
        .max_by(|(_, a), (_, b)| {
            contour_area(&a.points)
                .partial_cmp(&contour_area(&b.points))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

    let mut boundary: &[Point<i32>] = &outer.points;
    let outer_bbox_area = bounding_rect(&outer.points).area() as f64;
    if let Some(hole) = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Hole && c.parent == Some(outer_idx))
        .max_by(|a, b| {
            contour_area(&a.points)
                .partial_cmp(&contour_area(&b.points))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    {
        if contour_area(&hole.points) >= 0.25 * outer_bbox_area {
            boundary = &hole.points;
        }
    }
    if boundary.len() < 3 {
        return None;
    }

    let epsilon = 0.02 * arc_length(boundary, true);
    let polygon = approximate_polygon_dp(boundary, epsilon, true);
    let rect = bounding_rect(&polygon);
    if !rect.is_valid() {
        return None;
    }
    // A candidate spanning essentially the whole frame is not a sheet with a
    // visible border; leave that case to the binary strategy.
    let (sw, sh) = small.dimensions();
    if rect.width as f64 > 0.98 * sw as f64 && rect.height as f64 > 0.98 * sh as f64 {
        return None;
    }

    let rescaled = PixelRect::new(
        (rect.x as f64 / scale).round() as i32,
        (rect.y as f64 / scale).round() as i32,
        (rect.width as f64 / scale).round() as i32,
        (rect.height as f64 / scale).round() as i32,
    );
    rescaled.is_valid().then_some(rescaled)
}

/// Fixed-threshold binarization, then the bounding box of the largest
/// external contour. Fails when nothing exceeds the threshold.
pub fn detect_largest_binary_contour(gray: &GrayImage) -> Option<PixelRect> {
    let binary = threshold(gray, BINARY_SHEET_THRESHOLD, ThresholdType::Binary);
    let contours: Vec<Contour<i32>> = find_contours(&binary);
    let largest = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .max_by(|a, b| {
            contour_area(&a.points)
                .partial_cmp(&contour_area(&b.points))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
    let rect = bounding_rect(&largest.points);
    rect.is_valid().then_some(rect)
}

/// Last-resort assumption: the sheet fills the frame minus a fixed margin.
pub fn margin_heuristic(width: u32, height: u32) -> Option<PixelRect> {
    let dx = width as i32 / MARGIN_DIVISOR;
    let dy = height as i32 / MARGIN_DIVISOR;
    let rect = PixelRect::new(dx, dy, width as i32 - 2 * dx, height as i32 - 2 * dy);
    rect.is_valid().then_some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Dark background with a bright sheet rectangle.
    fn synthetic_sheet(w: u32, h: u32, sheet: PixelRect) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([40u8]));
        for y in sheet.y..sheet.y + sheet.height {
            for x in sheet.x..sheet.x + sheet.width {
                img.put_pixel(x as u32, y as u32, Luma([235u8]));
            }
        }
        img
    }

    fn assert_rect_close(found: PixelRect, expected: PixelRect, tolerance: f64) {
        let dw = (found.width - expected.width).abs() as f64;
        let dh = (found.height - expected.height).abs() as f64;
        assert!(
            dw <= expected.width as f64 * tolerance,
            "width {} vs expected {}",
            found.width,
            expected.width
        );
        assert!(
            dh <= expected.height as f64 * tolerance,
            "height {} vs expected {}",
            found.height,
            expected.height
        );
    }

    #[test]
    fn binary_contour_finds_sheet_within_two_percent() {
        let sheet = PixelRect::new(50, 50, 800, 1131);
        let gray = synthetic_sheet(900, 1250, sheet);
        let found = detect_largest_binary_contour(&gray).expect("sheet not detected");
        assert_rect_close(found, sheet, 0.02);
    }

    #[test]
    fn adaptive_polygon_finds_sheet_within_two_percent() {
        let sheet = PixelRect::new(50, 50, 800, 1131);
        let gray = synthetic_sheet(900, 1250, sheet);
        let found = detect_adaptive_polygon(&gray).expect("sheet not detected");
        assert_rect_close(found, sheet, 0.02);
    }

    #[test]
    fn binary_contour_fails_on_dark_image() {
        let gray = GrayImage::from_pixel(200, 200, Luma([30u8]));
        assert!(detect_largest_binary_contour(&gray).is_none());
    }

    #[test]
    fn adaptive_fails_on_uniform_image() {
        let gray = GrayImage::from_pixel(300, 300, Luma([128u8]));
        assert!(detect_adaptive_polygon(&gray).is_none());
    }

    #[test]
    fn margin_fallback_covers_most_of_the_frame() {
        let rect = margin_heuristic(400, 600).unwrap();
        assert_eq!(rect, PixelRect::new(20, 30, 360, 540));
    }

    #[test]
    fn chain_falls_back_to_margin_on_featureless_input() {
        let img = RgbImage::from_pixel(200, 300, image::Rgb([128u8, 128, 128]));
        let detection = detect_sheet(&img).unwrap();
        assert_eq!(detection.strategy, "margin-fallback");
    }
}
