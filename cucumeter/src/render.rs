//! Debug overlay construction.
//!
//! Draws, back to front: a semi-transparent fill of the segmented object, the
//! sheet rectangle frame, the object's contour outline, its rotated bounding
//! box, skeleton dots, and text labels when a font is available. This is a
//! diagnostic artifact — the pipeline swaps in a placeholder rather than let
//! a rendering problem mask a successful measurement.

use ab_glyph::{FontVec, PxScale};
use cucumeter_common::PixelRect;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut,
    draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::warn;

use crate::geometry::RotatedRect;

const SHEET_COLOR: Rgb<u8> = Rgb([0u8, 200, 255]);
const CONTOUR_COLOR: Rgb<u8> = Rgb([0u8, 220, 60]);
const BOX_COLOR: Rgb<u8> = Rgb([255u8, 210, 0]);
const SKELETON_COLOR: Rgb<u8> = Rgb([255u8, 60, 60]);
const LABEL_COLOR: Rgb<u8> = Rgb([255u8, 255, 255]);
const FILL_ALPHA: f32 = 0.35;

/// Render the annotated verification image. All coordinates are in source
/// image space; missing stages simply draw nothing.
pub fn render_debug(
    source: &RgbImage,
    sheet: Option<&PixelRect>,
    contour: Option<&[Point<i32>]>,
    skeleton: Option<&[(i32, i32)]>,
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = source.clone();

    if let Some(points) = contour {
        fill_contour_translucent(&mut canvas, points);
    }
    if let Some(rect) = sheet {
        draw_frame(&mut canvas, rect, SHEET_COLOR, 3);
    }
    if let Some(points) = contour {
        draw_closed_polyline(&mut canvas, points, CONTOUR_COLOR);
        if let Some(rect) = RotatedRect::from_points(points) {
            draw_rotated_box(&mut canvas, &rect, BOX_COLOR);
        }
    }
    if let Some(points) = skeleton {
        for &(x, y) in points {
            draw_filled_circle_mut(&mut canvas, (x, y), 1, SKELETON_COLOR);
        }
    }
    if let Some(font) = font {
        draw_labels(&mut canvas, sheet, contour, font);
    } else if sheet.is_some() || contour.is_some() {
        warn!("no label font configured, rendering overlay without text");
    }

    canvas
}

/// Minimal stand-in returned when rendering itself fails.
pub fn placeholder() -> RgbImage {
    RgbImage::from_pixel(16, 16, Rgb([96u8, 96, 96]))
}

/// Blend the fill color into the contour's interior so the underlying
/// texture stays visible.
fn fill_contour_translucent(canvas: &mut RgbImage, points: &[Point<i32>]) {
    let mut polygon: Vec<Point<i32>> = points.to_vec();
    if polygon.first() == polygon.last() {
        polygon.pop();
    }
    if polygon.len() < 3 {
        return;
    }
    let mut mask = GrayImage::new(canvas.width(), canvas.height());
    draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));
    for (x, y, px) in mask.enumerate_pixels() {
        if px[0] > 0 {
            let dst = canvas.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended =
                    dst[c] as f32 * (1.0 - FILL_ALPHA) + CONTOUR_COLOR[c] as f32 * FILL_ALPHA;
                dst[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn draw_frame(canvas: &mut RgbImage, rect: &PixelRect, color: Rgb<u8>, thickness: i32) {
    if !rect.is_valid() {
        return;
    }
    for i in 0..thickness {
        let w = rect.width - 2 * i;
        let h = rect.height - 2 * i;
        if w <= 0 || h <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at(rect.x + i, rect.y + i).of_size(w as u32, h as u32),
            color,
        );
    }
}

fn draw_closed_polyline(canvas: &mut RgbImage, points: &[Point<i32>], color: Rgb<u8>) {
    if points.len() < 2 {
        return;
    }
    for pair in points.windows(2) {
        draw_line_segment_mut(
            canvas,
            (pair[0].x as f32, pair[0].y as f32),
            (pair[1].x as f32, pair[1].y as f32),
            color,
        );
    }
    let first = points[0];
    let last = points[points.len() - 1];
    draw_line_segment_mut(
        canvas,
        (last.x as f32, last.y as f32),
        (first.x as f32, first.y as f32),
        color,
    );
}

fn draw_rotated_box(canvas: &mut RgbImage, rect: &RotatedRect, color: Rgb<u8>) {
    for i in 0..4 {
        let a = rect.corners[i];
        let b = rect.corners[(i + 1) % 4];
        draw_line_segment_mut(
            canvas,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }
}

fn draw_labels(
    canvas: &mut RgbImage,
    sheet: Option<&PixelRect>,
    contour: Option<&[Point<i32>]>,
    font: &FontVec,
) {
    let scale = PxScale::from(24.0);
    if let Some(rect) = sheet {
        let label = format!("sheet {}x{} px", rect.width, rect.height);
        let x = (rect.x + 8).clamp(0, canvas.width() as i32 - 1);
        let y = (rect.y + 8).clamp(0, canvas.height() as i32 - 1);
        draw_text_mut(canvas, LABEL_COLOR, x, y, scale, font, &label);
    }
    if let Some(points) = contour {
        let bbox = crate::geometry::bounding_rect(points);
        if bbox.is_valid() {
            let x = bbox.x.clamp(0, canvas.width() as i32 - 1);
            let y = (bbox.y - 28).clamp(0, canvas.height() as i32 - 1);
            draw_text_mut(canvas, LABEL_COLOR, x, y, scale, font, "object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contour() -> Vec<Point<i32>> {
        vec![
            Point::new(30, 40),
            Point::new(90, 40),
            Point::new(90, 60),
            Point::new(30, 60),
        ]
    }

    #[test]
    fn renders_all_layers_without_font() {
        let source = RgbImage::from_pixel(120, 100, Rgb([200u8, 200, 200]));
        let sheet = PixelRect::new(10, 10, 100, 80);
        let contour = sample_contour();
        let skeleton: Vec<(i32, i32)> = (35..85).map(|x| (x, 50)).collect();
        let out = render_debug(
            &source,
            Some(&sheet),
            Some(&contour),
            Some(&skeleton),
            None,
        );
        assert_eq!(out.dimensions(), source.dimensions());
        assert_eq!(*out.get_pixel(10, 10), SHEET_COLOR);
        assert_eq!(*out.get_pixel(60, 50), SKELETON_COLOR);
        // interior pixel is blended, not replaced
        let inside = out.get_pixel(60, 45);
        assert_ne!(*inside, Rgb([200u8, 200, 200]));
        assert_ne!(*inside, CONTOUR_COLOR);
    }

    #[test]
    fn renders_sheet_only_on_partial_failure() {
        let source = RgbImage::from_pixel(60, 60, Rgb([90u8, 90, 90]));
        let sheet = PixelRect::new(5, 5, 50, 50);
        let out = render_debug(&source, Some(&sheet), None, None, None);
        assert_eq!(*out.get_pixel(5, 5), SHEET_COLOR);
        assert_eq!(*out.get_pixel(30, 30), Rgb([90u8, 90, 90]));
    }

    #[test]
    fn degenerate_contour_is_skipped() {
        let source = RgbImage::from_pixel(40, 40, Rgb([10u8, 10, 10]));
        let tiny = vec![Point::new(5, 5)];
        let out = render_debug(&source, None, Some(&tiny), None, None);
        assert_eq!(out.dimensions(), (40, 40));
    }

    #[test]
    fn placeholder_is_nonempty() {
        let img = placeholder();
        assert!(img.width() > 0 && img.height() > 0);
    }
}
