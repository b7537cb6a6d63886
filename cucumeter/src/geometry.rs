//! Contour and point-set primitives shared by the pipeline stages.

use cucumeter_common::PixelRect;
use imageproc::geometry::{convex_hull, min_area_rect};
use imageproc::point::Point;

/// Area enclosed by a closed polygonal contour, via the shoelace formula.
///
/// Returns 0 for contours with fewer than 3 points.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let n = points.len();
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x as f64 * points[j].y as f64;
        area -= points[j].x as f64 * points[i].y as f64;
    }
    (area / 2.0).abs()
}

/// Axis-aligned bounding rectangle of a point set. Invalid rect when empty.
pub fn bounding_rect(points: &[Point<i32>]) -> PixelRect {
    if points.is_empty() {
        return PixelRect::new(0, 0, 0, 0);
    }
    let min_x = points.iter().map(|p| p.x).min().unwrap();
    let min_y = points.iter().map(|p| p.y).min().unwrap();
    let max_x = points.iter().map(|p| p.x).max().unwrap();
    let max_y = points.iter().map(|p| p.y).max().unwrap();
    PixelRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
}

/// Minimum-area rotated bounding rectangle of a point set.
///
/// More faithful than the axis-aligned box for tilted elongated objects,
/// which is why the shape filter and the width measurement both use it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: (f32, f32),
    pub width: f32,
    pub height: f32,
    pub angle_deg: f32,
    pub corners: [Point<i32>; 4],
}

impl RotatedRect {
    /// Returns `None` for degenerate point sets (fewer than 3 points).
    pub fn from_points(points: &[Point<i32>]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        // Near-collinear point sets (hairline streaks) break the rotating
        // calipers; fall back to the axis-aligned box for them.
        let bbox = bounding_rect(points);
        if bbox.width <= 2 || bbox.height <= 2 {
            let corners = [
                Point::new(bbox.x, bbox.y),
                Point::new(bbox.x + bbox.width - 1, bbox.y),
                Point::new(bbox.x + bbox.width - 1, bbox.y + bbox.height - 1),
                Point::new(bbox.x, bbox.y + bbox.height - 1),
            ];
            return Some(Self {
                center: (
                    bbox.x as f32 + bbox.width as f32 / 2.0,
                    bbox.y as f32 + bbox.height as f32 / 2.0,
                ),
                width: bbox.width as f32,
                height: bbox.height as f32,
                angle_deg: 0.0,
                corners,
            });
        }
        let corners = min_area_rect(points);
        let width = edge_length(corners[0], corners[1]);
        let height = edge_length(corners[1], corners[2]);
        let cx = corners.iter().map(|p| p.x as f32).sum::<f32>() / 4.0;
        let cy = corners.iter().map(|p| p.y as f32).sum::<f32>() / 4.0;
        let angle_deg = ((corners[1].y - corners[0].y) as f32)
            .atan2((corners[1].x - corners[0].x) as f32)
            .to_degrees();
        Some(Self {
            center: (cx, cy),
            width,
            height,
            angle_deg,
            corners,
        })
    }

    pub fn long_side(&self) -> f32 {
        self.width.max(self.height)
    }

    pub fn short_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Long/short side ratio, always ≥ 1. Sides below one pixel are clamped
    /// so hairline contours do not divide by zero.
    pub fn elongation(&self) -> f64 {
        self.long_side() as f64 / self.short_side().max(1.0) as f64
    }
}

fn edge_length(a: Point<i32>, b: Point<i32>) -> f32 {
    let dx = (b.x - a.x) as f32;
    let dy = (b.y - a.y) as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Contour area divided by convex hull area; 1.0 for convex shapes,
/// lower for ragged or concave ones.
pub fn solidity(points: &[Point<i32>]) -> f64 {
    let area = contour_area(points);
    if area <= 0.0 {
        return 0.0;
    }
    let hull = convex_hull(points);
    let hull_area = contour_area(&hull);
    if hull_area <= 0.0 {
        return 0.0;
    }
    (area / hull_area).min(1.0)
}

/// Contour area divided by its axis-aligned bounding-box area.
pub fn fill_ratio(points: &[Point<i32>]) -> f64 {
    let bbox = bounding_rect(points);
    if !bbox.is_valid() {
        return 0.0;
    }
    contour_area(points) / bbox.area() as f64
}

/// Translate every point by (dx, dy).
pub fn offset_points(points: &[Point<i32>], dx: i32, dy: i32) -> Vec<Point<i32>> {
    points
        .iter()
        .map(|p| Point::new(p.x + dx, p.y + dy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, side: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn shoelace_area_of_square() {
        assert_eq!(contour_area(&square(10, 10, 20)), 400.0);
    }

    #[test]
    fn area_of_degenerate_contour_is_zero() {
        assert_eq!(contour_area(&[]), 0.0);
        assert_eq!(contour_area(&[Point::new(0, 0), Point::new(5, 5)]), 0.0);
    }

    #[test]
    fn bounding_rect_spans_points() {
        let rect = bounding_rect(&square(5, 8, 10));
        assert_eq!(rect, PixelRect::new(5, 8, 11, 11));
    }

    #[test]
    fn rotated_rect_of_axis_aligned_box() {
        let rect = RotatedRect::from_points(&square(0, 0, 40)).unwrap();
        assert!((rect.long_side() - 40.0).abs() < 1.5);
        assert!((rect.short_side() - 40.0).abs() < 1.5);
        assert!((rect.elongation() - 1.0).abs() < 0.1);
    }

    #[test]
    fn rotated_rect_of_tilted_bar() {
        // 45°-tilted bar: endpoints along the diagonal, a few points thick
        let mut points = Vec::new();
        for i in 0..100 {
            points.push(Point::new(i, i));
            points.push(Point::new(i + 4, i));
        }
        let rect = RotatedRect::from_points(&points).unwrap();
        assert!(rect.elongation() > 10.0, "elongation={}", rect.elongation());
        // diagonal extent ≈ 99·√2
        assert!((rect.long_side() - 140.0).abs() < 10.0);
    }

    #[test]
    fn solidity_of_convex_shape_is_one() {
        let s = solidity(&square(0, 0, 30));
        assert!((s - 1.0).abs() < 0.05, "solidity={s}");
    }

    #[test]
    fn fill_ratio_of_square_is_high() {
        let f = fill_ratio(&square(0, 0, 30));
        assert!(f > 0.8, "fill_ratio={f}");
    }

    #[test]
    fn offset_translates_points() {
        let moved = offset_points(&[Point::new(1, 2)], 10, -2);
        assert_eq!(moved, vec![Point::new(11, 0)]);
    }
}
