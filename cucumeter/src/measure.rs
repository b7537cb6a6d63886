//! Length, width, diameter, volume and curvature from a segmented contour
//! and, when available, its skeleton path.

use cucumeter_common::{ErrorKind, MeasurementResult, ProcessError};
use imageproc::point::Point;
use log::debug;

use crate::geometry::RotatedRect;
use crate::skeleton::SkeletonPath;

/// Derive physical measurements from a contour in pixel coordinates.
///
/// Without a skeleton the length is the rotated bounding box's long side.
/// With one, the length is the curvilinear skeleton path plus the measured
/// tip shortfall — the medial axis stops up to one local radius short of
/// each rounded tip, but a path that already spans the full extent gets no
/// correction — and the mean turning angle along the path becomes the
/// curvature. The contour and the skeleton path must share one coordinate
/// frame. Width and diameter always come from the rotated box's short side.
pub fn measure(
    contour: &[Point<i32>],
    skeleton_path: Option<&SkeletonPath>,
    scale_px_per_mm: f64,
    curvature_sample_step: usize,
) -> MeasurementResult {
    if contour.len() < 3 {
        return MeasurementResult::failed(ProcessError::new(
            ErrorKind::MeasurementFailed,
            format!("degenerate contour with {} points", contour.len()),
        ));
    }
    if !(scale_px_per_mm.is_finite() && scale_px_per_mm > 0.0) {
        return MeasurementResult::failed(ProcessError::new(
            ErrorKind::MeasurementFailed,
            format!("non-positive scale {scale_px_per_mm}"),
        ));
    }
    let Some(rect) = RotatedRect::from_points(contour) else {
        return MeasurementResult::failed(ProcessError::new(
            ErrorKind::MeasurementFailed,
            "no bounding rectangle for contour",
        ));
    };

    let width_px = rect.short_side() as f64;
    let (length_px, curvature) = match skeleton_path {
        Some(path) if path.points.len() >= 2 => {
            let shortfall = tip_shortfall(path, &rect);
            debug!(
                "skeleton length {:.1}px (+{:.1}px tip shortfall)",
                path.length_px, shortfall
            );
            (
                path.length_px + shortfall,
                mean_turning_angle(&path.points, curvature_sample_step),
            )
        }
        _ => (rect.long_side() as f64, None),
    };

    let length_mm = length_px / scale_px_per_mm;
    let width_mm = width_px / scale_px_per_mm;
    let diameter_mm = width_mm;
    let volume_mm3 = cylinder_volume_mm3(length_mm, diameter_mm);

    if !(length_mm.is_finite() && width_mm.is_finite() && volume_mm3.is_finite()) {
        return MeasurementResult::failed(ProcessError::new(
            ErrorKind::MeasurementFailed,
            "non-finite measurement",
        ));
    }

    MeasurementResult {
        length_mm,
        width_mm,
        diameter_mm,
        volume_mm3,
        curvature_rad: curvature,
        error: None,
    }
}

/// Pixels to add back for the rounded tips the medial axis never reaches.
///
/// Capped at one minor radius per end; zero when the path already covers the
/// box's long side (a bent object's path can exceed it).
fn tip_shortfall(path: &SkeletonPath, rect: &RotatedRect) -> f64 {
    let extent_gap = rect.long_side() as f64 - path.length_px;
    extent_gap.clamp(0.0, rect.short_side() as f64)
}

/// Volume of a cylinder with the given length and diameter.
pub fn cylinder_volume_mm3(length_mm: f64, diameter_mm: f64) -> f64 {
    std::f64::consts::PI * (diameter_mm / 2.0).powi(2) * length_mm
}

/// Turning angles between consecutive chords of the path, sampled every
/// `step` points. Near zero everywhere for a straight object; a right-angle
/// bend shows up as a sample near π/2.
pub fn turning_angles(path: &[(u32, u32)], step: usize) -> Vec<f64> {
    let step = step.max(1);
    let samples: Vec<(f64, f64)> = path
        .iter()
        .step_by(step)
        .map(|&(x, y)| (x as f64, y as f64))
        .collect();
    if samples.len() < 3 {
        return Vec::new();
    }
    samples
        .windows(3)
        .filter_map(|w| {
            let v1 = (w[1].0 - w[0].0, w[1].1 - w[0].1);
            let v2 = (w[2].0 - w[1].0, w[2].1 - w[1].1);
            let n1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
            let n2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
            if n1 == 0.0 || n2 == 0.0 {
                return None;
            }
            let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (n1 * n2)).clamp(-1.0, 1.0);
            Some(cos.acos())
        })
        .collect()
}

/// Mean turning angle along the path, or `None` when the path is too short
/// to sample.
pub fn mean_turning_angle(path: &[(u32, u32)], step: usize) -> Option<f64> {
    let angles = turning_angles(path, step);
    if angles.is_empty() {
        return None;
    }
    Some(angles.iter().sum::<f64>() / angles.len() as f64)
}
