use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProcessError;

/// Reference sheet formats with physical dimensions in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SheetSize {
    /// A4: 210 × 297 mm
    A4,
    /// US Letter: 215.9 × 279.4 mm (8.5 × 11 inches)
    Letter,
    /// A3: 297 × 420 mm
    A3,
    /// Any other rigid reference rectangle of known physical size
    Custom { width_mm: f64, height_mm: f64 },
}

impl SheetSize {
    /// Returns (width, height) in millimeters
    pub fn dimensions_mm(&self) -> (f64, f64) {
        match self {
            SheetSize::A4 => (210.0, 297.0),
            SheetSize::Letter => (215.9, 279.4),
            SheetSize::A3 => (297.0, 420.0),
            SheetSize::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

impl fmt::Display for SheetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSize::A4 => write!(f, "A4 (210×297mm)"),
            SheetSize::Letter => write!(f, "Letter (8.5×11in)"),
            SheetSize::A3 => write!(f, "A3 (297×420mm)"),
            SheetSize::Custom {
                width_mm,
                height_mm,
            } => write!(f, "custom ({width_mm}×{height_mm}mm)"),
        }
    }
}

/// 2D point in pixel coordinates (origin top-left, x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned integer rectangle in image coordinates.
///
/// A zero or negative extent is the canonical "detection failed" sentinel;
/// check [`PixelRect::is_valid`] before trusting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Intersection of this rect with an image of the given dimensions.
    /// May return an invalid (zero-extent) rect if there is no overlap.
    pub fn clamped(&self, image_width: u32, image_height: u32) -> PixelRect {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width).min(image_width as i32);
        let y1 = (self.y + self.height).min(image_height as i32);
        PixelRect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Physical measurements of the segmented object.
///
/// When `error` is set, every numeric field is zero and meaningless; the
/// stages past the failure point were skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    /// Curvilinear length along the object's axis, millimeters.
    pub length_mm: f64,
    /// Width across the object's minor axis, millimeters.
    pub width_mm: f64,
    /// Cross-section diameter estimate, millimeters.
    pub diameter_mm: f64,
    /// Volume under a cylindrical approximation, cubic millimeters.
    pub volume_mm3: f64,
    /// Mean turning angle along the skeleton, radians. Present only for
    /// skeleton-based measurements; near zero for a straight object.
    pub curvature_rad: Option<f64>,
    pub error: Option<ProcessError>,
}

impl MeasurementResult {
    /// Zero-valued result carrying the failure that stopped the pipeline.
    pub fn failed(error: ProcessError) -> Self {
        Self {
            length_mm: 0.0,
            width_mm: 0.0,
            diameter_mm: 0.0,
            volume_mm3: 0.0,
            curvature_rad: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn sheet_dimensions() {
        assert_eq!(SheetSize::A4.dimensions_mm(), (210.0, 297.0));
        assert_eq!(SheetSize::A3.dimensions_mm(), (297.0, 420.0));
        let custom = SheetSize::Custom {
            width_mm: 100.0,
            height_mm: 50.0,
        };
        assert_eq!(custom.dimensions_mm(), (100.0, 50.0));
    }

    #[test]
    fn rect_validity() {
        assert!(PixelRect::new(0, 0, 10, 10).is_valid());
        assert!(!PixelRect::new(0, 0, 0, 10).is_valid());
        assert!(!PixelRect::new(5, 5, -1, 10).is_valid());
    }

    #[test]
    fn rect_clamps_to_image_bounds() {
        let rect = PixelRect::new(-10, 20, 100, 100);
        let clamped = rect.clamped(50, 60);
        assert_eq!(clamped, PixelRect::new(0, 20, 50, 40));
    }

    #[test]
    fn failed_result_zeroes_numerics() {
        let result =
            MeasurementResult::failed(ProcessError::new(ErrorKind::ObjectNotFound, "no contour"));
        assert!(!result.is_ok());
        assert_eq!(result.length_mm, 0.0);
        assert_eq!(result.volume_mm3, 0.0);
        assert!(result.curvature_rad.is_none());
    }
}
