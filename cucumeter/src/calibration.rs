//! Pixel-to-millimeter calibration from the detected sheet rectangle.

use cucumeter_common::{ErrorKind, PixelRect, ProcessError, SheetSize};
use log::debug;

/// Pixels per millimeter inferred from the sheet's pixel extent.
///
/// Orientation is inferred by matching the longer pixel dimension to the
/// longer physical dimension; the two per-axis estimates are then averaged,
/// which absorbs mild perspective distortion without a homography. Scales at
/// or below `min_scale_px_per_mm` mean the sheet is too small in frame to
/// trust and are rejected.
pub fn compute_scale(
    rect: &PixelRect,
    sheet: SheetSize,
    min_scale_px_per_mm: f64,
) -> Result<f64, ProcessError> {
    if !rect.is_valid() {
        return Err(ProcessError::new(
            ErrorKind::SheetNotFound,
            format!("invalid sheet rectangle {rect:?}"),
        ));
    }

    let (mut sheet_w_mm, mut sheet_h_mm) = sheet.dimensions_mm();
    if sheet_w_mm <= 0.0 || sheet_h_mm <= 0.0 {
        return Err(ProcessError::new(
            ErrorKind::ScaleTooSmall,
            format!("non-positive sheet dimensions {sheet}"),
        ));
    }

    let landscape_px = rect.width > rect.height;
    let landscape_mm = sheet_w_mm > sheet_h_mm;
    if landscape_px != landscape_mm {
        std::mem::swap(&mut sheet_w_mm, &mut sheet_h_mm);
    }

    let scale_x = rect.width as f64 / sheet_w_mm;
    let scale_y = rect.height as f64 / sheet_h_mm;
    let scale = 0.5 * (scale_x + scale_y);
    debug!("scale: x={scale_x:.3} y={scale_y:.3} mean={scale:.3} px/mm");

    if scale <= min_scale_px_per_mm {
        return Err(ProcessError::new(
            ErrorKind::ScaleTooSmall,
            format!("{scale:.2} px/mm at or below floor {min_scale_px_per_mm:.2}"),
        ));
    }
    Ok(scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_portrait_scale() {
        let rect = PixelRect::new(50, 50, 800, 1131);
        let scale = compute_scale(&rect, SheetSize::A4, 0.5).unwrap();
        let expected = 0.5 * (800.0 / 210.0 + 1131.0 / 297.0);
        assert!((scale - expected).abs() < 1e-9);
        assert!((scale - 3.81).abs() < 0.02);
    }

    #[test]
    fn orientation_is_inferred_from_aspect() {
        let portrait = compute_scale(&PixelRect::new(0, 0, 800, 1131), SheetSize::A4, 0.5).unwrap();
        let landscape =
            compute_scale(&PixelRect::new(0, 0, 1131, 800), SheetSize::A4, 0.5).unwrap();
        assert!((portrait - landscape).abs() < 1e-9);
    }

    #[test]
    fn tiny_sheet_is_rejected() {
        let rect = PixelRect::new(0, 0, 60, 85);
        let err = compute_scale(&rect, SheetSize::A4, 0.5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ScaleTooSmall);
    }

    #[test]
    fn invalid_rect_is_rejected() {
        let rect = PixelRect::new(0, 0, 0, 100);
        let err = compute_scale(&rect, SheetSize::A4, 0.5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SheetNotFound);
    }

    #[test]
    fn custom_sheet_dimensions() {
        let rect = PixelRect::new(0, 0, 500, 250);
        let sheet = SheetSize::Custom {
            width_mm: 100.0,
            height_mm: 50.0,
        };
        let scale = compute_scale(&rect, sheet, 0.5).unwrap();
        assert!((scale - 5.0).abs() < 1e-9);
    }
}
