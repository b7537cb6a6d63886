//! End-to-end orchestration: sheet → scale → segmentation → skeleton →
//! measurement → debug overlay.

use std::panic::{catch_unwind, AssertUnwindSafe};

use ab_glyph::FontVec;
use cucumeter_common::{
    ErrorKind, MeasurementResult, PixelPoint, PixelRect, ProcessError, ProcessorConfig,
};
use image::imageops::crop_imm;
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use log::{debug, info, warn};

use crate::calibration::compute_scale;
use crate::detection::detect_sheet;
use crate::geometry::{offset_points, RotatedRect};
use crate::measure::measure;
use crate::render;
use crate::segmentation::segment;
use crate::skeleton::{longest_path, prune_spurs, skeletonize, SkeletonPath};

/// Everything one pipeline invocation produced. Owns its debug image
/// independently of the input.
#[derive(Debug, Clone)]
pub struct ProcessedResult {
    pub measurement: MeasurementResult,
    /// Detected reference-sheet rectangle, when any strategy succeeded.
    pub sheet_rect: Option<PixelRect>,
    /// Segmented object contour in source-image coordinates.
    pub object_contour: Option<Vec<PixelPoint>>,
    /// Annotated verification image; present even for most failures so the
    /// caller always gets visual feedback.
    pub debug_image: Option<RgbImage>,
}

/// One configured measurement pipeline.
///
/// Stateless between invocations: every call owns its intermediate buffers,
/// so concurrent calls on different images need no synchronization.
pub struct ProducePipeline {
    config: ProcessorConfig,
    font: Option<FontVec>,
}

impl ProducePipeline {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config, font: None }
    }

    /// Supply TTF/OTF bytes for debug-overlay text labels. Unparsable fonts
    /// are ignored with a warning; overlays then render without text.
    pub fn with_label_font(mut self, bytes: Vec<u8>) -> Self {
        match FontVec::try_from_vec(bytes) {
            Ok(font) => self.font = Some(font),
            Err(err) => warn!("label font rejected: {err}"),
        }
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Run the full measurement pipeline on one decoded photograph.
    ///
    /// Never panics: unexpected failures in image operations surface as
    /// [`ErrorKind::InternalError`] with a placeholder debug image.
    pub fn process(&self, image: &DynamicImage) -> ProcessedResult {
        match catch_unwind(AssertUnwindSafe(|| self.run(image))) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("image operation panicked");
                warn!("pipeline aborted: {message}");
                ProcessedResult {
                    measurement: MeasurementResult::failed(ProcessError::new(
                        ErrorKind::InternalError,
                        message,
                    )),
                    sheet_rect: None,
                    object_contour: None,
                    debug_image: Some(render::placeholder()),
                }
            }
        }
    }

    fn run(&self, image: &DynamicImage) -> ProcessedResult {
        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return ProcessedResult {
                measurement: MeasurementResult::failed(ProcessError::new(
                    ErrorKind::ImageUnusable,
                    "empty input image",
                )),
                sheet_rect: None,
                object_contour: None,
                debug_image: None,
            };
        }

        let Some(detection) = detect_sheet(&rgb) else {
            return self.fail(&rgb, ErrorKind::SheetNotFound, "sheet not found", None, None);
        };
        let sheet_rect = detection.rect.clamped(rgb.width(), rgb.height());
        info!("sheet: {:?} via {}", sheet_rect, detection.strategy);
        if !sheet_rect.is_valid() {
            return self.fail(
                &rgb,
                ErrorKind::SheetNotFound,
                "sheet rectangle outside image",
                None,
                None,
            );
        }

        let scale = match compute_scale(&sheet_rect, self.config.sheet, self.config.min_scale_px_per_mm)
        {
            Ok(scale) => scale,
            Err(err) => {
                return self.fail(&rgb, err.kind, err.message, Some(sheet_rect), None);
            }
        };
        debug!("scale {scale:.3} px/mm for {}", self.config.sheet);

        let region = crop_imm(
            &rgb,
            sheet_rect.x as u32,
            sheet_rect.y as u32,
            sheet_rect.width as u32,
            sheet_rect.height as u32,
        )
        .to_image();

        let Some(segmentation) = segment(&region, &self.config) else {
            return self.fail(
                &rgb,
                ErrorKind::ObjectNotFound,
                "object not found",
                Some(sheet_rect),
                None,
            );
        };
        info!(
            "object: {} points via {}",
            segmentation.contour.len(),
            segmentation.strategy
        );
        let contour = offset_points(&segmentation.contour, sheet_rect.x, sheet_rect.y);

        let path = self.skeleton_path(&segmentation.contour, &region);
        let measurement = measure(
            &contour,
            path.as_ref(),
            scale,
            self.config.curvature_sample_step,
        );

        let skeleton_full: Option<Vec<(i32, i32)>> = path.as_ref().map(|p| {
            p.points
                .iter()
                .map(|&(x, y)| (x as i32 + sheet_rect.x, y as i32 + sheet_rect.y))
                .collect()
        });
        let debug_image = self.render(
            &rgb,
            Some(&sheet_rect),
            Some(&contour),
            skeleton_full.as_deref(),
        );

        ProcessedResult {
            measurement,
            sheet_rect: Some(sheet_rect),
            object_contour: Some(contour.iter().map(|p| PixelPoint::new(p.x, p.y)).collect()),
            debug_image,
        }
    }

    /// Rasterize the contour to a mask, thin it, and extract the skeleton
    /// path. Falls back to `None` (bounding-box measurement) when thinning
    /// yields nothing usable — a too-short path means the skeleton broke up.
    ///
    /// The mask covers only the contour's bounding box (plus a margin) so
    /// thinning cost scales with the object, not the sheet.
    fn skeleton_path(&self, contour: &[Point<i32>], region: &RgbImage) -> Option<SkeletonPath> {
        if contour.len() < 3 {
            return None;
        }
        let bbox = crate::geometry::bounding_rect(contour).clamped(region.width(), region.height());
        if !bbox.is_valid() {
            return None;
        }
        let margin = 2;
        let origin = (bbox.x - margin, bbox.y - margin);
        let mut polygon: Vec<Point<i32>> = contour
            .iter()
            .map(|p| Point::new(p.x - origin.0, p.y - origin.1))
            .collect();
        if polygon.first() == polygon.last() {
            polygon.pop();
        }
        if polygon.len() < 3 {
            return None;
        }
        let mut mask = GrayImage::new(
            (bbox.width + 2 * margin) as u32,
            (bbox.height + 2 * margin) as u32,
        );
        draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));

        let rect = RotatedRect::from_points(contour)?;
        let thinned = skeletonize(&mask, self.config.thinning);
        // thinning a wide blob leaves a diagonal spur at each corner; any
        // branch shorter than the object's own thickness is such an artifact
        let pruned = prune_spurs(&thinned, rect.short_side().ceil() as u32);
        let mut path = longest_path(&pruned)?;
        for p in &mut path.points {
            *p = (
                (p.0 as i32 + origin.0).max(0) as u32,
                (p.1 as i32 + origin.1).max(0) as u32,
            );
        }
        // the pruned spine spans roughly the long side minus the two tips;
        // anything much shorter means the skeleton broke into fragments
        let spine_extent = (rect.long_side() - rect.short_side()).max(0.0) as f64;
        if path.length_px < 0.5 * spine_extent {
            warn!(
                "skeleton path {:.0}px too short for object extent {:.0}px, using bounding box",
                path.length_px,
                rect.long_side()
            );
            return None;
        }
        Some(path)
    }

    fn fail(
        &self,
        rgb: &RgbImage,
        kind: ErrorKind,
        message: impl Into<String>,
        sheet_rect: Option<PixelRect>,
        contour: Option<&[Point<i32>]>,
    ) -> ProcessedResult {
        let debug_image = self.render(rgb, sheet_rect.as_ref(), contour, None);
        ProcessedResult {
            measurement: MeasurementResult::failed(ProcessError::new(kind, message)),
            sheet_rect,
            object_contour: contour
                .map(|points| points.iter().map(|p| PixelPoint::new(p.x, p.y)).collect()),
            debug_image,
        }
    }

    /// Rendering must never mask a measurement: any panic inside the
    /// renderer degrades to a placeholder image.
    fn render(
        &self,
        rgb: &RgbImage,
        sheet: Option<&PixelRect>,
        contour: Option<&[Point<i32>]>,
        skeleton: Option<&[(i32, i32)]>,
    ) -> Option<RgbImage> {
        let rendered = catch_unwind(AssertUnwindSafe(|| {
            render::render_debug(rgb, sheet, contour, skeleton, self.font.as_ref())
        }));
        match rendered {
            Ok(img) => Some(img),
            Err(_) => {
                warn!("debug rendering failed, substituting placeholder");
                Some(render::placeholder())
            }
        }
    }
}

impl Default for ProducePipeline {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}
