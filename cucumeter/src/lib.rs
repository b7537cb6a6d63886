//! Photograph-to-millimeters measurement of elongated produce.
//!
//! Give [`ProducePipeline`] a decoded photo of a cucumber lying on a
//! reference sheet of known physical size and it returns length, width,
//! diameter, volume and curvature, plus an annotated image showing every
//! decision the pipeline made along the way.
//!
//! The pipeline is a pure function of its input: detect the sheet, derive a
//! pixel-per-millimeter scale, segment the object inside the sheet region,
//! thin its mask to a skeleton, measure, and render a debug overlay. Each
//! stage validates its own preconditions and reports tagged failures through
//! [`MeasurementResult::error`]; nothing panics across the API boundary.

pub mod calibration;
pub mod detection;
pub mod geometry;
pub mod measure;
pub mod pipeline;
pub mod render;
pub mod segmentation;
pub mod skeleton;

pub use cucumeter_common::{
    default_color_ranges, ErrorKind, HsvRange, MeasurementResult, PixelPoint, PixelRect,
    ProcessError, ProcessorConfig, SheetSize, ThinningMethod,
};
pub use pipeline::{ProcessedResult, ProducePipeline};
