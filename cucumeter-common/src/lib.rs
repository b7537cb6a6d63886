//! Shared data contracts for the cucumeter measurement pipeline.
//!
//! Everything here is plain serde-serializable data: the application shell
//! that captures photographs and displays results depends on this crate
//! without pulling in any image-processing machinery.

mod config;
mod error;
mod types;

pub use config::{default_color_ranges, HsvRange, ProcessorConfig, ThinningMethod};
pub use error::{ErrorKind, ProcessError};
pub use types::{MeasurementResult, PixelPoint, PixelRect, SheetSize};
