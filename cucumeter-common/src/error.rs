use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure categories reported through [`crate::MeasurementResult::error`].
///
/// All of these are non-fatal: the pipeline reports them as data instead of
/// letting anything escape its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Input image is empty or otherwise unusable.
    ImageUnusable,
    /// No detection strategy produced a usable reference rectangle.
    SheetNotFound,
    /// Computed scale is below the sanity floor (photo taken too far away).
    ScaleTooSmall,
    /// No segmentation strategy produced a contour passing the shape filters.
    ObjectNotFound,
    /// Contour or skeleton data insufficient for numeric computation.
    MeasurementFailed,
    /// Unexpected failure in an image operation, caught at the pipeline
    /// boundary.
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ImageUnusable => "image unusable",
            ErrorKind::SheetNotFound => "sheet not found",
            ErrorKind::ScaleTooSmall => "scale too small",
            ErrorKind::ObjectNotFound => "object not found",
            ErrorKind::MeasurementFailed => "measurement failed",
            ErrorKind::InternalError => "internal error",
        };
        f.write_str(s)
    }
}

/// A tagged pipeline failure with a human-readable detail message.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProcessError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProcessError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = ProcessError::new(ErrorKind::SheetNotFound, "no rectangle candidates");
        assert_eq!(err.to_string(), "sheet not found: no rectangle candidates");
    }

    #[test]
    fn round_trips_through_json() {
        let err = ProcessError::new(ErrorKind::ScaleTooSmall, "0.21 px/mm");
        let json = serde_json::to_string(&err).unwrap();
        let back: ProcessError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
