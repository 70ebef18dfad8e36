use std::path::PathBuf;

use thiserror::Error;

use crate::enums::DType;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Index out of bounds: {axis} range {start}..{end} outside extent {extent}")]
    IndexOutOfBounds {
        axis: &'static str,
        start: i64,
        end: i64,
        extent: usize,
    },

    #[error("Refusing to overwrite existing target '{}'", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Invalid interpolation mode '{0}' (expected 'nearest' or 'bilinear')")]
    InvalidMode(String),

    #[error("Missing key '{0}'")]
    MissingKey(String),

    #[error("Malformed name '{0}': expected exactly one '.' between stem and suffix")]
    MalformedName(String),

    #[error("No slices to assemble")]
    NoSlices,

    #[error("Element type mismatch: stored {stored}, requested {requested}")]
    DTypeMismatch { stored: DType, requested: DType },

    #[error("Observer failed: {0}")]
    Observer(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl VolumeError {
    /// Errors a batch job reports for the offending item and then moves past.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            VolumeError::AlreadyExists(_)
                | VolumeError::MissingKey(_)
                | VolumeError::MalformedName(_)
        )
    }

    /// Short label used when summarizing batch skips.
    pub fn kind(&self) -> &'static str {
        match self {
            VolumeError::ShapeMismatch(_) => "shape mismatch",
            VolumeError::IndexOutOfBounds { .. } => "index out of bounds",
            VolumeError::AlreadyExists(_) => "already exists",
            VolumeError::InvalidMode(_) => "invalid mode",
            VolumeError::MissingKey(_) => "missing key",
            VolumeError::MalformedName(_) => "malformed name",
            VolumeError::NoSlices => "no slices",
            VolumeError::DTypeMismatch { .. } => "dtype mismatch",
            VolumeError::Observer(_) => "observer",
            VolumeError::Io(_) => "io",
            VolumeError::Json(_) => "json",
            VolumeError::Image(_) => "image",
        }
    }
}

pub type Result<T> = std::result::Result<T, VolumeError>;
