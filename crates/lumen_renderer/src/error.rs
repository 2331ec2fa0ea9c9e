//! Error types for camera setup, configuration loading and rendering.

use std::ops::Range;
use std::path::PathBuf;

use thiserror::Error;

/// Rejected camera configurations.
///
/// Any of these would otherwise turn into NaN or infinite values in the
/// derived viewport and poison every pixel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Image width must be at least 1 pixel")]
    ZeroWidth,

    #[error("Samples per pixel must be at least 1")]
    ZeroSamples,

    #[error("Aspect ratio must be finite and positive, got {0}")]
    InvalidAspectRatio(f32),

    #[error("Vertical field of view must be in (0, 180) degrees, got {0}")]
    InvalidFieldOfView(f32),

    #[error("Focus distance must be finite and positive, got {0}")]
    InvalidFocusDistance(f32),

    #[error("Defocus angle must be in [0, 180) degrees, got {0}")]
    InvalidDefocusAngle(f32),

    #[error("Camera look_from and look_at coincide")]
    DegenerateViewDirection,

    #[error("Camera up vector is non-finite or parallel to the view direction")]
    DegenerateUpVector,
}

/// Errors that can occur while loading render settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during a render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid camera: {0}")]
    Camera(#[from] CameraError),

    #[error("Worker count {workers} must be in 1..={height} for an image {height} rows tall")]
    InvalidWorkerCount { workers: usize, height: u32 },

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Worker for rows {}..{} failed: {reason}", rows.start, rows.end)]
    WorkerFailed { rows: Range<u32>, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
}

pub type CameraResult<T> = Result<T, CameraError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RenderResult<T> = Result<T, RenderError>;
