use std::fmt;
use std::path::PathBuf;

use align_core::ImageError;
use align_dog::DetectorError;
use align_flann::MatchError;
use align_geometry::GeometryError;

/// Which image of a pair an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSide {
    First,
    Second,
}

impl fmt::Display for ImageSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSide::First => write!(f, "first"),
            ImageSide::Second => write!(f, "second"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlignError {
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Insufficient features in {image} image: {found} keypoints (need {required})")]
    InsufficientFeatures {
        image: ImageSide,
        found: usize,
        required: usize,
    },
    #[error("Insufficient correspondences: {found} after ratio test (need {required})")]
    InsufficientCorrespondences { found: usize, required: usize },
    #[error("Degenerate geometry: no valid homography in {iterations} samples")]
    DegenerateGeometry { iterations: usize },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AlignError {
    /// Errors that concern a single pair; a sequence run can skip the pair and go on
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AlignError::Input(_)
                | AlignError::InsufficientFeatures { .. }
                | AlignError::InsufficientCorrespondences { .. }
                | AlignError::DegenerateGeometry { .. }
        )
    }
}

impl From<ImageError> for AlignError {
    fn from(err: ImageError) -> Self {
        AlignError::Input(err.to_string())
    }
}

impl From<DetectorError> for AlignError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Image(e) => e.into(),
            other => AlignError::Config(other.to_string()),
        }
    }
}

impl From<MatchError> for AlignError {
    fn from(err: MatchError) -> Self {
        AlignError::Config(err.to_string())
    }
}

impl From<GeometryError> for AlignError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::InsufficientCorrespondences { found } => AlignError::InsufficientCorrespondences {
                found,
                required: crate::MIN_CORRESPONDENCES,
            },
            GeometryError::DegenerateGeometry { iterations } => AlignError::DegenerateGeometry { iterations },
            GeometryError::NonInvertible => AlignError::DegenerateGeometry { iterations: 0 },
            GeometryError::InvalidParams(msg) => AlignError::Config(msg),
            GeometryError::Image(e) => e.into(),
        }
    }
}

pub type AlignResult<T> = Result<T, AlignError>;
