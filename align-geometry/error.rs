use align_core::ImageError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Insufficient correspondences: {found} (need at least 4 matched pairs)")]
    InsufficientCorrespondences { found: usize },
    #[error("Degenerate geometry: no valid model in {iterations} samples")]
    DegenerateGeometry { iterations: usize },
    #[error("Homography is not invertible")]
    NonInvertible,
    #[error("Invalid RANSAC parameter: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Image(#[from] ImageError),
}

pub type GeometryResult<T> = Result<T, GeometryError>;
