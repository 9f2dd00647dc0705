use align_core::ImageError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectorError {
    #[error("Invalid octave layer count: {0} (must be >= 1)")]
    InvalidOctaveLayers(usize),
    #[error("Invalid contrast threshold: {0} (must be finite and >= 0)")]
    InvalidContrastThreshold(f32),
    #[error("Invalid edge threshold: {0} (must be >= 1)")]
    InvalidEdgeThreshold(f32),
    #[error("Invalid base sigma: {0} (must be > 0.5)")]
    InvalidSigma(f32),
    #[error("Invalid octave cap: {0} (must be >= 1)")]
    InvalidMaxOctaves(usize),
    #[error("Invalid feature limit: {0} (must be >= 1)")]
    InvalidMaxFeatures(usize),
    #[error(transparent)]
    Image(#[from] ImageError),
}

pub type DetectorResult<T> = Result<T, DetectorError>;
