use align_core::{FloatImage, ScaleSpace};

/// Pixels closer to the octave border than this are never extrema
pub const IMAGE_BORDER: usize = 5;

/// Assumed blur of the input image
pub const SIGMA_IN: f32 = 0.5;

/// Newton steps allowed when localising an extremum
pub const MAX_INTERPOLATION_STEPS: usize = 5;

pub const ORIENTATION_BINS: usize = 36;
/// Orientation window radius, in units of the keypoint sigma
pub const ORIENTATION_RADIUS: f32 = 3.0 * ORIENTATION_SIGMA_FACTOR;
pub const ORIENTATION_SIGMA_FACTOR: f32 = 1.5;
/// Secondary histogram peaks above this fraction of the maximum spawn keypoints
pub const ORIENTATION_PEAK_RATIO: f32 = 0.8;

/// Integer position in one octave of the scale space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleSpacePoint {
    pub layer: usize,
    pub x: usize,
    pub y: usize,
}

/// Extremum after quadratic refinement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedExtremum {
    pub point: ScaleSpacePoint,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_layer: f32,
    /// Interpolated DoG value at the refined location
    pub contrast: f32,
}

/// Gaussian scale space together with its difference-of-Gaussians stack
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub space: ScaleSpace,
    /// `dogs[o][i] = octaves[o][i + 1] - octaves[o][i]`
    pub dogs: Vec<Vec<FloatImage>>,
}

impl Pyramid {
    pub fn n_octaves(&self) -> usize {
        self.dogs.len()
    }
}
