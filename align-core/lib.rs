mod image;

pub use crate::image::{FloatImage, Image, ImageError, ImageResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of floats in a gradient-histogram descriptor (4x4 cells x 8 bins)
pub const DESCRIPTOR_SIZE: usize = 128;

/// 128-dimensional unit-length descriptor
pub type Descriptor = [f32; DESCRIPTOR_SIZE];

/// Scale-space interest point with subpixel location
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub x: f32,      // Input image x coordinate
    pub y: f32,      // Input image y coordinate
    pub size: f32,   // Neighbourhood diameter in input image pixels
    pub angle: f32,  // Dominant orientation (radians, [0, 2pi), y axis pointing down)
    pub response: f32,
    pub octave: usize,
    pub layer: usize,
    pub layer_offset: f32, // Subscale offset of the refined extremum, in (-0.5, 0.5)
}

/// A candidate pairing of a query descriptor with a train descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<&Keypoint> for Point2 {
    fn from(kp: &Keypoint) -> Self {
        Point2::new(kp.x as f64, kp.y as f64)
    }
}

/// Index-aligned point pairs that survived match filtering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    pub matches: Vec<Match>,
    pub src: Vec<Point2>,
    pub dst: Vec<Point2>,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

/// Gaussian scale space of one image.
///
/// `octaves[o][i]` is layer `i` of octave `o`; octave `o` has
/// `1 / (seed_scale * 2^-o)` the resolution of the input image.
#[derive(Debug, Clone)]
pub struct ScaleSpace {
    pub octaves: Vec<Vec<FloatImage>>,
    pub octave_layers: usize,
    pub sigma: f32,
    /// Size of the seed image relative to the input (2.0 when upsampled)
    pub seed_scale: f32,
}

impl ScaleSpace {
    pub fn gaussian(&self, octave: usize, layer: usize) -> Option<&FloatImage> {
        self.octaves.get(octave).and_then(|o| o.get(layer))
    }

    /// Input image size divided by octave image size
    pub fn octave_step(&self, octave: usize) -> f32 {
        2f32.powi(octave as i32) / self.seed_scale
    }

    /// Keypoint location in the pixel grid of its octave
    pub fn octave_coords(&self, kp: &Keypoint) -> (f32, f32) {
        let step = self.octave_step(kp.octave);
        (kp.x / step, kp.y / step)
    }

    /// Blur level of the keypoint measured in octave pixels
    pub fn octave_sigma(&self, kp: &Keypoint) -> f32 {
        self.sigma * 2f32.powf((kp.layer as f32 + kp.layer_offset) / self.octave_layers as f32)
    }
}

pub fn default_threads() -> usize {
    num_cpus::get().max(1)
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypoint(x: f32, y: f32, octave: usize, layer: usize) -> Keypoint {
        Keypoint {
            x,
            y,
            size: 1.0,
            angle: 0.0,
            response: 1.0,
            octave,
            layer,
            layer_offset: 0.0,
        }
    }

    #[test]
    fn test_octave_coords_with_upsampled_seed() {
        let space = ScaleSpace {
            octaves: Vec::new(),
            octave_layers: 3,
            sigma: 1.6,
            seed_scale: 2.0,
        };
        assert_eq!(space.octave_coords(&keypoint(10.0, 4.0, 0, 1)), (20.0, 8.0));
        assert_eq!(space.octave_coords(&keypoint(10.0, 4.0, 2, 1)), (5.0, 2.0));
    }

    #[test]
    fn test_octave_sigma_doubles_per_octave_of_layers() {
        let space = ScaleSpace {
            octaves: Vec::new(),
            octave_layers: 3,
            sigma: 1.6,
            seed_scale: 1.0,
        };
        approx::assert_relative_eq!(space.octave_sigma(&keypoint(0.0, 0.0, 0, 0)), 1.6);
        approx::assert_relative_eq!(
            space.octave_sigma(&keypoint(0.0, 0.0, 0, 3)),
            3.2,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_point_distance() {
        approx::assert_relative_eq!(Point2::new(0.0, 0.0).distance(&Point2::new(3.0, 4.0)), 5.0);
    }
}
