//! Scale-invariant keypoint detection on a difference-of-Gaussians pyramid.
//!
//! [`DogDetector::detect`] builds the Gaussian scale space of an intensity
//! image, searches every inner DoG layer for 26-neighbour extrema, refines
//! them to subpixel and subscale accuracy, rejects low-contrast and edge
//! responses and assigns one keypoint per dominant gradient orientation.

pub mod builder;
pub mod config;
pub mod detector;
pub mod error;
pub mod extrema;
pub mod orientation;
pub mod pyramid;
pub mod refinement;
pub mod types;

pub use builder::DetectorBuilder;
pub use config::DetectorConfig;
pub use detector::{Detection, DogDetector};
pub use error::{DetectorError, DetectorResult};
pub use pyramid::ImagePyramid;
pub use types::Pyramid;
