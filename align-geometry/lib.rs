//! Projective geometry for image alignment: minimal and least-squares
//! homography solvers, RANSAC estimation and perspective warping.

pub mod error;
pub mod homography;
pub mod ransac;
pub mod warp;

pub use error::{GeometryError, GeometryResult};
pub use homography::Homography;
pub use ransac::{estimate_homography, HomographyEstimate, RansacParams};
pub use warp::{warp_perspective, warp_perspective_with_background};
