//! Feature-based alignment of image pairs and sequences.
//!
//! [`Aligner`] runs the full pipeline on two decoded images: DoG keypoints,
//! SIFT descriptors, KD-forest matching with the ratio test, RANSAC
//! homography and a perspective warp of the first image onto the second.

use align_core::{Correspondences, Descriptor, Image, Keypoint};
use align_dog::DogDetector;
use align_flann::{correspondences, ratio_test, FlannMatcher};
use align_geometry::{estimate_homography, warp_perspective, GeometryError, Homography};
use align_sift::SiftGenerator;
use rayon::prelude::*;

pub mod config;
pub mod error;
pub mod io;
pub mod visualization;

pub use align_core::{self, default_threads, init_thread_pool};
pub use config::AlignConfig;
pub use error::{AlignError, AlignResult, ImageSide};
pub use visualization::{render_matches, VisualizationConfig};

/// Keypoints needed on each side of a pair
pub const MIN_KEYPOINTS: usize = 4;
/// Ratio-test survivors needed before fitting a homography
pub const MIN_CORRESPONDENCES: usize = 4;

/// Keypoints of one image and their descriptors, index-aligned
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Outcome of aligning image A onto image B
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// A warped into B's frame, with B's dimensions and A's channels
    pub warped: Image,
    /// A and B side by side with the correspondences drawn
    pub visualization: Image,
    /// Maps A coordinates to B coordinates
    pub homography: Homography,
    /// Ratio-test survivors, A points in `src` and B points in `dst`
    pub correspondences: Correspondences,
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
    pub keypoints: (usize, usize),
    pub ransac_iterations: usize,
    pub mean_error: f64,
}

impl AlignmentResult {
    pub fn summary(&self) -> String {
        format!(
            "keypoints={}/{}, matches={}, inliers={}, iterations={}, mean_error={:.3}px",
            self.keypoints.0,
            self.keypoints.1,
            self.correspondences.len(),
            self.inlier_count,
            self.ransac_iterations,
            self.mean_error
        )
    }
}

/// Pairwise image aligner built from a validated [`AlignConfig`]
pub struct Aligner {
    cfg: AlignConfig,
    detector: DogDetector,
    sift: SiftGenerator,
    matcher: FlannMatcher,
}

impl Aligner {
    /// Create an aligner; fails with `Config` on invalid settings.
    ///
    /// The global thread pool is left alone, see [`init_thread_pool`].
    pub fn new(cfg: AlignConfig) -> AlignResult<Self> {
        cfg.validate()?;
        let detector = DogDetector::new(cfg.detector.clone())?;
        let matcher = FlannMatcher::new(cfg.matcher.clone())?;
        Ok(Self {
            cfg,
            detector,
            sift: SiftGenerator::new(),
            matcher,
        })
    }

    pub fn config(&self) -> &AlignConfig {
        &self.cfg
    }

    /// Detect keypoints on the intensity of `img` and describe them
    pub fn extract(&self, img: &Image) -> AlignResult<Features> {
        let gray = img.to_gray();
        let detection = self.detector.detect(&gray)?;
        let descriptors = self
            .sift
            .generate_descriptors(&detection.scale_space, &detection.keypoints);
        Ok(Features {
            keypoints: detection.keypoints,
            descriptors,
        })
    }

    /// Align `a` onto `b`
    pub fn align_pair(&self, a: &Image, b: &Image) -> AlignResult<AlignmentResult> {
        for (img, side) in [(a, ImageSide::First), (b, ImageSide::Second)] {
            if img.is_empty() {
                return Err(AlignError::Input(format!(
                    "{} image is empty ({}x{})",
                    side,
                    img.width(),
                    img.height()
                )));
            }
        }

        let (fa, fb) = rayon::join(|| self.extract(a), || self.extract(b));
        let (fa, fb) = (fa?, fb?);
        for (features, side) in [(&fa, ImageSide::First), (&fb, ImageSide::Second)] {
            if features.len() < MIN_KEYPOINTS {
                return Err(AlignError::InsufficientFeatures {
                    image: side,
                    found: features.len(),
                    required: MIN_KEYPOINTS,
                });
            }
        }

        let knn = self.matcher.knn_match(&fa.descriptors, &fb.descriptors, 2)?;
        let good = ratio_test(&knn, self.cfg.ratio);
        log::debug!(
            "{} of {} matches pass the ratio test at {}",
            good.len(),
            knn.len(),
            self.cfg.ratio
        );
        if good.len() < MIN_CORRESPONDENCES {
            return Err(AlignError::InsufficientCorrespondences {
                found: good.len(),
                required: MIN_CORRESPONDENCES,
            });
        }
        let corr = correspondences(good, &fa.keypoints, &fb.keypoints);

        let estimate = estimate_homography(&corr.src, &corr.dst, &self.cfg.ransac)?;
        let warped = warp_perspective(a, &estimate.homography, b.width(), b.height()).map_err(|e| match e {
            GeometryError::NonInvertible => AlignError::DegenerateGeometry {
                iterations: estimate.iterations,
            },
            other => other.into(),
        })?;
        let visualization = render_matches(a, b, &corr, &estimate.inliers, &self.cfg.visualization)?;

        let result = AlignmentResult {
            warped,
            visualization,
            homography: estimate.homography,
            correspondences: corr,
            inliers: estimate.inliers,
            inlier_count: estimate.inlier_count,
            keypoints: (fa.len(), fb.len()),
            ransac_iterations: estimate.iterations,
            mean_error: estimate.mean_error,
        };
        log::info!("Aligned pair: {}", result.summary());
        Ok(result)
    }

    /// Align every image onto its successor; one result per adjacent pair
    pub fn align_sequence(&self, images: &[Image]) -> Vec<AlignResult<AlignmentResult>> {
        images
            .par_windows(2)
            .map(|pair| self.align_pair(&pair[0], &pair[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = AlignConfig::default().with_ratio(2.0);
        assert!(matches!(Aligner::new(cfg), Err(AlignError::Config(_))));
    }

    #[test]
    fn test_empty_images_rejected() {
        let aligner = Aligner::new(AlignConfig::default()).unwrap();
        let empty = Image::new(0, 5, 1, Vec::new()).unwrap();
        let img = Image::from_val(8, 8, 1, 10).unwrap();
        assert!(matches!(aligner.align_pair(&empty, &img), Err(AlignError::Input(_))));
        assert!(matches!(aligner.align_pair(&img, &empty), Err(AlignError::Input(_))));
    }

    #[test]
    fn test_flat_image_has_no_features() {
        let aligner = Aligner::new(AlignConfig::fast_preset()).unwrap();
        let flat = Image::from_val(48, 48, 3, 128).unwrap();
        let features = aligner.extract(&flat).unwrap();
        assert!(features.is_empty());
        assert!(features.descriptors.is_empty());
    }

    #[test]
    fn test_sequence_of_one_image_is_empty() {
        let aligner = Aligner::new(AlignConfig::default()).unwrap();
        let img = Image::from_val(8, 8, 1, 10).unwrap();
        assert!(aligner.align_sequence(&[img]).is_empty());
        assert!(aligner.align_sequence(&[]).is_empty());
    }
}
