use align_core::{Image, Keypoint, ScaleSpace};
use rayon::prelude::*;

use crate::config::DetectorConfig;
use crate::error::DetectorResult;
use crate::extrema::ExtremaDetector;
use crate::orientation::OrientationEstimator;
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::{
    Pyramid, ORIENTATION_BINS, ORIENTATION_PEAK_RATIO, ORIENTATION_RADIUS,
    ORIENTATION_SIGMA_FACTOR,
};

/// Keypoints of one image together with the scale space they were found in.
///
/// Descriptors are sampled from the same Gaussian layers, so the two travel
/// together.
#[derive(Debug, Clone)]
pub struct Detection {
    pub keypoints: Vec<Keypoint>,
    pub scale_space: ScaleSpace,
}

impl Detection {
    fn empty(cfg: &DetectorConfig) -> Self {
        Self {
            keypoints: Vec::new(),
            scale_space: ScaleSpace {
                octaves: Vec::new(),
                octave_layers: cfg.octave_layers,
                sigma: cfg.sigma,
                seed_scale: if cfg.upsample { 2.0 } else { 1.0 },
            },
        }
    }
}

/// Difference-of-Gaussians keypoint detector
#[derive(Debug, Clone)]
pub struct DogDetector {
    cfg: DetectorConfig,
}

impl DogDetector {
    /// Creates a new detector with validation
    pub fn new(cfg: DetectorConfig) -> DetectorResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Detect oriented keypoints in a single-channel image.
    ///
    /// Output order is deterministic: octave, then layer, then row-major
    /// position, then orientation. When `max_features` is set only the
    /// strongest responses are kept, ties resolved by that order.
    pub fn detect(&self, img: &Image) -> DetectorResult<Detection> {
        let pyramid = match ImagePyramid::build(img, &self.cfg)? {
            Some(p) => p,
            None => {
                log::debug!(
                    "image {}x{} too small for a single octave",
                    img.width(),
                    img.height()
                );
                return Ok(Detection::empty(&self.cfg));
            }
        };

        let tasks: Vec<(usize, usize)> = (0..pyramid.n_octaves())
            .flat_map(|o| (1..=self.cfg.octave_layers).map(move |l| (o, l)))
            .collect();

        let mut keypoints: Vec<Keypoint> = tasks
            .par_iter()
            .flat_map_iter(|&(o, l)| self.detect_in_layer(&pyramid, o, l))
            .collect();

        log::debug!(
            "detected {} keypoints over {} octaves",
            keypoints.len(),
            pyramid.n_octaves()
        );

        if let Some(limit) = self.cfg.max_features {
            if keypoints.len() > limit {
                keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
                keypoints.truncate(limit);
                log::debug!("kept the {} strongest keypoints", limit);
            }
        }

        Ok(Detection {
            keypoints,
            scale_space: pyramid.space,
        })
    }

    fn detect_in_layer(&self, pyramid: &Pyramid, octave: usize, layer: usize) -> Vec<Keypoint> {
        let dogs = &pyramid.dogs[octave];
        let space = &pyramid.space;
        let s = self.cfg.octave_layers;
        let threshold = ExtremaDetector::prefilter_threshold(self.cfg.contrast_threshold, s);
        let step = space.octave_step(octave);

        let mut out = Vec::new();
        for candidate in ExtremaDetector::find_extrema(dogs, layer, threshold) {
            let refined = match KeypointRefinement::refine_extremum(
                dogs,
                candidate,
                s,
                self.cfg.contrast_threshold,
                self.cfg.edge_threshold,
            ) {
                Some(r) => r,
                None => continue,
            };

            let p = refined.point;
            let octave_sigma =
                self.cfg.sigma * 2f32.powf((p.layer as f32 + refined.offset_layer) / s as f32);
            let gaussian = &space.octaves[octave][p.layer];
            let hist = OrientationEstimator::histogram(
                gaussian,
                p.x,
                p.y,
                (ORIENTATION_RADIUS * octave_sigma).round() as i32,
                ORIENTATION_SIGMA_FACTOR * octave_sigma,
                ORIENTATION_BINS,
            );

            for angle in OrientationEstimator::dominant_orientations(&hist, ORIENTATION_PEAK_RATIO) {
                out.push(Keypoint {
                    x: (p.x as f32 + refined.offset_x) * step,
                    y: (p.y as f32 + refined.offset_y) * step,
                    size: octave_sigma * 2.0 * step,
                    angle,
                    response: refined.contrast.abs(),
                    octave,
                    layer: p.layer,
                    layer_offset: refined.offset_layer,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectorError;
    use align_core::ImageError;
    use std::f32::consts::TAU;

    /// Dark image with bright Gaussian blobs
    fn blob_image(size: usize, blobs: &[(f32, f32, f32, f32)]) -> Image {
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = ((i % size) as f32, (i / size) as f32);
                let v: f32 = blobs
                    .iter()
                    .map(|&(cx, cy, s, a)| {
                        a * (-((x - cx).powi(2) + (y - cy).powi(2)) / (2.0 * s * s)).exp()
                    })
                    .sum();
                (20.0 + v).round().clamp(0.0, 255.0) as u8
            })
            .collect();
        Image::new(size, size, 1, data).unwrap()
    }

    #[test]
    fn test_blob_is_detected_near_centre() {
        let img = blob_image(64, &[(32.0, 32.0, 4.0, 200.0)]);
        let detection = DogDetector::new(DetectorConfig::default())
            .unwrap()
            .detect(&img)
            .unwrap();
        assert!(!detection.keypoints.is_empty());
        let nearest = detection
            .keypoints
            .iter()
            .map(|kp| (kp.x - 32.0).hypot(kp.y - 32.0))
            .fold(f32::INFINITY, f32::min);
        assert!(nearest < 2.0, "closest keypoint {} px away", nearest);
    }

    #[test]
    fn test_keypoint_invariants() {
        let img = blob_image(
            96,
            &[
                (20.0, 24.0, 3.0, 180.0),
                (70.0, 30.0, 5.0, 150.0),
                (48.0, 70.0, 2.5, 220.0),
            ],
        );
        let detection = DogDetector::new(DetectorConfig::default())
            .unwrap()
            .detect(&img)
            .unwrap();
        assert!(!detection.keypoints.is_empty());
        for kp in &detection.keypoints {
            assert!(kp.x >= 0.0 && kp.x < 96.0 && kp.y >= 0.0 && kp.y < 96.0);
            assert!(kp.angle >= 0.0 && kp.angle < TAU);
            assert!(kp.size > 0.0 && kp.response > 0.0);
            assert!(kp.layer >= 1 && kp.layer <= 3);
            assert!(kp.layer_offset.abs() < 0.5);
            assert!(kp.octave < detection.scale_space.octaves.len());
        }
    }

    #[test]
    fn test_flat_image_has_no_keypoints() {
        let img = Image::from_val(64, 64, 1, 128).unwrap();
        let detection = DogDetector::new(DetectorConfig::default())
            .unwrap()
            .detect(&img)
            .unwrap();
        assert!(detection.keypoints.is_empty());
    }

    #[test]
    fn test_tiny_image_yields_empty_detection() {
        let img = Image::from_val(3, 3, 1, 10).unwrap();
        let cfg = DetectorConfig { upsample: false, ..Default::default() };
        let detection = DogDetector::new(cfg).unwrap().detect(&img).unwrap();
        assert!(detection.keypoints.is_empty());
        assert!(detection.scale_space.octaves.is_empty());
    }

    #[test]
    fn test_max_features_keeps_strongest() {
        let img = blob_image(
            96,
            &[(20.0, 24.0, 3.0, 180.0), (70.0, 30.0, 5.0, 150.0), (48.0, 70.0, 2.5, 220.0)],
        );
        let all = DogDetector::new(DetectorConfig::default()).unwrap().detect(&img).unwrap();
        let best = all
            .keypoints
            .iter()
            .map(|kp| kp.response)
            .fold(0.0f32, f32::max);

        let cfg = DetectorConfig { max_features: Some(1), ..Default::default() };
        let limited = DogDetector::new(cfg).unwrap().detect(&img).unwrap();
        assert_eq!(limited.keypoints.len(), 1);
        assert_eq!(limited.keypoints[0].response, best);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let img = blob_image(64, &[(20.0, 40.0, 3.0, 200.0), (44.0, 18.0, 4.0, 160.0)]);
        let detector = DogDetector::new(DetectorConfig::default()).unwrap();
        let a = detector.detect(&img).unwrap();
        let b = detector.detect(&img).unwrap();
        assert_eq!(a.keypoints, b.keypoints);
    }

    #[test]
    fn test_colour_input_rejected() {
        let img = Image::from_val(32, 32, 3, 10).unwrap();
        let result = DogDetector::new(DetectorConfig::default()).unwrap().detect(&img);
        assert!(matches!(
            result,
            Err(DetectorError::Image(ImageError::UnsupportedChannels(3)))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = DetectorConfig { octave_layers: 0, ..Default::default() };
        assert!(DogDetector::new(cfg).is_err());
    }
}
