use align_core::Point2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::{GeometryError, GeometryResult};
use crate::homography::Homography;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Correspondences in a minimal sample
const SAMPLE_SIZE: usize = 4;
/// Samples drawn and scored together between adaptive bound updates
const BATCH_SIZE: usize = 64;

/// Parameters for RANSAC homography estimation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacParams {
    /// Pixel distance below which a correspondence counts as an inlier.
    pub reproj_threshold: f64,
    /// Maximum number of minimal samples.
    pub max_iterations: usize,
    /// Desired probability that at least one sample is outlier-free.
    pub confidence: f64,
    /// Optional fixed seed for reproducible sampling.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub random_seed: Option<u64>,
    /// Whether to refit on all inliers with normalised DLT.
    pub refine: bool,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            reproj_threshold: 3.0,
            max_iterations: 2000,
            confidence: 0.995,
            random_seed: None,
            refine: true,
        }
    }
}

impl RansacParams {
    pub fn fast_preset() -> Self {
        Self {
            max_iterations: 500,
            confidence: 0.99,
            ..Self::default()
        }
    }

    pub fn balanced_preset() -> Self {
        Self::default()
    }

    pub fn precise_preset() -> Self {
        Self {
            reproj_threshold: 2.0,
            max_iterations: 5000,
            confidence: 0.999,
            ..Self::default()
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "RansacParams: threshold={}px, max_iterations={}, confidence={}, seed={:?}, refine={}",
            self.reproj_threshold, self.max_iterations, self.confidence, self.random_seed, self.refine
        )
    }

    pub fn validate(&self) -> GeometryResult<()> {
        if !self.reproj_threshold.is_finite() || self.reproj_threshold <= 0.0 {
            return Err(GeometryError::InvalidParams(format!(
                "reprojection threshold {} must be finite and > 0",
                self.reproj_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(GeometryError::InvalidParams(
                "max_iterations must be >= 1".to_string(),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(GeometryError::InvalidParams(format!(
                "confidence {} must lie in (0, 1)",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Robustly estimated homography with its consensus set
#[derive(Debug, Clone, PartialEq)]
pub struct HomographyEstimate {
    pub homography: Homography,
    /// `inliers[i]` is true when correspondence `i` agrees with `homography`
    pub inliers: Vec<bool>,
    pub inlier_count: usize,
    /// Minimal samples drawn
    pub iterations: usize,
    /// Mean reprojection error over the inliers, in pixels
    pub mean_error: f64,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    homography: Homography,
    inlier_count: usize,
    total_error: f64,
}

impl Candidate {
    /// More inliers first, then lower total error; equal candidates keep the earlier one
    fn beats(&self, other: &Candidate) -> bool {
        self.inlier_count > other.inlier_count
            || (self.inlier_count == other.inlier_count && self.total_error < other.total_error)
    }
}

/// Estimate the homography mapping `src[i]` to `dst[i]` with RANSAC.
///
/// Samples come from a single RNG in a fixed order and are scored in
/// parallel batches, so a fixed `random_seed` gives identical results and a
/// larger `max_iterations` never yields fewer RANSAC inliers.
pub fn estimate_homography(
    src: &[Point2],
    dst: &[Point2],
    params: &RansacParams,
) -> GeometryResult<HomographyEstimate> {
    params.validate()?;
    let n = src.len();
    if n != dst.len() || n < SAMPLE_SIZE {
        return Err(GeometryError::InsufficientCorrespondences {
            found: n.min(dst.len()),
        });
    }

    let mut rng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut best: Option<Candidate> = None;
    let mut bound = params.max_iterations;
    let mut drawn = 0;

    while drawn < bound {
        let batch_len = (bound - drawn).min(BATCH_SIZE);
        let samples: Vec<Vec<usize>> = (0..batch_len)
            .map(|_| rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE).into_vec())
            .collect();

        let scored: Vec<Option<Candidate>> = samples
            .par_iter()
            .map(|idx| {
                let s = [src[idx[0]], src[idx[1]], src[idx[2]], src[idx[3]]];
                let d = [dst[idx[0]], dst[idx[1]], dst[idx[2]], dst[idx[3]]];
                let homography = Homography::from_four_points(&s, &d)?;
                let (inlier_count, total_error) =
                    score(&homography, src, dst, params.reproj_threshold);
                Some(Candidate {
                    homography,
                    inlier_count,
                    total_error,
                })
            })
            .collect();

        // Reduce in sample order
        for candidate in scored.into_iter().flatten() {
            if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                best = Some(candidate);
            }
        }
        drawn += batch_len;

        if let Some(b) = &best {
            bound = bound.min(adaptive_iterations(b.inlier_count, n, params.confidence, params.max_iterations));
        }
    }

    let best = best.ok_or(GeometryError::DegenerateGeometry { iterations: drawn })?;
    log::debug!(
        "ransac: {} / {} inliers after {} samples",
        best.inlier_count,
        n,
        drawn
    );

    let mut homography = best.homography;
    if params.refine && best.inlier_count >= SAMPLE_SIZE {
        let (in_src, in_dst): (Vec<Point2>, Vec<Point2>) = src
            .iter()
            .zip(dst)
            .filter(|(s, d)| best.homography.transfer_error(s, d) <= params.reproj_threshold)
            .map(|(s, d)| (*s, *d))
            .unzip();
        if let Some(refined) = Homography::fit_dlt(&in_src, &in_dst) {
            let (count, _) = score(&refined, src, dst, params.reproj_threshold);
            if count >= best.inlier_count {
                log::debug!("refined homography keeps {} inliers", count);
                homography = refined;
            }
        }
    }

    let errors: Vec<f64> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| homography.transfer_error(s, d))
        .collect();
    let inliers: Vec<bool> = errors.iter().map(|&e| e <= params.reproj_threshold).collect();
    let inlier_count = inliers.iter().filter(|&&b| b).count();
    let mean_error = if inlier_count > 0 {
        errors
            .iter()
            .zip(&inliers)
            .filter(|&(_, &inl)| inl)
            .map(|(e, _)| e)
            .sum::<f64>()
            / inlier_count as f64
    } else {
        0.0
    };

    Ok(HomographyEstimate {
        homography,
        inliers,
        inlier_count,
        iterations: drawn,
        mean_error,
    })
}

/// Inlier count and summed inlier error of a model
fn score(h: &Homography, src: &[Point2], dst: &[Point2], threshold: f64) -> (usize, f64) {
    src.iter()
        .zip(dst)
        .map(|(s, d)| h.transfer_error(s, d))
        .filter(|&e| e <= threshold)
        .fold((0, 0.0), |(c, t), e| (c + 1, t + e))
}

/// Samples needed to draw one all-inlier sample with probability `confidence`
pub fn adaptive_iterations(inliers: usize, total: usize, confidence: f64, max_iterations: usize) -> usize {
    if total == 0 {
        return max_iterations;
    }
    let w = inliers as f64 / total as f64;
    let p_good = w.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 - f64::EPSILON {
        return 0;
    }
    if p_good <= f64::EPSILON {
        return max_iterations;
    }
    let n = ((1.0 - confidence).ln() / (1.0 - p_good).ln()).ceil();
    if n.is_finite() && n >= 0.0 {
        (n as usize).min(max_iterations)
    } else {
        max_iterations
    }
}
