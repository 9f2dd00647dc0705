use std::f32::consts::TAU;

use align_core::FloatImage;

/// Dominant gradient orientation assignment
pub struct OrientationEstimator;

impl OrientationEstimator {
    /// Gaussian-weighted histogram of gradient orientations around `(x, y)`.
    ///
    /// Bin `k` covers angles around `k * 2pi / n_bins`, measured with x to
    /// the right and y pointing down. The raw histogram is smoothed with the
    /// circular kernel `[1, 4, 6, 4, 1] / 16`.
    pub fn histogram(
        img: &FloatImage,
        x: usize,
        y: usize,
        radius: i32,
        sigma: f32,
        n_bins: usize,
    ) -> Vec<f32> {
        let (w, h) = (img.width() as i64, img.height() as i64);
        let weight_scale = -1.0 / (2.0 * sigma * sigma);
        let mut raw = vec![0.0f32; n_bins];

        for dy in -radius..=radius {
            let yy = y as i64 + dy as i64;
            if yy <= 0 || yy >= h - 1 {
                continue;
            }
            for dx in -radius..=radius {
                let xx = x as i64 + dx as i64;
                if xx <= 0 || xx >= w - 1 {
                    continue;
                }
                let (xx, yy) = (xx as usize, yy as usize);
                let gx = img.at(xx + 1, yy) - img.at(xx - 1, yy);
                let gy = img.at(xx, yy + 1) - img.at(xx, yy - 1);
                let magnitude = (gx * gx + gy * gy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let weight = ((dx * dx + dy * dy) as f32 * weight_scale).exp();
                let bin = (Self::wrap_angle(gy.atan2(gx)) * n_bins as f32 / TAU).round() as usize % n_bins;
                raw[bin] += weight * magnitude;
            }
        }

        let n = n_bins;
        (0..n)
            .map(|i| {
                let at = |o: isize| raw[(i as isize + o).rem_euclid(n as isize) as usize];
                (at(-2) + at(2)) * (1.0 / 16.0) + (at(-1) + at(1)) * (4.0 / 16.0) + at(0) * (6.0 / 16.0)
            })
            .collect()
    }

    /// Orientations of all local histogram peaks within `peak_ratio` of the
    /// global maximum, refined by parabolic interpolation. In radians, [0, 2pi).
    pub fn dominant_orientations(hist: &[f32], peak_ratio: f32) -> Vec<f32> {
        let n = hist.len();
        let max = hist.iter().copied().fold(0.0f32, f32::max);
        if n < 3 || max <= 0.0 {
            return Vec::new();
        }
        let threshold = max * peak_ratio;

        (0..n)
            .filter_map(|k| {
                let left = hist[(k + n - 1) % n];
                let right = hist[(k + 1) % n];
                let c = hist[k];
                if !(c > left && c > right && c >= threshold) {
                    return None;
                }
                let bin = k as f32 + 0.5 * (left - right) / (left - 2.0 * c + right);
                let bin = bin.rem_euclid(n as f32);
                Some(Self::wrap_angle(bin * TAU / n as f32))
            })
            .collect()
    }

    /// Map any angle to [0, 2pi)
    pub fn wrap_angle(angle: f32) -> f32 {
        let a = angle.rem_euclid(TAU);
        if a >= TAU {
            0.0
        } else {
            a
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    /// Linear ramp whose gradient points along `angle`
    fn ramp(size: usize, angle: f32) -> FloatImage {
        let (s, c) = angle.sin_cos();
        let data = (0..size * size)
            .map(|i| {
                let (x, y) = ((i % size) as f32, (i / size) as f32);
                0.01 * (c * x + s * y)
            })
            .collect();
        FloatImage::new(size, size, data).unwrap()
    }

    #[test]
    fn test_single_peak_along_gradient() {
        for &angle in &[0.0, FRAC_PI_2, PI, 1.0, 4.0] {
            let img = ramp(32, angle);
            let hist = OrientationEstimator::histogram(&img, 16, 16, 6, 3.0, 36);
            let peaks = OrientationEstimator::dominant_orientations(&hist, 0.8);
            assert_eq!(peaks.len(), 1, "angle {}", angle);
            let diff = (peaks[0] - angle).abs().min(TAU - (peaks[0] - angle).abs());
            assert!(diff < 0.1, "expected {}, got {}", angle, peaks[0]);
        }
    }

    #[test]
    fn test_two_equal_peaks() {
        let mut hist = vec![0.0; 36];
        hist[4] = 1.0;
        hist[22] = 0.9;
        let peaks = OrientationEstimator::dominant_orientations(&hist, 0.8);
        assert_eq!(peaks.len(), 2);
        approx::assert_relative_eq!(peaks[0], 4.0 * TAU / 36.0, epsilon = 1e-5);
    }

    #[test]
    fn test_weak_peak_dropped() {
        let mut hist = vec![0.0; 36];
        hist[4] = 1.0;
        hist[22] = 0.5;
        assert_eq!(OrientationEstimator::dominant_orientations(&hist, 0.8).len(), 1);
    }

    #[test]
    fn test_flat_histogram_has_no_orientation() {
        let img = FloatImage::zeros(16, 16);
        let hist = OrientationEstimator::histogram(&img, 8, 8, 4, 2.0, 36);
        assert!(OrientationEstimator::dominant_orientations(&hist, 0.8).is_empty());
    }

    #[test]
    fn test_wrap_angle() {
        approx::assert_relative_eq!(OrientationEstimator::wrap_angle(-FRAC_PI_2), 3.0 * FRAC_PI_2);
        approx::assert_relative_eq!(OrientationEstimator::wrap_angle(TAU + 1.0), 1.0, epsilon = 1e-5);
    }
}
