use align_core::{FloatImage, Image, ImageError, ScaleSpace};
use image::imageops::{resize, FilterType};
use image::{ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;
use rayon::prelude::*;

use crate::config::DetectorConfig;
use crate::error::DetectorResult;
use crate::types::{Pyramid, IMAGE_BORDER, SIGMA_IN};

type LumaFImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Kernel radius in units of sigma
const KERNEL_RADIUS_SIGMAS: f32 = 4.0;

/// Smallest octave side that still leaves room for extrema inside the border
const MIN_OCTAVE_SIZE: usize = 2 * IMAGE_BORDER + 2;

/// Gaussian / difference-of-Gaussians pyramid construction
pub struct ImagePyramid;

impl ImagePyramid {
    /// Blur increments between consecutive layers of an octave.
    ///
    /// Entry 0 is the absolute blur of the first layer; every following
    /// entry brings layer `i - 1` at `sigma * k^(i-1)` to `sigma * k^i`.
    pub fn layer_sigmas(sigma: f32, octave_layers: usize) -> Vec<f32> {
        let k = 2f32.powf(1.0 / octave_layers as f32);
        let mut sigmas = Vec::with_capacity(octave_layers + 3);
        sigmas.push(sigma);
        for i in 1..octave_layers + 3 {
            let prev = sigma * k.powi(i as i32 - 1);
            let total = prev * k;
            sigmas.push((total * total - prev * prev).sqrt());
        }
        sigmas
    }

    /// Number of octaves for a seed image of the given size
    pub fn octave_count(width: usize, height: usize, max_octaves: Option<usize>) -> usize {
        let min_dim = width.min(height);
        if min_dim < MIN_OCTAVE_SIZE {
            return 0;
        }
        let mut n = ((min_dim as f32).log2().round() as i64 - 2).max(1) as usize;
        // Drop octaves that would fall below the extremum border
        while n > 1 && (min_dim >> (n - 1)) < MIN_OCTAVE_SIZE {
            n -= 1;
        }
        match max_octaves {
            Some(cap) => n.min(cap),
            None => n,
        }
    }

    /// Build the scale space of a single-channel image.
    ///
    /// Returns `None` when the image is too small to hold one octave.
    pub fn build(img: &Image, cfg: &DetectorConfig) -> DetectorResult<Option<Pyramid>> {
        let base = FloatImage::from_gray(img)?;
        if base.width() == 0 || base.height() == 0 {
            return Ok(None);
        }

        let (seed, seed_scale, sigma_in) = if cfg.upsample {
            let up = Self::resize_linear(&base, base.width() * 2, base.height() * 2)?;
            (up, 2.0, 2.0 * SIGMA_IN)
        } else {
            (base, 1.0, SIGMA_IN)
        };

        let n_octaves = Self::octave_count(seed.width(), seed.height(), cfg.max_octaves);
        if n_octaves == 0 {
            return Ok(None);
        }

        let sigma_diff = (cfg.sigma * cfg.sigma - sigma_in * sigma_in).max(0.01).sqrt();
        let seed = Self::gaussian_blur(&seed, sigma_diff)?;

        let sigmas = Self::layer_sigmas(cfg.sigma, cfg.octave_layers);
        let mut octaves: Vec<Vec<FloatImage>> = Vec::with_capacity(n_octaves);
        for o in 0..n_octaves {
            let first = match octaves.last() {
                // Layer S of the previous octave has twice the base blur
                Some(prev) => prev[cfg.octave_layers].decimate(),
                None => seed.clone(),
            };
            let mut layers = Vec::with_capacity(sigmas.len());
            layers.push(first);
            for sigma in sigmas.iter().skip(1) {
                let next = Self::gaussian_blur(&layers[layers.len() - 1], *sigma)?;
                layers.push(next);
            }
            log::trace!(
                "octave {}: {}x{}",
                o,
                layers[0].width(),
                layers[0].height()
            );
            octaves.push(layers);
        }

        let dogs = octaves
            .par_iter()
            .map(|layers| {
                layers
                    .windows(2)
                    .map(|pair| pair[1].difference(&pair[0]))
                    .collect::<Result<Vec<_>, ImageError>>()
            })
            .collect::<Result<Vec<_>, ImageError>>()?;

        Ok(Some(Pyramid {
            space: ScaleSpace {
                octaves,
                octave_layers: cfg.octave_layers,
                sigma: cfg.sigma,
                seed_scale,
            },
            dogs,
        }))
    }

    /// Normalised 1-D Gaussian sampled over `[-ceil(4 sigma), ceil(4 sigma)]`
    pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
        let radius = (KERNEL_RADIUS_SIGMAS * sigma).ceil().max(1.0) as i32;
        let denom = 2.0 * sigma * sigma;
        let mut kernel: Vec<f32> = (-radius..=radius)
            .map(|i| (-((i * i) as f32) / denom).exp())
            .collect();
        let sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|k| *k /= sum);
        kernel
    }

    fn gaussian_blur(img: &FloatImage, sigma: f32) -> DetectorResult<FloatImage> {
        let kernel = Self::gaussian_kernel(sigma);
        let blurred = separable_filter_equal(&Self::to_buffer(img)?, &kernel);
        Self::from_buffer(blurred)
    }

    fn resize_linear(img: &FloatImage, width: usize, height: usize) -> DetectorResult<FloatImage> {
        let resized = resize(
            &Self::to_buffer(img)?,
            width as u32,
            height as u32,
            FilterType::Triangle,
        );
        Self::from_buffer(resized)
    }

    fn to_buffer(img: &FloatImage) -> DetectorResult<LumaFImage> {
        let expected_len = img.width() * img.height();
        ImageBuffer::from_raw(img.width() as u32, img.height() as u32, img.as_slice().to_vec())
            .ok_or_else(|| {
                ImageError::InvalidImageData {
                    expected_len,
                    actual_len: img.as_slice().len(),
                }
                .into()
            })
    }

    fn from_buffer(buffer: LumaFImage) -> DetectorResult<FloatImage> {
        let (w, h) = buffer.dimensions();
        Ok(FloatImage::new(w as usize, h as usize, buffer.into_raw())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: usize, height: usize) -> Image {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x * 3 + y * 5) % 256) as u8))
            .collect();
        Image::new(width, height, 1, data).unwrap()
    }

    #[test]
    fn test_layer_sigmas_compose_to_double() {
        let sigmas = ImagePyramid::layer_sigmas(1.6, 3);
        assert_eq!(sigmas.len(), 6);
        // Accumulated blur after S increments is 2 * sigma
        let total: f32 = sigmas[..4].iter().map(|s| s * s).sum::<f32>().sqrt();
        approx::assert_relative_eq!(total, 3.2, epsilon = 1e-4);
    }

    #[test]
    fn test_kernel_is_normalised_and_symmetric() {
        let kernel = ImagePyramid::gaussian_kernel(1.6);
        assert_eq!(kernel.len(), 2 * 7 + 1);
        approx::assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        for i in 0..kernel.len() / 2 {
            assert_eq!(kernel[i], kernel[kernel.len() - 1 - i]);
        }
    }

    #[test]
    fn test_blur_impulse_has_requested_sigma() {
        const N: usize = 61;
        for sigma in [1.2f32, 2.45, 3.0] {
            let mut data = vec![0.0f32; N * N];
            data[(N / 2) * N + N / 2] = 1.0;
            let impulse = FloatImage::new(N, N, data).unwrap();
            let blurred = ImagePyramid::gaussian_blur(&impulse, sigma).unwrap();

            let c = (N / 2) as f32;
            let (mut mass, mut var_x, mut var_y) = (0.0f32, 0.0f32, 0.0f32);
            for y in 0..N {
                for x in 0..N {
                    let v = blurred.at(x, y);
                    mass += v;
                    var_x += v * (x as f32 - c).powi(2);
                    var_y += v * (y as f32 - c).powi(2);
                }
            }
            approx::assert_relative_eq!(mass, 1.0, epsilon = 1e-4);
            let measured_x = (var_x / mass).sqrt();
            let measured_y = (var_y / mass).sqrt();
            assert!((measured_x / sigma - 1.0).abs() < 0.01, "sigma {} measured {}", sigma, measured_x);
            assert!((measured_y / sigma - 1.0).abs() < 0.01, "sigma {} measured {}", sigma, measured_y);
        }
    }

    #[test]
    fn test_octave_count() {
        assert_eq!(ImagePyramid::octave_count(5, 5, None), 0);
        assert_eq!(ImagePyramid::octave_count(12, 12, None), 1);
        // log2(512) - 2 = 7 octaves, the smallest is 8 pixels and gets dropped
        assert_eq!(ImagePyramid::octave_count(512, 512, None), 6);
        assert_eq!(ImagePyramid::octave_count(512, 512, Some(3)), 3);
    }

    #[test]
    fn test_build_shapes() {
        let img = gradient_image(64, 48);
        let cfg = DetectorConfig {
            upsample: false,
            ..Default::default()
        };
        let pyramid = ImagePyramid::build(&img, &cfg).unwrap().unwrap();
        assert_eq!(pyramid.space.seed_scale, 1.0);
        for (o, layers) in pyramid.space.octaves.iter().enumerate() {
            assert_eq!(layers.len(), cfg.octave_layers + 3);
            assert_eq!(pyramid.dogs[o].len(), cfg.octave_layers + 2);
            assert_eq!(layers[0].width(), 64 >> o);
            assert_eq!(layers[0].height(), 48 >> o);
        }
    }

    #[test]
    fn test_upsampled_seed() {
        let img = gradient_image(32, 32);
        let pyramid = ImagePyramid::build(&img, &DetectorConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(pyramid.space.seed_scale, 2.0);
        assert_eq!(pyramid.space.octaves[0][0].width(), 64);
    }

    #[test]
    fn test_too_small_image() {
        let img = gradient_image(4, 4);
        let cfg = DetectorConfig {
            upsample: false,
            ..Default::default()
        };
        assert!(ImagePyramid::build(&img, &cfg).unwrap().is_none());
    }

    #[test]
    fn test_flat_image_has_zero_dog() {
        let img = Image::from_val(40, 40, 1, 90).unwrap();
        let cfg = DetectorConfig {
            upsample: false,
            ..Default::default()
        };
        let pyramid = ImagePyramid::build(&img, &cfg).unwrap().unwrap();
        for dog in pyramid.dogs.iter().flatten() {
            assert!(dog.as_slice().iter().all(|v| v.abs() < 1e-5));
        }
    }
}
