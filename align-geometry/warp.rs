use align_core::{Image, Point2};
use rayon::prelude::*;

use crate::error::GeometryResult;
use crate::homography::Homography;

/// Slack on the source bounds for coordinates that land on the last row/column
const BOUNDS_EPS: f64 = 1e-6;

/// Warp `src` into a `width` x `height` image with `h` mapping src -> dst.
///
/// Destination pixels whose source position falls outside the image are
/// black.
pub fn warp_perspective(src: &Image, h: &Homography, width: usize, height: usize) -> GeometryResult<Image> {
    warp_perspective_with_background(src, h, width, height, 0)
}

/// Like [`warp_perspective`], filling uncovered pixels with `background`.
///
/// Fails with `NonInvertible` when `h` is singular.
pub fn warp_perspective_with_background(
    src: &Image,
    h: &Homography,
    width: usize,
    height: usize,
    background: u8,
) -> GeometryResult<Image> {
    let inv = h.inverse()?;
    let channels = src.channels();
    let mut data = vec![background; width * height * channels];
    if data.is_empty() || src.is_empty() {
        return Ok(Image::new(width, height, channels, data)?);
    }

    let (sw, sh) = (src.width(), src.height());
    let (max_x, max_y) = ((sw - 1) as f64, (sh - 1) as f64);

    data.par_chunks_mut(width * channels)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.chunks_mut(channels).enumerate() {
                let p = match inv.project(&Point2::new(x as f64, y as f64)) {
                    Some(p) => p,
                    None => continue,
                };
                if p.x < -BOUNDS_EPS || p.y < -BOUNDS_EPS || p.x > max_x + BOUNDS_EPS || p.y > max_y + BOUNDS_EPS {
                    continue;
                }
                let (px, py) = (p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y));
                let (x0, y0) = (px.floor() as usize, py.floor() as usize);
                let (x1, y1) = ((x0 + 1).min(sw - 1), (y0 + 1).min(sh - 1));
                let (fx, fy) = (px - x0 as f64, py - y0 as f64);

                for (c, out) in pixel.iter_mut().enumerate() {
                    let top = src.get(x0, y0, c) as f64 * (1.0 - fx) + src.get(x1, y0, c) as f64 * fx;
                    let bottom = src.get(x0, y1, c) as f64 * (1.0 - fx) + src.get(x1, y1, c) as f64 * fx;
                    *out = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    Ok(Image::new(width, height, channels, data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeometryError;
    use nalgebra::Matrix3;
    use proptest::prelude::*;

    fn pattern(width: usize, height: usize, channels: usize) -> Image {
        let data = (0..width * height * channels)
            .map(|i| ((i * 37 + 11) % 251) as u8)
            .collect();
        Image::new(width, height, channels, data).unwrap()
    }

    fn translation(tx: f64, ty: f64) -> Homography {
        Homography::from_matrix(Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0))
    }

    #[test]
    fn test_identity_warp_is_copy() {
        let img = pattern(17, 11, 3);
        let warped = warp_perspective(&img, &Homography::identity(), 17, 11).unwrap();
        assert_eq!(warped, img);
    }

    #[test]
    fn test_integer_translation() {
        let img = pattern(10, 8, 1);
        let warped = warp_perspective(&img, &translation(2.0, 1.0), 10, 8).unwrap();
        for y in 0..8 {
            for x in 0..10 {
                let expected = if x >= 2 && y >= 1 { img.get(x - 2, y - 1, 0) } else { 0 };
                assert_eq!(warped.get(x, y, 0), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_half_pixel_shift_averages() {
        let img = Image::new(2, 1, 1, vec![10, 20]).unwrap();
        let warped = warp_perspective(&img, &translation(-0.5, 0.0), 2, 1).unwrap();
        assert_eq!(warped.get(0, 0, 0), 15);
        assert_eq!(warped.get(1, 0, 0), 0);
    }

    #[test]
    fn test_output_size_and_background() {
        let img = pattern(8, 8, 3);
        let warped = warp_perspective_with_background(&img, &translation(100.0, 0.0), 5, 4, 77).unwrap();
        assert_eq!((warped.width(), warped.height(), warped.channels()), (5, 4, 3));
        assert!(warped.as_slice().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_singular_homography_fails() {
        let img = pattern(4, 4, 1);
        let h = Homography::from_matrix(Matrix3::zeros());
        assert_eq!(warp_perspective(&img, &h, 4, 4), Err(GeometryError::NonInvertible));
    }

    #[test]
    fn test_empty_output() {
        let img = pattern(4, 4, 1);
        let warped = warp_perspective(&img, &Homography::identity(), 0, 3).unwrap();
        assert!(warped.is_empty());
    }

    proptest! {
        #[test]
        fn outside_pixels_are_background(
            tx in -30.0f64..30.0,
            ty in -30.0f64..30.0,
            background in any::<u8>(),
        ) {
            let img = pattern(20, 16, 1);
            let h = translation(tx, ty);
            let warped = warp_perspective_with_background(&img, &h, 24, 18, background).unwrap();
            let inv = h.inverse().unwrap();
            for y in 0..18 {
                for x in 0..24 {
                    let p = inv.project(&Point2::new(x as f64, y as f64)).unwrap();
                    let outside = p.x < -1e-6 || p.y < -1e-6 || p.x > 19.0 + 1e-6 || p.y > 15.0 + 1e-6;
                    if outside {
                        prop_assert_eq!(warped.get(x, y, 0), background);
                    }
                }
            }
        }
    }
}
