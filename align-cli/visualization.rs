use align_core::{Correspondences, Image};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::error::{AlignError, AlignResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Colours cycled over the drawn correspondences
const PALETTE: [[u8; 3]; 8] = [
    [255, 64, 64],
    [64, 255, 64],
    [64, 128, 255],
    [255, 220, 0],
    [255, 0, 255],
    [0, 255, 255],
    [255, 128, 0],
    [160, 96, 255],
];

/// Match rendering settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VisualizationConfig {
    /// Also draw ratio-test survivors that RANSAC rejected
    pub draw_outliers: bool,
    /// Radius of the circle drawn around each matched keypoint
    pub marker_radius: i32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            draw_outliers: true,
            marker_radius: 4,
        }
    }
}

impl VisualizationConfig {
    pub fn summary(&self) -> String {
        format!(
            "VisualizationConfig: draw_outliers={}, marker_radius={}",
            self.draw_outliers, self.marker_radius
        )
    }

    pub fn validate(&self) -> AlignResult<()> {
        if self.marker_radius < 0 {
            return Err(AlignError::Config(format!(
                "Invalid marker radius: {} (must be >= 0)",
                self.marker_radius
            )));
        }
        Ok(())
    }
}

/// Draw `a` and `b` side by side with a line per correspondence.
///
/// `inliers` is indexed like `corr`; entries marked false are skipped unless
/// `cfg.draw_outliers` is set. The result is RGB, `(wA + wB) x max(hA, hB)`.
pub fn render_matches(
    a: &Image,
    b: &Image,
    corr: &Correspondences,
    inliers: &[bool],
    cfg: &VisualizationConfig,
) -> AlignResult<Image> {
    let width = a.width() + b.width();
    let height = a.height().max(b.height());
    let mut canvas = RgbImage::new(width as u32, height as u32);

    image::imageops::replace(&mut canvas, &to_rgb_buffer(a)?, 0, 0);
    image::imageops::replace(&mut canvas, &to_rgb_buffer(b)?, a.width() as i64, 0);

    let offset = a.width() as f32;
    let mut drawn = 0usize;
    for (i, (p, q)) in corr.src.iter().zip(&corr.dst).enumerate() {
        let inlier = inliers.get(i).copied().unwrap_or(false);
        if !inlier && !cfg.draw_outliers {
            continue;
        }
        let color = Rgb(PALETTE[drawn % PALETTE.len()]);
        drawn += 1;

        let start = (p.x as f32, p.y as f32);
        let end = (q.x as f32 + offset, q.y as f32);
        draw_line_segment_mut(&mut canvas, start, end, color);
        if cfg.marker_radius > 0 {
            draw_hollow_circle_mut(&mut canvas, round(start), cfg.marker_radius, color);
            draw_hollow_circle_mut(&mut canvas, round(end), cfg.marker_radius, color);
        }
    }
    log::debug!("Drew {} of {} correspondences", drawn, corr.len());

    Ok(Image::new(width, height, 3, canvas.into_raw())?)
}

fn round(p: (f32, f32)) -> (i32, i32) {
    (p.0.round() as i32, p.1.round() as i32)
}

fn to_rgb_buffer(img: &Image) -> AlignResult<RgbImage> {
    let rgb = img.to_rgb();
    RgbImage::from_raw(rgb.width() as u32, rgb.height() as u32, rgb.into_raw())
        .ok_or_else(|| AlignError::Input("pixel buffer does not match its dimensions".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use align_core::{Match, Point2};

    fn corr(pairs: &[((f64, f64), (f64, f64))]) -> Correspondences {
        Correspondences {
            matches: (0..pairs.len())
                .map(|i| Match {
                    query_idx: i,
                    train_idx: i,
                    distance: 0.0,
                })
                .collect(),
            src: pairs.iter().map(|&(p, _)| Point2::new(p.0, p.1)).collect(),
            dst: pairs.iter().map(|&(_, q)| Point2::new(q.0, q.1)).collect(),
        }
    }

    #[test]
    fn test_canvas_layout() {
        let a = Image::from_val(10, 6, 1, 50).unwrap();
        let b = Image::from_val(8, 9, 3, 200).unwrap();
        let out = render_matches(&a, &b, &Correspondences::default(), &[], &VisualizationConfig::default()).unwrap();
        assert_eq!((out.width(), out.height(), out.channels()), (18, 9, 3));
        assert_eq!(out.get(0, 0, 0), 50);
        assert_eq!(out.get(10, 0, 2), 200);
        // below the shorter image stays black
        assert_eq!(out.get(3, 7, 1), 0);
    }

    #[test]
    fn test_outliers_skipped_when_disabled() {
        let a = Image::from_val(20, 20, 1, 0).unwrap();
        let b = Image::from_val(20, 20, 1, 0).unwrap();
        let c = corr(&[((5.0, 5.0), (5.0, 5.0)), ((10.0, 15.0), (10.0, 15.0))]);
        let cfg = VisualizationConfig {
            draw_outliers: false,
            marker_radius: 0,
        };
        let out = render_matches(&a, &b, &c, &[true, false], &cfg).unwrap();
        // inlier line crosses the seam at y = 5, the outlier at y = 15 is not drawn
        assert!((0..3).any(|ch| out.get(20, 5, ch) > 0));
        assert!((0..3).all(|ch| out.get(20, 15, ch) == 0));

        let all = render_matches(&a, &b, &c, &[true, false], &VisualizationConfig::default()).unwrap();
        assert!((0..3).any(|ch| all.get(20, 15, ch) > 0));
    }

    #[test]
    fn test_negative_radius_invalid() {
        let cfg = VisualizationConfig {
            marker_radius: -1,
            ..VisualizationConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
