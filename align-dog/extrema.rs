use align_core::FloatImage;
use rayon::prelude::*;

use crate::types::{ScaleSpacePoint, IMAGE_BORDER};

/// Discrete scale-space extremum search over a difference-of-Gaussians stack
pub struct ExtremaDetector;

impl ExtremaDetector {
    /// Pre-refinement threshold on |DoG| for `octave_layers` layers per octave
    pub fn prefilter_threshold(contrast_threshold: f32, octave_layers: usize) -> f32 {
        0.5 * contrast_threshold / octave_layers as f32
    }

    /// Find the extrema of layer `layer` of one octave's DoG stack.
    ///
    /// A pixel qualifies when its magnitude exceeds `threshold` and it is
    /// not exceeded by any of its 26 neighbours in the layers below, at and
    /// above. Results are in row-major order.
    pub fn find_extrema(dogs: &[FloatImage], layer: usize, threshold: f32) -> Vec<ScaleSpacePoint> {
        if layer == 0 || layer + 1 >= dogs.len() {
            return Vec::new();
        }
        let (prev, curr, next) = (&dogs[layer - 1], &dogs[layer], &dogs[layer + 1]);
        let (w, h) = (curr.width(), curr.height());
        if w <= 2 * IMAGE_BORDER || h <= 2 * IMAGE_BORDER {
            return Vec::new();
        }

        (IMAGE_BORDER..h - IMAGE_BORDER)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut v = Vec::new();
                for x in IMAGE_BORDER..w - IMAGE_BORDER {
                    let val = curr.at(x, y);
                    if val.abs() <= threshold {
                        continue;
                    }
                    if Self::is_extremum([prev, curr, next], x, y, val) {
                        v.push(ScaleSpacePoint { layer, x, y });
                    }
                }
                v
            })
            .collect()
    }

    #[inline]
    fn is_extremum(stack: [&FloatImage; 3], x: usize, y: usize, val: f32) -> bool {
        let maximum = val > 0.0;
        for (i, img) in stack.iter().enumerate() {
            for yy in y - 1..=y + 1 {
                for xx in x - 1..=x + 1 {
                    if i == 1 && xx == x && yy == y {
                        continue;
                    }
                    let q = img.at(xx, yy);
                    if (maximum && q > val) || (!maximum && q < val) {
                        return false;
                    }
                }
            }
        }
        true
    }
}
