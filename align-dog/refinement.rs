use align_core::FloatImage;
use nalgebra::{Matrix3, Vector3};

use crate::types::{RefinedExtremum, ScaleSpacePoint, IMAGE_BORDER, MAX_INTERPOLATION_STEPS};

/// Subpixel/subscale localisation and rejection of unstable extrema
pub struct KeypointRefinement;

/// First and second derivatives of the DoG at a discrete sample
struct LocalFit {
    value: f32,
    gradient: Vector3<f32>,
    hessian: Matrix3<f32>,
}

impl KeypointRefinement {
    /// Refine a discrete extremum by fitting a 3D quadratic in (x, y, scale).
    ///
    /// The sample moves to a neighbour whenever the fitted offset exceeds half
    /// a pixel in any direction. Returns `None` when the fit leaves the
    /// searchable region, does not converge, has low contrast or lies on an
    /// edge.
    pub fn refine_extremum(
        dogs: &[FloatImage],
        start: ScaleSpacePoint,
        octave_layers: usize,
        contrast_threshold: f32,
        edge_threshold: f32,
    ) -> Option<RefinedExtremum> {
        let (w, h) = (dogs[0].width(), dogs[0].height());
        let mut point = start;

        for _ in 0..MAX_INTERPOLATION_STEPS {
            let fit = Self::local_fit(dogs, point);
            // Solve H * offset = -g
            let offset = fit.hessian.lu().solve(&(-fit.gradient))?;
            if !offset.iter().all(|v| v.is_finite()) {
                return None;
            }

            if offset.iter().all(|v| v.abs() < 0.5) {
                let contrast = fit.value + 0.5 * fit.gradient.dot(&offset);
                if contrast.abs() * (octave_layers as f32) < contrast_threshold {
                    return None;
                }
                if Self::is_on_edge(&fit.hessian, edge_threshold) {
                    return None;
                }
                return Some(RefinedExtremum {
                    point,
                    offset_x: offset[0],
                    offset_y: offset[1],
                    offset_layer: offset[2],
                    contrast,
                });
            }

            // Large offsets would overflow the integer update
            if offset.iter().any(|v| v.abs() > (w.max(h) as f32)) {
                return None;
            }
            let x = point.x as i64 + offset[0].round() as i64;
            let y = point.y as i64 + offset[1].round() as i64;
            let layer = point.layer as i64 + offset[2].round() as i64;

            let border = IMAGE_BORDER as i64;
            if layer < 1
                || layer > octave_layers as i64
                || x < border
                || x >= w as i64 - border
                || y < border
                || y >= h as i64 - border
            {
                return None;
            }
            point = ScaleSpacePoint {
                layer: layer as usize,
                x: x as usize,
                y: y as usize,
            };
        }

        // Did not converge within the step limit
        None
    }

    fn local_fit(dogs: &[FloatImage], p: ScaleSpacePoint) -> LocalFit {
        let (prev, curr, next) = (&dogs[p.layer - 1], &dogs[p.layer], &dogs[p.layer + 1]);
        let (x, y) = (p.x, p.y);
        let v = curr.at(x, y);

        let dx = (curr.at(x + 1, y) - curr.at(x - 1, y)) * 0.5;
        let dy = (curr.at(x, y + 1) - curr.at(x, y - 1)) * 0.5;
        let ds = (next.at(x, y) - prev.at(x, y)) * 0.5;

        let dxx = curr.at(x + 1, y) + curr.at(x - 1, y) - 2.0 * v;
        let dyy = curr.at(x, y + 1) + curr.at(x, y - 1) - 2.0 * v;
        let dss = next.at(x, y) + prev.at(x, y) - 2.0 * v;
        let dxy = (curr.at(x + 1, y + 1) - curr.at(x - 1, y + 1) - curr.at(x + 1, y - 1)
            + curr.at(x - 1, y - 1))
            * 0.25;
        let dxs = (next.at(x + 1, y) - next.at(x - 1, y) - prev.at(x + 1, y) + prev.at(x - 1, y))
            * 0.25;
        let dys = (next.at(x, y + 1) - next.at(x, y - 1) - prev.at(x, y + 1) + prev.at(x, y - 1))
            * 0.25;

        LocalFit {
            value: v,
            gradient: Vector3::new(dx, dy, ds),
            hessian: Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss),
        }
    }

    /// Principal curvature ratio test on the spatial 2x2 Hessian
    fn is_on_edge(hessian: &Matrix3<f32>, edge_threshold: f32) -> bool {
        let (dxx, dyy, dxy) = (hessian[(0, 0)], hessian[(1, 1)], hessian[(0, 1)]);
        let tr = dxx + dyy;
        let det = dxx * dyy - dxy * dxy;
        if det <= 0.0 {
            return true;
        }
        tr * tr * edge_threshold >= (edge_threshold + 1.0).powi(2) * det
    }
}
