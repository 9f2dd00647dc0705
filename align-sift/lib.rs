use std::f32::consts::{SQRT_2, TAU};

use align_core::{DESCRIPTOR_SIZE, Descriptor, FloatImage, Keypoint, ScaleSpace};
use rayon::prelude::*;

/// Spatial cells per side of the descriptor grid
const GRID_WIDTH: usize = 4;
/// Orientation bins per cell
const ORI_BINS: usize = 8;
/// Cell width in units of the keypoint sigma
const CELL_SCALE: f32 = 3.0;
/// Components are clipped to this fraction of the vector norm
const MAG_THRESHOLD: f32 = 0.2;

/// Gradient-histogram descriptor extraction on a Gaussian scale space
#[derive(Debug, Clone, Copy, Default)]
pub struct SiftGenerator;

impl SiftGenerator {
    pub fn new() -> Self {
        Self
    }

    /// One descriptor per keypoint, in keypoint order.
    ///
    /// Keypoints must come from a detection on `space`; a keypoint that
    /// refers to a missing octave or layer gets an all-zero descriptor.
    pub fn generate_descriptors(&self, space: &ScaleSpace, kps: &[Keypoint]) -> Vec<Descriptor> {
        let descriptors: Vec<Descriptor> = kps
            .par_iter()
            .map(|kp| match space.gaussian(kp.octave, kp.layer) {
                Some(img) => {
                    let (x, y) = space.octave_coords(kp);
                    self.describe(img, x, y, space.octave_sigma(kp), kp.angle)
                }
                None => [0.0; DESCRIPTOR_SIZE],
            })
            .collect();
        log::debug!("computed {} descriptors", descriptors.len());
        descriptors
    }

    /// Describe the neighbourhood of `(x, y)` (octave pixels) at blur `sigma`
    /// in the frame rotated by `angle`.
    pub fn describe(&self, img: &FloatImage, x: f32, y: f32, sigma: f32, angle: f32) -> Descriptor {
        let d = GRID_WIDTH;
        let n = ORI_BINS;
        let (w, h) = (img.width() as i64, img.height() as i64);
        let (px, py) = (x.round() as i64, y.round() as i64);

        let hist_width = CELL_SCALE * sigma;
        let diag = ((w * w + h * h) as f32).sqrt();
        let radius = (hist_width * SQRT_2 * (d as f32 + 1.0) * 0.5).round().min(diag) as i64;
        let (sin_t, cos_t) = angle.sin_cos();
        let (sin_t, cos_t) = (sin_t / hist_width, cos_t / hist_width);
        let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
        let bins_per_rad = n as f32 / TAU;

        // Padded histogram, (d + 2) x (d + 2) x n
        let stride_c = n;
        let stride_r = (d + 2) * n;
        let mut hist = vec![0.0f32; (d + 2) * (d + 2) * n];

        for i in -radius..=radius {
            let r = py + i;
            if r <= 0 || r >= h - 1 {
                continue;
            }
            for j in -radius..=radius {
                let c = px + j;
                if c <= 0 || c >= w - 1 {
                    continue;
                }
                // Offset rotated into the keypoint frame, in cell units
                let c_rot = j as f32 * cos_t + i as f32 * sin_t;
                let r_rot = -(j as f32) * sin_t + i as f32 * cos_t;
                let rbin = r_rot + d as f32 / 2.0 - 0.5;
                let cbin = c_rot + d as f32 / 2.0 - 0.5;
                if rbin <= -1.0 || rbin >= d as f32 || cbin <= -1.0 || cbin >= d as f32 {
                    continue;
                }

                let (cu, ru) = (c as usize, r as usize);
                let dx = img.at(cu + 1, ru) - img.at(cu - 1, ru);
                let dy = img.at(cu, ru + 1) - img.at(cu, ru - 1);
                let magnitude = (dx * dx + dy * dy).sqrt();
                if magnitude == 0.0 {
                    continue;
                }
                let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
                let ori = (dy.atan2(dx) - angle).rem_euclid(TAU);
                let obin = ori * bins_per_rad;

                let (r0, c0, o0) = (rbin.floor(), cbin.floor(), obin.floor());
                let (fr, fc, fo) = (rbin - r0, cbin - c0, obin - o0);
                let (r0, c0) = ((r0 as i64 + 1) as usize, (c0 as i64 + 1) as usize);
                let o0 = o0 as usize % n;
                let o1 = (o0 + 1) % n;

                let v = magnitude * weight;
                let v_r1 = v * fr;
                let v_r0 = v - v_r1;
                for (row, v_r) in [(r0, v_r0), (r0 + 1, v_r1)] {
                    let v_c1 = v_r * fc;
                    let v_c0 = v_r - v_c1;
                    for (col, v_c) in [(c0, v_c0), (c0 + 1, v_c1)] {
                        let v_o1 = v_c * fo;
                        let base = row * stride_r + col * stride_c;
                        hist[base + o0] += v_c - v_o1;
                        hist[base + o1] += v_o1;
                    }
                }
            }
        }

        let mut desc = [0.0f32; DESCRIPTOR_SIZE];
        for row in 0..d {
            for col in 0..d {
                let src = (row + 1) * stride_r + (col + 1) * stride_c;
                let dst = (row * d + col) * n;
                desc[dst..dst + n].copy_from_slice(&hist[src..src + n]);
            }
        }
        normalize_clipped(&mut desc);
        desc
    }
}

/// L2-normalise, clip large components and renormalise
fn normalize_clipped(desc: &mut Descriptor) {
    let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return;
    }
    let clip = MAG_THRESHOLD * norm;
    for v in desc.iter_mut() {
        *v = v.min(clip);
    }
    let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt().max(f32::EPSILON);
    for v in desc.iter_mut() {
        *v /= norm;
    }
}
