use align_core::Point2;
use nalgebra::{Matrix3, SMatrix, SVector, SymmetricEigen, Vector3};

use crate::error::{GeometryError, GeometryResult};

/// Homogeneous coordinates with |w| below this do not project
const EPS_W: f64 = 1e-12;
/// Triangles with an area below this (in squared pixels) count as collinear
const EPS_AREA: f64 = 1e-6;

/// 3x3 projective transform mapping source points to destination points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Row-major entries
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Same transform scaled so that `h22 = 1`, when possible
    pub fn normalized(&self) -> Self {
        let h22 = self.matrix[(2, 2)];
        if h22.abs() > EPS_W && h22.is_finite() {
            Self::from_matrix(self.matrix / h22)
        } else {
            *self
        }
    }

    /// Map a point; `None` when it lands on the line at infinity
    pub fn project(&self, p: &Point2) -> Option<Point2> {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if !w.is_finite() || w.abs() <= EPS_W {
            return None;
        }
        let q = Point2::new(v[0] / w, v[1] / w);
        (q.x.is_finite() && q.y.is_finite()).then_some(q)
    }

    /// Reprojection distance `|H * src - dst|`, infinite when `src` does not project
    pub fn transfer_error(&self, src: &Point2, dst: &Point2) -> f64 {
        match self.project(src) {
            Some(p) => p.distance(dst),
            None => f64::INFINITY,
        }
    }

    pub fn inverse(&self) -> GeometryResult<Homography> {
        match self.matrix.try_inverse() {
            Some(inv) if inv.iter().all(|v| v.is_finite()) => Ok(Self::from_matrix(inv).normalized()),
            _ => Err(GeometryError::NonInvertible),
        }
    }

    /// Exact homography through four correspondences.
    ///
    /// Solves the 8x8 system for `h00..h21` with `h22 = 1`. Returns `None`
    /// when three points of either quadruple are collinear or the system is
    /// singular.
    pub fn from_four_points(src: &[Point2; 4], dst: &[Point2; 4]) -> Option<Homography> {
        if has_collinear_triple(src) || has_collinear_triple(dst) {
            return None;
        }

        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for (i, (p, q)) in src.iter().zip(dst.iter()).enumerate() {
            let (x, y, u, v) = (p.x, p.y, q.x, q.y);
            let r = 2 * i;
            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -x * u;
            a[(r, 7)] = -y * u;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -x * v;
            a[(r + 1, 7)] = -y * v;
            b[r + 1] = v;
        }

        let h = a.lu().solve(&b)?;
        if !h.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self::from_matrix(Matrix3::new(
            h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
        )))
    }

    /// Least-squares homography over any number (>= 4) of correspondences.
    ///
    /// Both point sets are Hartley-normalised (centroid at the origin, mean
    /// distance sqrt 2); the solution is the eigenvector of `A^T A` with the
    /// smallest eigenvalue.
    pub fn fit_dlt(src: &[Point2], dst: &[Point2]) -> Option<Homography> {
        if src.len() < 4 || src.len() != dst.len() {
            return None;
        }
        let t_src = normalizing_transform(src)?;
        let t_dst = normalizing_transform(dst)?;

        let mut ata = SMatrix::<f64, 9, 9>::zeros();
        for (p, q) in src.iter().zip(dst) {
            let (x, y) = apply_affine(&t_src, p);
            let (u, v) = apply_affine(&t_dst, q);
            let r1 = SVector::<f64, 9>::from_row_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
            let r2 = SVector::<f64, 9>::from_row_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
            ata += r1 * r1.transpose() + r2 * r2.transpose();
        }

        let eigen = SymmetricEigen::new(ata);
        let (min_idx, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))?;
        let h = eigen.eigenvectors.column(min_idx);
        let hn = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let t_dst_inv = t_dst.try_inverse()?;
        let m = t_dst_inv * hn * t_src;
        if !m.iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self::from_matrix(m).normalized())
    }
}

fn triangle_area(a: &Point2, b: &Point2, c: &Point2) -> f64 {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)).abs()
}

fn has_collinear_triple(p: &[Point2; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES
        .iter()
        .any(|&(i, j, k)| triangle_area(&p[i], &p[j], &p[k]) < EPS_AREA)
}

/// Similarity moving the centroid to the origin with mean distance sqrt 2
fn normalizing_transform(points: &[Point2]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| (p.x - cx).hypot(p.y - cy))
        .sum::<f64>()
        / n;
    if !(mean_dist > EPS_W) {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn apply_affine(t: &Matrix3<f64>, p: &Point2) -> (f64, f64) {
    (
        t[(0, 0)] * p.x + t[(0, 1)] * p.y + t[(0, 2)],
        t[(1, 0)] * p.x + t[(1, 1)] * p.y + t[(1, 2)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_homography() -> Homography {
        Homography::from_matrix(Matrix3::new(
            0.9, 0.1, 12.0, -0.05, 1.1, -7.0, 1e-4, -2e-4, 1.0,
        ))
    }

    fn grid(n: usize) -> Vec<Point2> {
        (0..n * n)
            .map(|i| Point2::new(20.0 + 30.0 * (i % n) as f64, 15.0 + 25.0 * (i / n) as f64))
            .collect()
    }

    fn assert_matrix_close(a: &Homography, b: &Homography, eps: f64) {
        for (x, y) in a.normalized().matrix().iter().zip(b.normalized().matrix().iter()) {
            assert_relative_eq!(x, y, epsilon = eps);
        }
    }

    #[test]
    fn test_identity_projection() {
        let p = Point2::new(3.5, -2.0);
        assert_eq!(Homography::identity().project(&p), Some(p));
    }

    #[test]
    fn test_four_point_solver_recovers_transform() {
        let h = sample_homography();
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 5.0),
            Point2::new(90.0, 80.0),
            Point2::new(-10.0, 70.0),
        ];
        let dst = src.map(|p| h.project(&p).unwrap());
        let solved = Homography::from_four_points(&src, &dst).unwrap();
        assert_matrix_close(&solved, &h, 1e-8);
    }

    #[test]
    fn test_collinear_sample_rejected() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 5.0),
        ];
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(Homography::from_four_points(&src, &dst).is_none());
        assert!(Homography::from_four_points(&dst, &src).is_none());
    }

    #[test]
    fn test_dlt_recovers_transform() {
        let h = sample_homography();
        let src = grid(5);
        let dst: Vec<Point2> = src.iter().map(|p| h.project(p).unwrap()).collect();
        let fitted = Homography::fit_dlt(&src, &dst).unwrap();
        assert_matrix_close(&fitted, &h, 1e-6);
    }

    #[test]
    fn test_dlt_needs_spread_points() {
        let same = vec![Point2::new(4.0, 4.0); 6];
        assert!(Homography::fit_dlt(&same, &same).is_none());
        assert!(Homography::fit_dlt(&grid(1), &grid(1)).is_none());
    }

    #[test]
    fn test_inverse_round_trip() {
        let h = sample_homography();
        let inv = h.inverse().unwrap();
        let p = Point2::new(40.0, 60.0);
        let back = inv.project(&h.project(&p).unwrap()).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_not_invertible() {
        let h = Homography::from_matrix(Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0));
        assert_eq!(h.inverse(), Err(GeometryError::NonInvertible));
    }

    #[test]
    fn test_point_at_infinity() {
        let h = Homography::from_matrix(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0));
        assert!(h.project(&Point2::new(0.0, 3.0)).is_none());
        assert_eq!(h.transfer_error(&Point2::new(0.0, 3.0), &Point2::default()), f64::INFINITY);
    }
}
