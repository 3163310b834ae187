use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

const EPS: f64 = 1e-12;

/// One correspondence: `src` in the frame being warped, `dst` in the frame
/// it is warped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPair {
    pub src: (f64, f64),
    pub dst: (f64, f64),
}

impl PointPair {
    pub fn new(src: (f64, f64), dst: (f64, f64)) -> Self {
        Self { src, dst }
    }
}

/// 3x3 projective transform mapping source pixels to destination pixels,
/// scaled so that `h[(2, 2)] == 1` whenever that entry is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    h: Matrix3<f64>,
}

impl Homography {
    pub fn from_matrix(h: Matrix3<f64>) -> Self {
        let w = h[(2, 2)];
        if w.abs() > EPS {
            Self { h: h / w }
        } else {
            Self { h }
        }
    }

    pub fn identity() -> Self {
        Self { h: Matrix3::identity() }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            h: Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0),
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    /// Row-major entries, the layout `imageproc` projections take.
    pub fn to_row_major_f32(&self) -> [f32; 9] {
        let mut out = [0f32; 9];
        for r in 0..3 {
            for c in 0..3 {
                out[r * 3 + c] = self.h[(r, c)] as f32;
            }
        }
        out
    }

    pub fn determinant(&self) -> f64 {
        self.h.determinant()
    }

    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }

    /// Map a point; `None` when it lands on the line at infinity.
    pub fn project(&self, (x, y): (f64, f64)) -> Option<(f64, f64)> {
        let v = self.h * Vector3::new(x, y, 1.0);
        let w = v[2];
        if !w.is_finite() || w.abs() <= EPS {
            return None;
        }
        let (px, py) = (v[0] / w, v[1] / w);
        if px.is_finite() && py.is_finite() {
            Some((px, py))
        } else {
            None
        }
    }

    pub fn inverse(&self) -> Option<Homography> {
        self.h.try_inverse().map(Homography::from_matrix)
    }

    /// Distance between the projected source point and the destination
    /// point; infinite when the source does not project.
    pub fn transfer_error(&self, pair: &PointPair) -> f64 {
        match self.project(pair.src) {
            Some((x, y)) => ((x - pair.dst.0).powi(2) + (y - pair.dst.1).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }

    /// Exact homography through four correspondences.
    pub fn from_four_points(pairs: &[PointPair; 4]) -> Option<Homography> {
        solve_dlt(pairs)
    }

    /// Least-squares homography over four or more correspondences.
    pub fn from_correspondences(pairs: &[PointPair]) -> Option<Homography> {
        if pairs.len() < 4 {
            return None;
        }
        solve_dlt(pairs)
    }
}

/// Similarity transform moving the points' centroid to the origin with a
/// mean distance of sqrt(2).
fn normalizing_transform(points: impl Iterator<Item = (f64, f64)> + Clone) -> Option<Matrix3<f64>> {
    let n = points.clone().count() as f64;
    let (sx, sy) = points.clone().fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points.map(|(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt()).sum::<f64>() / n;
    if mean_dist <= EPS {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn apply(t: &Matrix3<f64>, (x, y): (f64, f64)) -> (f64, f64) {
    (t[(0, 0)] * x + t[(0, 2)], t[(1, 1)] * y + t[(1, 2)])
}

/// Normalized DLT with `h22` fixed to 1, solved in the least-squares sense.
fn solve_dlt(pairs: &[PointPair]) -> Option<Homography> {
    let t_src = normalizing_transform(pairs.iter().map(|p| p.src))?;
    let t_dst = normalizing_transform(pairs.iter().map(|p| p.dst))?;

    let n = pairs.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 8);
    let mut b = DVector::<f64>::zeros(2 * n);
    for (i, pair) in pairs.iter().enumerate() {
        let (x, y) = apply(&t_src, pair.src);
        let (u, v) = apply(&t_dst, pair.dst);

        a[(2 * i, 0)] = x;
        a[(2 * i, 1)] = y;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i, 6)] = -x * u;
        a[(2 * i, 7)] = -y * u;
        b[2 * i] = u;

        a[(2 * i + 1, 3)] = x;
        a[(2 * i + 1, 4)] = y;
        a[(2 * i + 1, 5)] = 1.0;
        a[(2 * i + 1, 6)] = -x * v;
        a[(2 * i + 1, 7)] = -y * v;
        b[2 * i + 1] = v;
    }

    let h = a.svd(true, true).solve(&b, EPS).ok()?;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
    let t_dst_inv = t_dst.try_inverse()?;
    let homography = Homography::from_matrix(t_dst_inv * normalized * t_src);
    if homography.is_finite() {
        Some(homography)
    } else {
        None
    }
}
