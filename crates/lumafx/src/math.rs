//! 3x3 matrix helpers and spline interpolation used by the warp and curve
//! effects. Matrices are flat row lists of nine values.

pub type Mat3 = [f32; 9];

pub const IDENTITY: Mat3 = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Inverse of `m`, or `None` when it is singular.
pub fn inverse(m: &Mat3) -> Option<Mat3> {
    let [a, b, c, d, e, f, g, h, i] = *m;
    let det = a * e * i - a * f * h - b * d * i + b * f * g + c * d * h - c * e * g;
    if det == 0.0 || !det.is_finite() {
        return None;
    }
    Some([
        (e * i - f * h) / det,
        (c * h - b * i) / det,
        (b * f - c * e) / det,
        (f * g - d * i) / det,
        (a * i - c * g) / det,
        (c * d - a * f) / det,
        (d * h - e * g) / det,
        (b * g - a * h) / det,
        (a * e - b * d) / det,
    ])
}

/// Row-major product `a * b`.
pub fn multiply(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [0.0; 9];
    for row in 0..3 {
        for col in 0..3 {
            out[row * 3 + col] = (0..3).map(|k| a[row * 3 + k] * b[k * 3 + col]).sum();
        }
    }
    out
}

/// Projective transform taking the unit square onto the quad
/// `[x0, y0, x1, y1, x2, y2, x3, y3]`, as a row list.
///
/// The result is written so that a column-major upload (see
/// [`crate::UniformValue::Mat3`]) yields the transform applied to
/// `(x, y, 1)` column vectors.
pub fn square_to_quad(quad: &[f32; 8]) -> Mat3 {
    let [x0, y0, x1, y1, x2, y2, x3, y3] = *quad;
    let dx1 = x1 - x2;
    let dy1 = y1 - y2;
    let dx2 = x3 - x2;
    let dy2 = y3 - y2;
    let dx3 = x0 - x1 + x2 - x3;
    let dy3 = y0 - y1 + y2 - y3;
    let det = dx1 * dy2 - dx2 * dy1;
    let a = (dx3 * dy2 - dx2 * dy3) / det;
    let b = (dx1 * dy3 - dx3 * dy1) / det;
    [
        x1 - x0 + a * x1,
        y1 - y0 + a * y1,
        a,
        x3 - x0 + b * x3,
        y3 - y0 + b * y3,
        b,
        x0,
        y0,
        1.0,
    ]
}

/// Natural cubic spline through a set of control points.
#[derive(Clone, Debug)]
pub struct SplineInterpolator {
    xa: Vec<f32>,
    ya: Vec<f32>,
    y2: Vec<f32>,
}

impl SplineInterpolator {
    /// Points are sorted by x. Callers must supply at least two points with
    /// distinct x values.
    pub fn new(points: &[[f32; 2]]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a[0].total_cmp(&b[0]));
        let xa: Vec<f32> = sorted.iter().map(|point| point[0]).collect();
        let ya: Vec<f32> = sorted.iter().map(|point| point[1]).collect();
        let n = xa.len();

        let mut u = vec![0.0f32; n];
        let mut y2 = vec![0.0f32; n];
        for i in 1..n.saturating_sub(1) {
            let sig = (xa[i] - xa[i - 1]) / (xa[i + 1] - xa[i - 1]);
            let p = sig * y2[i - 1] + 2.0;
            y2[i] = (sig - 1.0) / p;
            let slope = (ya[i + 1] - ya[i]) / (xa[i + 1] - xa[i])
                - (ya[i] - ya[i - 1]) / (xa[i] - xa[i - 1]);
            u[i] = (6.0 * slope / (xa[i + 1] - xa[i - 1]) - sig * u[i - 1]) / p;
        }
        if n > 0 {
            y2[n - 1] = 0.0;
        }
        for i in (0..n.saturating_sub(1)).rev() {
            y2[i] = y2[i] * y2[i + 1] + u[i];
        }

        Self { xa, ya, y2 }
    }

    pub fn interpolate(&self, x: f32) -> f32 {
        let n = self.ya.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 {
            return self.ya[0];
        }
        let mut klo = 0;
        let mut khi = n - 1;
        while khi - klo > 1 {
            let k = (khi + klo) / 2;
            if self.xa[k] > x {
                khi = k;
            } else {
                klo = k;
            }
        }
        let h = self.xa[khi] - self.xa[klo];
        let a = (self.xa[khi] - x) / h;
        let b = (x - self.xa[klo]) / h;
        a * self.ya[klo]
            + b * self.ya[khi]
            + ((a * a * a - a) * self.y2[klo] + (b * b * b - b) * self.y2[khi]) * (h * h) / 6.0
    }
}

/// 256-entry lookup table sampling the spline through `points` at `i / 255`.
pub fn spline_lookup(points: &[[f32; 2]]) -> [u8; 256] {
    let spline = SplineInterpolator::new(points);
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let value = (spline.interpolate(i as f32 / 255.0) * 256.0).floor();
        *entry = value.clamp(0.0, 255.0) as u8;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &Mat3, b: &Mat3) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }

    /// Applies a row list the way the shader sees it after upload.
    fn project(m: &Mat3, x: f32, y: f32) -> (f32, f32) {
        let w = m[2] * x + m[5] * y + m[8];
        ((m[0] * x + m[3] * y + m[6]) / w, (m[1] * x + m[4] * y + m[7]) / w)
    }

    #[test]
    fn inverse_round_trips() {
        let m = [2.0, 0.5, 0.0, -1.0, 3.0, 1.0, 0.25, 0.0, 1.0];
        let inv = inverse(&m).unwrap();
        assert_close(&multiply(&m, &inv), &IDENTITY);
        assert!(inverse(&[1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]).is_none());
    }

    #[test]
    fn square_to_quad_maps_unit_corners() {
        let quad = [10.0, 20.0, 110.0, 25.0, 100.0, 130.0, 5.0, 120.0];
        let m = square_to_quad(&quad);
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for (index, (u, v)) in corners.into_iter().enumerate() {
            let (x, y) = project(&m, u, v);
            assert!((x - quad[index * 2]).abs() < 1e-3, "corner {index}: {x}");
            assert!((y - quad[index * 2 + 1]).abs() < 1e-3, "corner {index}: {y}");
        }
    }

    #[test]
    fn spline_passes_through_control_points() {
        let spline = SplineInterpolator::new(&[[1.0, 1.0], [0.0, 0.0], [0.5, 0.7]]);
        assert!((spline.interpolate(0.0)).abs() < 1e-6);
        assert!((spline.interpolate(0.5) - 0.7).abs() < 1e-6);
        assert!((spline.interpolate(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn identity_curve_lookup_is_near_linear() {
        let table = spline_lookup(&[[0.0, 0.0], [1.0, 1.0]]);
        assert_eq!(table[0], 0);
        assert_eq!(table[255], 255);
        for (i, value) in table.iter().enumerate() {
            assert!((*value as i32 - i as i32).abs() <= 1, "entry {i} = {value}");
        }
    }
}
