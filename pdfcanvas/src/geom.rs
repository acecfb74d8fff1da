//! Affine matrix algebra, rectangle and bounding-box helpers.
//!
//! A [`Matrix`] `[a b c d e f]` maps `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`,
//! the same layout as `euclid::Transform2D` (`m11 m12 m21 m22 m31 m32`).

use crate::graphics::Point;
use euclid::default::Transform2D;

pub type Matrix = Transform2D<f32>;

/// Returned when a matrix with zero determinant has to be inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("matrix is not invertible")]
pub struct SingularMatrix;

/// Compose two matrices, the result applies `m1` first, then `m2`.
pub fn transform(m1: &Matrix, m2: &Matrix) -> Matrix {
    m1.then(m2)
}

pub fn apply_transform(p: Point, m: &Matrix) -> Point {
    Point::new(
        m.m11.mul_add(p.x, m.m21.mul_add(p.y, m.m31)),
        m.m12.mul_add(p.x, m.m22.mul_add(p.y, m.m32)),
    )
}

fn determinant(m: &Matrix) -> f64 {
    f64::from(m.m11) * f64::from(m.m22) - f64::from(m.m12) * f64::from(m.m21)
}

/// Map `p` through the inverse of `m`.
pub fn apply_inverse_transform(p: Point, m: &Matrix) -> Result<Point, SingularMatrix> {
    let d = determinant(m);
    if d == 0.0 {
        return Err(SingularMatrix);
    }
    let (a, b, c, dd, e, f) = (
        f64::from(m.m11),
        f64::from(m.m12),
        f64::from(m.m21),
        f64::from(m.m22),
        f64::from(m.m31),
        f64::from(m.m32),
    );
    let (x, y) = (f64::from(p.x), f64::from(p.y));
    let xt = (x * dd - y * c + c * f - e * dd) / d;
    let yt = (-x * b + y * a + e * b - f * a) / d;
    Ok(Point::new(xt as f32, yt as f32))
}

pub fn inverse_transform(m: &Matrix) -> Result<Matrix, SingularMatrix> {
    if determinant(m) == 0.0 {
        return Err(SingularMatrix);
    }
    m.inverse().ok_or(SingularMatrix)
}

/// The two singular values of the linear part of `m`, used to measure how much
/// `m` stretches line widths along its principal axes. A zero value
/// falls back to `1`.
pub fn singular_value_decompose_2d_scale(m: &Matrix) -> [f32; 2] {
    let (m0, m1, m2, m3) = (
        f64::from(m.m11),
        f64::from(m.m12),
        f64::from(m.m21),
        f64::from(m.m22),
    );
    // eigenvalues of M·Mᵗ
    let a = m0 * m0 + m1 * m1;
    let b = m0 * m2 + m1 * m3;
    let c = m2 * m2 + m3 * m3;

    let first = (a + c) / 2.0;
    let second = (first * first - (a * c - b * b)).max(0.0).sqrt();
    let or_one = |v: f64| if v > 0.0 && v.is_finite() { v } else { 1.0 };
    [
        or_one(first + second).sqrt() as f32,
        or_one(first - second).sqrt() as f32,
    ]
}

/// True if `m` only scales or flips, or is a 90° rotation with scale.
pub fn is_scale_or_quarter_turn(m: &Matrix) -> bool {
    (m.m12 == 0.0 && m.m21 == 0.0) || (m.m11 == 0.0 && m.m22 == 0.0)
}

/// Axis-aligned rectangle, always kept normalized: `left_x <= right_x`,
/// `lower_y <= upper_y`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
    pub left_x: f32,
    pub lower_y: f32,
    pub right_x: f32,
    pub upper_y: f32,
}

impl Rectangle {
    pub const EMPTY: Self = Self {
        left_x: 0.0,
        lower_y: 0.0,
        right_x: 0.0,
        upper_y: 0.0,
    };

    /// From left, bottom, right, top, re-order them to make sure that
    /// left <= right, bottom <= top
    pub fn from_lbrt(left_x: f32, bottom_y: f32, right_x: f32, top_y: f32) -> Self {
        Self {
            left_x: left_x.min(right_x),
            lower_y: bottom_y.min(top_y),
            right_x: left_x.max(right_x),
            upper_y: bottom_y.max(top_y),
        }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::from_lbrt(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f32 {
        self.right_x - self.left_x
    }

    pub fn height(&self) -> f32 {
        self.upper_y - self.lower_y
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Intersection of two rectangles, `None` if they do not overlap.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let left_x = self.left_x.max(other.left_x);
        let right_x = self.right_x.min(other.right_x);
        if left_x > right_x {
            return None;
        }
        let lower_y = self.lower_y.max(other.lower_y);
        let upper_y = self.upper_y.min(other.upper_y);
        if lower_y > upper_y {
            return None;
        }
        Some(Self {
            left_x,
            lower_y,
            right_x,
            upper_y,
        })
    }

    /// Bounding box of the four corners mapped through `m`.
    pub fn transform(&self, m: &Matrix) -> Self {
        let mut bbox = MinMax::default();
        for (x, y) in [
            (self.left_x, self.lower_y),
            (self.right_x, self.lower_y),
            (self.left_x, self.upper_y),
            (self.right_x, self.upper_y),
        ] {
            let p = apply_transform(Point::new(x, y), m);
            bbox.update(p.x, p.y);
        }
        bbox.to_rect().unwrap_or(Self::EMPTY)
    }
}

/// Running bounding box `[min_x, min_y, max_x, max_y]`, empty until the first
/// point is added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax(pub [f32; 4]);

impl Default for MinMax {
    fn default() -> Self {
        Self([f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY])
    }
}

impl MinMax {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] > self.0[2] || self.0[1] > self.0[3]
    }

    pub fn update(&mut self, x: f32, y: f32) {
        let [min_x, min_y, max_x, max_y] = &mut self.0;
        *min_x = min_x.min(x);
        *min_y = min_y.min(y);
        *max_x = max_x.max(x);
        *max_y = max_y.max(y);
    }

    pub fn to_rect(&self) -> Option<Rectangle> {
        let [min_x, min_y, max_x, max_y] = self.0;
        (!self.is_empty()).then(|| Rectangle::from_lbrt(min_x, min_y, max_x, max_y))
    }
}

/// Map a bbox through a transform that only scales/flips or turns by 90°,
/// see [`is_scale_or_quarter_turn`].
pub fn scale_min_max(m: &Matrix, min_max: &mut MinMax) {
    let mm = &mut min_max.0;
    if m.m11 != 0.0 {
        if m.m11 < 0.0 {
            mm.swap(0, 2);
        }
        mm[0] *= m.m11;
        mm[2] *= m.m11;

        if m.m22 < 0.0 {
            mm.swap(1, 3);
        }
        mm[1] *= m.m22;
        mm[3] *= m.m22;
    } else {
        mm.swap(0, 1);
        mm.swap(2, 3);

        if m.m12 < 0.0 {
            mm.swap(1, 3);
        }
        mm[1] *= m.m12;
        mm[3] *= m.m12;

        if m.m21 < 0.0 {
            mm.swap(0, 2);
        }
        mm[0] *= m.m21;
        mm[2] *= m.m21;
    }
    mm[0] += m.m31;
    mm[1] += m.m32;
    mm[2] += m.m31;
    mm[3] += m.m32;
}

const EPSILON: f64 = 1e-12;

fn extremum_on_curve(xs: [f64; 4], ys: [f64; 4], t: f64, min_max: &mut MinMax) {
    if t <= 0.0 || t >= 1.0 {
        return;
    }
    let mt = 1.0 - t;
    let tt = t * t;
    let ttt = tt * t;
    let at = |v: [f64; 4]| {
        mt * (mt * (mt * v[0] + 3.0 * t * v[1]) + 3.0 * tt * v[2]) + ttt * v[3]
    };
    min_max.update(at(xs) as f32, at(ys) as f32);
}

/// Solve `a·t² + b·t + c = 0` for the extrema of one curve coordinate.
fn extremum(xs: [f64; 4], ys: [f64; 4], a: f64, b: f64, c: f64, min_max: &mut MinMax) {
    if a.abs() < EPSILON {
        if b.abs() >= EPSILON {
            extremum_on_curve(xs, ys, -c / b, min_max);
        }
        return;
    }

    let delta = b * b - 4.0 * a * c;
    if delta < 0.0 {
        return;
    }
    let sqrt_delta = delta.sqrt();
    let a2 = 2.0 * a;
    extremum_on_curve(xs, ys, (-b + sqrt_delta) / a2, min_max);
    extremum_on_curve(xs, ys, (-b - sqrt_delta) / a2, min_max);
}

/// Extend `min_max` by the exact bounding box of the cubic Bézier
/// `p0 p1 p2 p3`, including the curve's extrema between its endpoints.
pub fn bezier_bounding_box(p0: Point, p1: Point, p2: Point, p3: Point, min_max: &mut MinMax) {
    min_max.update(p0.x, p0.y);
    min_max.update(p3.x, p3.y);

    let xs = [p0.x, p1.x, p2.x, p3.x].map(f64::from);
    let ys = [p0.y, p1.y, p2.y, p3.y].map(f64::from);
    extremum(
        xs,
        ys,
        3.0 * (-xs[0] + 3.0 * (xs[1] - xs[2]) + xs[3]),
        6.0 * (xs[0] - 2.0 * xs[1] + xs[2]),
        3.0 * (xs[1] - xs[0]),
        min_max,
    );
    extremum(
        xs,
        ys,
        3.0 * (-ys[0] + 3.0 * (ys[1] - ys[2]) + ys[3]),
        6.0 * (ys[0] - 2.0 * ys[1] + ys[2]),
        3.0 * (ys[1] - ys[0]),
        min_max,
    );
}

#[cfg(test)]
mod tests;
