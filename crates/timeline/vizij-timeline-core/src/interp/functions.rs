//! Interpolation helpers:
//! - lerp_value (number + component-wise Vector3)
//! - handle_ease (cubic-bezier timing built from keyframe handles)

use crate::data::Handles;
use crate::value::{Value, Vec2};

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Blend two values. Mismatched kinds hold `a`.
#[inline]
pub fn lerp_value(a: &Value, b: &Value, t: f64) -> Value {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Value::Number(lerp_f64(*x, *y, t)),
        (Value::Vector3(x), Value::Vector3(y)) => Value::Vector3(x.lerp(*y, t)),
        _ => *a,
    }
}

#[inline]
fn cubic_bezier(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Cubic-bezier timing function (0,0)-(x1,y1)-(x2,y2)-(1,1).
/// Inverts the x curve by binary search, then evaluates y.
#[inline]
pub fn bezier_ease_t(t: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    // Control points on the diagonal make y(s) == x(s): exactly linear.
    if x1 == y1 && x2 == y2 {
        return t;
    }
    let x1 = x1.clamp(0.0, 1.0);
    let x2 = x2.clamp(0.0, 1.0);
    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    let mut mid = t;
    for _ in 0..48 {
        let x = cubic_bezier(0.0, x1, x2, 1.0, mid);
        if (x - t).abs() < 1e-9 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    cubic_bezier(0.0, y1, y2, 1.0, mid)
}

/// Ease `progress` across a segment using the left keyframe's `out` handle and the right
/// keyframe's `in` handle.
#[inline]
pub fn handle_ease(progress: f64, left: &Handles, right: &Handles) -> f64 {
    let Vec2 { x: x1, y: y1 } = left.r#out;
    let Vec2 { x: x2, y: y2 } = right.r#in;
    bezier_ease_t(progress, x1, y1, x2, y2)
}
