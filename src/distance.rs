//! Orientation-invariant distance between equal-length fibers.
//!
//! Tracking does not fix which end of a fiber is its start, so the distance
//! is the mean point-wise Euclidean distance taken in both orientations,
//! keeping the smaller:
//!
//! ```text
//! d_direct(A, B)  = 1/K Σ |a_i − b_i|
//! d_flipped(A, B) = 1/K Σ |a_i − b_{K−1−i}|
//! d(A, B)         = min(d_direct, d_flipped)
//! ```
//!
//! `d` is symmetric and zero only for coincident fibers (in one of the two
//! orientations), but the triangle inequality does not hold in general.
//!
//! Sums are accumulated over mirrored index pairs `(i, K−1−i)`. Swapping
//! arguments or reversing both fibers only permutes terms inside each pair,
//! and IEEE addition is commutative, so symmetry and reversal invariance
//! hold bit for bit.

use crate::types::{Point3, Polyline};

/// Sum `term(i)` for `i` in `0..k`, pairing `i` with `k − 1 − i`.
#[inline]
fn mirrored_sum(k: usize, term: impl Fn(usize) -> f64) -> f64 {
    let mut sum = 0.0;
    for i in 0..k / 2 {
        sum += term(i) + term(k - 1 - i);
    }
    if k % 2 == 1 {
        sum += term(k / 2);
    }
    sum
}

/// Mean point-wise distance with both fibers in stored order.
///
/// Both slices must have the same non-zero length.
pub fn direct_distance(a: &[Point3], b: &[Point3]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let k = a.len().min(b.len());
    if k == 0 {
        return 0.0;
    }
    mirrored_sum(k, |i| a[i].distance(&b[i])) / k as f64
}

/// Mean point-wise distance with `b` traversed in reverse.
///
/// Both slices must have the same non-zero length.
pub fn flipped_distance(a: &[Point3], b: &[Point3]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let k = a.len().min(b.len());
    if k == 0 {
        return 0.0;
    }
    mirrored_sum(k, |i| a[i].distance(&b[k - 1 - i])) / k as f64
}

/// Orientation-invariant fiber distance: `min(direct, flipped)`.
///
/// Callers guarantee equal lengths; the classifier checks this before any
/// distance is computed.
pub fn fiber_distance(a: &Polyline, b: &Polyline) -> f64 {
    let direct = direct_distance(a.points(), b.points());
    let flipped = flipped_distance(a.points(), b.points());
    direct.min(flipped)
}

/// Distance from a fiber to a representative set: the minimum over the set.
///
/// A single-centroid set and a full reference set are handled alike.
/// Returns `None` for an empty set.
pub fn distance_to_set(fiber: &Polyline, representatives: &[Polyline]) -> Option<f64> {
    representatives
        .iter()
        .map(|r| fiber_distance(fiber, r))
        .fold(None, |best, d| match best {
            Some(b) if b <= d => Some(b),
            _ => Some(d),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(offset_x: f32) -> Polyline {
        Polyline::straight(
            Point3::new(offset_x, 0.0, 0.0),
            Point3::new(offset_x, 0.0, 20.0),
            21,
        )
    }

    #[test]
    fn test_identical_is_zero() {
        assert_eq!(fiber_distance(&line(0.0), &line(0.0)), 0.0);
    }

    #[test]
    fn test_reversed_is_zero() {
        let a = line(0.0);
        assert_eq!(fiber_distance(&a, &a.reversed()), 0.0);
        assert!(direct_distance(a.points(), a.reversed().points()) > 0.0);
    }

    #[test]
    fn test_uniform_offset() {
        assert_eq!(fiber_distance(&line(0.0), &line(2.0)), 2.0);
        assert_eq!(fiber_distance(&line(0.0), &line(10.0)), 10.0);
    }

    #[test]
    fn test_symmetry_exact() {
        let a = Polyline::new(vec![
            Point3::new(0.1, 0.7, -3.0),
            Point3::new(1.3, 2.2, 0.4),
            Point3::new(2.9, 3.1, 1.7),
            Point3::new(3.3, 5.8, 2.2),
        ])
        .unwrap();
        let b = Polyline::new(vec![
            Point3::new(-1.0, 0.2, 0.0),
            Point3::new(0.5, 1.0, 0.9),
            Point3::new(2.0, 4.4, 1.1),
            Point3::new(4.1, 4.9, 3.6),
        ])
        .unwrap();

        assert_eq!(fiber_distance(&a, &b), fiber_distance(&b, &a));
        assert_eq!(
            fiber_distance(&a, &b.reversed()),
            fiber_distance(&a.reversed(), &b)
        );
    }

    #[test]
    fn test_distance_to_set() {
        let fiber = line(0.0);
        let set = vec![line(5.0), line(1.0), line(3.0)];
        assert_eq!(distance_to_set(&fiber, &set), Some(1.0));
        assert_eq!(distance_to_set(&fiber, &[]), None);
    }
}
