//! Arc-length resampling of fibers to a fixed point count.

use crate::types::{Bundle, Point3, Polyline};

/// Error type for resampling.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResampleError {
    /// A fiber cannot be resampled from fewer than two points.
    #[error("Fiber {fiber} has {points} point(s); at least 2 are required for resampling")]
    TooFewPoints {
        /// Index of the offending fiber.
        fiber: usize,
        /// Its point count.
        points: usize,
    },
    /// The requested point count is unusable.
    #[error("Invalid target point count {0}; must be at least 2")]
    InvalidTarget(usize),
}

/// Resamples every fiber of a bundle to a fixed point count.
pub trait Resampler: Send + Sync {
    /// Return a bundle with the same fibers, in the same order, each with
    /// exactly `target` points.
    fn resample(&self, bundle: &Bundle, target: usize) -> Result<Bundle, ResampleError>;
}

/// Places points at equal arc-length fractions along each fiber.
///
/// The first and last points are preserved; intermediate points are
/// linearly interpolated inside the segment they fall on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcLengthResampler;

impl ArcLengthResampler {
    /// Create a resampler.
    pub fn new() -> Self {
        Self
    }

    /// Resample a single fiber. `fiber` is only used in error values.
    pub fn resample_fiber(
        &self,
        fiber: usize,
        polyline: &Polyline,
        target: usize,
    ) -> Result<Polyline, ResampleError> {
        if target < 2 {
            return Err(ResampleError::InvalidTarget(target));
        }
        let points = polyline.points();
        if points.len() < 2 {
            return Err(ResampleError::TooFewPoints {
                fiber,
                points: points.len(),
            });
        }

        // cumulative[i] = arc length from points[0] to points[i]
        let mut cumulative = Vec::with_capacity(points.len());
        cumulative.push(0.0f64);
        for w in points.windows(2) {
            let last = cumulative[cumulative.len() - 1];
            cumulative.push(last + w[0].distance(&w[1]));
        }
        let total = cumulative[cumulative.len() - 1];

        if total <= 0.0 {
            return Ok(Polyline::new(vec![points[0]; target]).unwrap_or_else(|| polyline.clone()));
        }

        let step = total / (target - 1) as f64;
        let mut out: Vec<Point3> = Vec::with_capacity(target);
        out.push(points[0]);

        let mut segment = 0usize;
        for i in 1..target - 1 {
            let s = step * i as f64;
            while segment + 1 < points.len() - 1 && cumulative[segment + 1] < s {
                segment += 1;
            }
            let seg_len = cumulative[segment + 1] - cumulative[segment];
            let t = if seg_len > 0.0 {
                ((s - cumulative[segment]) / seg_len).clamp(0.0, 1.0)
            } else {
                0.0
            };
            out.push(points[segment].lerp(&points[segment + 1], t));
        }
        out.push(points[points.len() - 1]);

        Ok(Polyline::new(out).unwrap_or_else(|| polyline.clone()))
    }
}

impl Resampler for ArcLengthResampler {
    fn resample(&self, bundle: &Bundle, target: usize) -> Result<Bundle, ResampleError> {
        bundle
            .iter()
            .enumerate()
            .map(|(i, fiber)| self.resample_fiber(i, fiber, target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point3, b: Point3) {
        assert!(a.distance(&b) < 1e-4, "{a} != {b}");
    }

    #[test]
    fn test_resample_straight_line_is_uniform() {
        // Unevenly spaced points along z
        let zs = [0.0f32, 1.0, 1.5, 7.0, 20.0];
        let fiber = Polyline::new(zs.iter().map(|&z| Point3::new(0.0, 0.0, z)).collect()).unwrap();

        let out = ArcLengthResampler::new().resample_fiber(0, &fiber, 21).unwrap();
        assert_eq!(out.len(), 21);
        for (j, p) in out.points().iter().enumerate() {
            assert_close(*p, Point3::new(0.0, 0.0, j as f32));
        }
    }

    #[test]
    fn test_endpoints_preserved() {
        let fiber = Polyline::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 4.0, 0.0),
            Point3::new(3.0, 4.0, 12.0),
        ])
        .unwrap();

        let out = ArcLengthResampler::new().resample_fiber(0, &fiber, 7).unwrap();
        assert_eq!(out.first(), fiber.first());
        assert_eq!(out.last(), fiber.last());
        // Total length 17; arc length is preserved up to the corner cut
        assert!(out.arc_length() <= fiber.arc_length() + 1e-6);
    }

    #[test]
    fn test_degenerate_fiber() {
        let p = Point3::new(1.0, 2.0, 3.0);
        let fiber = Polyline::new(vec![p, p, p]).unwrap();
        let out = ArcLengthResampler::new().resample_fiber(0, &fiber, 5).unwrap();
        assert_eq!(out.points(), &[p; 5]);
    }

    #[test]
    fn test_errors() {
        let resampler = ArcLengthResampler::new();
        let single = Polyline::new(vec![Point3::origin()]).unwrap();
        let line = Polyline::straight(Point3::origin(), Point3::new(1.0, 0.0, 0.0), 4);

        let bundle: Bundle = vec![line.clone(), single].into();
        assert_eq!(
            resampler.resample(&bundle, 21),
            Err(ResampleError::TooFewPoints { fiber: 1, points: 1 })
        );
        assert_eq!(
            resampler.resample_fiber(0, &line, 1),
            Err(ResampleError::InvalidTarget(1))
        );
    }

    #[test]
    fn test_bundle_order_preserved() {
        let a = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 14.0), 15);
        let b = Polyline::straight(Point3::new(5.0, 0.0, 0.0), Point3::new(5.0, 0.0, 29.0), 30);
        let out = ArcLengthResampler::new()
            .resample(&vec![a, b].into(), 21)
            .unwrap();

        assert_eq!(out.point_counts(), vec![21, 21]);
        assert_close(out[1].first(), Point3::new(5.0, 0.0, 0.0));
    }
}
