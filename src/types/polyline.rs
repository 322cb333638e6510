//! Polyline type: one fiber or one centroid.

use serde::{Deserialize, Serialize};

use super::point::Point3;

/// An ordered, non-empty sequence of 3D points.
///
/// A polyline is either a tractography fiber or a centroid. After
/// canonicalization every polyline in a dataset has the same number of
/// points, equidistant along arc length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point3>", into = "Vec<Point3>")]
pub struct Polyline(Vec<Point3>);

/// A polyline was built from an empty point list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Polyline must have at least one point")]
pub struct EmptyPolylineError;

impl TryFrom<Vec<Point3>> for Polyline {
    type Error = EmptyPolylineError;

    fn try_from(points: Vec<Point3>) -> Result<Self, Self::Error> {
        Self::new(points).ok_or(EmptyPolylineError)
    }
}

impl From<Polyline> for Vec<Point3> {
    fn from(polyline: Polyline) -> Self {
        polyline.0
    }
}

impl Polyline {
    /// Create a polyline. Returns `None` for an empty point list.
    pub fn new(points: Vec<Point3>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self(points))
        }
    }

    /// Straight line from `start` to `end` with `count` evenly spaced points.
    ///
    /// `count` below 2 is treated as 2.
    pub fn straight(start: Point3, end: Point3, count: usize) -> Self {
        let count = count.max(2);
        let last = (count - 1) as f64;
        Self(
            (0..count)
                .map(|i| start.lerp(&end, i as f64 / last))
                .collect(),
        )
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the polyline has no points (never true once constructed).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The points as a slice.
    pub fn points(&self) -> &[Point3] {
        &self.0
    }

    /// Consume into the point vector.
    pub fn into_points(self) -> Vec<Point3> {
        self.0
    }

    /// First point.
    pub fn first(&self) -> Point3 {
        self.0[0]
    }

    /// Last point.
    pub fn last(&self) -> Point3 {
        self.0[self.0.len() - 1]
    }

    /// The same points in reverse order.
    pub fn reversed(&self) -> Polyline {
        let mut points = self.0.clone();
        points.reverse();
        Self(points)
    }

    /// Translate every point by a fixed offset.
    pub fn translated(&self, dx: f32, dy: f32, dz: f32) -> Polyline {
        Self(self.0.iter().map(|p| p.offset(dx, dy, dz)).collect())
    }

    /// Total length along the polyline.
    pub fn arc_length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Point-wise arithmetic mean of equal-length polylines.
    ///
    /// The j-th point of the result is the mean of the j-th points of the
    /// inputs. Returns `None` for an empty input or mismatched lengths.
    pub fn mean<'a, I>(polylines: I) -> Option<Polyline>
    where
        I: IntoIterator<Item = &'a Polyline>,
    {
        let mut iter = polylines.into_iter();
        let first = iter.next()?;
        let k = first.len();

        let mut sums: Vec<[f64; 3]> = first
            .points()
            .iter()
            .map(|p| [f64::from(p.x), f64::from(p.y), f64::from(p.z)])
            .collect();
        let mut count = 1usize;

        for polyline in iter {
            if polyline.len() != k {
                return None;
            }
            for (sum, p) in sums.iter_mut().zip(polyline.points()) {
                sum[0] += f64::from(p.x);
                sum[1] += f64::from(p.y);
                sum[2] += f64::from(p.z);
            }
            count += 1;
        }

        let n = count as f64;
        Some(Self(
            sums.into_iter()
                .map(|s| Point3::new((s[0] / n) as f32, (s[1] / n) as f32, (s[2] / n) as f32))
                .collect(),
        ))
    }
}

impl std::ops::Index<usize> for Polyline {
    type Output = Point3;

    fn index(&self, index: usize) -> &Point3 {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rejected() {
        assert!(Polyline::new(vec![]).is_none());
        assert!(Polyline::new(vec![Point3::origin()]).is_some());
    }

    #[test]
    fn test_straight_line() {
        let line = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 20.0), 21);
        assert_eq!(line.len(), 21);
        assert_eq!(line[5], Point3::new(0.0, 0.0, 5.0));
        assert!((line.arc_length() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_reversed() {
        let line = Polyline::straight(Point3::origin(), Point3::new(1.0, 0.0, 0.0), 3);
        let rev = line.reversed();
        assert_eq!(rev.first(), line.last());
        assert_eq!(rev.last(), line.first());
        assert_eq!(rev.reversed(), line);
    }

    #[test]
    fn test_mean() {
        let a = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 4.0), 5);
        let b = a.translated(2.0, 0.0, 0.0);
        let mean = Polyline::mean([&a, &b]).unwrap();
        assert_eq!(mean, a.translated(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_mean_rejects_mismatched_lengths() {
        let a = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 4.0), 5);
        let b = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 4.0), 6);
        assert!(Polyline::mean([&a, &b]).is_none());
        assert!(Polyline::mean(std::iter::empty::<&Polyline>()).is_none());
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<Polyline>("[]").is_err());

        let line = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 4.0), 5);
        let json = serde_json::to_string(&line).unwrap();
        assert!(json.starts_with("[{"));
        assert_eq!(serde_json::from_str::<Polyline>(&json).unwrap(), line);

        // An empty bundle is fine, an empty fiber inside one is not
        assert!(serde_json::from_str::<crate::types::Bundle>("[]").is_ok());
        assert!(serde_json::from_str::<crate::types::Bundle>("[[]]").is_err());
    }
}
