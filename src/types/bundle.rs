//! Ragged fiber container.

use serde::{Deserialize, Serialize};

use super::polyline::Polyline;

/// An ordered set of fibers with possibly different point counts.
///
/// Fiber order is significant: a fiber's position is its index into the
/// originating dataset, and output index files refer to it. No homogeneity
/// is assumed until [`Bundle::uniform_point_count`] says so.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle {
    fibers: Vec<Polyline>,
}

impl Bundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bundle with room for `capacity` fibers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fibers: Vec::with_capacity(capacity),
        }
    }

    /// Append a fiber.
    pub fn push(&mut self, fiber: Polyline) {
        self.fibers.push(fiber);
    }

    /// Number of fibers.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    /// Whether the bundle holds no fibers.
    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Fiber at `index`.
    pub fn get(&self, index: usize) -> Option<&Polyline> {
        self.fibers.get(index)
    }

    /// Fibers as a slice.
    pub fn fibers(&self) -> &[Polyline] {
        &self.fibers
    }

    /// Iterate over fibers in dataset order.
    pub fn iter(&self) -> std::slice::Iter<'_, Polyline> {
        self.fibers.iter()
    }

    /// Consume into the fiber vector.
    pub fn into_fibers(self) -> Vec<Polyline> {
        self.fibers
    }

    /// Point count of every fiber, in order.
    pub fn point_counts(&self) -> Vec<usize> {
        self.fibers.iter().map(Polyline::len).collect()
    }

    /// Total number of points over all fibers.
    pub fn total_points(&self) -> usize {
        self.fibers.iter().map(Polyline::len).sum()
    }

    /// Whether consecutive fibers all share one point count.
    ///
    /// Trivially true for fewer than two fibers.
    pub fn is_uniform(&self) -> bool {
        self.fibers.windows(2).all(|w| w[0].len() == w[1].len())
    }

    /// The shared point count, if the bundle is non-empty and uniform.
    pub fn uniform_point_count(&self) -> Option<usize> {
        let first = self.fibers.first()?;
        self.is_uniform().then(|| first.len())
    }

    /// Index of the first fiber whose point count differs from `expected`.
    pub fn first_mismatch(&self, expected: usize) -> Option<(usize, usize)> {
        self.fibers
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() != expected)
            .map(|(i, f)| (i, f.len()))
    }

    /// New bundle with the fibers at `indices`, in the given order.
    ///
    /// Indices out of range are skipped.
    pub fn select(&self, indices: &[usize]) -> Bundle {
        indices
            .iter()
            .filter_map(|&i| self.fibers.get(i).cloned())
            .collect()
    }
}

impl From<Vec<Polyline>> for Bundle {
    fn from(fibers: Vec<Polyline>) -> Self {
        Self { fibers }
    }
}

impl FromIterator<Polyline> for Bundle {
    fn from_iter<T: IntoIterator<Item = Polyline>>(iter: T) -> Self {
        Self {
            fibers: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Bundle {
    type Item = &'a Polyline;
    type IntoIter = std::slice::Iter<'a, Polyline>;

    fn into_iter(self) -> Self::IntoIter {
        self.fibers.iter()
    }
}

impl IntoIterator for Bundle {
    type Item = Polyline;
    type IntoIter = std::vec::IntoIter<Polyline>;

    fn into_iter(self) -> Self::IntoIter {
        self.fibers.into_iter()
    }
}

impl std::ops::Index<usize> for Bundle {
    type Output = Polyline;

    fn index(&self, index: usize) -> &Polyline {
        &self.fibers[index]
    }
}
