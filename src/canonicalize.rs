//! Canonicalization of a subject dataset to K points per fiber.
//!
//! Classification compares fibers point by point, so every fiber must have
//! exactly K equidistant points. Output bundles, however, keep the original
//! geometry; a [`CanonicalDataset`] carries both views.

use std::time::Instant;

use tracing::{debug, info};

use crate::resample::{ResampleError, Resampler};
use crate::types::{Bundle, Polyline};

/// A subject dataset in both original and canonical (K-point) form.
#[derive(Debug, Clone)]
pub struct CanonicalDataset {
    original: Bundle,
    /// `None` when the original is already canonical and serves both roles.
    resampled: Option<Bundle>,
    point_count: usize,
}

impl CanonicalDataset {
    /// Original, full-resolution fibers.
    pub fn original(&self) -> &Bundle {
        &self.original
    }

    /// K-point fibers used for classification and centroids.
    pub fn canonical(&self) -> &Bundle {
        self.resampled.as_ref().unwrap_or(&self.original)
    }

    /// Whether the resampler was invoked.
    pub fn was_resampled(&self) -> bool {
        self.resampled.is_some()
    }

    /// The canonical point count K.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Number of fibers (same in both views).
    pub fn len(&self) -> usize {
        self.original.len()
    }

    /// Whether the dataset has no fibers.
    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Original and canonical fiber at `index`.
    pub fn fiber(&self, index: usize) -> Option<(&Polyline, &Polyline)> {
        Some((self.original.get(index)?, self.canonical().get(index)?))
    }
}

/// Decides when a dataset needs resampling, and delegates it.
pub struct Canonicalizer<'r, R: Resampler + ?Sized> {
    resampler: &'r R,
    point_count: usize,
}

impl<'r, R: Resampler + ?Sized> Canonicalizer<'r, R> {
    /// Create a canonicalizer targeting `point_count` points per fiber.
    pub fn new(resampler: &'r R, point_count: usize) -> Self {
        Self {
            resampler,
            point_count,
        }
    }

    /// Whether `bundle` can be classified as-is.
    ///
    /// True when every fiber already has exactly K points. An empty dataset
    /// is trivially canonical.
    ///
    /// Uniformity alone is not enough: a dataset whose fibers all share some
    /// other count (including a single fiber with a count other than K) is
    /// resampled, since the classifier only accepts K-point fibers.
    pub fn is_canonical(&self, bundle: &Bundle) -> bool {
        bundle.is_empty() || bundle.uniform_point_count() == Some(self.point_count)
    }

    /// Build the canonical view of `bundle`, resampling only when needed.
    pub fn canonicalize(&self, bundle: Bundle) -> Result<CanonicalDataset, ResampleError> {
        if self.is_canonical(&bundle) {
            debug!(
                fibers = bundle.len(),
                point_count = self.point_count,
                "Dataset already canonical, skipping resampling"
            );
            return Ok(CanonicalDataset {
                original: bundle,
                resampled: None,
                point_count: self.point_count,
            });
        }

        let start = Instant::now();
        let resampled = self.resampler.resample(&bundle, self.point_count)?;
        info!(
            fibers = bundle.len(),
            uniform = bundle.is_uniform(),
            point_count = self.point_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resampled subject fibers"
        );

        Ok(CanonicalDataset {
            original: bundle,
            resampled: Some(resampled),
            point_count: self.point_count,
        })
    }
}
