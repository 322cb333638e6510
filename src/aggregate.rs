//! Groups assigned fibers by label and derives per-label artifacts.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atlas::Atlas;
use crate::canonicalize::CanonicalDataset;
use crate::types::{Assignment, Bundle, LabelId, Polyline};

/// Fibers extracted for one atlas label.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedBundle {
    /// Atlas label id.
    pub label: LabelId,
    /// Atlas label name.
    pub name: String,
    /// Original dataset indices, ascending.
    pub indices: Vec<usize>,
    /// Original-resolution fibers at `indices`.
    pub fibers: Bundle,
    /// Canonical K-point fibers at `indices`.
    pub canonical: Bundle,
    /// Point-wise mean of `canonical`.
    pub centroid: Polyline,
}

impl SegmentedBundle {
    /// Number of fibers in the bundle.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the bundle is empty (never true for aggregator output).
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Fiber count for one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    /// Label name.
    pub label: String,
    /// Assigned fibers.
    pub fibers: usize,
}

/// Summary counts of a segmentation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationStats {
    /// Fibers in the subject dataset.
    pub total_fibers: usize,
    /// Fibers assigned to some label.
    pub assigned: usize,
    /// Fibers left unassigned.
    pub unassigned: usize,
    /// Labels with at least one fiber.
    pub segmented_labels: usize,
    /// Per-label counts in atlas order, including empty labels.
    pub per_label: Vec<LabelCount>,
    /// Whether the subject was resampled before classification.
    pub resampled: bool,
}

impl SegmentationStats {
    /// Compute counts from an assignment.
    pub fn compute(atlas: &Atlas, assignment: &Assignment, resampled: bool) -> Self {
        let members = assignment.members_by_label();
        let per_label: Vec<LabelCount> = atlas
            .iter()
            .map(|(id, label)| LabelCount {
                label: label.name().to_string(),
                fibers: members.get(id.index()).map_or(0, Vec::len),
            })
            .collect();

        Self {
            total_fibers: assignment.len(),
            assigned: assignment.assigned_count(),
            unassigned: assignment.unassigned_count(),
            segmented_labels: per_label.iter().filter(|c| c.fibers > 0).count(),
            per_label,
            resampled,
        }
    }
}

/// Builds [`SegmentedBundle`]s from a finished assignment.
pub struct ResultAggregator<'a> {
    atlas: &'a Atlas,
    parallel: bool,
}

impl<'a> ResultAggregator<'a> {
    /// Create an aggregator.
    pub fn new(atlas: &'a Atlas) -> Self {
        Self {
            atlas,
            parallel: true,
        }
    }

    /// Enable or disable the thread pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn build(&self, label: LabelId, indices: Vec<usize>, dataset: &CanonicalDataset) -> Option<SegmentedBundle> {
        let entry = self.atlas.get(label)?;
        let fibers = dataset.original().select(&indices);
        let canonical = dataset.canonical().select(&indices);
        let centroid = Polyline::mean(canonical.iter())?;

        debug!(label = entry.name(), fibers = indices.len(), "Segmented bundle built");
        Some(SegmentedBundle {
            label,
            name: entry.name().to_string(),
            indices,
            fibers,
            canonical,
            centroid,
        })
    }

    /// One bundle per label with at least one assigned fiber, in atlas order.
    pub fn aggregate(&self, assignment: &Assignment, dataset: &CanonicalDataset) -> Vec<SegmentedBundle> {
        let groups: Vec<(LabelId, Vec<usize>)> = assignment
            .members_by_label()
            .into_iter()
            .enumerate()
            .filter(|(_, members)| !members.is_empty())
            .map(|(i, members)| (LabelId::new(i), members))
            .collect();

        if self.parallel {
            groups
                .into_par_iter()
                .filter_map(|(label, indices)| self.build(label, indices, dataset))
                .collect()
        } else {
            groups
                .into_iter()
                .filter_map(|(label, indices)| self.build(label, indices, dataset))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasLabel;
    use crate::canonicalize::Canonicalizer;
    use crate::resample::ArcLengthResampler;
    use crate::types::{FiberState, Point3};

    fn line(x: f32, points: usize) -> Polyline {
        Polyline::straight(Point3::new(x, 0.0, 0.0), Point3::new(x, 0.0, 20.0), points)
    }

    fn assigned(label: usize) -> FiberState {
        FiberState::Assigned {
            label: LabelId::new(label),
            distance: 0.0,
        }
    }

    #[test]
    fn test_aggregate_uses_original_geometry() {
        let atlas = Atlas::new(vec![
            AtlasLabel::from_centroid("A", 2.0, line(0.0, 21)).unwrap(),
            AtlasLabel::from_centroid("B", 1.0, line(5.0, 21)).unwrap(),
            AtlasLabel::from_centroid("C", 1.0, line(9.0, 21)).unwrap(),
        ])
        .unwrap();

        let resampler = ArcLengthResampler::new();
        let dataset = Canonicalizer::new(&resampler, 21)
            .canonicalize(vec![line(0.0, 15), line(7.0, 30), line(2.0, 30)].into())
            .unwrap();

        let assignment = Assignment::new(vec![assigned(0), FiberState::Unassigned, assigned(0)], 3);
        let bundles = ResultAggregator::new(&atlas).aggregate(&assignment, &dataset);

        assert_eq!(bundles.len(), 1);
        let a = &bundles[0];
        assert_eq!(a.name, "A");
        assert_eq!(a.indices, vec![0, 2]);
        assert_eq!(a.fibers.point_counts(), vec![15, 30]);
        assert_eq!(a.canonical.point_counts(), vec![21, 21]);
        assert_eq!(a.centroid.len(), 21);
        assert!((a.centroid.first().x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_stats() {
        let atlas = Atlas::new(vec![
            AtlasLabel::from_centroid("A", 2.0, line(0.0, 21)).unwrap(),
            AtlasLabel::from_centroid("B", 1.0, line(5.0, 21)).unwrap(),
        ])
        .unwrap();
        let assignment = Assignment::new(vec![assigned(1), FiberState::Unassigned, assigned(1)], 2);

        let stats = SegmentationStats::compute(&atlas, &assignment, false);
        assert_eq!(stats.total_fibers, 3);
        assert_eq!(stats.assigned, 2);
        assert_eq!(stats.unassigned, 1);
        assert_eq!(stats.segmented_labels, 1);
        assert_eq!(stats.per_label[0], LabelCount { label: "A".to_string(), fibers: 0 });
        assert_eq!(stats.per_label[1].fibers, 2);
    }
}
