//! Nearest-label classification of subject fibers.
//!
//! For every subject fiber f:
//!
//! 1. Compute d(f, L) against every atlas label L in load order
//! 2. Keep the minimum; a later label only wins if it is closer by more
//!    than the tie tolerance, so ties go to the earlier label
//! 3. Assign if d* ≤ threshold(L*), otherwise leave unassigned
//!
//! Fibers are independent, so the work is split into fixed-size index
//! chunks that each write their own slice of a pre-sized state vector.
//! The first precondition violation stops the whole run.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, info_span};

use crate::atlas::Atlas;
use crate::config::{MatchPolicy, SegmentConfig};
use crate::distance::distance_to_set;
use crate::types::{Assignment, Bundle, FiberState, LabelId, Polyline};

/// Error type for classification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    /// A fiber reached the classifier without the canonical point count.
    ///
    /// This is an upstream bug, never bad data, and is fatal to the run.
    #[error("Precondition violation: fiber {fiber} has {found} points, classifier requires {expected}")]
    PreconditionViolation {
        /// Index of the offending fiber.
        fiber: usize,
        /// Canonical point count.
        expected: usize,
        /// Actual point count.
        found: usize,
    },
}

/// Best label for one fiber, before thresholding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestLabel {
    /// The closest label.
    pub label: LabelId,
    /// Distance to it.
    pub distance: f64,
}

/// Classifies subject fibers against a shared, read-only atlas.
pub struct Classifier<'a> {
    atlas: &'a Atlas,
    policy: MatchPolicy,
    tie_tolerance: f64,
    parallel: bool,
    chunk_size: usize,
}

impl<'a> Classifier<'a> {
    /// Create a classifier with default settings.
    pub fn new(atlas: &'a Atlas) -> Self {
        Self::with_config(atlas, &SegmentConfig::default())
    }

    /// Create a classifier from a run configuration.
    pub fn with_config(atlas: &'a Atlas, config: &SegmentConfig) -> Self {
        Self {
            atlas,
            policy: config.match_policy,
            tie_tolerance: config.tie_tolerance,
            parallel: config.parallel,
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Set the match policy.
    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable or disable the thread pool.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The atlas being matched against.
    pub fn atlas(&self) -> &Atlas {
        self.atlas
    }

    /// Nearest label of a fiber, ignoring thresholds.
    ///
    /// Returns `None` only when no distance is comparable (NaN coordinates).
    pub fn nearest(&self, fiber: &Polyline) -> Option<NearestLabel> {
        let mut best: Option<NearestLabel> = None;
        for (label, entry) in self.atlas.iter() {
            let Some(distance) = distance_to_set(fiber, entry.representatives(self.policy)) else {
                continue;
            };
            if distance.is_nan() {
                continue;
            }
            match best {
                Some(b) if distance >= b.distance - self.tie_tolerance => {}
                _ => best = Some(NearestLabel { label, distance }),
            }
        }
        best
    }

    /// Classify one fiber into a terminal state.
    pub fn classify_fiber(&self, index: usize, fiber: &Polyline) -> Result<FiberState, ClassifyError> {
        let expected = self.atlas.point_count();
        if fiber.len() != expected {
            return Err(ClassifyError::PreconditionViolation {
                fiber: index,
                expected,
                found: fiber.len(),
            });
        }

        let state = match self.nearest(fiber) {
            Some(nearest) => {
                let threshold = self
                    .atlas
                    .get(nearest.label)
                    .map(|l| l.threshold())
                    .unwrap_or(f64::NEG_INFINITY);
                if nearest.distance <= threshold {
                    FiberState::Assigned {
                        label: nearest.label,
                        distance: nearest.distance,
                    }
                } else {
                    FiberState::Unassigned
                }
            }
            None => FiberState::Unassigned,
        };
        Ok(state)
    }

    fn classify_chunk(&self, chunk_index: usize, states: &mut [FiberState], fibers: &Bundle) -> Result<(), ClassifyError> {
        let base = chunk_index * self.chunk_size;
        for (offset, slot) in states.iter_mut().enumerate() {
            let index = base + offset;
            *slot = FiberState::Evaluating;
            *slot = self.classify_fiber(index, &fibers[index])?;
        }
        Ok(())
    }

    /// Classify every fiber of a canonical dataset.
    ///
    /// All-or-nothing: either every fiber ends in a terminal state, or the
    /// first [`ClassifyError::PreconditionViolation`] is returned.
    pub fn classify(&self, fibers: &Bundle) -> Result<Assignment, ClassifyError> {
        let span = info_span!(
            "classify",
            fibers = fibers.len(),
            labels = self.atlas.len(),
            policy = %self.policy,
            parallel = self.parallel,
        );
        let _guard = span.enter();
        let start = Instant::now();

        let mut states = vec![FiberState::Unevaluated; fibers.len()];
        if self.parallel {
            states
                .par_chunks_mut(self.chunk_size)
                .enumerate()
                .try_for_each(|(chunk, slots)| self.classify_chunk(chunk, slots, fibers))?;
        } else {
            states
                .chunks_mut(self.chunk_size)
                .enumerate()
                .try_for_each(|(chunk, slots)| self.classify_chunk(chunk, slots, fibers))?;
        }

        let assignment = Assignment::new(states, self.atlas.len());
        info!(
            assigned = assignment.assigned_count(),
            unassigned = assignment.unassigned_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Classification complete"
        );
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasLabel;
    use crate::types::Point3;

    fn line(x: f32) -> Polyline {
        Polyline::straight(Point3::new(x, 0.0, 0.0), Point3::new(x, 0.0, 20.0), 21)
    }

    fn two_label_atlas() -> Atlas {
        Atlas::new(vec![
            AtlasLabel::from_centroid("A", 2.0, line(0.0)).unwrap(),
            AtlasLabel::from_centroid("B", 1.0, line(5.0)).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_nearest_label_wins() {
        let atlas = two_label_atlas();
        let classifier = Classifier::new(&atlas);

        let state = classifier.classify_fiber(0, &line(4.5)).unwrap();
        assert_eq!(state.label(), Some(LabelId::new(1)));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let atlas = two_label_atlas();
        let classifier = Classifier::new(&atlas);

        // Exactly 2.0 away from A, 3.0 from B
        let at_boundary = line(-2.0);
        assert_eq!(
            classifier.classify_fiber(0, &at_boundary).unwrap(),
            FiberState::Assigned { label: LabelId::new(0), distance: 2.0 }
        );

        let past_boundary = line(-2.001);
        assert_eq!(
            classifier.classify_fiber(0, &past_boundary).unwrap(),
            FiberState::Unassigned
        );
    }

    #[test]
    fn test_tie_goes_to_first_label() {
        let atlas = Atlas::new(vec![
            AtlasLabel::from_centroid("left", 5.0, line(-1.0)).unwrap(),
            AtlasLabel::from_centroid("right", 5.0, line(1.0)).unwrap(),
        ])
        .unwrap();
        let classifier = Classifier::new(&atlas);

        let state = classifier.classify_fiber(0, &line(0.0)).unwrap();
        assert_eq!(state.label(), Some(LabelId::new(0)));
    }

    #[test]
    fn test_precondition_violation() {
        let atlas = two_label_atlas();
        let short = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 20.0), 15);
        let fibers: Bundle = vec![line(0.0), short].into();

        let err = Classifier::new(&atlas).classify(&fibers).unwrap_err();
        assert_eq!(
            err,
            ClassifyError::PreconditionViolation { fiber: 1, expected: 21, found: 15 }
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let atlas = two_label_atlas();
        let fibers: Bundle = (0..500).map(|i| line((i % 80) as f32 * 0.1 - 1.0)).collect();
        let config = SegmentConfig {
            chunk_size: 17,
            ..Default::default()
        };

        let parallel = Classifier::with_config(&atlas, &config).classify(&fibers).unwrap();
        let sequential = Classifier::with_config(&atlas, &config)
            .parallel(false)
            .classify(&fibers)
            .unwrap();

        assert_eq!(parallel, sequential);
        assert!(parallel.is_complete());
    }

    #[test]
    fn test_full_reference_policy() {
        // Centroid of {0, 10} sits at 5, far from both members
        let refs: Bundle = vec![line(0.0), line(10.0)].into();
        let atlas = Atlas::new(vec![AtlasLabel::new("wide", 1.0, 2, refs, 21).unwrap()]).unwrap();

        let centroid = Classifier::new(&atlas).with_policy(MatchPolicy::Centroid);
        let full = Classifier::new(&atlas).with_policy(MatchPolicy::FullReference);

        assert_eq!(centroid.classify_fiber(0, &line(9.5)).unwrap(), FiberState::Unassigned);
        assert_eq!(full.classify_fiber(0, &line(9.5)).unwrap().label(), Some(LabelId::new(0)));
    }
}
