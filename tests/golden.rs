//! Golden tests for fiber segmentation.
//!
//! These tests pin down the reference scenarios: the two-label atlas, the
//! inclusive threshold boundary, reversal invariance and canonicalization.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use fiberseg::{
    segment, ArcLengthResampler, Atlas, AtlasLabel, Bundle, FiberState, InMemoryBundleStore,
    LabelId, Point3, Polyline, SegmentConfig, SegmentRequest, Segmenter, BundleStore,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Straight 21-point line from (x, 0, 0) to (x, 0, 20).
fn line_at(x: f32) -> Polyline {
    Polyline::straight(Point3::new(x, 0.0, 0.0), Point3::new(x, 0.0, 20.0), 21)
}

/// Label "A" (threshold 2.0) on the z axis, "B" (threshold 1.0) shifted by (5, 0, 0).
fn reference_atlas() -> Atlas {
    let a = line_at(0.0);
    let b = a.translated(5.0, 0.0, 0.0);
    Atlas::new(vec![
        AtlasLabel::from_centroid("A", 2.0, a).unwrap(),
        AtlasLabel::from_centroid("B", 1.0, b).unwrap(),
    ])
    .unwrap()
}

fn run(subject: Bundle) -> fiberseg::Segmentation {
    segment(
        subject,
        &reference_atlas(),
        &ArcLengthResampler::new(),
        &SegmentConfig::default(),
    )
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference Scenario
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reference_scenario() {
    let a = line_at(0.0);
    let subject: Bundle = vec![
        a.clone(),                        // 0: exact match of A
        a.translated(10.0, 0.0, 0.0),     // 1: 10 from A, 5 from B
        a.reversed(),                     // 2: A traversed backwards
    ]
    .into();

    let result = run(subject);
    let a_id = LabelId::new(0);

    assert_eq!(result.assignment.label_of(0), Some(a_id));
    assert_eq!(result.assignment.state(1), Some(&FiberState::Unassigned));
    assert_eq!(result.assignment.label_of(2), Some(a_id));

    // Only label A produces output, and its index list is [0, 2]
    assert_eq!(result.bundles.len(), 1);
    assert_eq!(result.bundles[0].name, "A");
    assert_eq!(result.bundles[0].indices, vec![0, 2]);
    assert!(!result.stats.resampled);
}

#[test]
fn test_threshold_boundary_inclusive() {
    let subject: Bundle = vec![
        line_at(-2.0),   // exactly at A's threshold
        line_at(-2.01),  // just past it
        line_at(6.0),    // exactly at B's threshold
        line_at(6.01),   // just past it
    ]
    .into();

    let result = run(subject);
    assert_eq!(
        result.assignment.state(0),
        Some(&FiberState::Assigned { label: LabelId::new(0), distance: 2.0 })
    );
    assert_eq!(result.assignment.state(1), Some(&FiberState::Unassigned));
    assert_eq!(
        result.assignment.state(2),
        Some(&FiberState::Assigned { label: LabelId::new(1), distance: 1.0 })
    );
    assert_eq!(result.assignment.state(3), Some(&FiberState::Unassigned));
}

#[test]
fn test_canonical_dataset_not_resampled() {
    let subject: Bundle = (0..10).map(|i| line_at(i as f32 * 0.1)).collect();
    let result = run(subject.clone());

    assert!(!result.dataset.was_resampled());
    assert_eq!(result.dataset.canonical(), &subject);
}

#[test]
fn test_non_canonical_dataset_keeps_original_geometry() {
    let short = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 20.0), 15);
    let long = Polyline::straight(Point3::new(0.0, 0.0, 20.0), Point3::origin(), 30);
    let result = run(vec![short, long].into());

    assert!(result.dataset.was_resampled());
    assert_eq!(result.dataset.canonical().point_counts(), vec![21, 21]);

    let a = &result.bundles[0];
    assert_eq!(a.indices, vec![0, 1]);
    assert_eq!(a.fibers.point_counts(), vec![15, 30]);
    assert_eq!(a.centroid.len(), 21);
}

// ─────────────────────────────────────────────────────────────────────────────
// Partition Property
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_index_files_partition_subject() {
    let subject: Bundle = (0..200)
        .map(|i| line_at((i % 40) as f32 * 0.25 - 2.0))
        .collect();
    let total = subject.len();

    let store = Arc::new(
        InMemoryBundleStore::new()
            .with_bundle("/s/tracts.bundles", subject)
            .with_bundle("/atlas/atlas_A.bundles", Bundle::from(vec![line_at(0.0)]))
            .with_bundle("/atlas/atlas_B.bundles", Bundle::from(vec![line_at(5.0)]))
            .with_text("/atlas/info.txt", "A 2.0 100\nB 1.0 100\n"),
    );
    let request = SegmentRequest {
        input: "/s/tracts.bundles".into(),
        subject_id: "07".to_string(),
        atlas_dir: "/atlas".into(),
        atlas_info: "/atlas/info.txt".into(),
        output_dir: "/out".into(),
    };
    let report = Segmenter::new(Arc::clone(&store), SegmentConfig::default())
        .run(&request)
        .unwrap();

    let mut seen = BTreeSet::new();
    let mut listed = 0usize;
    for label in &report.labels {
        let text = store.read_text(&Path::new("/out").join(&label.index_file)).unwrap();
        for index in fiberseg::output::parse_index_list(&text).unwrap() {
            assert!(seen.insert(index), "fiber {index} listed twice");
            listed += 1;
        }
    }

    assert_eq!(listed, report.stats.assigned);
    assert_eq!(listed + report.stats.unassigned, total);
    assert!(seen.iter().all(|&i| i < total));
}
