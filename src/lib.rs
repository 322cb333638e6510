//! # fiberseg
//!
//! Atlas-based segmentation of white matter fiber bundles.
//!
//! Given a subject's tractography (a set of 3D polylines) and a multi-subject
//! atlas of labeled reference bundles, each with a distance threshold, every
//! subject fiber is assigned to at most one atlas label or left unassigned.
//!
//! ## Core Contract
//!
//! 1. Canonicalize: resample every fiber to K equidistant points (K = 21)
//!    unless the dataset already is canonical
//! 2. Classify: nearest label by orientation-invariant mean point distance,
//!    accepted only within that label's threshold
//! 3. Aggregate: per label, the original-resolution fibers, their indices
//!    and a centroid
//!
//! ## Architecture
//!
//! ```text
//! subject.bundles → Canonicalizer ─┐
//!                                  ├→ Classifier → ResultAggregator → ArtifactWriter
//! atlas_dir + info → AtlasLoader ──┘        ↑
//!                                    distance engine
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same subject + same atlas + same config → identical assignment,
//!   regardless of thread count
//! - Ties between labels go to the label loaded first
//! - Index lists are in original dataset order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod config;
pub mod io;
pub mod resample;
pub mod canonicalize;
pub mod distance;
pub mod atlas;
pub mod classifier;
pub mod aggregate;
pub mod output;
pub mod pipeline;

// Re-exports
pub use types::{Assignment, Bundle, EmptyPolylineError, FiberState, LabelId, Point3, Polyline};
pub use canonical::{bundle_hash, canonical_hash, canonical_hash_hex, quantize, to_canonical_bytes};
pub use config::{ConfigError, MatchPolicy, SegmentConfig};
pub use io::{BundleIoError, BundleStore, FileBundleStore, InMemoryBundleStore};
pub use resample::{ArcLengthResampler, ResampleError, Resampler};
pub use canonicalize::{CanonicalDataset, Canonicalizer};
pub use distance::{direct_distance, distance_to_set, fiber_distance, flipped_distance};
pub use atlas::{Atlas, AtlasError, AtlasInfo, AtlasInfoEntry, AtlasLabel, AtlasLoader};
pub use classifier::{ClassifyError, Classifier, NearestLabel};
pub use aggregate::{LabelCount, ResultAggregator, SegmentationStats, SegmentedBundle};
pub use output::{
    ArtifactPaths, ArtifactWriter, LabelArtifacts, ManifestBuilder, OutputError,
    SegmentationManifest,
};
pub use pipeline::{
    fiberseg, segment, SegmentError, SegmentRequest, Segmentation, SegmentationReport, Segmenter,
};

/// Schema version for manifests and fingerprints.
/// Increment on breaking changes to any serialized type.
pub const SEGMENTATION_SCHEMA_VERSION: &str = "1.0.0";

/// Canonical number of points per fiber.
pub const DEFAULT_POINT_COUNT: usize = 21;
