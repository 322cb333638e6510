//! Segmentation run manifest.
//!
//! The manifest records everything needed to tell whether two runs should
//! have produced identical artifacts: subject id and fiber content, atlas
//! fingerprint and parameter hash. `run_id` hashes exactly those inputs, so
//! the same inputs always yield the same `run_id` regardless of when they ran.

use serde::{Deserialize, Serialize};

use crate::aggregate::SegmentationStats;
use crate::atlas::Atlas;
use crate::canonical::canonical_hash_hex;
use crate::config::{MatchPolicy, SegmentConfig};
use crate::SEGMENTATION_SCHEMA_VERSION;

/// Directory and file names of the run artifacts, relative to the output root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Directory of per-label index lists.
    pub index_dir: String,
    /// Directory of original-resolution segmented bundles.
    pub bundles_dir: String,
    /// Directory of K-point segmented bundles.
    pub canonical_bundles_dir: String,
    /// Directory of per-label centroids.
    pub centroids_dir: String,
    /// Manifest file name.
    pub manifest: String,
}

impl ArtifactPaths {
    /// Default layout for a canonical point count K.
    pub fn for_point_count(point_count: usize) -> Self {
        Self {
            index_dir: "idx_bundles".to_string(),
            bundles_dir: "final_bundles".to_string(),
            canonical_bundles_dir: format!("final_bundles_{point_count}p"),
            centroids_dir: "centroids".to_string(),
            manifest: "segmentation_manifest.json".to_string(),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::for_point_count(crate::DEFAULT_POINT_COUNT)
    }
}

/// Files written for one label, relative to the output root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelArtifacts {
    /// Label name.
    pub label: String,
    /// Number of fibers.
    pub fibers: usize,
    /// Index list file.
    pub index_file: String,
    /// Original-resolution bundle.
    pub bundle_file: String,
    /// K-point bundle, when written.
    pub canonical_bundle_file: Option<String>,
    /// Centroid bundle.
    pub centroid_file: String,
}

/// The complete run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationManifest {
    /// Deterministic identifier of this run's inputs.
    pub run_id: String,
    /// Schema version.
    pub version: String,
    /// Subject identifier.
    pub subject_id: String,
    /// Content hash of the subject fibers.
    pub subject_fingerprint: String,
    /// Atlas content fingerprint.
    pub atlas_fingerprint: String,
    /// Number of atlas labels.
    pub atlas_labels: usize,
    /// Hash of the result-affecting configuration.
    pub params_hash: String,
    /// Canonical point count K.
    pub point_count: usize,
    /// Match policy used.
    pub match_policy: MatchPolicy,
    /// Unix timestamp when the manifest was built.
    pub computed_at: i64,
    /// Artifact layout.
    pub artifact_paths: ArtifactPaths,
    /// Files written per non-empty label, in atlas order.
    pub labels: Vec<LabelArtifacts>,
    /// Summary statistics.
    pub stats: SegmentationStats,
}

/// Internal struct for computing run_id.
#[derive(Serialize)]
struct RunIdInput<'a> {
    version: &'a str,
    subject_id: &'a str,
    subject_fingerprint: &'a str,
    atlas_fingerprint: &'a str,
    params_hash: &'a str,
    stats: &'a SegmentationStats,
}

/// Builder for segmentation manifests.
#[derive(Default)]
pub struct ManifestBuilder<'a> {
    subject_id: Option<String>,
    subject_fingerprint: Option<String>,
    atlas: Option<&'a Atlas>,
    config: Option<&'a SegmentConfig>,
    stats: Option<SegmentationStats>,
    labels: Vec<LabelArtifacts>,
    artifact_paths: Option<ArtifactPaths>,
}

impl<'a> ManifestBuilder<'a> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subject identifier.
    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Set the subject content hash (see [`bundle_hash`](crate::canonical::bundle_hash)).
    pub fn subject_content(mut self, fingerprint: impl Into<String>) -> Self {
        self.subject_fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the atlas.
    pub fn atlas(mut self, atlas: &'a Atlas) -> Self {
        self.atlas = Some(atlas);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: &'a SegmentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the run statistics.
    pub fn stats(mut self, stats: SegmentationStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Set the per-label artifact list.
    pub fn labels(mut self, labels: Vec<LabelArtifacts>) -> Self {
        self.labels = labels;
        self
    }

    /// Set custom artifact paths.
    pub fn with_paths(mut self, paths: ArtifactPaths) -> Self {
        self.artifact_paths = Some(paths);
        self
    }

    /// Build the manifest, or `None` if subject, subject content, atlas,
    /// config or stats is missing.
    pub fn build(self) -> Option<SegmentationManifest> {
        let subject_id = self.subject_id?;
        let subject_fingerprint = self.subject_fingerprint?;
        let atlas = self.atlas?;
        let config = self.config?;
        let stats = self.stats?;

        let params_hash = config.params_hash();
        let run_id = canonical_hash_hex(&RunIdInput {
            version: SEGMENTATION_SCHEMA_VERSION,
            subject_id: &subject_id,
            subject_fingerprint: &subject_fingerprint,
            atlas_fingerprint: atlas.fingerprint(),
            params_hash: &params_hash,
            stats: &stats,
        });

        Some(SegmentationManifest {
            run_id,
            version: SEGMENTATION_SCHEMA_VERSION.to_string(),
            subject_id,
            subject_fingerprint,
            atlas_fingerprint: atlas.fingerprint().to_string(),
            atlas_labels: atlas.len(),
            params_hash,
            point_count: config.point_count,
            match_policy: config.match_policy,
            computed_at: chrono::Utc::now().timestamp(),
            artifact_paths: self
                .artifact_paths
                .unwrap_or_else(|| ArtifactPaths::for_point_count(config.point_count)),
            labels: self.labels,
            stats,
        })
    }
}
