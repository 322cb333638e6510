//! End-to-end segmentation of one subject against an atlas.
//!
//! ```text
//! read subject → Canonicalizer ─┐
//!                               ├→ Classifier → ResultAggregator → ArtifactWriter
//! AtlasLoader ──────────────────┘
//! ```
//!
//! All loading and format errors surface before classification starts.
//! Classification itself is all-or-nothing, and nothing is written unless
//! it succeeds.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span};

use crate::aggregate::{ResultAggregator, SegmentationStats, SegmentedBundle};
use crate::atlas::{Atlas, AtlasError, AtlasLoader};
use crate::canonical::bundle_hash;
use crate::canonicalize::{CanonicalDataset, Canonicalizer};
use crate::classifier::{ClassifyError, Classifier};
use crate::config::{ConfigError, SegmentConfig};
use crate::io::{BundleIoError, BundleStore, FileBundleStore};
use crate::output::{ArtifactPaths, ArtifactWriter, LabelArtifacts, ManifestBuilder, OutputError};
use crate::resample::{ArcLengthResampler, ResampleError, Resampler};
use crate::types::{Assignment, Bundle};

/// Error type for a segmentation run.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Reading the subject bundle failed.
    #[error("Cannot read subject tractography: {0}")]
    Subject(#[source] BundleIoError),
    /// Resampling the subject failed.
    #[error(transparent)]
    Resample(#[from] ResampleError),
    /// Loading or validating the atlas failed.
    #[error(transparent)]
    Atlas(#[from] AtlasError),
    /// A fiber violated the classifier's precondition.
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    /// Writing artifacts failed.
    #[error(transparent)]
    Output(#[from] OutputError),
    /// The atlas point count differs from the configured one.
    #[error("Atlas uses {atlas} points per fiber but the run is configured for {configured}")]
    PointCountMismatch {
        /// Atlas point count.
        atlas: usize,
        /// Configured point count.
        configured: usize,
    },
}

/// In-memory result of segmenting one subject.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Subject data in original and canonical form.
    pub dataset: CanonicalDataset,
    /// Per-fiber label decisions.
    pub assignment: Assignment,
    /// One entry per non-empty label, in atlas order.
    pub bundles: Vec<SegmentedBundle>,
    /// Summary counts.
    pub stats: SegmentationStats,
}

/// Segment a subject bundle against an already loaded atlas.
///
/// Pure computation: no I/O happens here.
pub fn segment<R: Resampler + ?Sized>(
    subject: Bundle,
    atlas: &Atlas,
    resampler: &R,
    config: &SegmentConfig,
) -> Result<Segmentation, SegmentError> {
    config.validate()?;
    if atlas.point_count() != config.point_count {
        return Err(SegmentError::PointCountMismatch {
            atlas: atlas.point_count(),
            configured: config.point_count,
        });
    }

    let dataset = Canonicalizer::new(resampler, config.point_count).canonicalize(subject)?;
    let assignment = Classifier::with_config(atlas, config).classify(dataset.canonical())?;
    let bundles = ResultAggregator::new(atlas)
        .parallel(config.parallel)
        .aggregate(&assignment, &dataset);
    let stats = SegmentationStats::compute(atlas, &assignment, dataset.was_resampled());

    Ok(Segmentation {
        dataset,
        assignment,
        bundles,
        stats,
    })
}

/// Input and output locations of one run.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    /// Subject tractography bundle.
    pub input: PathBuf,
    /// Subject identifier used in output file names.
    pub subject_id: String,
    /// Directory of atlas bundles.
    pub atlas_dir: PathBuf,
    /// Atlas info file.
    pub atlas_info: PathBuf,
    /// Output root.
    pub output_dir: PathBuf,
}

/// Outcome of a run that wrote its artifacts.
#[derive(Debug, Clone)]
pub struct SegmentationReport {
    /// Summary counts.
    pub stats: SegmentationStats,
    /// Files written per non-empty label.
    pub labels: Vec<LabelArtifacts>,
    /// Manifest path, when written.
    pub manifest_path: Option<PathBuf>,
    /// Deterministic run id.
    pub run_id: Option<String>,
}

/// Runs segmentation against a bundle store.
pub struct Segmenter<S: BundleStore, R: Resampler = ArcLengthResampler> {
    store: Arc<S>,
    resampler: R,
    config: SegmentConfig,
}

impl<S: BundleStore> Segmenter<S, ArcLengthResampler> {
    /// Create a segmenter with the arc-length resampler.
    pub fn new(store: Arc<S>, config: SegmentConfig) -> Self {
        Self::with_resampler(store, ArcLengthResampler::new(), config)
    }
}

impl<S: BundleStore, R: Resampler> Segmenter<S, R> {
    /// Create a segmenter with a custom resampler.
    pub fn with_resampler(store: Arc<S>, resampler: R, config: SegmentConfig) -> Self {
        Self {
            store,
            resampler,
            config,
        }
    }

    /// The run configuration.
    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the atlas described by a request.
    pub fn load_atlas(&self, request: &SegmentRequest) -> Result<Atlas, SegmentError> {
        let atlas = AtlasLoader::new(self.store.as_ref(), self.config.point_count)
            .with_prefix(self.config.atlas_file_prefix.clone())
            .load(&request.atlas_dir, &request.atlas_info)?;
        Ok(atlas)
    }

    /// Run the full pipeline and write all artifacts.
    pub fn run(&self, request: &SegmentRequest) -> Result<SegmentationReport, SegmentError> {
        let span = info_span!("segment", subject = %request.subject_id);
        let _guard = span.enter();
        let start = Instant::now();

        self.config.validate()?;

        // Fail fast: everything that can be wrong with the inputs is checked
        // before any classification work.
        let subject = self
            .store
            .read_bundle(&request.input)
            .map_err(SegmentError::Subject)?;
        info!(fibers = subject.len(), input = %request.input.display(), "Read subject");
        let atlas = self.load_atlas(request)?;

        let segmentation = segment(subject, &atlas, &self.resampler, &self.config)?;

        let paths = ArtifactPaths::for_point_count(self.config.point_count);
        let writer = ArtifactWriter::new(
            self.store.as_ref(),
            request.output_dir.clone(),
            request.subject_id.clone(),
            paths.clone(),
        )
        .write_canonical(self.config.write_canonical_bundles);
        let labels = writer.write_run(atlas.labels().iter().map(|l| l.name()), &segmentation.bundles)?;

        let (manifest_path, run_id) = if self.config.write_manifest {
            let manifest = ManifestBuilder::new()
                .subject(request.subject_id.clone())
                .subject_content(bundle_hash(segmentation.dataset.original()))
                .atlas(&atlas)
                .config(&self.config)
                .stats(segmentation.stats.clone())
                .labels(labels.clone())
                .with_paths(paths)
                .build();
            match manifest {
                Some(manifest) => {
                    let path = writer.write_manifest(&manifest)?;
                    (Some(path), Some(manifest.run_id))
                }
                None => (None, None),
            }
        } else {
            (None, None)
        };

        info!(
            assigned = segmentation.stats.assigned,
            unassigned = segmentation.stats.unassigned,
            labels = segmentation.stats.segmented_labels,
            resampled = segmentation.stats.resampled,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Segmentation complete"
        );

        Ok(SegmentationReport {
            stats: segmentation.stats,
            labels,
            manifest_path,
            run_id,
        })
    }
}

/// Segment a `.bundles` file on disk with default settings.
pub fn fiberseg(
    input: impl Into<PathBuf>,
    subject_id: impl Into<String>,
    atlas_dir: impl Into<PathBuf>,
    atlas_info: impl Into<PathBuf>,
    output_dir: impl Into<PathBuf>,
) -> Result<SegmentationReport, SegmentError> {
    let request = SegmentRequest {
        input: input.into(),
        subject_id: subject_id.into(),
        atlas_dir: atlas_dir.into(),
        atlas_info: atlas_info.into(),
        output_dir: output_dir.into(),
    };
    Segmenter::new(Arc::new(FileBundleStore::new()), SegmentConfig::default()).run(&request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasLabel;
    use crate::io::InMemoryBundleStore;
    use crate::types::{Point3, Polyline};
    use std::path::Path;

    fn line(x: f32, points: usize) -> Polyline {
        Polyline::straight(Point3::new(x, 0.0, 0.0), Point3::new(x, 0.0, 20.0), points)
    }

    fn request() -> SegmentRequest {
        SegmentRequest {
            input: PathBuf::from("/subject/tracts.bundles"),
            subject_id: "01".to_string(),
            atlas_dir: PathBuf::from("/atlas"),
            atlas_info: PathBuf::from("/atlas/atlas_info.txt"),
            output_dir: PathBuf::from("/out"),
        }
    }

    fn store(subject: Bundle) -> InMemoryBundleStore {
        InMemoryBundleStore::new()
            .with_bundle("/subject/tracts.bundles", subject)
            .with_bundle("/atlas/atlas_A.bundles", Bundle::from(vec![line(0.0, 21)]))
            .with_bundle("/atlas/atlas_B.bundles", Bundle::from(vec![line(5.0, 21)]))
            .with_text("/atlas/atlas_info.txt", "A 2.0 1\nB 1.0 1\n")
    }

    #[test]
    fn test_segment_point_count_mismatch() {
        let atlas = Atlas::new(vec![AtlasLabel::from_centroid("A", 1.0, line(0.0, 21)).unwrap()]).unwrap();
        let config = SegmentConfig {
            point_count: 15,
            ..Default::default()
        };
        let err = segment(Bundle::new(), &atlas, &ArcLengthResampler::new(), &config).unwrap_err();
        assert!(matches!(err, SegmentError::PointCountMismatch { atlas: 21, configured: 15 }));
    }

    #[test]
    fn test_run_writes_only_non_empty_labels() {
        let subject: Bundle = vec![line(0.0, 21), line(30.0, 21), line(0.5, 21)].into();
        let store = Arc::new(store(subject));
        let segmenter = Segmenter::new(Arc::clone(&store), SegmentConfig::default());

        let report = segmenter.run(&request()).unwrap();
        assert_eq!(report.stats.assigned, 2);
        assert_eq!(report.stats.unassigned, 1);
        assert_eq!(report.labels.len(), 1);
        assert!(report.run_id.is_some());

        assert_eq!(store.read_text(Path::new("/out/idx_bundles/A.txt")).unwrap(), "0\n2\n");
        assert!(!store.exists(Path::new("/out/idx_bundles/B.txt")));
        assert!(store.exists(Path::new("/out/segmentation_manifest.json")));
    }

    #[test]
    fn test_rerun_clears_labels_that_became_empty() {
        let store = Arc::new(store(vec![line(0.0, 21), line(5.0, 21)].into()));
        let segmenter = Segmenter::new(Arc::clone(&store), SegmentConfig::default());
        segmenter.run(&request()).unwrap();
        assert!(store.exists(Path::new("/out/idx_bundles/A.txt")));

        store
            .write_bundle(Path::new("/subject/tracts.bundles"), &vec![line(5.0, 21), line(30.0, 21)].into())
            .unwrap();
        let report = segmenter.run(&request()).unwrap();

        assert_eq!(report.labels.len(), 1);
        assert!(!store.exists(Path::new("/out/idx_bundles/A.txt")));
        assert!(!store.exists(Path::new("/out/centroids/01_to_A.bundles")));
        assert_eq!(store.read_text(Path::new("/out/idx_bundles/B.txt")).unwrap(), "0\n");
    }

    #[test]
    fn test_atlas_errors_abort_before_writing() {
        let store = Arc::new(
            store(vec![line(0.0, 21)].into()).with_text("/atlas/atlas_info.txt", "A 2.0 1\nMISSING 1.0 1\n"),
        );
        let segmenter = Segmenter::new(Arc::clone(&store), SegmentConfig::default());

        let err = segmenter.run(&request()).unwrap_err();
        assert!(matches!(err, SegmentError::Atlas(AtlasError::Format { .. })));
        assert!(store.paths_under(Path::new("/out")).is_empty());
    }

    #[test]
    fn test_missing_subject() {
        let store = Arc::new(InMemoryBundleStore::new());
        let err = Segmenter::new(store, SegmentConfig::default())
            .run(&request())
            .unwrap_err();
        assert!(matches!(err, SegmentError::Subject(BundleIoError::NotFound(_))));
    }
}
