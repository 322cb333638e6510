//! Writes per-label artifacts through a bundle store.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::manifest::{ArtifactPaths, LabelArtifacts, SegmentationManifest};
use super::OutputError;
use crate::aggregate::SegmentedBundle;
use crate::io::bundles::HEADER_EXTENSION;
use crate::io::BundleStore;
use crate::types::Bundle;

/// Render an index list: one index per line.
pub fn format_index_list(indices: &[usize]) -> String {
    let mut out = String::with_capacity(indices.len() * 8);
    for index in indices {
        out.push_str(&index.to_string());
        out.push('\n');
    }
    out
}

/// Parse an index list. Values written as floats (`12.0`) are accepted.
pub fn parse_index_list(text: &str) -> Result<Vec<usize>, String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.parse::<usize>().or_else(|_| {
                l.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as usize)
                    .ok_or_else(|| format!("`{l}` is not a fiber index"))
            })
        })
        .collect()
}

/// Writes the artifacts of one run under an output root.
pub struct ArtifactWriter<'s, S: BundleStore + ?Sized> {
    store: &'s S,
    root: PathBuf,
    subject_id: String,
    paths: ArtifactPaths,
    write_canonical: bool,
}

impl<'s, S: BundleStore + ?Sized> ArtifactWriter<'s, S> {
    /// Create a writer for `subject_id` under `root`.
    pub fn new(store: &'s S, root: impl Into<PathBuf>, subject_id: impl Into<String>, paths: ArtifactPaths) -> Self {
        Self {
            store,
            root: root.into(),
            subject_id: subject_id.into(),
            paths,
            write_canonical: true,
        }
    }

    /// Whether to also write K-point bundles.
    pub fn write_canonical(mut self, enabled: bool) -> Self {
        self.write_canonical = enabled;
        self
    }

    /// The artifact layout.
    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    fn bundle_name(&self, label: &str) -> String {
        format!("{}_to_{label}.{HEADER_EXTENSION}", self.subject_id)
    }

    fn relative(dir: &str, file: &str) -> String {
        Path::new(dir).join(file).display().to_string()
    }

    /// Write index list, bundles and centroid for one label.
    pub fn write_label(&self, bundle: &SegmentedBundle) -> Result<LabelArtifacts, OutputError> {
        let index_file = Self::relative(&self.paths.index_dir, &format!("{}.txt", bundle.name));
        self.store
            .write_text(&self.root.join(&index_file), &format_index_list(&bundle.indices))?;

        let name = self.bundle_name(&bundle.name);

        let bundle_file = Self::relative(&self.paths.bundles_dir, &name);
        self.store.write_bundle(&self.root.join(&bundle_file), &bundle.fibers)?;

        let file = Self::relative(&self.paths.canonical_bundles_dir, &name);
        let canonical_bundle_file = if self.write_canonical {
            self.store.write_bundle(&self.root.join(&file), &bundle.canonical)?;
            Some(file)
        } else {
            self.store.remove(&self.root.join(&file))?;
            None
        };

        let centroid_file = Self::relative(&self.paths.centroids_dir, &name);
        let centroid: Bundle = vec![bundle.centroid.clone()].into();
        self.store.write_bundle(&self.root.join(&centroid_file), &centroid)?;

        debug!(label = %bundle.name, fibers = bundle.len(), "Wrote label artifacts");
        Ok(LabelArtifacts {
            label: bundle.name.clone(),
            fibers: bundle.len(),
            index_file,
            bundle_file,
            canonical_bundle_file,
            centroid_file,
        })
    }

    /// Remove any artifacts a previous run left for `label`.
    pub fn remove_label(&self, label: &str) -> Result<(), OutputError> {
        let name = self.bundle_name(label);
        let stale = [
            Self::relative(&self.paths.index_dir, &format!("{label}.txt")),
            Self::relative(&self.paths.bundles_dir, &name),
            Self::relative(&self.paths.canonical_bundles_dir, &name),
            Self::relative(&self.paths.centroids_dir, &name),
        ];
        for file in &stale {
            self.store.remove(&self.root.join(file))?;
        }
        Ok(())
    }

    /// Write the non-empty labels and clear the files of every other label in `all_labels`.
    ///
    /// An output root reused across runs then only holds this run's index lists.
    pub fn write_run<'l>(
        &self,
        all_labels: impl IntoIterator<Item = &'l str>,
        bundles: &[SegmentedBundle],
    ) -> Result<Vec<LabelArtifacts>, OutputError> {
        let mut cleared = 0usize;
        for label in all_labels {
            if !bundles.iter().any(|b| b.name == label) {
                self.remove_label(label)?;
                cleared += 1;
            }
        }
        debug!(cleared, "Cleared artifacts of empty labels");
        self.write_all(bundles)
    }

    /// Write every label, in the given order.
    pub fn write_all(&self, bundles: &[SegmentedBundle]) -> Result<Vec<LabelArtifacts>, OutputError> {
        let written = bundles
            .iter()
            .map(|b| self.write_label(b))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            labels = written.len(),
            root = %self.root.display(),
            "Wrote segmentation artifacts"
        );
        Ok(written)
    }

    /// Write the manifest as pretty JSON. Returns its full path.
    pub fn write_manifest(&self, manifest: &SegmentationManifest) -> Result<PathBuf, OutputError> {
        let path = self.root.join(&self.paths.manifest);
        let json = serde_json::to_string_pretty(manifest)?;
        self.store.write_text(&path, &json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::InMemoryBundleStore;
    use crate::types::{LabelId, Point3, Polyline};

    fn segmented() -> SegmentedBundle {
        let fiber = Polyline::straight(Point3::origin(), Point3::new(0.0, 0.0, 20.0), 21);
        SegmentedBundle {
            label: LabelId::new(0),
            name: "AR_ANT".to_string(),
            indices: vec![3, 8],
            fibers: vec![fiber.clone(), fiber.clone()].into(),
            canonical: vec![fiber.clone(), fiber.clone()].into(),
            centroid: fiber,
        }
    }

    #[test]
    fn test_index_list_roundtrip() {
        assert_eq!(format_index_list(&[0, 12, 7]), "0\n12\n7\n");
        assert_eq!(parse_index_list("0\n12.0\n\n7\n").unwrap(), vec![0, 12, 7]);
        assert!(parse_index_list("1.5").is_err());
    }

    #[test]
    fn test_write_label_layout() {
        let store = InMemoryBundleStore::new();
        let writer = ArtifactWriter::new(&store, "/out", "01", ArtifactPaths::default());

        let artifacts = writer.write_label(&segmented()).unwrap();
        assert_eq!(artifacts.index_file, "idx_bundles/AR_ANT.txt");
        assert_eq!(artifacts.bundle_file, "final_bundles/01_to_AR_ANT.bundles");
        assert_eq!(
            artifacts.canonical_bundle_file.as_deref(),
            Some("final_bundles_21p/01_to_AR_ANT.bundles")
        );

        assert_eq!(store.read_text(Path::new("/out/idx_bundles/AR_ANT.txt")).unwrap(), "3\n8\n");
        let centroid = store
            .read_bundle(Path::new("/out/centroids/01_to_AR_ANT.bundles"))
            .unwrap();
        assert_eq!(centroid.len(), 1);
    }

    #[test]
    fn test_canonical_bundles_optional() {
        let store = InMemoryBundleStore::new();
        let writer = ArtifactWriter::new(&store, "/out", "01", ArtifactPaths::default()).write_canonical(false);

        let artifacts = writer.write_label(&segmented()).unwrap();
        assert!(artifacts.canonical_bundle_file.is_none());
        assert!(store.paths_under(Path::new("/out/final_bundles_21p")).is_empty());
    }

    #[test]
    fn test_write_run_clears_empty_labels() {
        let store = InMemoryBundleStore::new();
        let writer = ArtifactWriter::new(&store, "/out", "01", ArtifactPaths::default());
        writer.write_label(&segmented()).unwrap();

        let mut other = segmented();
        other.label = LabelId::new(1);
        other.name = "CST".to_string();
        writer.write_run(["AR_ANT", "CST"], &[other]).unwrap();

        assert!(!store.exists(Path::new("/out/idx_bundles/AR_ANT.txt")));
        assert!(!store.exists(Path::new("/out/final_bundles/01_to_AR_ANT.bundles")));
        assert!(!store.exists(Path::new("/out/final_bundles_21p/01_to_AR_ANT.bundles")));
        assert!(!store.exists(Path::new("/out/centroids/01_to_AR_ANT.bundles")));
        assert!(store.exists(Path::new("/out/idx_bundles/CST.txt")));
    }
}
