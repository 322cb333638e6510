//! Loads an atlas from a bundle directory and its info file.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, info_span};

use super::{Atlas, AtlasError, AtlasInfo, AtlasLabel};
use crate::io::bundles::HEADER_EXTENSION;
use crate::io::BundleStore;

/// Reads labeled reference bundles through a [`BundleStore`].
///
/// Each info record `name` is looked up as `<dir>/<prefix><name>.bundles`,
/// then as `<dir>/<name>.bundles`.
pub struct AtlasLoader<'s, S: BundleStore + ?Sized> {
    store: &'s S,
    file_prefix: String,
    point_count: usize,
}

impl<'s, S: BundleStore + ?Sized> AtlasLoader<'s, S> {
    /// Create a loader expecting `point_count` points per reference fiber.
    pub fn new(store: &'s S, point_count: usize) -> Self {
        Self {
            store,
            file_prefix: "atlas_".to_string(),
            point_count,
        }
    }

    /// Override the bundle file prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Candidate bundle paths for a label, in lookup order.
    pub fn candidate_paths(&self, atlas_dir: &Path, label: &str) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(2);
        if !self.file_prefix.is_empty() {
            paths.push(atlas_dir.join(format!("{}{label}.{HEADER_EXTENSION}", self.file_prefix)));
        }
        paths.push(atlas_dir.join(format!("{label}.{HEADER_EXTENSION}")));
        paths
    }

    /// Resolve the bundle file for a label.
    pub fn resolve(&self, atlas_dir: &Path, label: &str) -> Result<PathBuf, AtlasError> {
        let candidates = self.candidate_paths(atlas_dir, label);
        candidates
            .iter()
            .find(|p| self.store.exists(p))
            .cloned()
            .ok_or_else(|| {
                let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
                AtlasError::format(label, format!("no bundle file found (tried {})", tried.join(", ")))
            })
    }

    /// Load and validate the whole atlas.
    ///
    /// Every error is raised here, before any classification starts.
    pub fn load(&self, atlas_dir: &Path, info_path: &Path) -> Result<Atlas, AtlasError> {
        let span = info_span!("atlas_load", atlas_dir = %atlas_dir.display());
        let _guard = span.enter();
        let start = Instant::now();

        let info = AtlasInfo::parse(&self.store.read_text(info_path)?)?;
        if info.is_empty() {
            return Err(AtlasError::Empty);
        }

        let mut labels = Vec::with_capacity(info.len());
        for entry in &info.entries {
            // Cheap checks first so a bad threshold is reported without I/O
            if !entry.threshold.is_finite() || entry.threshold < 0.0 {
                return Err(AtlasError::Threshold {
                    label: entry.name.clone(),
                    threshold: entry.threshold,
                });
            }

            let path = self.resolve(atlas_dir, &entry.name)?;
            let references = self.store.read_bundle(&path)?;
            debug!(
                label = %entry.name,
                path = %path.display(),
                fibers = references.len(),
                expected = entry.expected_size,
                "Loaded atlas bundle"
            );

            labels.push(AtlasLabel::new(
                entry.name.clone(),
                entry.threshold,
                entry.expected_size,
                references,
                self.point_count,
            )?);
        }

        let atlas = Atlas::new(labels)?;
        info!(
            labels = atlas.len(),
            point_count = atlas.point_count(),
            fingerprint = atlas.fingerprint(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Atlas loaded"
        );
        Ok(atlas)
    }
}
