//! Segmentation artifacts: index lists, bundles, centroids and manifest.
//!
//! ```text
//! <output>/
//!   idx_bundles/<label>.txt
//!   final_bundles/<subject>_to_<label>.bundles
//!   final_bundles_<K>p/<subject>_to_<label>.bundles
//!   centroids/<subject>_to_<label>.bundles
//!   segmentation_manifest.json
//! ```
//!
//! Labels without fibers produce no files.

pub mod manifest;
pub mod writer;

pub use manifest::{ArtifactPaths, LabelArtifacts, ManifestBuilder, SegmentationManifest};
pub use writer::{format_index_list, parse_index_list, ArtifactWriter};

use crate::io::BundleIoError;

/// Error type for artifact writing.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Writing a file failed.
    #[error(transparent)]
    Bundle(#[from] BundleIoError),
    /// The manifest could not be serialized.
    #[error("Manifest serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
