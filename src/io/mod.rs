//! Bundle storage backends.
//!
//! Everything the segmentation pipeline reads or writes goes through a
//! [`BundleStore`]: tractography bundles, the atlas info file, index lists
//! and the run manifest. The file backend speaks the BrainVISA `.bundles`
//! format; the in-memory backend is used by tests.

pub mod bundles;
pub mod memory;

use std::path::{Path, PathBuf};

use crate::types::Bundle;

/// Error type for bundle storage operations.
#[derive(Debug, thiserror::Error)]
pub enum BundleIoError {
    /// The target does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Underlying I/O failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },
    /// The file exists but does not follow the bundle format.
    #[error("Malformed bundle file {}: {message}", .path.display())]
    Format {
        /// File being decoded.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },
}

impl BundleIoError {
    /// Wrap an I/O error, mapping `NotFound` to its own variant.
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Create a format error.
    pub fn format(path: &Path, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Trait for bundle storage backends.
///
/// Implementations must return fibers in stored order and overwrite
/// existing targets on write.
pub trait BundleStore: Send + Sync {
    /// Read an ordered sequence of fibers.
    fn read_bundle(&self, path: &Path) -> Result<Bundle, BundleIoError>;

    /// Write an ordered sequence of fibers, creating or overwriting the target.
    fn write_bundle(&self, path: &Path, bundle: &Bundle) -> Result<(), BundleIoError>;

    /// Read a text file (atlas info).
    fn read_text(&self, path: &Path) -> Result<String, BundleIoError>;

    /// Write a text file (index lists, manifest).
    fn write_text(&self, path: &Path, contents: &str) -> Result<(), BundleIoError>;

    /// Whether a bundle or text file exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Remove a bundle (both files) or text file. Removing a missing target is not an error.
    fn remove(&self, path: &Path) -> Result<(), BundleIoError>;
}

pub use bundles::FileBundleStore;
pub use memory::InMemoryBundleStore;
