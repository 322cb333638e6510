//! Atlas: labeled reference bundles with per-label thresholds.
//!
//! An atlas is built once from a directory of bundle files plus an info
//! file, validated eagerly, and then passed by reference to the classifier.
//!
//! ```text
//! atlas_info.txt ─┐
//!                 ├─→ AtlasLoader → AtlasLabel (centroid) × N → Atlas
//! atlas_dir/*.bundles ─┘
//! ```

pub mod info;
pub mod model;
pub mod loader;

// Re-exports
pub use info::{AtlasInfo, AtlasInfoEntry};
pub use model::{Atlas, AtlasLabel};
pub use loader::AtlasLoader;

use crate::io::BundleIoError;

/// Error type for atlas loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    /// Syntax error in the atlas info file.
    #[error("Atlas info line {line}: {message}")]
    Info {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },
    /// Inconsistency between a label and its bundle file.
    #[doc(alias = "AtlasFormatError")]
    #[error("Atlas format error for label `{label}`: {message}")]
    Format {
        /// The offending label.
        label: String,
        /// What was wrong.
        message: String,
    },
    /// A label's threshold is negative or not finite.
    #[doc(alias = "ThresholdError")]
    #[error("Invalid threshold {threshold} for label `{label}`: must be a non-negative number")]
    Threshold {
        /// The offending label.
        label: String,
        /// The rejected value.
        threshold: f64,
    },
    /// Two records share a label name.
    #[error("Duplicate atlas label `{0}`")]
    DuplicateLabel(String),
    /// The info file lists no labels.
    #[error("Atlas has no labels")]
    Empty,
    /// Reading the info file or a bundle failed.
    #[error(transparent)]
    Bundle(#[from] BundleIoError),
}

impl AtlasError {
    /// Create a format error for a label.
    pub fn format(label: &str, message: impl Into<String>) -> Self {
        Self::Format {
            label: label.to_string(),
            message: message.into(),
        }
    }

    /// Create an info syntax error.
    pub fn info(line: usize, message: impl Into<String>) -> Self {
        Self::Info {
            line,
            message: message.into(),
        }
    }
}
