//! Segmentation configuration.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Floats are quantized to integers before hashing (×1e6, rounded to i64),
//! so `params_hash` is stable across platforms and serializer versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::canonical::{canonical_hash_hex, quantize};
use crate::DEFAULT_POINT_COUNT;

/// Which atlas fibers a subject fiber is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// One centroid per label: O(1) comparisons per label.
    #[default]
    Centroid,
    /// Every reference fiber of a label; the label distance is the minimum.
    FullReference,
}

impl MatchPolicy {
    /// Parse policy from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "centroid" => Some(Self::Centroid),
            "full_reference" | "full" => Some(Self::FullReference),
            _ => None,
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Centroid => write!(f, "centroid"),
            Self::FullReference => write!(f, "full_reference"),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Cannot read config {path}: {source}")]
    Io {
        /// Config file path.
        path: String,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid JSON for [`SegmentConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Segmentation run configuration.
///
/// ## Parameters
///
/// - `point_count`: canonical point count K every fiber is resampled to
/// - `match_policy`: centroid-only or full reference set matching
/// - `tie_tolerance`: labels closer than this are considered tied; the
///   earlier label in atlas order wins
/// - `parallel`: classify and aggregate on the rayon thread pool
/// - `chunk_size`: fibers per classification work unit
/// - `write_canonical_bundles`: also write K-point segmented bundles
/// - `write_manifest`: write `segmentation_manifest.json`
/// - `atlas_file_prefix`: prefix of atlas bundle file names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Canonical point count K.
    pub point_count: usize,
    /// Representative set used per label.
    pub match_policy: MatchPolicy,
    /// Distance tolerance for tie-breaking.
    pub tie_tolerance: f64,
    /// Whether to use the thread pool.
    pub parallel: bool,
    /// Fibers per work unit.
    pub chunk_size: usize,
    /// Write the K-point copies of segmented bundles.
    pub write_canonical_bundles: bool,
    /// Write the run manifest.
    pub write_manifest: bool,
    /// Atlas bundle file prefix (`atlas_` → `atlas_<label>.bundles`).
    pub atlas_file_prefix: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            point_count: DEFAULT_POINT_COUNT,
            match_policy: MatchPolicy::Centroid,
            tie_tolerance: 1e-6,
            parallel: true,
            chunk_size: 4096,
            write_canonical_bundles: true,
            write_manifest: true,
            atlas_file_prefix: "atlas_".to_string(),
        }
    }
}

/// Quantized parameters that determine classification output.
#[derive(Serialize)]
struct QuantizedSegmentParams<'a> {
    point_count: usize,
    match_policy: MatchPolicy,
    tie_tolerance: i64,
    atlas_file_prefix: &'a str,
}

impl SegmentConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.point_count < 2 {
            return Err(ConfigError::Invalid(format!(
                "point_count must be at least 2, got {}",
                self.point_count
            )));
        }
        if !self.tie_tolerance.is_finite() || self.tie_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tie_tolerance must be a non-negative finite number, got {}",
                self.tie_tolerance
            )));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Hash of the parameters that affect which fiber lands in which label.
    ///
    /// Execution knobs (`parallel`, `chunk_size`, output toggles) are
    /// excluded: they never change the result.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&QuantizedSegmentParams {
            point_count: self.point_count,
            match_policy: self.match_policy,
            tie_tolerance: quantize(self.tie_tolerance),
            atlas_file_prefix: &self.atlas_file_prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SegmentConfig::default();
        assert_eq!(config.point_count, 21);
        assert_eq!(config.match_policy, MatchPolicy::Centroid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SegmentConfig =
            serde_json::from_str(r#"{ "match_policy": "full_reference", "parallel": false }"#).unwrap();
        assert_eq!(config.match_policy, MatchPolicy::FullReference);
        assert!(!config.parallel);
        assert_eq!(config.point_count, 21);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SegmentConfig {
            point_count: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SegmentConfig {
            tie_tolerance: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_params_hash_ignores_execution_knobs() {
        let a = SegmentConfig::default();
        let b = SegmentConfig {
            parallel: false,
            chunk_size: 7,
            write_manifest: false,
            ..Default::default()
        };
        let c = SegmentConfig {
            match_policy: MatchPolicy::FullReference,
            ..Default::default()
        };

        assert_eq!(a.params_hash(), b.params_hash());
        assert_ne!(a.params_hash(), c.params_hash());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(MatchPolicy::from_str("full-reference"), Some(MatchPolicy::FullReference));
        assert_eq!(MatchPolicy::from_str("Centroid"), Some(MatchPolicy::Centroid));
        assert_eq!(MatchPolicy::from_str("medoid"), None);
    }
}
