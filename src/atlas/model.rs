//! Validated, immutable atlas model.

use serde::Serialize;

use super::AtlasError;
use crate::canonical::{bundle_hash, canonical_hash_hex, quantize};
use crate::config::MatchPolicy;
use crate::types::{Bundle, LabelId, Polyline};

/// One labeled reference bundle of the atlas.
#[derive(Debug, Clone)]
pub struct AtlasLabel {
    name: String,
    threshold: f64,
    expected_size: usize,
    references: Bundle,
    centroid: Polyline,
}

impl AtlasLabel {
    /// Build a label from its reference fibers.
    ///
    /// Fails with [`AtlasError::Threshold`] for a negative or non-finite
    /// threshold and [`AtlasError::Format`] when the reference set is empty
    /// or any fiber does not have exactly `point_count` points.
    pub fn new(
        name: impl Into<String>,
        threshold: f64,
        expected_size: usize,
        references: Bundle,
        point_count: usize,
    ) -> Result<Self, AtlasError> {
        let name = name.into();

        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AtlasError::Threshold {
                label: name,
                threshold,
            });
        }
        if references.is_empty() {
            return Err(AtlasError::format(&name, "reference bundle has no fibers"));
        }
        if let Some((fiber, found)) = references.first_mismatch(point_count) {
            return Err(AtlasError::format(
                &name,
                format!("reference fiber {fiber} has {found} points, expected {point_count}"),
            ));
        }

        let centroid = Polyline::mean(references.iter())
            .ok_or_else(|| AtlasError::format(&name, "cannot compute centroid"))?;

        Ok(Self {
            name,
            threshold,
            expected_size,
            references,
            centroid,
        })
    }

    /// Build a label whose only reference fiber is `centroid`.
    pub fn from_centroid(name: impl Into<String>, threshold: f64, centroid: Polyline) -> Result<Self, AtlasError> {
        let k = centroid.len();
        Self::new(name, threshold, 1, vec![centroid].into(), k)
    }

    /// Label name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assignment threshold (inclusive).
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Expected fiber count hint from the info file.
    pub fn expected_size(&self) -> usize {
        self.expected_size
    }

    /// Reference fibers, K points each.
    pub fn references(&self) -> &Bundle {
        &self.references
    }

    /// Point-wise mean of the reference fibers.
    pub fn centroid(&self) -> &Polyline {
        &self.centroid
    }

    /// Point count of every reference fiber.
    pub fn point_count(&self) -> usize {
        self.centroid.len()
    }

    /// The fibers a subject fiber is compared against under `policy`.
    pub fn representatives(&self, policy: MatchPolicy) -> &[Polyline] {
        match policy {
            MatchPolicy::Centroid => std::slice::from_ref(&self.centroid),
            MatchPolicy::FullReference => self.references.fibers(),
        }
    }
}

/// Ordered, name-unique collection of atlas labels.
///
/// Constructed once, validated, then shared read-only (it is `Sync`) by all
/// classification workers.
#[derive(Debug, Clone)]
pub struct Atlas {
    labels: Vec<AtlasLabel>,
    point_count: usize,
    fingerprint: String,
}

#[derive(Serialize)]
struct LabelFingerprintInput<'a> {
    name: &'a str,
    threshold: i64,
    expected_size: usize,
    reference_count: usize,
    references: String,
    centroid: Vec<[i64; 3]>,
}

impl Atlas {
    /// Build an atlas from labels in load order.
    ///
    /// Fails when there are no labels, a name repeats, or labels disagree on
    /// the point count.
    pub fn new(labels: Vec<AtlasLabel>) -> Result<Self, AtlasError> {
        let first = labels.first().ok_or(AtlasError::Empty)?;
        let point_count = first.point_count();

        for (i, label) in labels.iter().enumerate() {
            if labels[..i].iter().any(|l| l.name == label.name) {
                return Err(AtlasError::DuplicateLabel(label.name.clone()));
            }
            if label.point_count() != point_count {
                return Err(AtlasError::format(
                    &label.name,
                    format!(
                        "reference fibers have {} points, atlas uses {point_count}",
                        label.point_count()
                    ),
                ));
            }
        }

        let fingerprint_input: Vec<LabelFingerprintInput<'_>> = labels
            .iter()
            .map(|l| LabelFingerprintInput {
                name: &l.name,
                threshold: quantize(l.threshold),
                expected_size: l.expected_size,
                reference_count: l.references.len(),
                references: bundle_hash(&l.references),
                centroid: l
                    .centroid
                    .points()
                    .iter()
                    .map(|p| {
                        [
                            quantize(f64::from(p.x)),
                            quantize(f64::from(p.y)),
                            quantize(f64::from(p.z)),
                        ]
                    })
                    .collect(),
            })
            .collect();
        let fingerprint = canonical_hash_hex(&(point_count, fingerprint_input));

        Ok(Self {
            labels,
            point_count,
            fingerprint,
        })
    }

    /// Labels in load order.
    pub fn labels(&self) -> &[AtlasLabel] {
        &self.labels
    }

    /// Labels paired with their ids, in load order.
    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &AtlasLabel)> {
        self.labels.iter().enumerate().map(|(i, l)| (LabelId::new(i), l))
    }

    /// Label by id.
    pub fn get(&self, id: LabelId) -> Option<&AtlasLabel> {
        self.labels.get(id.index())
    }

    /// Label by name.
    pub fn find(&self, name: &str) -> Option<(LabelId, &AtlasLabel)> {
        self.iter().find(|(_, l)| l.name == name)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a constructed atlas.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Canonical point count K of all reference fibers.
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    /// Content hash over names, thresholds, sizes, reference fibers and centroids.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}
