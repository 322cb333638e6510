//! Atlas info descriptor parsing.
//!
//! One record per line, whitespace separated:
//!
//! ```text
//! # label        threshold  expected_size
//! lh_AR_ANT      8          1500
//! lh_CST         10.5       3200.0
//! ```
//!
//! `expected_size` is informational and may be omitted or written as a
//! float. Blank lines and `#` comments are ignored.

use serde::{Deserialize, Serialize};

use super::AtlasError;

/// One label record from the atlas info file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasInfoEntry {
    /// Label name; also names the label's bundle file.
    pub name: String,
    /// Maximum distance for a fiber to be assigned to this label.
    pub threshold: f64,
    /// Typical fiber count of the label (not enforced).
    pub expected_size: usize,
}

/// Parsed atlas info file, in file order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AtlasInfo {
    /// Label records in file order.
    pub entries: Vec<AtlasInfoEntry>,
}

impl AtlasInfo {
    /// Parse the text of an atlas info file.
    ///
    /// Only syntax is checked here; threshold ranges and duplicate names are
    /// validated when the [`Atlas`](super::Atlas) is built.
    pub fn parse(text: &str) -> Result<Self, AtlasError> {
        let mut entries = Vec::new();

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let line_no = line_no + 1;

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 2 || fields.len() > 3 {
                return Err(AtlasError::info(
                    line_no,
                    format!("expected `name threshold [expected_size]`, found {} field(s)", fields.len()),
                ));
            }

            let name = fields[0];
            if !is_plain_name(name) {
                return Err(AtlasError::info(
                    line_no,
                    format!("label name `{name}` must be a plain file name (no path separators, not `.` or `..`)"),
                ));
            }
            let name = name.to_string();
            let threshold: f64 = fields[1].parse().map_err(|_| {
                AtlasError::info(line_no, format!("threshold `{}` is not a number", fields[1]))
            })?;

            let expected_size = match fields.get(2) {
                None => 0,
                Some(raw) => parse_size(raw).ok_or_else(|| {
                    AtlasError::info(line_no, format!("expected size `{raw}` is not a count"))
                })?,
            };

            entries.push(AtlasInfoEntry {
                name,
                threshold,
                expected_size,
            });
        }

        Ok(Self { entries })
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the file listed no labels.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Label names become file names under the atlas and output directories.
fn is_plain_name(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn parse_size(raw: &str) -> Option<usize> {
    if let Ok(n) = raw.parse::<usize>() {
        return Some(n);
    }
    let f: f64 = raw.parse().ok()?;
    (f.is_finite() && f >= 0.0).then(|| f.trunc() as usize)
}
