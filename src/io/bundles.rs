//! BrainVISA `.bundles` / `.bundlesdata` file backend.
//!
//! A bundle on disk is a pair of files sharing a stem:
//!
//! ```text
//! subject.bundles       text header: attributes = { 'curves_count' : N, ... }
//! subject.bundlesdata   N records of: i32 point count, count × (f32 x, f32 y, f32 z)
//! ```
//!
//! All binary values are little-endian (`'byte_order' : 'DCBA'`).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BundleIoError, BundleStore};
use crate::types::{Bundle, Point3, Polyline};

/// Extension of the header file.
pub const HEADER_EXTENSION: &str = "bundles";

/// Extension of the binary data file.
pub const DATA_EXTENSION: &str = "bundlesdata";

const POINT_BYTES: usize = 3 * std::mem::size_of::<f32>();

/// Header path for a bundle path given with either extension.
pub fn header_path(path: &Path) -> PathBuf {
    path.with_extension(HEADER_EXTENSION)
}

/// Data path for a bundle path given with either extension.
pub fn data_path(path: &Path) -> PathBuf {
    path.with_extension(DATA_EXTENSION)
}

/// Render the text header for a bundle of `curves_count` fibers.
pub fn encode_header(curves_count: usize) -> String {
    format!(
        "attributes = {{\n    'binary' : 1,\n    'bundles' : [ 'points', 0 ],\n    'byte_order' : 'DCBA',\n    'curves_count' : {curves_count},\n    'data_file_name' : '*.{DATA_EXTENSION}',\n    'format' : 'bundles_1.0',\n    'space_dimension' : 3\n  }}\n"
    )
}

/// Extract `curves_count` from a header, if present.
pub fn parse_curves_count(header: &str) -> Option<usize> {
    let start = header.find("'curves_count'")? + "'curves_count'".len();
    let rest = header[start..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Encode fibers into the binary record layout.
pub fn encode_data(bundle: &Bundle) -> Vec<u8> {
    let mut out = Vec::with_capacity(bundle.len() * 4 + bundle.total_points() * POINT_BYTES);
    for fiber in bundle {
        out.extend_from_slice(&(fiber.len() as i32).to_le_bytes());
        for p in fiber.points() {
            out.extend_from_slice(&p.x.to_le_bytes());
            out.extend_from_slice(&p.y.to_le_bytes());
            out.extend_from_slice(&p.z.to_le_bytes());
        }
    }
    out
}

/// Decode the binary record layout.
///
/// `expected` is the header's `curves_count`; when present the record count
/// must match it exactly. `path` is only used in error messages.
pub fn decode_data(bytes: &[u8], expected: Option<usize>, path: &Path) -> Result<Bundle, BundleIoError> {
    // Each record takes at least 4 + POINT_BYTES bytes
    let max_records = bytes.len() / (4 + POINT_BYTES);
    let mut bundle = Bundle::with_capacity(expected.unwrap_or(0).min(max_records));
    let mut offset = 0usize;

    while offset < bytes.len() {
        let fiber = bundle.len();
        let count_bytes = read_array::<4>(bytes, offset).ok_or_else(|| {
            BundleIoError::format(path, format!("truncated point count for fiber {fiber}"))
        })?;
        offset += 4;

        let count = i32::from_le_bytes(count_bytes);
        if count <= 0 {
            return Err(BundleIoError::format(
                path,
                format!("fiber {fiber} has non-positive point count {count}"),
            ));
        }
        let count = count as usize;

        let needed = count * POINT_BYTES;
        if bytes.len() - offset < needed {
            return Err(BundleIoError::format(
                path,
                format!("fiber {fiber} declares {count} points but the data ends early"),
            ));
        }

        let mut points = Vec::with_capacity(count);
        for chunk in bytes[offset..offset + needed].chunks_exact(POINT_BYTES) {
            let coord = |i: usize| f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]]);
            points.push(Point3::new(coord(0), coord(4), coord(8)));
        }
        offset += needed;

        // count > 0, so the polyline is never empty
        if let Some(polyline) = Polyline::new(points) {
            bundle.push(polyline);
        }
    }

    if let Some(expected) = expected {
        if expected != bundle.len() {
            return Err(BundleIoError::format(
                path,
                format!("header declares {expected} curves, data holds {}", bundle.len()),
            ));
        }
    }

    Ok(bundle)
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    bytes.get(offset..offset + N)?.try_into().ok()
}

/// Bundle store over the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBundleStore;

impl FileBundleStore {
    /// Create a file store.
    pub fn new() -> Self {
        Self
    }
}

fn ensure_parent(path: &Path) -> Result<(), BundleIoError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| BundleIoError::from_io(parent, e))
        }
        _ => Ok(()),
    }
}

impl BundleStore for FileBundleStore {
    fn read_bundle(&self, path: &Path) -> Result<Bundle, BundleIoError> {
        let header_file = header_path(path);
        let header = fs::read_to_string(&header_file)
            .map_err(|e| BundleIoError::from_io(&header_file, e))?;
        let expected = parse_curves_count(&header);

        let data_file = data_path(path);
        let bytes = fs::read(&data_file).map_err(|e| BundleIoError::from_io(&data_file, e))?;
        let bundle = decode_data(&bytes, expected, &data_file)?;

        debug!(path = %header_file.display(), fibers = bundle.len(), "Read bundle");
        Ok(bundle)
    }

    fn write_bundle(&self, path: &Path, bundle: &Bundle) -> Result<(), BundleIoError> {
        let header_file = header_path(path);
        let data_file = data_path(path);
        ensure_parent(&header_file)?;

        fs::write(&header_file, encode_header(bundle.len()))
            .map_err(|e| BundleIoError::from_io(&header_file, e))?;
        fs::write(&data_file, encode_data(bundle))
            .map_err(|e| BundleIoError::from_io(&data_file, e))?;

        debug!(path = %header_file.display(), fibers = bundle.len(), "Wrote bundle");
        Ok(())
    }

    fn read_text(&self, path: &Path) -> Result<String, BundleIoError> {
        fs::read_to_string(path).map_err(|e| BundleIoError::from_io(path, e))
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<(), BundleIoError> {
        ensure_parent(path)?;
        fs::write(path, contents).map_err(|e| BundleIoError::from_io(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        if path.extension().and_then(|e| e.to_str()) == Some(HEADER_EXTENSION) {
            header_path(path).is_file() && data_path(path).is_file()
        } else {
            path.is_file()
        }
    }

    fn remove(&self, path: &Path) -> Result<(), BundleIoError> {
        let targets = if path.extension().and_then(|e| e.to_str()) == Some(HEADER_EXTENSION) {
            vec![header_path(path), data_path(path)]
        } else {
            vec![path.to_path_buf()]
        };
        for target in targets {
            match fs::remove_file(&target) {
                Ok(()) => debug!(path = %target.display(), "Removed file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(BundleIoError::from_io(&target, e)),
            }
        }
        Ok(())
    }
}
