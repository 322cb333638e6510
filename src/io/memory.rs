//! In-memory bundle store for testing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::bundles::header_path;
use super::{BundleIoError, BundleStore};
use crate::types::Bundle;

#[derive(Debug, Clone)]
enum Entry {
    Bundle(Bundle),
    Text(String),
}

/// In-memory bundle store for testing.
///
/// Bundle paths are normalized to their `.bundles` header path, so reading
/// `x.bundlesdata` finds a bundle written as `x.bundles`. Uses a BTreeMap
/// for deterministic iteration order.
#[derive(Debug, Default)]
pub struct InMemoryBundleStore {
    entries: RwLock<BTreeMap<PathBuf, Entry>>,
}

impl InMemoryBundleStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a bundle (builder style, for test setup).
    pub fn with_bundle(self, path: impl AsRef<Path>, bundle: Bundle) -> Self {
        self.entries
            .write()
            .insert(header_path(path.as_ref()), Entry::Bundle(bundle));
        self
    }

    /// Insert a text file (builder style, for test setup).
    pub fn with_text(self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.entries
            .write()
            .insert(path.as_ref().to_path_buf(), Entry::Text(contents.into()));
        self
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.read().keys().cloned().collect()
    }

    /// Stored paths under a directory, sorted.
    pub fn paths_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.entries
            .read()
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl BundleStore for InMemoryBundleStore {
    fn read_bundle(&self, path: &Path) -> Result<Bundle, BundleIoError> {
        let key = header_path(path);
        match self.entries.read().get(&key) {
            Some(Entry::Bundle(bundle)) => Ok(bundle.clone()),
            Some(Entry::Text(_)) => Err(BundleIoError::format(path, "entry is a text file")),
            None => Err(BundleIoError::NotFound(key)),
        }
    }

    fn write_bundle(&self, path: &Path, bundle: &Bundle) -> Result<(), BundleIoError> {
        self.entries
            .write()
            .insert(header_path(path), Entry::Bundle(bundle.clone()));
        Ok(())
    }

    fn read_text(&self, path: &Path) -> Result<String, BundleIoError> {
        match self.entries.read().get(path) {
            Some(Entry::Text(text)) => Ok(text.clone()),
            Some(Entry::Bundle(_)) => Err(BundleIoError::format(path, "entry is a bundle")),
            None => Err(BundleIoError::NotFound(path.to_path_buf())),
        }
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<(), BundleIoError> {
        self.entries
            .write()
            .insert(path.to_path_buf(), Entry::Text(contents.to_string()));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let entries = self.entries.read();
        entries.contains_key(path) || entries.contains_key(&header_path(path))
    }

    fn remove(&self, path: &Path) -> Result<(), BundleIoError> {
        let mut entries = self.entries.write();
        if entries.remove(path).is_none() {
            if let Some(Entry::Bundle(_)) = entries.get(&header_path(path)) {
                entries.remove(&header_path(path));
            }
        }
        Ok(())
    }
}
