//! Resolution cache.
//!
//! The map from normalized relative paths to the absolute path winning
//! under the current overlay. The manager rebuilds it lazily: deeper
//! directories are walked first, explicit paths overwrite, everything
//! else is first-writer-wins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Relative-to-absolute path map for the active overlay.
#[derive(Debug, Default)]
pub struct PathCache {
    paths: BTreeMap<PathBuf, PathBuf>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The absolute path resolved for `relative_path`, or an empty path
    /// when no enabled directory claims it.
    pub fn get(&self, relative_path: &Path) -> PathBuf {
        match self.paths.get(relative_path) {
            Some(absolute) => absolute.clone(),
            None => {
                warn!(
                    target: "vfs",
                    path = %relative_path.display(),
                    "path not found"
                );
                PathBuf::new()
            }
        }
    }

    /// Insert only when the key is absent. Returns whether an insert
    /// happened.
    pub fn insert(&mut self, relative_path: PathBuf, absolute_path: PathBuf) -> bool {
        if self.paths.contains_key(&relative_path) {
            return false;
        }
        self.paths.insert(relative_path, absolute_path);
        true
    }

    /// Insert or overwrite; explicit paths always win.
    pub fn insert_or_assign(&mut self, relative_path: PathBuf, absolute_path: PathBuf) {
        self.paths.insert(relative_path, absolute_path);
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Snapshot of the whole map, for tests and diagnostics.
    pub fn entries(&self) -> Vec<(PathBuf, PathBuf)> {
        self.paths
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_is_empty_sentinel() {
        let cache = PathCache::new();
        assert_eq!(cache.get(Path::new("a/b.txt")), PathBuf::new());
    }

    #[test]
    fn test_insert_respects_existing() {
        let mut cache = PathCache::new();
        assert!(cache.insert(PathBuf::from("a"), PathBuf::from("/one/a")));
        assert!(!cache.insert(PathBuf::from("a"), PathBuf::from("/two/a")));
        assert_eq!(cache.get(Path::new("a")), PathBuf::from("/one/a"));
    }

    #[test]
    fn test_insert_or_assign_overwrites() {
        let mut cache = PathCache::new();
        cache.insert(PathBuf::from("a"), PathBuf::from("/one/a"));
        cache.insert_or_assign(PathBuf::from("a"), PathBuf::from("/two/a"));
        assert_eq!(cache.get(Path::new("a")), PathBuf::from("/two/a"));
    }

    #[test]
    fn test_clear() {
        let mut cache = PathCache::new();
        cache.insert(PathBuf::from("a"), PathBuf::from("/one/a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
