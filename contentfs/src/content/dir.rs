//! Content directory descriptors.
//!
//! A [`ContentDir`] describes one on-disk subtree contributing files to
//! the overlayed namespace: its unique label, version, prerequisite
//! directories (with optional minimum versions), and the relative paths
//! it claims as non-overlayable overrides.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::version::ContentVersion;

/// Name of the definition file marking a content directory's top.
pub const DEFINITION_FILENAME: &str = "Content.inf";

/// Descriptor for one layered content directory.
///
/// Created by the definition parser with an empty `path` (the caller
/// fills in the definition file's containing directory) and registered
/// disabled at depth zero; the registry computes the real depth during
/// validation.
///
/// # Example
///
/// ```
/// use std::collections::{BTreeMap, BTreeSet};
/// use contentfs::content::ContentDir;
///
/// let mut requires = BTreeMap::new();
/// requires.insert("base".to_string(), "1.0.0".to_string());
///
/// let dir = ContentDir::new(
///     "mod",
///     "An example mod",
///     "0.2.0",
///     requires,
///     BTreeSet::new(),
/// );
///
/// assert_eq!(dir.label(), "mod");
/// assert!(!dir.enabled());
/// assert_eq!(dir.depth(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ContentDir {
    /// Absolute location of the directory; empty until assigned.
    path: PathBuf,
    label: String,
    description: String,
    version: ContentVersion,
    /// Prerequisite label to minimum version string; an empty string
    /// accepts any version.
    requires: BTreeMap<String, String>,
    /// Relative paths this directory claims as overrides.
    explicit_paths: BTreeSet<PathBuf>,
    enabled: bool,
    /// One greater than the maximum depth of prerequisites, zero if none.
    depth: usize,
}

impl ContentDir {
    pub fn new(
        label: impl Into<String>,
        description: impl Into<String>,
        version: &str,
        requires: BTreeMap<String, String>,
        explicit_paths: BTreeSet<PathBuf>,
    ) -> Self {
        Self {
            path: PathBuf::new(),
            label: label.into(),
            description: description.into(),
            version: ContentVersion::parse(version),
            requires,
            explicit_paths,
            enabled: false,
            depth: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn version(&self) -> &ContentVersion {
        &self.version
    }

    pub fn requires(&self) -> &BTreeMap<String, String> {
        &self.requires
    }

    pub fn explicit_paths(&self) -> &BTreeSet<PathBuf> {
        &self.explicit_paths
    }

    /// Whether this directory claims `path` as an override.
    pub fn is_explicit(&self, path: &Path) -> bool {
        self.explicit_paths.contains(path)
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Flip the enabled flag. Returns whether the state changed.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        true
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(label: &str) -> ContentDir {
        ContentDir::new(label, "", "1.0.0", BTreeMap::new(), BTreeSet::new())
    }

    #[test]
    fn test_new_starts_disabled_at_depth_zero() {
        let dir = plain("base");
        assert!(!dir.enabled());
        assert_eq!(dir.depth(), 0);
        assert!(dir.path().as_os_str().is_empty());
    }

    #[test]
    fn test_set_enabled_reports_change() {
        let mut dir = plain("base");
        assert!(dir.set_enabled(true));
        assert!(!dir.set_enabled(true));
        assert!(dir.set_enabled(false));
        assert!(!dir.set_enabled(false));
    }

    #[test]
    fn test_is_explicit() {
        let mut paths = BTreeSet::new();
        paths.insert(PathBuf::from("a/b.txt"));
        let dir = ContentDir::new("mod", "", "1.0.0", BTreeMap::new(), paths);

        assert!(dir.is_explicit(Path::new("a/b.txt")));
        assert!(!dir.is_explicit(Path::new("a/c.txt")));
    }

    #[test]
    fn test_version_parsed_on_construction() {
        let dir = plain("base");
        assert_eq!(dir.version().major, 1);
    }

    #[test]
    fn test_set_path() {
        let mut dir = plain("base");
        dir.set_path("/content/base");
        assert_eq!(dir.path(), Path::new("/content/base"));
    }
}
