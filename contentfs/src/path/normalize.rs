//! Path normalization.
//!
//! Produces the canonical form used as the identity key throughout the
//! node graph: `.` elements are dropped, `..` consumes one following
//! non-`..` element, the relative-root marker is dropped (but remembered
//! in the result's flag), and empty fragments disappear. Results are
//! memoized in a bounded in-memory cache since normalization sits on the
//! hot path of every lookup during content enumeration.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use moka::sync::Cache;
use tracing::warn;

use super::element::RELATIVE_ROOT_TOKEN;

/// Maximum number of memoized normalization entries.
///
/// Enumerating a large content tree normalizes every discovered path, so
/// the table is bounded rather than grow-forever. 4096 entries covers a
/// full rebuild of a typical content set without eviction churn.
pub const NORMALIZE_CACHE_CAPACITY: u64 = 4096;

/// A path in canonical form.
///
/// Obtained from [`normalize`]. Carries the reduced path plus whether the
/// input was anchored at the relative-root marker (the marker itself is
/// dropped from the reduced path).
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use contentfs::path::normalize;
///
/// let n = normalize(Path::new("a/./b/../c"));
/// assert_eq!(n.as_path(), Path::new("a/c"));
/// assert!(!n.is_relative_rooted());
///
/// let r = normalize(Path::new("*?/foo"));
/// assert_eq!(r.as_path(), Path::new("foo"));
/// assert!(r.is_relative_rooted());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    path: PathBuf,
    relative: bool,
}

impl NormalizedPath {
    /// The reduced path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Consume into the reduced path.
    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }

    /// Whether the input was anchored at the relative-root marker.
    pub fn is_relative_rooted(&self) -> bool {
        self.relative
    }

    /// Whether the reduced path is empty.
    pub fn is_empty(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

fn memo() -> &'static Cache<PathBuf, NormalizedPath> {
    static MEMO: OnceLock<Cache<PathBuf, NormalizedPath>> = OnceLock::new();
    MEMO.get_or_init(|| Cache::new(NORMALIZE_CACHE_CAPACITY))
}

/// Reduce a path to canonical form.
///
/// Fragments are visited in reverse. A `..` consumes the next real
/// fragment toward the front; more `..` than real fragments collapses to
/// the empty path, which is not an error. `.` and empty fragments are
/// skipped. The relative-root marker is skipped and recorded in the
/// result. Windows-style root prefixes are preserved verbatim and are
/// never consumed by `..`.
///
/// An empty input normalizes to itself with a warning.
pub fn normalize(path: &Path) -> NormalizedPath {
    if path.as_os_str().is_empty() {
        warn!(target: "vfs", "attempt to normalize empty path");
        return NormalizedPath {
            path: PathBuf::new(),
            relative: false,
        };
    }

    if let Some(hit) = memo().get(path) {
        return hit;
    }

    let mut pending_dot_dot = 0usize;
    let mut relative = false;
    // Kept fragments, rear-to-front.
    let mut kept: Vec<&OsStr> = Vec::new();

    for component in path.components().rev() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => pending_dot_dot += 1,
            Component::Normal(text) if text == OsStr::new(RELATIVE_ROOT_TOKEN) => {
                relative = true;
            }
            Component::Prefix(_) => kept.push(component.as_os_str()),
            _ => {
                if pending_dot_dot > 0 {
                    pending_dot_dot -= 1;
                } else {
                    kept.push(component.as_os_str());
                }
            }
        }
    }

    let mut reduced = PathBuf::new();
    for fragment in kept.iter().rev() {
        reduced.push(fragment);
    }

    let result = NormalizedPath {
        path: reduced,
        relative,
    };
    memo().insert(path.to_path_buf(), result.clone());
    result
}

/// Free-function form of [`normalize`] returning just the reduced path.
pub fn normalized_path(path: &Path) -> PathBuf {
    normalize(path).into_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_dot_elements() {
        assert_eq!(
            normalize(Path::new("a/./b/../c")).as_path(),
            Path::new("a/c")
        );
        assert_eq!(normalize(Path::new("./a/b")).as_path(), Path::new("a/b"));
    }

    #[test]
    fn test_normalize_dot_dot_consumes_one_element() {
        assert_eq!(normalize(Path::new("a/b/..")).as_path(), Path::new("a"));
        assert_eq!(
            normalize(Path::new("a/b/../../c")).as_path(),
            Path::new("c")
        );
    }

    #[test]
    fn test_normalize_excess_dot_dot_collapses_to_empty() {
        assert!(normalize(Path::new("a/../..")).is_empty());
        assert!(normalize(Path::new("..")).is_empty());
    }

    #[test]
    fn test_normalize_relative_marker() {
        let n = normalize(Path::new("*?/foo"));
        assert_eq!(n.as_path(), Path::new("foo"));
        assert!(n.is_relative_rooted());

        let plain = normalize(Path::new("foo/bar"));
        assert!(!plain.is_relative_rooted());
    }

    #[test]
    fn test_normalize_empty_path_is_identity() {
        let n = normalize(Path::new(""));
        assert!(n.is_empty());
        assert!(!n.is_relative_rooted());
    }

    #[test]
    fn test_normalize_preserves_absolute_root() {
        assert_eq!(
            normalize(Path::new("/usr/share/../lib")).as_path(),
            Path::new("/usr/lib")
        );
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in ["a/./b/../c", "/x/y/z", "*?/data/../foo", "a//b"] {
            let once = normalize(Path::new(input));
            let twice = normalize(once.as_path());
            assert_eq!(once.as_path(), twice.as_path(), "input {input:?}");
        }
    }

    #[test]
    fn test_normalize_collapses_repeated_separators() {
        assert_eq!(normalize(Path::new("a//b")).as_path(), Path::new("a/b"));
    }

    #[test]
    fn test_normalized_path_free_function() {
        assert_eq!(normalized_path(Path::new("a/./b")), PathBuf::from("a/b"));
    }
}
