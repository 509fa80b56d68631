//! Shared path nodes.
//!
//! A [`PathNode`] represents one normalized path as an element chained to
//! its parent node. The chain is shared: two paths with a common parent
//! point at the same parent node, and a root's element can be reassigned
//! after construction so every node beneath it observes the new location
//! without any rewriting.
//!
//! Write permission is inherited downward and monotonic: once a node (or
//! any ancestor) permits writes, the node reports writable for the rest
//! of its lifetime. Setting the flag on a child can never revoke
//! permission granted higher up the chain.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::path::{is_invalid_sentinel, is_relative_marker, PathElement, RELATIVE_ROOT_TOKEN};

use super::status::FileStatus;

/// Structural role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A potential directory.
    Directory,
    /// A potential regular file.
    File,
    /// A labeled, parentless directory whose element may be reassigned.
    Root,
}

impl NodeKind {
    /// Roots are directories too.
    pub fn is_directory(&self) -> bool {
        matches!(self, NodeKind::Directory | NodeKind::Root)
    }
}

/// One element in the shared path graph.
///
/// The assembled [`path`](PathNode::path) is the concatenation of the
/// parent chain's elements; relative-root markers are skipped during
/// assembly. Nodes are handed out as `Arc<PathNode>` by the
/// [`Manager`](super::Manager) and deduplicated by normalized path.
#[derive(Debug)]
pub struct PathNode {
    /// Element fragment; a full absolute path for roots, a single
    /// fragment otherwise. Mutable so roots can be relocated.
    element: RwLock<PathBuf>,
    parent: Option<Arc<PathNode>>,
    kind: NodeKind,
    /// Present on roots only.
    label: Option<String>,
    allow_writes: AtomicBool,
    status_cache: Mutex<Option<FileStatus>>,
}

impl PathNode {
    fn new(
        element: PathBuf,
        parent: Option<Arc<PathNode>>,
        allow_writes: bool,
        kind: NodeKind,
        label: Option<String>,
    ) -> Self {
        let inherited = parent.as_ref().map_or(false, |p| p.writable());
        Self {
            element: RwLock::new(element),
            parent,
            kind,
            label,
            allow_writes: AtomicBool::new(allow_writes || inherited),
            status_cache: Mutex::new(None),
        }
    }

    pub(crate) fn new_dir(
        element: PathBuf,
        parent: Option<Arc<PathNode>>,
        allow_writes: bool,
    ) -> Self {
        Self::new(element, parent, allow_writes, NodeKind::Directory, None)
    }

    pub(crate) fn new_file(
        element: PathBuf,
        parent: Option<Arc<PathNode>>,
        allow_writes: bool,
    ) -> Self {
        Self::new(element, parent, allow_writes, NodeKind::File, None)
    }

    pub(crate) fn new_root(label: String, element: PathBuf, allow_writes: bool) -> Self {
        Self::new(element, None, allow_writes, NodeKind::Root, Some(label))
    }

    /// Shared anchor for paths rooted at the relative marker.
    pub(crate) fn new_relative_anchor() -> Self {
        Self::new(
            PathBuf::from(RELATIVE_ROOT_TOKEN),
            None,
            false,
            NodeKind::Directory,
            None,
        )
    }

    /// Whether this node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The parent node, if any.
    pub fn parent(&self) -> Option<&Arc<PathNode>> {
        self.parent.as_ref()
    }

    /// Structural role of this node.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The root label, present on labeled roots only.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// This node's own element fragment.
    pub fn element(&self) -> PathBuf {
        self.element.read().clone()
    }

    pub(crate) fn set_element(&self, element: PathBuf) {
        if element.as_os_str().is_empty() {
            return;
        }
        *self.element.write() = element;
    }

    /// The assembled path: the concatenation of the parent chain's
    /// elements, with relative-root markers skipped.
    pub fn path(&self) -> PathBuf {
        let mut assembled = self.parent.as_ref().map(|p| p.path()).unwrap_or_default();
        let element = self.element.read();
        if !element.as_os_str().is_empty() && !is_relative_marker(&element) {
            assembled.push(element.as_path());
        }
        assembled
    }

    /// Whether this node is, or stems from, the relative-root marker.
    /// Relativity is inherited from the chain's top.
    pub fn is_relative(&self) -> bool {
        match &self.parent {
            Some(parent) => parent.is_relative(),
            None => is_relative_marker(&self.element.read()),
        }
    }

    /// The top of this node's chain, or `None` for relative chains.
    pub fn root(self: Arc<Self>) -> Option<Arc<PathNode>> {
        if self.is_relative() {
            return None;
        }
        let mut current = self;
        while let Some(parent) = current.parent.clone() {
            current = parent;
        }
        Some(current)
    }

    /// Whether `ancestor` appears in this node's parent chain. Compared
    /// by assembled path, so a relocated root still matches.
    pub fn has_ancestor(&self, ancestor: &Arc<PathNode>) -> bool {
        let target = ancestor.path();
        let mut current = self.parent.clone();
        while let Some(node) = current {
            if node.path() == target {
                return true;
            }
            current = node.parent.clone();
        }
        false
    }

    /// The fragment that, appended to `base`, yields this node's path.
    ///
    /// Returns an empty path when this node's path *is* `base`, and the
    /// invalid sentinel when the chain never passes through `base`.
    pub fn portion_from(&self, base: &Path) -> PathBuf {
        if self.path() == base {
            return PathBuf::new();
        }

        let element = self.element.read().clone();
        if is_relative_marker(&element) {
            return PathElement::DotDot.to_path();
        }

        match &self.parent {
            Some(parent) => {
                let mut portion = parent.portion_from(base);
                if is_invalid_sentinel(&portion) {
                    return portion;
                }
                portion.push(&element);
                portion
            }
            None => PathElement::Invalid.to_path(),
        }
    }

    /// Whether this node (or an ancestor) permits writes. A `true`
    /// answer is cached on the node; permission is monotonic for the
    /// chain's lifetime.
    pub fn writable(&self) -> bool {
        if self.allow_writes.load(Ordering::Relaxed) {
            return true;
        }
        if self.parent.as_ref().map_or(false, |p| p.writable()) {
            self.allow_writes.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Set this node's own write flag. Permission already granted by an
    /// ancestor is preserved regardless of `allow_writes`.
    pub fn set_writable(&self, allow_writes: bool) {
        let inherited = self.parent.as_ref().map_or(false, |p| p.writable());
        self.allow_writes
            .store(allow_writes || inherited, Ordering::Relaxed);
    }

    /// Last observed filesystem status for the assembled path.
    ///
    /// Returns the cached status when present; otherwise probes the disk
    /// once and caches the answer. Relative nodes never probe.
    pub fn status(&self) -> FileStatus {
        if self.is_relative() {
            return (*self.status_cache.lock()).unwrap_or(FileStatus::Unknown);
        }

        let mut cache = self.status_cache.lock();
        if let Some(status) = *cache {
            return status;
        }
        let status = FileStatus::probe(&self.path());
        *cache = Some(status);
        status
    }

    /// Whether the assembled path currently exists on disk. Relative
    /// nodes always report `false`.
    pub fn exists(&self) -> bool {
        if self.is_relative() {
            debug!(
                target: "vfs",
                path = %self.path().display(),
                "existence query on relative path"
            );
            return false;
        }
        self.status().exists()
    }

    /// Record a status observed out-of-band (directory iteration).
    pub(crate) fn prime_status(&self, status: FileStatus) {
        *self.status_cache.lock() = Some(status);
    }

    /// Drop the cached status so the next query re-probes.
    pub(crate) fn clear_status(&self) {
        *self.status_cache.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Arc<PathNode>, Arc<PathNode>, Arc<PathNode>) {
        let root = Arc::new(PathNode::new_root(
            "data".to_string(),
            PathBuf::from("/data"),
            false,
        ));
        let dir = Arc::new(PathNode::new_dir(
            PathBuf::from("scripting"),
            Some(root.clone()),
            false,
        ));
        let file = Arc::new(PathNode::new_file(
            PathBuf::from("foo.txt"),
            Some(dir.clone()),
            false,
        ));
        (root, dir, file)
    }

    #[test]
    fn test_path_assembles_parent_chain() {
        let (root, dir, file) = chain();
        assert_eq!(root.path(), PathBuf::from("/data"));
        assert_eq!(dir.path(), PathBuf::from("/data/scripting"));
        assert_eq!(file.path(), PathBuf::from("/data/scripting/foo.txt"));
    }

    #[test]
    fn test_root_reassignment_is_observed_by_children() {
        let (root, _dir, file) = chain();
        root.set_element(PathBuf::from("/mnt/game"));
        assert_eq!(file.path(), PathBuf::from("/mnt/game/scripting/foo.txt"));
    }

    #[test]
    fn test_set_element_ignores_empty() {
        let (root, _, _) = chain();
        root.set_element(PathBuf::new());
        assert_eq!(root.path(), PathBuf::from("/data"));
    }

    #[test]
    fn test_relative_chain() {
        let anchor = Arc::new(PathNode::new_relative_anchor());
        let node = Arc::new(PathNode::new_dir(
            PathBuf::from("foo"),
            Some(anchor.clone()),
            false,
        ));
        assert!(anchor.is_relative());
        assert!(node.is_relative());
        // Marker elements are skipped during assembly.
        assert_eq!(node.path(), PathBuf::from("foo"));
        // Relative nodes never probe and never exist.
        assert!(!node.exists());
        assert_eq!(node.status(), FileStatus::Unknown);
        assert!(node.root().is_none());
    }

    #[test]
    fn test_root_of_chain() {
        let (root, _dir, file) = chain();
        let top = file.root().unwrap();
        assert_eq!(top.path(), root.path());
        assert!(top.is_root());
    }

    #[test]
    fn test_has_ancestor() {
        let (root, dir, file) = chain();
        assert!(file.has_ancestor(&root));
        assert!(file.has_ancestor(&dir));
        assert!(dir.has_ancestor(&root));
        assert!(!root.has_ancestor(&dir));
        assert!(!file.has_ancestor(&file));
    }

    #[test]
    fn test_portion_from() {
        let (_root, _dir, file) = chain();
        assert_eq!(
            file.portion_from(Path::new("/data")),
            PathBuf::from("scripting/foo.txt")
        );
        assert_eq!(
            file.portion_from(Path::new("/data/scripting")),
            PathBuf::from("foo.txt")
        );
        assert_eq!(
            file.portion_from(Path::new("/data/scripting/foo.txt")),
            PathBuf::new()
        );
    }

    #[test]
    fn test_portion_from_uncontained_is_invalid() {
        let (_root, _dir, file) = chain();
        let portion = file.portion_from(Path::new("/elsewhere"));
        assert!(is_invalid_sentinel(&portion));
    }

    #[test]
    fn test_write_permission_inherited() {
        let root = Arc::new(PathNode::new_root(
            "w".to_string(),
            PathBuf::from("/w"),
            true,
        ));
        let child = Arc::new(PathNode::new_dir(
            PathBuf::from("save"),
            Some(root.clone()),
            false,
        ));
        assert!(child.writable());
    }

    #[test]
    fn test_write_permission_monotonic() {
        let root = Arc::new(PathNode::new_root(
            "w".to_string(),
            PathBuf::from("/w"),
            true,
        ));
        let child = Arc::new(PathNode::new_dir(
            PathBuf::from("save"),
            Some(root.clone()),
            false,
        ));
        assert!(child.writable());
        // Clearing the child's own flag cannot revoke what the root grants.
        child.set_writable(false);
        assert!(child.writable());
    }

    #[test]
    fn test_write_permission_lazy_propagation() {
        let root = Arc::new(PathNode::new_root(
            "w".to_string(),
            PathBuf::from("/w"),
            false,
        ));
        let child = Arc::new(PathNode::new_dir(
            PathBuf::from("save"),
            Some(root.clone()),
            false,
        ));
        assert!(!child.writable());
        // Permission granted to the root after the child was built is
        // still observed through the chain.
        root.set_writable(true);
        assert!(child.writable());
    }

    #[test]
    fn test_node_kind_directory() {
        assert!(NodeKind::Directory.is_directory());
        assert!(NodeKind::Root.is_directory());
        assert!(!NodeKind::File.is_directory());
    }
}
