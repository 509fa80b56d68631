//! The path node graph.
//!
//! Hands out one [`PathNode`] per normalized path, building missing
//! ancestors on the way and anchoring chains at registered roots. The
//! container is guarded by a mutex because directory iteration may be
//! driven from I/O helper threads while the rest of the process queries
//! paths.
//!
//! # Keys and root relocation
//!
//! Nodes are indexed by the normalized path under which they were
//! inserted. When a root is relocated with [`Manager::set_root_path`],
//! every node beneath it assembles the new location automatically, but
//! index keys of already-inserted descendants are not rewritten;
//! [`Manager::emplace_try`] detects the mismatch on access, evicts the
//! stale entry, and materializes a fresh chain.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{error, trace, warn};

use crate::path::{classify, is_relative_marker, normalize, NormalizedPath, PathElement};

use super::path_node::PathNode;
use super::status::FileStatus;

struct Graph {
    /// Labeled roots.
    roots: HashMap<String, Arc<PathNode>>,
    /// All nodes, keyed by normalized path at insertion time.
    nodes: BTreeMap<PathBuf, Arc<PathNode>>,
    /// Shared chain anchor for relative-marker paths, built on demand.
    relative_anchor: Option<Arc<PathNode>>,
}

/// Deduplicating manager for the path node graph.
///
/// Plain value, constructible anywhere (tests build their own); the
/// process-wide instance lives behind [`Manager::global`].
pub struct Manager {
    inner: Mutex<Graph>,
}

impl Manager {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Graph {
                roots: HashMap::new(),
                nodes: BTreeMap::new(),
                relative_anchor: None,
            }),
        }
    }

    /// The process-wide graph, created on first access.
    pub fn global() -> &'static Arc<Manager> {
        static GLOBAL: OnceLock<Arc<Manager>> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            trace!(target: "vfs", "created path node manager");
            Arc::new(Manager::new())
        })
    }

    /// Register a labeled root.
    ///
    /// The root's element may be the relative marker `*?` when the real
    /// location is not known yet; assign it later with
    /// [`set_root_path`](Manager::set_root_path). Re-registering an
    /// existing label keeps the original root.
    pub fn init_root(&self, label: impl Into<String>, path: impl Into<PathBuf>, allow_writes: bool) {
        let label = label.into();
        let path = path.into();

        let mut graph = self.inner.lock();
        if graph.roots.contains_key(&label) {
            warn!(target: "vfs", label = %label, "root already registered, keeping existing");
            return;
        }

        let element = if is_relative_marker(&path) {
            path
        } else {
            normalize(&path).into_path_buf()
        };
        let root = Arc::new(PathNode::new_root(label.clone(), element, allow_writes));

        let key = root.path();
        if !key.as_os_str().is_empty() {
            graph.nodes.insert(key, root.clone());
        }
        trace!(target: "vfs", label = %label, path = %root.path().display(), "registered root");
        graph.roots.insert(label, root);
    }

    /// Reassign a registered root's underlying path. All nodes chained
    /// through the root observe the change on their next query.
    pub fn set_root_path(&self, label: &str, path: impl Into<PathBuf>) {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return;
        }

        let mut graph = self.inner.lock();
        let Some(root) = graph.roots.get(label).cloned() else {
            error!(target: "vfs", label = %label, "no root registered for label");
            return;
        };

        let element = normalize(&path).into_path_buf();
        if element.as_os_str().is_empty() {
            warn!(target: "vfs", label = %label, path = %path.display(), "root path normalized to empty");
            return;
        }

        let old_key = root.path();
        if let Some(existing) = graph.nodes.get(&old_key) {
            if Arc::ptr_eq(existing, &root) {
                graph.nodes.remove(&old_key);
            }
        }

        root.set_element(element.clone());
        root.clear_status();
        graph.nodes.insert(element, root);
    }

    /// Look up a registered root by label.
    pub fn root(&self, label: &str) -> Option<Arc<PathNode>> {
        self.inner.lock().roots.get(label).cloned()
    }

    /// Find an existing node. Keyed by normalized path; `.` and `..`
    /// inputs never resolve.
    pub fn find(&self, path: &Path) -> Option<Arc<PathNode>> {
        if path.as_os_str().is_empty() {
            return None;
        }
        match classify(path) {
            PathElement::Dot | PathElement::DotDot => return None,
            _ => {}
        }

        let normal = normalize(path);
        if normal.is_empty() {
            return None;
        }
        self.inner.lock().nodes.get(normal.as_path()).cloned()
    }

    /// Return the node for `path`, creating it and any missing ancestors
    /// if necessary. Ancestor construction stops at a registered root
    /// whose path is a prefix of the input.
    pub fn emplace(&self, path: &Path) -> Option<Arc<PathNode>> {
        if path.as_os_str().is_empty() {
            error!(target: "vfs", "passed empty path");
            return None;
        }

        let normal = normalize(path);
        if normal.is_empty() {
            warn!(target: "vfs", path = %path.display(), "path normalized to empty");
            return None;
        }

        let mut graph = self.inner.lock();
        if let Some(node) = graph.nodes.get(normal.as_path()) {
            return Some(node.clone());
        }
        insert_path(&mut graph, &normal, false)
    }

    /// Like [`emplace`](Manager::emplace), but also applies a write flag.
    ///
    /// If a node is already indexed under the normalized key but its
    /// assembled path no longer matches (its root moved), the stale entry
    /// is evicted and a fresh chain is built.
    pub fn emplace_try(&self, path: &Path, allow_writes: bool) -> Option<Arc<PathNode>> {
        if path.as_os_str().is_empty() {
            error!(target: "vfs", "passed empty path");
            return None;
        }

        let normal = normalize(path);
        if normal.is_empty() {
            warn!(target: "vfs", path = %path.display(), "path normalized to empty");
            return None;
        }

        let mut graph = self.inner.lock();
        if let Some(node) = graph.nodes.get(normal.as_path()).cloned() {
            if node.path() == normal.as_path() {
                node.set_writable(allow_writes);
                return Some(node);
            }
            graph.nodes.remove(normal.as_path());
        }
        insert_path(&mut graph, &normal, allow_writes)
    }

    /// Enumerate on-disk entries under `dir_path`, inserting a node for
    /// each discovered entry and returning their absolute paths. `.` and
    /// `..` are excluded; directory symlinks are not followed.
    pub fn iterate_directory(&self, dir_path: &Path, recursive: bool) -> Vec<PathBuf> {
        let mut found = Vec::new();

        let Some(dir_node) = self.emplace(dir_path) else {
            error!(target: "vfs", path = %dir_path.display(), "failed to retrieve directory node");
            return found;
        };
        if !dir_node.kind().is_directory() {
            error!(target: "vfs", path = %dir_path.display(), "not a directory node");
            return found;
        }

        self.scan_directory(&dir_node.path(), recursive, &mut found);
        found
    }

    fn scan_directory(&self, dir: &Path, recursive: bool, found: &mut Vec<PathBuf>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %dir.display(),
                    error = %source,
                    "filesystem error during directory iteration"
                );
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    error!(
                        target: "vfs",
                        path = %dir.display(),
                        error = %source,
                        "filesystem error reading directory entry"
                    );
                    continue;
                }
            };

            let path = entry.path();
            let status = entry
                .file_type()
                .map(FileStatus::from_file_type)
                .unwrap_or(FileStatus::Unknown);

            if let Some(node) = self.emplace(&path) {
                node.prime_status(status);
            }
            found.push(path.clone());

            if recursive && status.is_dir() {
                self.scan_directory(&path, recursive, found);
            }
        }
    }

    /// Evict the node indexed under `path`.
    pub fn reset(&self, path: &Path) {
        let normal = normalize(path);
        self.inner.lock().nodes.remove(normal.as_path());
    }

    /// Evict every node. Registered roots stay addressable by label and
    /// re-anchor chains built afterwards.
    pub fn reset_all(&self) {
        self.inner.lock().nodes.clear();
    }

    /// Number of indexed nodes; test and diagnostics aid.
    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

fn relative_anchor(graph: &mut Graph) -> Arc<PathNode> {
    graph
        .relative_anchor
        .get_or_insert_with(|| Arc::new(PathNode::new_relative_anchor()))
        .clone()
}

/// Build the chain for `normal`, reusing roots and already-indexed
/// prefixes. The final element becomes a file node when the disk says so,
/// a directory node otherwise; the node exists either way.
fn insert_path(
    graph: &mut Graph,
    normal: &NormalizedPath,
    allow_writes: bool,
) -> Option<Arc<PathNode>> {
    let elements: Vec<PathBuf> = normal
        .as_path()
        .components()
        .map(|component| PathBuf::from(component.as_os_str()))
        .collect();
    if elements.is_empty() {
        warn!(target: "vfs", "path had no elements");
        return None;
    }

    let relative = normal.is_relative_rooted();
    let mut parent: Option<Arc<PathNode>> = relative.then(|| relative_anchor(graph));

    // Locate the deepest registered root whose current path is a prefix
    // of the input; everything up to it is anchored at the root and only
    // the tail is materialized. Roots are matched by assembled path, so a
    // relocated root anchors new chains at its new location.
    let mut key = PathBuf::new();
    let mut start = 0usize;
    if !relative {
        let root_paths: Vec<(PathBuf, Arc<PathNode>)> = graph
            .roots
            .values()
            .map(|root| (root.path(), root.clone()))
            .collect();

        let mut prefix = PathBuf::new();
        for (index, element) in elements.iter().enumerate() {
            prefix.push(element);
            if let Some((_, root)) = root_paths.iter().find(|(path, _)| path == &prefix) {
                parent = Some(root.clone());
                start = index + 1;
                key = prefix.clone();
            }
        }
        if start == elements.len() {
            // The input is exactly a root path.
            return parent;
        }
    }

    let last_index = elements.len() - 1;
    for (index, element) in elements.iter().enumerate().skip(start) {
        key.push(element);
        let is_last = index == last_index;

        if let Some(existing) = graph.nodes.get(&key) {
            let existing = existing.clone();
            if is_last {
                existing.set_writable(allow_writes);
            }
            parent = Some(existing);
            continue;
        }

        let node = if is_last {
            let status = if relative {
                FileStatus::Unknown
            } else {
                FileStatus::probe(&key)
            };
            if status.is_file() {
                Arc::new(PathNode::new_file(
                    element.clone(),
                    parent.clone(),
                    allow_writes,
                ))
            } else {
                Arc::new(PathNode::new_dir(
                    element.clone(),
                    parent.clone(),
                    allow_writes,
                ))
            }
        } else {
            Arc::new(PathNode::new_dir(element.clone(), parent.clone(), false))
        };
        graph.nodes.insert(key.clone(), node.clone());
        parent = Some(node);
    }

    parent
}
