//! Content manager: search directories and overlay resolution.
//!
//! Scans search roots for `Content.inf` definition files, registers the
//! parsed descriptors, and answers `get_path` queries from a lazily
//! rebuilt resolution cache.
//!
//! # Overlay precedence
//!
//! The rebuild walks enabled directories in **descending** depth order
//! and inserts non-explicit paths only when the key is absent. The first
//! directory visited is the deepest, so by default deeper content wins a
//! collision, the opposite of what layered-overlay systems usually do.
//! This is intentional, long-standing behavior that saved games and mods
//! rely on: a directory that wants its file to win declares it under
//! `Retain`, which overwrites unconditionally.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::node;

use super::cache::PathCache;
use super::dir::DEFINITION_FILENAME;
use super::parser;
use super::registry::Registry;

struct State {
    search_paths: BTreeSet<PathBuf>,
    registry: Registry,
    cache: PathCache,
    /// Set by enable/disable; the next read rebuilds the cache.
    dirty: bool,
}

/// Owner of the content directory registry and resolution cache.
///
/// Plain value over a shared [`node::Manager`]; the process-wide instance
/// lives behind [`init_content_manager`] / [`content_manager`].
pub struct Manager {
    nodes: Arc<node::Manager>,
    state: Mutex<State>,
}

impl Manager {
    /// Create a manager with no search directories.
    pub fn new(nodes: Arc<node::Manager>) -> Self {
        Self {
            nodes,
            state: Mutex::new(State {
                search_paths: BTreeSet::new(),
                registry: Registry::new(),
                cache: PathCache::new(),
                dirty: false,
            }),
        }
    }

    /// Create a manager and scan an initial search directory.
    pub fn with_search_dir(search_dir: impl Into<PathBuf>, nodes: Arc<node::Manager>) -> Self {
        let manager = Self::new(nodes);
        manager.add_search_dir(search_dir);
        manager
    }

    /// The search roots scanned so far.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        self.state.lock().search_paths.iter().cloned().collect()
    }

    /// Scan `path` recursively for `Content.inf` files and register every
    /// parsed descriptor. Repeating a search path is a silent no-op.
    pub fn add_search_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut state = self.state.lock();
        if !state.search_paths.insert(path.clone()) {
            return;
        }

        let definition_files = self.nodes.paths_in_dir_matching(
            &path,
            |candidate| {
                self.nodes.is_regular_file(candidate)
                    && candidate.file_name() == Some(OsStr::new(DEFINITION_FILENAME))
            },
            true,
        );

        for definition_file in definition_files {
            let outcome = match parser::parse_definition_file(&definition_file) {
                Ok(outcome) => outcome,
                Err(source) => {
                    error!(target: "vfs", error = %source, "skipping definition file");
                    continue;
                }
            };

            for parse_error in &outcome.errors {
                error!(target: "vfs", error = %parse_error, "definition parse error");
            }

            let containing_dir = definition_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            for mut dir in outcome.dirs {
                dir.set_path(containing_dir.clone());
                let label = dir.label().to_string();
                match state.registry.add(dir) {
                    Ok(()) => {
                        debug!(
                            target: "vfs",
                            label = %label,
                            path = %containing_dir.display(),
                            "registered content directory"
                        );
                    }
                    Err(source) => {
                        error!(target: "vfs", error = %source, "skipping content directory");
                    }
                }
            }
        }
    }

    /// Every registered label in ascending depth order.
    pub fn all_labels(&self) -> Vec<String> {
        self.state.lock().registry.all_labels()
    }

    /// Labels filtered by enabled state, in ascending depth order. Runs
    /// full validation first, so directories with lapsed prerequisites
    /// drop out of the enabled view.
    pub fn get_labels(&self, enabled: bool) -> Vec<String> {
        self.state.lock().registry.labels_filtered(enabled)
    }

    /// Enable a directory by label. Refused (and logged) when validation
    /// fails; the descriptor then stays disabled.
    pub fn enable(&self, label: &str) {
        let mut state = self.state.lock();
        match state.registry.enable(label) {
            Ok(true) => state.dirty = true,
            Ok(false) => {}
            Err(source) => {
                warn!(target: "vfs", label = %label, error = %source, "directory did not validate");
            }
        }
    }

    /// Disable a directory by label. Enabled dependents are caught by the
    /// next validation pass.
    pub fn disable(&self, label: &str) {
        let mut state = self.state.lock();
        match state.registry.disable(label) {
            Ok(true) => state.dirty = true,
            Ok(false) => {}
            Err(source) => {
                error!(target: "vfs", label = %label, error = %source, "cannot disable");
            }
        }
    }

    /// Resolve a relative path against the current overlay. The query is
    /// normalized before lookup. Returns an empty path when no enabled
    /// directory claims it.
    pub fn get_path(&self, relative_path: &Path) -> PathBuf {
        let mut state = self.state.lock();
        if state.registry.is_empty() {
            error!(target: "vfs", "no content directories");
            return PathBuf::new();
        }

        self.refresh_cache(&mut state);
        let normal = crate::path::normalize(relative_path);
        state.cache.get(normal.as_path())
    }

    /// Rebuild the resolution map when flagged dirty.
    fn refresh_cache(&self, state: &mut State) {
        if !state.dirty {
            return;
        }
        state.dirty = false;

        state.registry.validate_all();
        state.cache.clear();

        let State {
            registry, cache, ..
        } = state;

        for dir in registry.dirs_by_descending_depth() {
            if !dir.enabled() {
                continue;
            }

            for absolute in self.nodes.paths_in_dir(dir.path(), true) {
                let relative = self.nodes.path_portion_from(&absolute, dir.path());
                if relative.as_os_str().is_empty() {
                    warn!(
                        target: "vfs",
                        path = %absolute.display(),
                        dir = %dir.label(),
                        "skipping path outside its directory"
                    );
                    continue;
                }

                if dir.is_explicit(&relative) {
                    cache.insert_or_assign(relative, absolute);
                } else {
                    cache.insert(relative, absolute);
                }
            }
        }

        debug!(target: "vfs", entries = cache.len(), "rebuilt resolution cache");
    }
}

//      ##      Singleton accessors         ##

static CONTENT_MANAGER: OnceLock<Manager> = OnceLock::new();

/// Establish the process-wide content manager.
///
/// The first call must provide a non-empty search directory and creates
/// the manager over the global path node graph. Later calls log a
/// diagnostic and return the existing instance without re-initializing.
///
/// # Panics
///
/// Panics when `search_dir` is empty.
pub fn init_content_manager(search_dir: impl Into<PathBuf>) -> &'static Manager {
    let search_dir = search_dir.into();
    assert!(
        !search_dir.as_os_str().is_empty(),
        "content manager requires a non-empty search directory"
    );

    let mut created = false;
    let manager = CONTENT_MANAGER.get_or_init(|| {
        created = true;
        trace!(target: "vfs", "created content manager");
        Manager::with_search_dir(&search_dir, node::Manager::global().clone())
    });
    if !created {
        error!(
            target: "vfs",
            path = %search_dir.display(),
            "content manager previously initialized"
        );
    }
    manager
}

/// The process-wide content manager.
///
/// # Panics
///
/// Panics when [`init_content_manager`] has not run yet.
pub fn content_manager() -> &'static Manager {
    CONTENT_MANAGER
        .get()
        .expect("content manager not initialized")
}

/// The process-wide content manager, or `None` before initialization.
pub fn try_content_manager() -> Option<&'static Manager> {
    CONTENT_MANAGER.get()
}
