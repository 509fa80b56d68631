//! contentfs - layered content-directory virtual filesystem.
//!
//! Presents a single read-mostly namespace assembled from overlayed
//! on-disk content directories (base assets, mods, patches). Each
//! directory declares a label, a version, prerequisite directories, and
//! the paths it retains as overrides; the crate resolves a relative path
//! like `scripting/species/foo.txt` to the absolute path winning under
//! the currently enabled layers.
//!
//! # Architecture
//!
//! - [`path`]: element classification and memoized normalization; every
//!   lookup key in the crate is a normalized path.
//! - [`node`]: the deduplicated, parent-linked path node graph with
//!   labeled relocatable roots, write-permission inheritance, and cached
//!   filesystem status. Filesystem helper operations live on
//!   [`node::Manager`].
//! - [`content`]: `Content.inf` parsing, the multi-indexed directory
//!   registry with dependency validation, and the resolution cache.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use contentfs::content::init_content_manager;
//!
//! let manager = init_content_manager("/opt/game/content");
//! manager.enable("base");
//!
//! let absolute = manager.get_path(Path::new("scripting/species/foo.txt"));
//! if absolute.as_os_str().is_empty() {
//!     eprintln!("no enabled directory provides that file");
//! }
//! ```

pub mod content;
pub mod node;
mod ops;
pub mod path;

use std::sync::Arc;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The process-wide path node manager.
///
/// Convenience accessor over [`node::Manager::global`]; prefer holding a
/// manager value and threading it through call sites where practical.
pub fn vfs_manager() -> Arc<node::Manager> {
    node::Manager::global().clone()
}
