//! Filesystem operations routed through the path node graph.
//!
//! These are the helpers the rest of the game consumes. Every operation
//! resolves its argument to a [`PathNode`](crate::node::PathNode) first,
//! so status answers are cached and write permission is enforced through
//! the node chain. Per the crate's error policy, query operations never
//! fail: they log at warn/error level and return sentinel values (`false`,
//! `None`, an empty list, an empty path). Write operations additionally
//! refuse relative paths and non-writable chains.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{error, trace, warn};

use crate::node::Manager;
use crate::path::{is_invalid_sentinel, normalized_path};

/// UTF-8 byte order mark, stripped from text reads.
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

impl Manager {
    /// Whether `lhs` is lexically contained by `rhs`. Both sides are
    /// compared through their normalized node chains.
    pub fn path_contained_by(&self, lhs: &Path, rhs: &Path) -> bool {
        let Some(lhs_node) = self.emplace(lhs) else {
            error!(target: "vfs", path = %lhs.display(), "failed to get path node");
            return false;
        };
        let Some(rhs_node) = self.emplace(rhs) else {
            error!(target: "vfs", path = %rhs.display(), "failed to get path node");
            return false;
        };
        lhs_node.has_ancestor(&rhs_node)
    }

    /// The portion of `path` after `base_dir`, or an empty path when
    /// `path` is not contained by `base_dir`.
    pub fn path_portion_from(&self, path: &Path, base_dir: &Path) -> PathBuf {
        let Some(node) = self.emplace(path) else {
            error!(target: "vfs", path = %path.display(), "failed to get path node");
            return PathBuf::new();
        };

        let portion = node.portion_from(&normalized_path(base_dir));
        if is_invalid_sentinel(&portion) {
            warn!(
                target: "vfs",
                path = %node.path().display(),
                base = %base_dir.display(),
                "path not contained by base"
            );
            return PathBuf::new();
        }
        portion
    }

    /// Whether `path` exists on the filesystem. Relative paths report
    /// `false` without probing.
    pub fn exists(&self, path: &Path) -> bool {
        let Some(node) = self.emplace(path) else {
            error!(target: "vfs", path = %path.display(), "no path node returned");
            return false;
        };
        node.exists()
    }

    /// Whether `path` exists and is a directory.
    pub fn is_directory(&self, path: &Path) -> bool {
        self.emplace(path)
            .map_or(false, |node| node.exists() && node.status().is_dir())
    }

    /// Whether `path` exists and is a regular file.
    pub fn is_regular_file(&self, path: &Path) -> bool {
        self.emplace(path)
            .map_or(false, |node| node.exists() && node.status().is_file())
    }

    /// Whether `path` is empty: a directory with no entries, or a regular
    /// file of zero length. Missing paths report `false`.
    pub fn is_empty(&self, path: &Path) -> bool {
        let Some(node) = self.emplace(path) else {
            error!(target: "vfs", path = %path.display(), "failed to get path node");
            return false;
        };
        if !node.exists() {
            return false;
        }

        let abs = node.path();
        if node.status().is_dir() {
            match std::fs::read_dir(&abs) {
                Ok(mut entries) => entries.next().is_none(),
                Err(source) => {
                    error!(
                        target: "vfs",
                        path = %abs.display(),
                        error = %source,
                        "filesystem error during access"
                    );
                    false
                }
            }
        } else {
            match std::fs::metadata(&abs) {
                Ok(metadata) => metadata.len() == 0,
                Err(source) => {
                    error!(
                        target: "vfs",
                        path = %abs.display(),
                        error = %source,
                        "filesystem error during access"
                    );
                    false
                }
            }
        }
    }

    /// Last modification time for `path`, or `None` when the path does
    /// not exist or the probe fails.
    pub fn last_write_time(&self, path: &Path) -> Option<SystemTime> {
        if !self.exists(path) {
            return None;
        }
        match std::fs::metadata(path).and_then(|metadata| metadata.modified()) {
            Ok(modified) => Some(modified),
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %path.display(),
                    error = %source,
                    "filesystem error during access"
                );
                None
            }
        }
    }

    /// All paths contained in a directory, excluding `.` and `..`.
    pub fn paths_in_dir(&self, abs_dir_path: &Path, recursive: bool) -> Vec<PathBuf> {
        self.iterate_directory(abs_dir_path, recursive)
    }

    /// All paths contained in a directory which satisfy `pred`.
    pub fn paths_in_dir_matching(
        &self,
        abs_dir_path: &Path,
        pred: impl Fn(&Path) -> bool,
        recursive: bool,
    ) -> Vec<PathBuf> {
        self.iterate_directory(abs_dir_path, recursive)
            .into_iter()
            .filter(|path| pred(path))
            .collect()
    }

    /// All regular files contained in a directory, optionally filtered by
    /// extension (without the leading dot, compared case-insensitively).
    ///
    /// A relative `dir_path` is resolved through the content manager when
    /// one is initialized, so game code can enumerate resource-relative
    /// directories like `scripting/species`.
    pub fn files_in_dir(
        &self,
        dir_path: &Path,
        recursive: bool,
        extension: Option<&str>,
    ) -> Vec<PathBuf> {
        let resolved = if dir_path.is_relative() {
            match crate::content::try_content_manager() {
                Some(content) => {
                    let mapped = content.get_path(dir_path);
                    if mapped.as_os_str().is_empty() {
                        dir_path.to_path_buf()
                    } else {
                        mapped
                    }
                }
                None => dir_path.to_path_buf(),
            }
        } else {
            dir_path.to_path_buf()
        };

        let Some(node) = self.emplace(&resolved) else {
            error!(target: "vfs", path = %dir_path.display(), "failed to get path node");
            return Vec::new();
        };
        if !(node.exists() && node.status().is_dir()) {
            trace!(target: "vfs", path = %node.path().display(), "ignoring: not a directory");
            return Vec::new();
        }

        let pred = |file: &Path| -> bool {
            let included = self.is_regular_file(file)
                && extension.map_or(true, |wanted| {
                    file.extension()
                        .map_or(false, |ext| ext.eq_ignore_ascii_case(wanted))
                });
            trace!(
                target: "vfs",
                path = %file.display(),
                included,
                "extension filter"
            );
            included
        };

        self.paths_in_dir_matching(&node.path(), pred, recursive)
    }

    /// Read a regular file as UTF-8 text, stripping a leading byte order
    /// mark. Returns `None` when the path is not a readable regular file.
    pub fn read_text_file(&self, path: &Path) -> Option<String> {
        let Some(node) = self.emplace(path) else {
            warn!(target: "vfs", path = %path.display(), "failed to get path node");
            return None;
        };
        if !(node.exists() && node.status().is_file()) {
            error!(
                target: "vfs",
                path = %node.path().display(),
                "attempt to read from non-regular file"
            );
            return None;
        }

        match std::fs::read(node.path()) {
            Ok(mut bytes) => {
                if bytes.starts_with(&UTF8_BOM) {
                    bytes.drain(..UTF8_BOM.len());
                }
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %node.path().display(),
                    error = %source,
                    "filesystem error during access"
                );
                None
            }
        }
    }

    /// Read a regular file through a handler. Returns `true` when the
    /// file opened and the handler reported success.
    pub fn read_file<F>(&self, path: &Path, handler: F) -> bool
    where
        F: FnOnce(&mut dyn Read) -> bool,
    {
        let Some(node) = self.emplace(path) else {
            warn!(target: "vfs", path = %path.display(), "failed to get path node");
            return false;
        };
        if !(node.exists() && node.status().is_file()) {
            error!(
                target: "vfs",
                path = %node.path().display(),
                "attempt to read non-file path"
            );
            return false;
        }

        match std::fs::File::open(node.path()) {
            Ok(file) => {
                let mut reader = BufReader::new(file);
                handler(&mut reader)
            }
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %node.path().display(),
                    error = %source,
                    "filesystem error during access"
                );
                false
            }
        }
    }

    /// Write text to a file, creating or truncating it. Refused when the
    /// node chain forbids writes or the path is relative.
    pub fn write_text_file(&self, path: &Path, contents: &str) -> bool {
        let Some(node) = self.emplace_try(path, false) else {
            error!(target: "vfs", path = %path.display(), "failed to get path node");
            return false;
        };
        if !node.writable() || node.is_relative() || path.is_relative() {
            error!(
                target: "vfs",
                path = %node.path().display(),
                "attempt to write to forbidden or relative path"
            );
            return false;
        }

        match std::fs::write(node.path(), contents.as_bytes()) {
            Ok(()) => {
                node.clear_status();
                true
            }
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %node.path().display(),
                    error = %source,
                    "filesystem error during access"
                );
                false
            }
        }
    }

    /// Write a file through a handler. Returns `true` when the file
    /// opened and the handler reported success. Same refusal rules as
    /// [`write_text_file`](Manager::write_text_file).
    pub fn write_file<F>(&self, path: &Path, handler: F) -> bool
    where
        F: FnOnce(&mut dyn Write) -> bool,
    {
        let Some(node) = self.emplace_try(path, false) else {
            error!(target: "vfs", path = %path.display(), "failed to get path node");
            return false;
        };
        if !node.writable() || node.is_relative() || path.is_relative() {
            error!(
                target: "vfs",
                path = %node.path().display(),
                "attempt to write to forbidden or relative path"
            );
            return false;
        }

        match std::fs::File::create(node.path()) {
            Ok(file) => {
                let mut writer = BufWriter::new(file);
                let success = handler(&mut writer) && writer.flush().is_ok();
                node.clear_status();
                success
            }
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %node.path().display(),
                    error = %source,
                    "filesystem error during access"
                );
                false
            }
        }
    }

    /// Erase a regular file. Returns `true` when the path was an existing
    /// regular file on a writable chain and was removed.
    pub fn erase_file(&self, abs_path: &Path) -> bool {
        let Some(node) = self.emplace(abs_path) else {
            error!(target: "vfs", path = %abs_path.display(), "failed to get path node");
            return false;
        };
        if !(node.exists() && node.status().is_file()) {
            return false;
        }
        if !node.writable() {
            error!(
                target: "vfs",
                path = %node.path().display(),
                "attempt to erase non-writable file"
            );
            return false;
        }

        match std::fs::remove_file(node.path()) {
            Ok(()) => {
                node.clear_status();
                true
            }
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %node.path().display(),
                    error = %source,
                    "filesystem error during access"
                );
                false
            }
        }
    }

    /// Create a directory and any missing parents. Requires a writable
    /// chain whose root currently exists on disk as a directory.
    pub fn create_directories(&self, target_path: &Path) -> bool {
        let Some(node) = self.emplace(target_path) else {
            error!(target: "vfs", path = %target_path.display(), "failed to get path node");
            return false;
        };
        if !node.writable() {
            error!(
                target: "vfs",
                path = %node.path().display(),
                "attempt to create directories on non-writable path"
            );
            return false;
        }

        let Some(root) = node.clone().root() else {
            warn!(target: "vfs", path = %node.path().display(), "no root for relative path");
            return false;
        };
        if !(root.exists() && root.status().is_dir()) {
            warn!(
                target: "vfs",
                root = %root.path().display(),
                "root path does not exist or is not a directory"
            );
            return false;
        }

        match std::fs::create_dir_all(node.path()) {
            Ok(()) => {
                trace!(target: "vfs", path = %node.path().display(), "created directories");
                node.clear_status();
                true
            }
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %node.path().display(),
                    error = %source,
                    "filesystem error during access"
                );
                false
            }
        }
    }
}
