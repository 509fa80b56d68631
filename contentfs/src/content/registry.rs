//! Content directory registry.
//!
//! Holds every known [`ContentDir`] and keeps three views consistent:
//! identity (insertion slot), label (ordered, unique), and dependency
//! depth (ordered, non-unique, recomputed during validation). Validation
//! enforces that an enabled directory's prerequisites are registered,
//! enabled, and new enough, and force-disables directories whose
//! prerequisites have lapsed.

use thiserror::Error;
use tracing::error;

use super::dir::ContentDir;
use super::version::ContentVersion;

use std::collections::BTreeMap;

/// Registration and validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no content directory registered for label {0:?}")]
    UnknownLabel(String),

    #[error("content directory {0:?} already registered")]
    DuplicateLabel(String),

    #[error("{label:?} missing prerequisite {prereq:?}")]
    MissingPrerequisite { label: String, prereq: String },

    #[error("{label:?} prerequisite {prereq:?} is disabled")]
    DisabledPrerequisite { label: String, prereq: String },

    #[error("{label:?} requires {prereq:?} version {required} or newer, found {found}")]
    VersionMismatch {
        label: String,
        prereq: String,
        required: ContentVersion,
        found: ContentVersion,
    },

    #[error("dependency cycle through {0:?}")]
    DependencyCycle(String),
}

/// Multi-indexed set of content directories.
#[derive(Debug, Default)]
pub struct Registry {
    /// Primary store; the slot index is the identity key.
    dirs: Vec<ContentDir>,
    /// Label view into `dirs`.
    by_label: BTreeMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Labels are unique within the registry.
    pub fn add(&mut self, dir: ContentDir) -> Result<(), RegistryError> {
        if self.by_label.contains_key(dir.label()) {
            return Err(RegistryError::DuplicateLabel(dir.label().to_string()));
        }
        self.by_label.insert(dir.label().to_string(), self.dirs.len());
        self.dirs.push(dir);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    /// Look up a descriptor by label.
    pub fn get(&self, label: &str) -> Option<&ContentDir> {
        self.by_label.get(label).map(|&index| &self.dirs[index])
    }

    /// Slot indices ordered by ascending `(depth, label)`.
    ///
    /// Ties within one depth are broken by label so a walk over the
    /// registry is deterministic for a fixed set of directories.
    fn indices_by_depth(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.dirs.len()).collect();
        indices.sort_by(|&a, &b| {
            (self.dirs[a].depth(), self.dirs[a].label())
                .cmp(&(self.dirs[b].depth(), self.dirs[b].label()))
        });
        indices
    }

    /// Every label, in ascending depth order.
    pub fn all_labels(&self) -> Vec<String> {
        self.indices_by_depth()
            .into_iter()
            .map(|index| self.dirs[index].label().to_string())
            .collect()
    }

    /// Labels filtered by enabled flag, in ascending depth order. Runs
    /// full validation first so lapsed directories drop out of the
    /// enabled view.
    pub fn labels_filtered(&mut self, enabled: bool) -> Vec<String> {
        self.validate_all();
        self.indices_by_depth()
            .into_iter()
            .filter(|&index| self.dirs[index].enabled() == enabled)
            .map(|index| self.dirs[index].label().to_string())
            .collect()
    }

    /// Descriptors in descending `(depth, label)` order, the overlay walk
    /// order of the resolution cache.
    pub fn dirs_by_descending_depth(&self) -> Vec<&ContentDir> {
        self.indices_by_depth()
            .into_iter()
            .rev()
            .map(|index| &self.dirs[index])
            .collect()
    }

    /// Enable a directory. Returns whether the state changed; a failed
    /// validation refuses the request and leaves the directory disabled.
    pub fn enable(&mut self, label: &str) -> Result<bool, RegistryError> {
        self.validate_one(label)?;
        let index = self.by_label[label];
        Ok(self.dirs[index].set_enabled(true))
    }

    /// Disable a directory. Returns whether the state changed. Does not
    /// cascade; dependents are caught by the next [`validate_all`].
    ///
    /// [`validate_all`]: Registry::validate_all
    pub fn disable(&mut self, label: &str) -> Result<bool, RegistryError> {
        let index = *self
            .by_label
            .get(label)
            .ok_or_else(|| RegistryError::UnknownLabel(label.to_string()))?;
        Ok(self.dirs[index].set_enabled(false))
    }

    /// Validate a single directory against its prerequisites and record
    /// its recomputed depth on success.
    ///
    /// A disabled prerequisite additionally force-disables the candidate.
    pub fn validate_one(&mut self, label: &str) -> Result<(), RegistryError> {
        let index = *self
            .by_label
            .get(label)
            .ok_or_else(|| RegistryError::UnknownLabel(label.to_string()))?;

        if self.reaches(label, label) {
            return Err(RegistryError::DependencyCycle(label.to_string()));
        }

        let requires = self.dirs[index].requires().clone();
        let mut depth = 0;
        for (prereq, constraint) in requires {
            let Some(&prereq_index) = self.by_label.get(&prereq) else {
                return Err(RegistryError::MissingPrerequisite {
                    label: label.to_string(),
                    prereq,
                });
            };

            depth = depth.max(self.dirs[prereq_index].depth() + 1);

            if !self.dirs[prereq_index].enabled() {
                if self.dirs[index].set_enabled(false) {
                    error!(
                        target: "vfs",
                        label = %label,
                        prereq = %prereq,
                        "enabled directory has disabled prerequisite"
                    );
                }
                return Err(RegistryError::DisabledPrerequisite {
                    label: label.to_string(),
                    prereq,
                });
            }

            if !constraint.is_empty() {
                let required = ContentVersion::parse(&constraint);
                let found = self.dirs[prereq_index].version().clone();
                if found < required {
                    return Err(RegistryError::VersionMismatch {
                        label: label.to_string(),
                        prereq,
                        required,
                        found,
                    });
                }
            }
        }

        self.dirs[index].set_depth(depth);
        Ok(())
    }

    /// Walk enabled directories in descending depth order and force-
    /// disable any whose prerequisite is missing or disabled. Runs before
    /// every cache rebuild and before the enabled label view.
    pub fn validate_all(&mut self) {
        for index in self.indices_by_depth().into_iter().rev() {
            if !self.dirs[index].enabled() {
                continue;
            }

            let requires = self.dirs[index].requires().clone();
            for prereq in requires.keys() {
                let satisfied = self
                    .by_label
                    .get(prereq)
                    .map_or(false, |&prereq_index| self.dirs[prereq_index].enabled());
                if !satisfied {
                    error!(
                        target: "vfs",
                        label = %self.dirs[index].label(),
                        prereq = %prereq,
                        "missing or disabled prerequisite, disabling"
                    );
                    self.dirs[index].set_enabled(false);
                    break;
                }
            }
        }
    }

    /// Whether `target` is reachable from `from` through prerequisite
    /// edges (excluding the trivial zero-length walk).
    fn reaches(&self, from: &str, target: &str) -> bool {
        let mut stack: Vec<&str> = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        if let Some(&index) = self.by_label.get(from) {
            stack.extend(self.dirs[index].requires().keys().map(String::as_str));
        }

        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            if let Some(&index) = self.by_label.get(current) {
                stack.extend(self.dirs[index].requires().keys().map(String::as_str));
            }
        }
        false
    }
}
