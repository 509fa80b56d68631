//! Filesystem status snapshots.
//!
//! Every disk probe in the crate funnels through [`FileStatus::probe`] so
//! that operating-system errors are logged once and converted into a
//! value callers can branch on without handling `Result`s.

use std::fmt;
use std::io;
use std::path::Path;

use tracing::error;

/// Last observed state of a path on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Never probed, or the probe failed with an operating-system error.
    Unknown,
    /// Probed and absent.
    NotFound,
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Present but neither a regular file nor a directory (socket,
    /// unfollowed symlink, device node).
    Other,
}

impl FileStatus {
    /// Whether the path was present at probe time.
    pub fn exists(&self) -> bool {
        matches!(
            self,
            FileStatus::File | FileStatus::Directory | FileStatus::Other
        )
    }

    /// Whether the path was a regular file at probe time.
    pub fn is_file(&self) -> bool {
        matches!(self, FileStatus::File)
    }

    /// Whether the path was a directory at probe time.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileStatus::Directory)
    }

    /// Probe the filesystem for `path`.
    ///
    /// Errors other than not-found are logged and reported as
    /// [`FileStatus::Unknown`]; this function never fails.
    pub fn probe(path: &Path) -> FileStatus {
        match std::fs::metadata(path) {
            Ok(metadata) => FileStatus::from_file_type(metadata.file_type()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => FileStatus::NotFound,
            Err(source) => {
                error!(
                    target: "vfs",
                    path = %path.display(),
                    error = %source,
                    "filesystem error during status probe"
                );
                FileStatus::Unknown
            }
        }
    }

    /// Classify an already-obtained file type (directory iteration hands
    /// these out without a second stat).
    pub fn from_file_type(file_type: std::fs::FileType) -> FileStatus {
        if file_type.is_file() {
            FileStatus::File
        } else if file_type.is_dir() {
            FileStatus::Directory
        } else {
            FileStatus::Other
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FileStatus::Unknown => "unknown",
            FileStatus::NotFound => "not found",
            FileStatus::File => "file",
            FileStatus::Directory => "directory",
            FileStatus::Other => "other",
        };
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_probe_missing_path() {
        let temp = TempDir::new().unwrap();
        let status = FileStatus::probe(&temp.path().join("missing"));
        assert_eq!(status, FileStatus::NotFound);
        assert!(!status.exists());
    }

    #[test]
    fn test_probe_file_and_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f.txt");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(FileStatus::probe(&file), FileStatus::File);
        assert_eq!(FileStatus::probe(temp.path()), FileStatus::Directory);
        assert!(FileStatus::probe(&file).is_file());
        assert!(FileStatus::probe(temp.path()).is_dir());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", FileStatus::File), "file");
        assert_eq!(format!("{}", FileStatus::NotFound), "not found");
    }
}
