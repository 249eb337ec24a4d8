//! Recursive directory scanning

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Result, SourceError};

/// A regular file found by one poll's scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Path relative to the scan root
    pub relative_path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileCandidate {
    /// Build a candidate by reading the file's metadata
    ///
    /// # Arguments
    /// * `root` - Scan root the relative path is computed against
    /// * `path` - Path to the file
    pub fn from_path(root: &Path, path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::with_metadata(root, path, &metadata))
    }

    fn with_metadata(root: &Path, path: &Path, metadata: &fs::Metadata) -> Self {
        let relative_path = path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf());

        Self {
            path: path.to_path_buf(),
            relative_path,
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }

    /// The file's own name, without any directory component
    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or(Cow::Borrowed(""))
    }

    /// Modification time in milliseconds since the Unix epoch, 0 when unknown
    pub fn modified_millis(&self) -> u64 {
        self.modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A directory or file the walk could not read
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ScanError {
    pub path: Option<PathBuf>,
    pub message: String,
    /// The scan root itself failed, so the whole scan is unusable
    pub at_root: bool,
}

impl ScanError {
    fn from_walk(err: walkdir::Error) -> Self {
        let path = err.path().map(Path::to_path_buf);
        let at_root = err.depth() == 0;
        let message = match &path {
            Some(p) => format!("{}: {}", p.display(), err),
            None => err.to_string(),
        };
        Self {
            path,
            message,
            at_root,
        }
    }
}

/// Recursive scanner over a fixed root directory
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    root: PathBuf,
}

impl DirectoryScanner {
    /// Create a scanner after checking the root is a readable directory
    ///
    /// # Arguments
    /// * `root` - Directory to scan
    ///
    /// # Returns
    /// A configuration error when the root is empty, missing, not a
    /// directory, or unreadable
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(SourceError::Config("scan root must not be empty".to_string()));
        }

        let root = fs::canonicalize(root).map_err(|e| {
            SourceError::Config(format!("cannot access directory {}: {}", root.display(), e))
        })?;

        if !root.is_dir() {
            return Err(SourceError::Config(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        fs::read_dir(&root).map_err(|e| {
            SourceError::Config(format!("directory {} is not readable: {}", root.display(), e))
        })?;

        Ok(Self { root })
    }

    /// Canonical scan root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh walk of the root
    ///
    /// The walk is lazy: files are only visited as the iterator is consumed.
    /// Symbolic links are not followed, so link cycles are never entered.
    pub fn scan(&self) -> Scan {
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();

        Scan {
            root: self.root.clone(),
            walker,
        }
    }
}

/// Lazy iterator over the regular files below a scan root
pub struct Scan {
    root: PathBuf,
    walker: walkdir::IntoIter,
}

impl Iterator for Scan {
    type Item = std::result::Result<FileCandidate, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.walker.next()? {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    return match entry.metadata() {
                        Ok(metadata) => Some(Ok(FileCandidate::with_metadata(
                            &self.root,
                            entry.path(),
                            &metadata,
                        ))),
                        Err(e) => {
                            // Vanished between listing and stat
                            let err = ScanError::from_walk(e);
                            warn!("Skipping unreadable file: {}", err);
                            Some(Err(err))
                        }
                    };
                }
                Err(e) => {
                    let err = ScanError::from_walk(e);
                    if !err.at_root {
                        warn!("Skipping unreadable directory: {}", err);
                    }
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn names(scanner: &DirectoryScanner) -> Vec<String> {
        scanner
            .scan()
            .filter_map(|r| r.ok())
            .map(|c| c.relative_path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_scan_is_recursive() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        File::create(temp_dir.path().join("test1.txt")).unwrap();
        File::create(subdir.join("test2.txt")).unwrap();

        let scanner = DirectoryScanner::new(temp_dir.path()).unwrap();
        assert_eq!(names(&scanner), vec!["subdir/test2.txt", "test1.txt"]);
    }

    #[test]
    fn test_scan_is_restartable() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("a.txt")).unwrap();

        let scanner = DirectoryScanner::new(temp_dir.path()).unwrap();
        assert_eq!(names(&scanner).len(), 1);

        File::create(temp_dir.path().join("b.txt")).unwrap();
        assert_eq!(names(&scanner), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_candidate_metadata() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("data.log"), b"12345").unwrap();

        let scanner = DirectoryScanner::new(temp_dir.path()).unwrap();
        let candidate = scanner.scan().next().unwrap().unwrap();

        assert_eq!(candidate.file_name(), "data.log");
        assert_eq!(candidate.size, 5);
        assert!(candidate.path.is_absolute());
        assert!(candidate.modified_millis() > 0);
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = DirectoryScanner::new(&missing).unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.txt");
        File::create(&file).unwrap();

        assert!(DirectoryScanner::new(&file).is_err());
        assert!(DirectoryScanner::new("").is_err());
    }

    #[test]
    fn test_root_removed_after_startup_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("root");
        fs::create_dir(&root).unwrap();

        let scanner = DirectoryScanner::new(&root).unwrap();
        fs::remove_dir(&root).unwrap();

        let first = scanner.scan().next().unwrap();
        assert!(first.unwrap_err().at_root);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("sub");
        fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("real.txt")).unwrap();

        // A cycle back to the root and a link to a file
        std::os::unix::fs::symlink(temp_dir.path(), subdir.join("loop")).unwrap();
        std::os::unix::fs::symlink(subdir.join("real.txt"), temp_dir.path().join("link.txt"))
            .unwrap();

        let scanner = DirectoryScanner::new(temp_dir.path()).unwrap();
        assert_eq!(names(&scanner), vec!["sub/real.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        File::create(locked.join("secret.txt")).unwrap();
        File::create(temp_dir.path().join("open.txt")).unwrap();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Running with privileges that bypass permission checks
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let scanner = DirectoryScanner::new(temp_dir.path()).unwrap();
        let results: Vec<_> = scanner.scan().collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        let files: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

        assert_eq!(errors.len(), 1);
        assert!(!errors[0].at_root);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name(), "open.txt");
    }
}
