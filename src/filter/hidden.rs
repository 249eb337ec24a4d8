use std::path::Path;

use super::FileFilter;
use crate::error::Result;
use crate::scanner::FileCandidate;

/// Rejects hidden files.
///
/// A file is hidden when its own name starts with `.`; on Windows the hidden
/// attribute counts as well. Only the file name is inspected, not the names
/// of its parent directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct HiddenFileFilter;

impl HiddenFileFilter {
    pub fn new() -> Self {
        Self
    }

    pub fn is_hidden(path: &Path) -> bool {
        let dot_file = path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false);

        dot_file || has_hidden_attribute(path)
    }
}

#[cfg(windows)]
fn has_hidden_attribute(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;

    std::fs::metadata(path)
        .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_attribute(_path: &Path) -> bool {
    false
}

impl FileFilter for HiddenFileFilter {
    fn accept(&self, candidate: &FileCandidate) -> Result<bool> {
        Ok(!Self::is_hidden(&candidate.path))
    }

    fn description(&self) -> String {
        "ignore_hidden".to_string()
    }
}
