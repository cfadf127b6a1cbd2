//! Request-scoped staging of input and output files
//!
//! Every file a tool call touches is tracked as a [`StagedFile`] carrying its
//! ownership. Files the server created are owned and removed when the
//! [`StagingPool`] is released or dropped; caller files are never touched.

pub mod placement;
pub mod resolver;
pub mod validate;

pub use placement::{unique_path, write_output, OutputDecision, Placement};
pub use resolver::{
    batch_len, clean_path_argument, decode_base64_payload, resolve_input, resolve_many,
};
pub use validate::{check_batch, format_size, validate_image, validate_size, ImageCheck};

use crate::error::Result;
use std::path::{Path, PathBuf};

const TEMP_PREFIX: &str = "mtk_";

/// One input or output artifact tracked for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    path: PathBuf,
    owned: bool,
}

impl StagedFile {
    /// A file the server created and must delete.
    pub fn owned(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: true,
        }
    }

    /// A file supplied by the caller; never deleted.
    pub fn borrowed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Directory containing the file (`.` for bare relative names).
    pub fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// File stem, or `fallback` when the file is a server temp file.
    pub fn display_stem(&self, fallback: &str) -> String {
        if self.owned {
            return fallback.to_string();
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Ordered set of files staged during one request.
///
/// Dropping the pool releases it, so every early return through `?`
/// cleans up exactly like the success path.
#[derive(Debug)]
pub struct StagingPool {
    root: PathBuf,
    entries: Vec<StagedFile>,
}

impl StagingPool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
        }
    }

    /// Record a path with its ownership.
    pub fn track(&mut self, path: impl Into<PathBuf>, owned: bool) -> StagedFile {
        let staged = StagedFile {
            path: path.into(),
            owned,
        };
        self.entries.push(staged.clone());
        staged
    }

    /// Create an empty owned temp file with the given suffix.
    pub fn temp_file(&mut self, suffix: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.root)?
            .into_temp_path()
            .keep()
            .map_err(|e| e.error)?;
        tracing::debug!(path = %path.display(), "staged temp file");
        self.track(path.clone(), true);
        Ok(path)
    }

    /// Create an owned temp directory; it is removed recursively on release.
    pub fn temp_dir(&mut self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&self.root)?
            .keep();
        tracing::debug!(path = %path.display(), "staged temp directory");
        self.track(path.clone(), true);
        Ok(path)
    }

    /// Release a single owned entry now.
    pub fn release(&mut self, path: &Path) {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.owned && e.path == path)
        {
            let entry = self.entries.remove(pos);
            remove_staged(&entry.path);
        }
    }

    /// Delete every owned entry still on disk. Returns how many were removed.
    ///
    /// Individual failures are logged and do not stop the rest.
    pub fn release_all(&mut self) -> usize {
        let mut removed = 0;
        for entry in self.entries.drain(..) {
            if entry.owned && remove_staged(&entry.path) {
                removed += 1;
            }
        }
        removed
    }

    /// Owned paths currently tracked.
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|e| e.owned)
            .map(|e| e.path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for StagingPool {
    fn drop(&mut self) {
        let removed = self.release_all();
        if removed > 0 {
            tracing::debug!(removed, "staging pool released");
        }
    }
}

fn remove_staged(path: &Path) -> bool {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove staged file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_all_removes_owned_only() {
        let dir = tempfile::tempdir().unwrap();
        let caller = dir.path().join("caller.txt");
        std::fs::write(&caller, b"keep me").unwrap();

        let mut pool = StagingPool::new(dir.path());
        pool.track(&caller, false);
        let temp = pool.temp_file(".bin").unwrap();
        let temp_dir = pool.temp_dir().unwrap();
        std::fs::write(temp_dir.join("inner.png"), b"x").unwrap();

        assert!(temp.exists());
        assert_eq!(pool.release_all(), 2);
        assert!(!temp.exists());
        assert!(!temp_dir.exists());
        assert!(caller.exists());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_release_all_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = StagingPool::new(dir.path());
        let first = pool.temp_file(".a").unwrap();
        let second = pool.temp_file(".b").unwrap();
        std::fs::remove_file(&first).unwrap();

        assert_eq!(pool.release_all(), 1);
        assert!(!second.exists());
    }

    #[test]
    fn test_drop_releases() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut pool = StagingPool::new(dir.path());
            pool.temp_file(".docx").unwrap()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_release_single() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = StagingPool::new(dir.path());
        let a = pool.temp_file(".a").unwrap();
        let b = pool.temp_file(".b").unwrap();

        pool.release(&a);
        assert!(!a.exists());
        assert!(b.exists());
        assert_eq!(pool.owned_paths(), vec![b.clone()]);
    }

    #[test]
    fn test_temp_file_suffix_and_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested");
        let mut pool = StagingPool::new(&root);
        let path = pool.temp_file(".pdf").unwrap();
        assert!(path.starts_with(&root));
        assert_eq!(path.extension().unwrap(), "pdf");
    }

    #[test]
    fn test_staged_file_helpers() {
        let caller = StagedFile::borrowed("/photos/holiday.jpg");
        assert!(!caller.is_owned());
        assert_eq!(caller.directory(), PathBuf::from("/photos"));
        assert_eq!(caller.display_stem("image"), "holiday");

        let temp = StagedFile::owned("/tmp/mtk_abc.jpg");
        assert_eq!(temp.display_stem("image"), "image");

        let relative = StagedFile::borrowed("report.pdf");
        assert_eq!(relative.directory(), PathBuf::from("."));
    }
}
