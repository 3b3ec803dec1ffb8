//! Directory listing seam between the resolver and storage.

use std::io;
use std::path::Path;
use std::time::SystemTime;

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_directory: bool,
    pub modified: Option<SystemTime>,
}

/// Read-only view of stored site content.
///
/// Calls block; async callers run them on the blocking pool.
pub trait DirectoryLister: Send + Sync + 'static {
    /// Entries directly inside `dir`, sorted by name.
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    /// The entry at `path`, or `None` when nothing exists there.
    fn stat(&self, path: &Path) -> io::Result<Option<DirEntry>>;
}

/// Lister backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLister;

impl FsLister {
    fn entry(name: String, metadata: &std::fs::Metadata) -> DirEntry {
        DirEntry {
            name,
            is_directory: metadata.is_dir(),
            modified: metadata.modified().ok(),
        }
    }
}

impl DirectoryLister for FsLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            // Follows symlinks; a dangling link is skipped.
            let Ok(metadata) = std::fs::metadata(entry.path()) else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::entry(name, &metadata));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<Option<DirEntry>> {
        match std::fs::metadata(path) {
            Ok(metadata) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(Some(Self::entry(name, &metadata)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
