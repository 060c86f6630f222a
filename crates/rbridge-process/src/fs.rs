//! Read-only filesystem access used by executable discovery
//!
//! Discovery goes through [`FileSystem`] so tests can run it against an
//! in-memory tree instead of real install locations.

use std::io;
use std::path::{Path, PathBuf};

/// The filesystem queries discovery needs
pub trait FileSystem: Send + Sync {
    /// Entries of `dir`, or `None` if the directory cannot be listed.
    fn list_dir(&self, dir: &Path) -> Option<Vec<PathBuf>>;

    fn is_dir(&self, path: &Path) -> bool;

    fn exists(&self, path: &Path) -> bool;

    /// Absolute path with symlinks resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn list_dir(&self, dir: &Path) -> Option<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(err) => {
                tracing::trace!("Cannot read directory {:?}: {}", dir, err);
                return None;
            }
        };

        // read_dir order is platform dependent; keep discovery deterministic
        let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
        paths.sort();
        Some(paths)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        // Avoids `\\?\` UNC prefixes on Windows
        dunce::canonicalize(path)
    }
}
