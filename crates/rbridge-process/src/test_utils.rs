//! Test utilities for discovery and process tests
//!
//! Provides an in-memory [`FileSystem`], a configurable [`Prober`] and a
//! helper that writes shell scripts standing in for an R interpreter.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::fs::FileSystem;
use crate::probe::{ProbeFailure, Prober};

/// Number of `list_dir` calls made against a [`FakeFileSystem`]
#[derive(Debug, Clone, Default)]
pub struct ListCounter(Arc<AtomicUsize>);

impl ListCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory directory tree.
///
/// Registering an entry also lists it under its parent, when the parent is a
/// registered directory.
#[derive(Debug, Clone, Default)]
pub struct FakeFileSystem {
    dirs: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    files: BTreeSet<PathBuf>,
    aliases: BTreeMap<PathBuf, PathBuf>,
    list_calls: ListCounter,
}

impl FakeFileSystem {
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.link_into_parent(&path);
        self.dirs.entry(path).or_default();
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.link_into_parent(&path);
        self.files.insert(path);
    }

    /// A symlink-like entry: exists, and canonicalizes to `target`
    pub fn add_alias(&mut self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        let link = link.as_ref().to_path_buf();
        self.link_into_parent(&link);
        self.aliases.insert(link, target.as_ref().to_path_buf());
    }

    /// Counter shared with this filesystem and its clones
    pub fn list_count(&self) -> ListCounter {
        self.list_calls.clone()
    }

    fn link_into_parent(&mut self, path: &Path) {
        if let Some(children) = path.parent().and_then(|p| self.dirs.get_mut(p)) {
            children.insert(path.to_path_buf());
        }
    }
}

impl FileSystem for FakeFileSystem {
    fn list_dir(&self, dir: &Path) -> Option<Vec<PathBuf>> {
        self.list_calls.0.fetch_add(1, Ordering::SeqCst);
        self.dirs
            .get(dir)
            .map(|children| children.iter().cloned().collect())
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains_key(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.dirs.contains_key(path) || self.files.contains(path) || self.aliases.contains_key(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        if let Some(target) = self.aliases.get(path) {
            return Ok(target.clone());
        }
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such entry"))
        }
    }
}

/// Prober that accepts every path except a fixed reject list
#[derive(Debug, Clone, Default)]
pub struct StaticProber {
    rejected: HashSet<PathBuf>,
}

impl StaticProber {
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn rejecting<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            rejected: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Prober for StaticProber {
    fn probe(&self, executable: &Path) -> Result<(), ProbeFailure> {
        if self.rejected.contains(executable) {
            Err(ProbeFailure::Spawn(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "rejected by test prober",
            )))
        } else {
            Ok(())
        }
    }
}

/// Write an executable `/bin/sh` script named `name` into `dir`.
///
/// `body` is the script after the shebang line.
#[cfg(unix)]
pub fn write_fake_interpreter(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake interpreter");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake interpreter");
    path
}
