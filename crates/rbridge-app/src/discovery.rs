//! Startup resolution of the R executable
//!
//! Picks the executable for a new session from, in order of precedence:
//! an explicit path, a user-chosen folder, then discovery over the
//! configured and platform default directories.

use std::path::{Path, PathBuf};

use rbridge_core::prelude::*;
use rbridge_core::Platform;
use rbridge_process::{FileSystem, Locator, Prober};

use crate::config::InterpreterSettings;

/// Where the caller wants R looked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupRequest {
    /// Explicit executable; only this path is checked
    pub executable: Option<PathBuf>,
    /// Folder to search with the platform's executable names
    pub folder: Option<PathBuf>,
    pub extra_dirs: Vec<PathBuf>,
    pub search_path: bool,
}

impl LookupRequest {
    /// Request built from config, without folder override
    pub fn from_settings(settings: &InterpreterSettings) -> Self {
        Self {
            executable: settings.path.clone(),
            folder: None,
            extra_dirs: settings.extra_dirs.clone(),
            search_path: settings.search_path,
        }
    }

    pub fn with_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.folder = folder;
        self
    }
}

/// Outcome of a lookup. Not finding R is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(PathBuf),
    NotFound {
        /// (directory, name) pairs that were tried
        searched: usize,
    },
}

impl Lookup {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Lookup::Found(path) => Some(path),
            Lookup::NotFound { .. } => None,
        }
    }

    /// Turn absence into [`Error::InterpreterNotFound`]
    pub fn into_result(self) -> Result<PathBuf> {
        match self {
            Lookup::Found(path) => Ok(path),
            Lookup::NotFound { searched } => Err(Error::InterpreterNotFound {
                candidates: searched,
            }),
        }
    }
}

/// Resolve `request` with an already configured locator. Blocking.
pub fn find_with<F, P>(locator: &Locator<F, P>, request: &LookupRequest) -> Lookup
where
    F: FileSystem,
    P: Prober,
{
    if let Some(executable) = &request.executable {
        return match locator.verify(executable) {
            Ok(path) => {
                info!("Using configured R at {}", path.display());
                Lookup::Found(path)
            }
            Err(e) => {
                warn!("Configured R at {} is not usable: {}", executable.display(), e);
                Lookup::NotFound { searched: 1 }
            }
        };
    }

    if let Some(folder) = &request.folder {
        let names = locator.possible_executables();
        return match locator.locate_in(folder) {
            Some(path) => {
                info!("Found R in {}: {}", folder.display(), path.display());
                Lookup::Found(path)
            }
            None => {
                warn!("No R executable ({}) in {}", names.join(", "), folder.display());
                Lookup::NotFound {
                    searched: names.len(),
                }
            }
        };
    }

    let searched = locator.candidate_count();
    match locator.locate() {
        Some(path) => {
            info!("Discovered R at {}", path.display());
            Lookup::Found(path)
        }
        None => {
            warn!("R not found after checking {} candidates", searched);
            Lookup::NotFound { searched }
        }
    }
}

/// Resolve `request` on the real filesystem. Blocking.
pub fn find_interpreter(platform: Platform, request: &LookupRequest) -> Lookup {
    let locator = Locator::new(platform)
        .with_extra_dirs(request.extra_dirs.clone())
        .with_search_path(request.search_path);
    find_with(&locator, request)
}

/// Run [`find_interpreter`] on the blocking pool
pub async fn find_interpreter_async(platform: Platform, request: LookupRequest) -> Result<Lookup> {
    tokio::task::spawn_blocking(move || find_interpreter(platform, &request))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("discovery task failed: {}", e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbridge_process::test_utils::{FakeFileSystem, StaticProber};

    fn unix_fs() -> FakeFileSystem {
        let mut fs = FakeFileSystem::default();
        fs.add_dir("/usr/lib/R/bin");
        fs.add_file("/usr/lib/R/bin/R");
        fs.add_dir("/opt/custom");
        fs.add_file("/opt/custom/R");
        fs.add_dir("/home/me/R-devel");
        fs.add_file("/home/me/R-devel/exec");
        fs
    }

    fn locator(prober: StaticProber) -> Locator<FakeFileSystem, StaticProber> {
        Locator::with_parts(Platform::Unix, unix_fs(), prober)
    }

    #[test]
    fn test_discovery_finds_default_location() {
        let lookup = find_with(&locator(StaticProber::accept_all()), &LookupRequest::default());
        assert_eq!(lookup, Lookup::Found(PathBuf::from("/usr/lib/R/bin/R")));
    }

    #[test]
    fn test_extra_dirs_take_precedence() {
        let locator = locator(StaticProber::accept_all())
            .with_extra_dirs(vec![PathBuf::from("/opt/custom")]);
        let lookup = find_with(&locator, &LookupRequest::default());
        assert_eq!(lookup, Lookup::Found(PathBuf::from("/opt/custom/R")));
    }

    #[test]
    fn test_explicit_path_is_only_candidate() {
        let request = LookupRequest {
            executable: Some(PathBuf::from("/opt/custom/R")),
            ..Default::default()
        };
        let lookup = find_with(&locator(StaticProber::accept_all()), &request);
        assert_eq!(lookup.path(), Some(Path::new("/opt/custom/R")));
    }

    #[test]
    fn test_unusable_explicit_path_does_not_fall_back() {
        let request = LookupRequest {
            executable: Some(PathBuf::from("/opt/custom/R")),
            ..Default::default()
        };
        let lookup = find_with(
            &locator(StaticProber::rejecting(["/opt/custom/R"])),
            &request,
        );
        assert_eq!(lookup, Lookup::NotFound { searched: 1 });
    }

    #[test]
    fn test_folder_uses_platform_names() {
        let request = LookupRequest::default().with_folder(Some(PathBuf::from("/home/me/R-devel")));
        let lookup = find_with(&locator(StaticProber::accept_all()), &request);
        assert_eq!(lookup, Lookup::Found(PathBuf::from("/home/me/R-devel/exec")));
    }

    #[test]
    fn test_folder_miss_reports_names_tried() {
        let request = LookupRequest::default().with_folder(Some(PathBuf::from("/nowhere")));
        let lookup = find_with(&locator(StaticProber::accept_all()), &request);
        assert_eq!(lookup, Lookup::NotFound { searched: 2 });
    }

    #[test]
    fn test_not_found_is_distinct_error() {
        let err = Lookup::NotFound { searched: 6 }.into_result().unwrap_err();
        assert!(matches!(err, Error::InterpreterNotFound { candidates: 6 }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_request_from_settings() {
        let settings = InterpreterSettings {
            path: Some(PathBuf::from("/x/R")),
            extra_dirs: vec![PathBuf::from("/y")],
            search_path: true,
            capture_stderr: true,
        };
        let request = LookupRequest::from_settings(&settings);
        assert_eq!(request.executable, Some(PathBuf::from("/x/R")));
        assert_eq!(request.extra_dirs, vec![PathBuf::from("/y")]);
        assert!(request.search_path);
        assert!(request.folder.is_none());
    }

    #[tokio::test]
    async fn test_async_lookup_of_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let request = LookupRequest {
            executable: Some(dir.path().join("no-such-R")),
            ..Default::default()
        };
        let lookup = find_interpreter_async(Platform::Unix, request).await.unwrap();
        assert_eq!(lookup, Lookup::NotFound { searched: 1 });
    }
}
