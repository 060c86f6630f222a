//! R executable discovery
//!
//! Discovery walks an ordered list of candidate directories and, inside each
//! directory, an ordered list of executable names (directory-major,
//! name-minor). A candidate wins when it exists, can be canonicalized and
//! passes the [`Prober`]. Every failure just moves on to the next candidate;
//! finding nothing is reported as `None`, not as an error.
//!
//! On Windows the candidate directories are not fixed: R installs one
//! directory per version below `C:\Program Files\R`, so the install roots are
//! scanned for `bin` directories. That scan touches the filesystem and only
//! happens when [`Locator::candidate_dirs`] is first called.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rbridge_core::prelude::*;
use rbridge_core::Platform;

use crate::fs::{FileSystem, OsFileSystem};
use crate::probe::{ProbeFailure, Prober, SpawnProbe};

/// Primary Windows install root
pub const WINDOWS_INSTALL_ROOT: &str = r"C:\Program Files\R";

/// Install root used by 32-bit installers
pub const WINDOWS_X86_INSTALL_ROOT: &str = r"C:\Program Files (x86)\R";

const MAC_LOCATIONS: &[&str] = &["/usr/local/bin/", "/Applications/R.app/Contents/MacOS/R"];
const UNIX_LOCATIONS: &[&str] = &["/usr/lib/R/bin", "/usr/bin/", "/usr/share/R/share"];

const MAC_EXECUTABLES: &[&str] = &["R", "R.app"];
const UNIX_EXECUTABLES: &[&str] = &["R", "exec"];
const WINDOWS_EXECUTABLES: &[&str] = &["R.exe"];

/// Segment an install subdirectory must contain to be searched
const BIN_SEGMENT: &str = "bin";

/// Executable names to try in each candidate directory, in order.
pub fn executable_names(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Mac => MAC_EXECUTABLES,
        Platform::Unix => UNIX_EXECUTABLES,
        Platform::Windows => WINDOWS_EXECUTABLES,
    }
}

/// Startup flags for an interactive, quiet session without user profiles.
///
/// The last flag differs: the Windows front end needs `--ess` to behave as
/// an interactive terminal when its stdin is a pipe.
pub fn invocation_flags(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Mac | Platform::Unix => &["--vanilla", "--quiet", "--interactive"],
        Platform::Windows => &["--vanilla", "--quiet", "--ess"],
    }
}

/// Full command line for launching R at `path`: the path followed by
/// [`invocation_flags`].
pub fn invocation_args(platform: Platform, path: &Path) -> Vec<String> {
    std::iter::once(path.to_string_lossy().into_owned())
        .chain(invocation_flags(platform).iter().map(|f| f.to_string()))
        .collect()
}

/// Fixed candidate directories for Mac and Unix.
///
/// Returns an empty list for Windows, whose directories come from
/// [`windows_candidate_dirs`].
pub fn static_candidate_dirs(platform: Platform) -> Vec<PathBuf> {
    let locations: &[&str] = match platform {
        Platform::Mac => MAC_LOCATIONS,
        Platform::Unix => UNIX_LOCATIONS,
        Platform::Windows => &[],
    };
    locations.iter().map(PathBuf::from).collect()
}

/// Scan one install root for `bin` directories.
///
/// Looks one level into every subdirectory of `root` (one per installed R
/// version) and keeps the directories whose name contains `bin`.
/// Returns `None` if `root` itself cannot be listed.
pub fn scan_install_root(fs: &dyn FileSystem, root: &Path) -> Option<Vec<PathBuf>> {
    let versions = fs.list_dir(root)?;
    let mut found = Vec::new();

    for version_dir in versions.iter().filter(|p| fs.is_dir(p)) {
        let Some(entries) = fs.list_dir(version_dir) else {
            trace!("Cannot list {:?}, skipping", version_dir);
            continue;
        };

        found.extend(entries.into_iter().filter(|entry| {
            entry
                .file_name()
                .is_some_and(|name| name.to_string_lossy().contains(BIN_SEGMENT))
                && fs.is_dir(entry)
        }));
    }

    debug!("Install root {:?}: {} bin directories", root, found.len());
    Some(found)
}

/// Candidate directories from both Windows install roots, primary first.
///
/// A root that is missing contributes nothing, exactly like a root that
/// exists but holds no `bin` directories.
pub fn windows_candidate_dirs(fs: &dyn FileSystem, primary: &Path, secondary: &Path) -> Vec<PathBuf> {
    let mut dirs = scan_install_root(fs, primary).unwrap_or_default();
    dirs.extend(scan_install_root(fs, secondary).unwrap_or_default());
    dirs
}

/// Platform default candidate directories.
///
/// On Windows this scans the filesystem; call it once and keep the result.
pub fn default_candidate_dirs(platform: Platform, fs: &dyn FileSystem) -> Vec<PathBuf> {
    match platform {
        Platform::Windows => windows_candidate_dirs(
            fs,
            Path::new(WINDOWS_INSTALL_ROOT),
            Path::new(WINDOWS_X86_INSTALL_ROOT),
        ),
        Platform::Mac | Platform::Unix => static_candidate_dirs(platform),
    }
}

/// Check a single candidate file: exists, canonicalizes, passes the probe.
pub fn check_candidate(
    path: &Path,
    fs: &dyn FileSystem,
    prober: &dyn Prober,
) -> std::result::Result<PathBuf, ProbeFailure> {
    if !fs.exists(path) {
        return Err(ProbeFailure::Missing);
    }

    let canonical = fs.canonicalize(path).map_err(ProbeFailure::Canonicalize)?;
    prober.probe(&canonical)?;
    Ok(canonical)
}

/// Find the first usable executable, directory-major then name-minor.
pub fn discover_executable(
    dirs: &[PathBuf],
    names: &[&str],
    fs: &dyn FileSystem,
    prober: &dyn Prober,
) -> Option<PathBuf> {
    for dir in dirs {
        for name in names {
            let candidate = dir.join(name);
            match check_candidate(&candidate, fs, prober) {
                Ok(found) => {
                    info!("Found R executable: {}", found.display());
                    return Some(found);
                }
                Err(ProbeFailure::Missing) => {
                    trace!("No candidate at {:?}", candidate);
                }
                Err(failure) => {
                    debug!("Rejected candidate {:?}: {}", candidate, failure);
                }
            }
        }
    }

    debug!("No R executable in {} candidate directories", dirs.len());
    None
}

/// Signature of the `PATH` lookup used when `search_path` is enabled
pub type PathLookup = fn(Platform) -> Option<PathBuf>;

/// Directory of the first platform executable found on `PATH`.
pub fn path_dir(platform: Platform) -> Option<PathBuf> {
    path_dir_in(platform, std::env::var_os("PATH")?)
}

/// Directory of the first platform executable found in `paths`, a
/// `PATH`-style list.
pub fn path_dir_in(platform: Platform, paths: impl AsRef<std::ffi::OsStr>) -> Option<PathBuf> {
    let name = executable_names(platform).first()?;
    match which::which_in(name, Some(paths), Path::new(".")) {
        Ok(found) => found.parent().map(Path::to_path_buf),
        Err(e) => {
            trace!("{} not on PATH: {}", name, e);
            None
        }
    }
}

/// Locates R for one platform.
///
/// Search order: configured extra directories, the platform defaults, then
/// (when enabled) the directory of `R` on `PATH`. Discovery is blocking; from
/// async code run it with `tokio::task::spawn_blocking`.
pub struct Locator<F = OsFileSystem, P = SpawnProbe> {
    platform: Platform,
    fs: F,
    prober: P,
    extra_dirs: Vec<PathBuf>,
    search_path: bool,
    path_lookup: PathLookup,
    default_dirs: OnceLock<Vec<PathBuf>>,
}

impl Locator {
    /// Locator using the real filesystem and a spawning probe
    pub fn new(platform: Platform) -> Self {
        Self::with_parts(platform, OsFileSystem, SpawnProbe::new())
    }

    /// Locator for the platform this process runs on
    pub fn for_current_platform() -> Result<Self> {
        Ok(Self::new(Platform::current()?))
    }
}

impl<F: FileSystem, P: Prober> Locator<F, P> {
    pub fn with_parts(platform: Platform, fs: F, prober: P) -> Self {
        Self {
            platform,
            fs,
            prober,
            extra_dirs: Vec::new(),
            search_path: false,
            path_lookup: path_dir,
            default_dirs: OnceLock::new(),
        }
    }

    /// Directories searched before the platform defaults
    pub fn with_extra_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.extra_dirs = dirs;
        self
    }

    /// Also search the directory of `R` on `PATH`, after the defaults
    pub fn with_search_path(mut self, enabled: bool) -> Self {
        self.search_path = enabled;
        self
    }

    /// Replace how the `PATH` directory is found
    pub fn with_path_lookup(mut self, lookup: PathLookup) -> Self {
        self.path_lookup = lookup;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Executable names this locator looks for
    pub fn possible_executables(&self) -> &'static [&'static str] {
        executable_names(self.platform)
    }

    /// Platform default directories, scanned on first call and cached.
    pub fn default_dirs(&self) -> &[PathBuf] {
        self.default_dirs
            .get_or_init(|| default_candidate_dirs(self.platform, &self.fs))
    }

    /// Every directory that [`locate`](Self::locate) will search, in order
    pub fn candidate_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.extra_dirs.clone();
        dirs.extend(self.default_dirs().iter().cloned());

        if self.search_path {
            if let Some(dir) = (self.path_lookup)(self.platform) {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
        }

        dirs
    }

    /// Number of (directory, name) pairs [`locate`](Self::locate) checks
    pub fn candidate_count(&self) -> usize {
        self.candidate_dirs().len() * self.possible_executables().len()
    }

    /// Find R in the candidate directories
    pub fn locate(&self) -> Option<PathBuf> {
        let dirs = self.candidate_dirs();
        discover_executable(&dirs, self.possible_executables(), &self.fs, &self.prober)
    }

    /// Find R in a single, user-chosen folder
    pub fn locate_in(&self, folder: &Path) -> Option<PathBuf> {
        discover_executable(
            &[folder.to_path_buf()],
            self.possible_executables(),
            &self.fs,
            &self.prober,
        )
    }

    /// Check an explicit executable path
    pub fn verify(&self, executable: &Path) -> std::result::Result<PathBuf, ProbeFailure> {
        check_candidate(executable, &self.fs, &self.prober)
    }
}
