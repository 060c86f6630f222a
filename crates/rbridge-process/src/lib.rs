//! # rbridge-process - R Discovery and Process Management
//!
//! Finds an R executable, spawns it, captures its output into a bounded
//! buffer and writes commands to its stdin.
//!
//! Depends on [`rbridge_core`] for the platform type and error handling.
//!
//! ## Public API
//!
//! ### Discovery
//! - [`Locator`] - Platform-aware search over candidate directories
//! - [`discover_executable()`] - First usable candidate, directory-major
//! - [`invocation_args()`] - Command line for an interactive session
//! - [`FileSystem`], [`Prober`] - Injection points for tests
//!
//! ### Output
//! - [`OutputBuffer`] - Bounded, thread-safe text store with FIFO eviction
//! - [`OutputSnapshot`] - Buffer copy with its stream position
//!
//! ### Process Management
//! - [`RProcess`] - Spawn and manage a running interpreter

pub mod buffer;
pub mod decoder;
pub mod fs;
pub mod locator;
pub mod probe;
pub mod process;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

// Public API re-exports
pub use buffer::{OutputBuffer, OutputSnapshot, DEFAULT_BUFFER_CAPACITY};
pub use fs::{FileSystem, OsFileSystem};
pub use locator::{
    default_candidate_dirs, discover_executable, executable_names, invocation_args,
    invocation_flags, scan_install_root, Locator, WINDOWS_INSTALL_ROOT, WINDOWS_X86_INSTALL_ROOT,
};
pub use probe::{ProbeFailure, Prober, SpawnProbe};
pub use process::{RProcess, StartOptions};
