//! Host platform detection
//!
//! The platform decides where R is installed, which executable names exist,
//! and which startup flags the interpreter expects. There is no safe default:
//! an unrecognized operating system is a hard error.

use std::fmt;
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Operating system family, as far as locating and launching R is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Unix,
    Mac,
}

/// Resolved once from `std::env::consts::OS` on first use.
static CURRENT: LazyLock<Option<Platform>> =
    LazyLock::new(|| Platform::from_os_name(std::env::consts::OS).ok());

impl Platform {
    /// Map an operating system identifier to a platform.
    ///
    /// Matching is a case-insensitive substring test, checked in order:
    /// `win`, then `mac`, then `nix` / `nux` / `aix`.
    ///
    /// ```
    /// use rbridge_core::Platform;
    ///
    /// assert_eq!(Platform::from_os_name("Windows 10").unwrap(), Platform::Windows);
    /// assert_eq!(Platform::from_os_name("Linux").unwrap(), Platform::Unix);
    /// assert!(Platform::from_os_name("Plan 9").is_err());
    /// ```
    pub fn from_os_name(os_name: &str) -> Result<Self> {
        let os = os_name.to_lowercase();

        if os.contains("win") {
            Ok(Platform::Windows)
        } else if os.contains("mac") {
            Ok(Platform::Mac)
        } else if os.contains("nix") || os.contains("nux") || os.contains("aix") {
            Ok(Platform::Unix)
        } else {
            Err(Error::unsupported_platform(os_name))
        }
    }

    /// The platform this process runs on.
    pub fn current() -> Result<Self> {
        (*CURRENT).ok_or_else(|| Error::unsupported_platform(std::env::consts::OS))
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Unix => write!(f, "unix"),
            Platform::Mac => write!(f, "mac"),
        }
    }
}
