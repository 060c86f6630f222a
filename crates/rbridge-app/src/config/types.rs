//! Configuration types for R Bridge
//!
//! Defines `Settings` (config.toml) and its sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use rbridge_core::prelude::*;
use rbridge_process::DEFAULT_BUFFER_CAPACITY;

/// Application settings (config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub buffer: BufferSettings,

    #[serde(default)]
    pub notifier: NotifierSettings,

    #[serde(default)]
    pub interpreter: InterpreterSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

impl Settings {
    /// Reject values no session can run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer.capacity == 0 {
            return Err(Error::config_invalid("buffer.capacity must be greater than 0"));
        }
        if self.notifier.delay_ms == 0 {
            return Err(Error::config_invalid("notifier.delay_ms must be greater than 0"));
        }
        Ok(())
    }
}

/// Output buffer settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BufferSettings {
    /// Maximum characters of output kept
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

/// Change notifier settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NotifierSettings {
    /// Coalescing delay between buffer checks
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl NotifierSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_delay_ms() -> u64 {
    10
}

/// Where to find R and how to run it
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InterpreterSettings {
    /// Explicit executable; skips discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Searched before the platform default directories
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,

    /// Also consider `R` on PATH
    #[serde(default)]
    pub search_path: bool,

    /// Show R's stderr alongside stdout
    #[serde(default = "default_true")]
    pub capture_stderr: bool,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            path: None,
            extra_dirs: Vec::new(),
            search_path: false,
            capture_stderr: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Session lifecycle settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionSettings {
    /// How long R may take to exit on its own before it is killed
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl SessionSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}
