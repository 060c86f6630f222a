//! Settings loader for `<config dir>/r-bridge/config.toml`

use super::types::Settings;
use rbridge_core::prelude::*;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "r-bridge";

const DEFAULT_CONFIG: &str = r#"# R Bridge Configuration

[buffer]
capacity = 10000          # characters of output kept, must be > 0

[notifier]
delay_ms = 10             # how often new output is checked, must be > 0

[interpreter]
# path = "/usr/lib/R/bin/R"   # explicit executable, skips discovery
extra_dirs = []           # searched before the platform defaults
search_path = false       # also consider `R` on PATH
capture_stderr = true

[session]
shutdown_grace_ms = 2000
"#;

/// Default location of the settings file
///
/// `None` when the platform has no config directory.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILENAME))
}

/// Load settings from the default location
pub fn load_default_settings() -> Settings {
    match config_path() {
        Some(path) => load_settings(&path),
        None => {
            debug!("No config directory on this platform, using defaults");
            Settings::default()
        }
    }
}

/// Load settings from `path`
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Write the commented default config to `path` unless a file is already there
///
/// Returns `true` when a file was created.
pub fn init_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        debug!("Config file {:?} already exists", path);
        return Ok(false);
    }

    ensure_parent(path)?;
    std::fs::write(path, DEFAULT_CONFIG)
        .map_err(|e| Error::config(format!("Failed to write {}: {}", path.display(), e)))?;

    info!("Created config file at {:?}", path);
    Ok(true)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }
    Ok(())
}
