//! Configuration file parsing for R Bridge
//!
//! Settings live in `config.toml` under the platform config directory
//! (`~/.config/r-bridge/` on Linux).

pub mod settings;
pub mod types;

pub use settings::{config_path, init_config_file, load_default_settings, load_settings};
pub use types::*;
