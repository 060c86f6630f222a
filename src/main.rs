//! R Bridge - run an interactive R session from the terminal
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use tracing::{error, info};

use r_bridge::{run, RunOptions};
use rbridge_app::config::{self, Settings};
use rbridge_core::{logging, Error};

/// R Bridge - locate R and bridge an interactive session with it
#[derive(Parser, Debug)]
#[command(name = "rbridge")]
#[command(about = "Locate an R interpreter and run an interactive session", long_about = None)]
struct Args {
    /// Path to the R executable (skips discovery)
    #[arg(long = "r", value_name = "EXE")]
    r: Option<PathBuf>,

    /// Folder containing the R executable
    #[arg(long, value_name = "DIR", conflicts_with = "r")]
    r_home: Option<PathBuf>,

    /// Output buffer capacity in characters
    #[arg(long, value_name = "CHARS")]
    buffer: Option<usize>,

    /// Delay between output checks in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Run in headless mode (NDJSON output)
    #[arg(long)]
    headless: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a default config file and exit
    #[arg(long)]
    init_config: bool,
}

impl Args {
    /// Config file values overridden by flags
    fn settings(&self) -> Settings {
        let mut settings = match &self.config {
            Some(path) => config::load_settings(path),
            None => config::load_default_settings(),
        };

        if let Some(r) = &self.r {
            settings.interpreter.path = Some(r.clone());
        }
        if let Some(capacity) = self.buffer {
            settings.buffer.capacity = capacity;
        }
        if let Some(delay_ms) = self.delay_ms {
            settings.notifier.delay_ms = delay_ms;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if args.init_config {
        let path = args
            .config
            .clone()
            .or_else(config::config_path)
            .ok_or_else(|| eyre!("no config directory on this platform, pass --config"))?;
        if config::init_config_file(&path)? {
            eprintln!("Wrote default config to {}", path.display());
        } else {
            eprintln!("Config already exists at {}", path.display());
        }
        return Ok(());
    }

    // Logs go to a file; stdout belongs to the session
    if let Err(e) = logging::init() {
        eprintln!("Logging disabled: {}", e);
    }

    let options = RunOptions {
        settings: args.settings(),
        r_home: args.r_home.clone(),
        headless: args.headless,
    };

    let result = run(options).await;
    info!("R Bridge exiting");

    match result {
        Ok(Some(code)) if code != 0 => std::process::exit(code),
        Ok(_) => Ok(()),
        Err(Error::InterpreterNotFound { candidates }) => {
            eprintln!("❌ R not found ({} locations checked).", candidates);
            eprintln!();
            eprintln!("Hint: pass the executable with --r /path/to/R,");
            eprintln!("      or the folder containing it with --r-home <dir>,");
            eprintln!("      or set [interpreter] path in the config file.");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Application error: {:?}", e);
            Err(e).wrap_err("R session failed")
        }
    }
}
