//! R Bridge Library
//!
//! Finds an R interpreter and runs an interactive session with it from the
//! terminal, either as plain console text or as NDJSON events.

pub mod console;
pub mod headless;
pub mod input;
pub mod runner;

// Re-export main entry points
pub use runner::{render_on_thread, run, run_session, RunOptions};
