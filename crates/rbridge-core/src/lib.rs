//! # rbridge-core - Core Domain Types
//!
//! Foundation crate for R Bridge. Provides the error type, host platform
//! detection, session lifecycle types and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (thiserror, tracing, dirs).
//!
//! ## Public API
//!
//! ### Platform (`platform`)
//! - [`Platform`] - Windows, Unix or Mac, resolved once from the OS identifier
//!
//! ### Session Types (`types`)
//! - [`SessionState`] - `Created -> Running -> Closed` lifecycle
//! - [`AtomicSessionState`] - Lock-free shared lifecycle flag
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use rbridge_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod platform;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result, ResultExt};
pub use platform::Platform;
pub use types::{AtomicSessionState, SessionState};
