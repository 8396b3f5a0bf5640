//! # cromulent-core
//!
//! Shared infrastructure for the cromulent tools.
//!
//! This crate provides:
//! - [`CoreError`] - Errors raised while setting up a run
//! - [`logging`] - Tracing setup
//! - [`config`] - YAML configuration with environment overrides
//!
//! ## Example
//!
//! ```no_run
//! use cromulent_core::{Config, logging};
//!
//! fn main() -> cromulent_core::Result<()> {
//!     let _guard = logging::init_logging(None, 0)?;
//!     let config = Config::load(None)?;
//!     tracing::info!(cromwell = %config.cromwell.base_url(), "configured");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use config::Config;
pub use error::{CoreError, Result};
pub use logging::{LogGuard, init_logging};
