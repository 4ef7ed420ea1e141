//! Shared building blocks for the snaprestore workspace.
//!
//! - [`Error`] / [`Result`]: the error type for configuration and file access
//! - [`BestEffort`] / [`ResultTap`]: combinators for side effects whose failure
//!   must be logged but never propagated
//! - [`config`]: TOML loading for the typed configuration sections owned by
//!   the other crates

pub mod config;
pub mod error;
pub mod result;

pub use config::{load_toml, parse_toml};
pub use error::Error;
pub use result::{BestEffort, Result, ResultTap};
