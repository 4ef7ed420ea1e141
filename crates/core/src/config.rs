//! TOML configuration loading.
//!
//! Each crate owns its typed config section; this module only turns a file
//! or string into one of them.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::result::Result;

/// Parse a TOML document into `T`.
///
/// `origin` names the source in error messages (usually a file path).
///
/// # Errors
///
/// Returns `Error::TomlParseFailed` if the document is malformed or does
/// not match `T`.
pub fn parse_toml<T: DeserializeOwned>(content: &str, origin: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::toml_parse_failed(origin, e.to_string()))
}

/// Read and parse a TOML file into `T`.
///
/// # Errors
///
/// Returns `Error::FileReadFailed` if the file cannot be read and
/// `Error::TomlParseFailed` if it cannot be parsed.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
    parse_toml(&content, &path.display().to_string())
}
