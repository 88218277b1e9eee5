//! The external configuration surface: a single file path, deserializable from
//! a caller's configuration document under its native key name.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration consumed by [`crate::pipeline::read`]/[`crate::pipeline::write`].
///
/// Deserializes from a document whose single required field is `QVDFile`, matching
/// the host tool's on-disk configuration key, so embedding this inside a larger
/// configuration document does not force a caller to rename the key.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "QVDFile")]
    qvd_file: PathBuf,
}

impl Config {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { qvd_file: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.qvd_file
    }
}
