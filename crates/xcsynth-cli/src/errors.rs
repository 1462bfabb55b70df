//! Error types for the xcsynth command line
//!
//! Library errors are wrapped here so every command returns one type;
//! `main` adds context with `anyhow` only at the outermost boundary.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use xcsynth_config::ConfigError;
use xcsynth_manifest::ManifestError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid scan pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("Cannot scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{0} is locked by another xcsynth process")]
    Locked(PathBuf),

    #[error("No project document at {0}")]
    NoDocument(PathBuf),

    #[error("{count} invariant violation(s): {tags}")]
    Verification { count: usize, tags: String },

    #[error("Failed to encode JSON output: {0}")]
    Json(#[from] serde_json::Error),
}
