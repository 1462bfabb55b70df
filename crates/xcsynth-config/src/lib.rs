//! Configuration for xcsynth: the optional `xcsynth.toml` at a project root
//! and the on-disk location of the project document.

pub mod config;
pub mod errors;
pub mod paths;

pub use config::{Config, ScanConfig, SettingsConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME};
pub use errors::ConfigError;
pub use paths::{ProjectPaths, DOCUMENT_FILE_NAME};
