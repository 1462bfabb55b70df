//! Project document location
//!
//! The document lives at `<root>/<Name>.xcodeproj/project.pbxproj`. Its lock,
//! backup and staging files sit beside it.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::errors::ConfigError;

pub const DOCUMENT_FILE_NAME: &str = "project.pbxproj";
const BUNDLE_EXTENSION: &str = "xcodeproj";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub project_name: String,
    /// The `<Name>.xcodeproj` directory
    pub bundle: PathBuf,
    pub document: PathBuf,
    pub backup: PathBuf,
    pub lock: PathBuf,
    pub staging: PathBuf,
}

impl ProjectPaths {
    /// Locate the project under `root`.
    ///
    /// The name comes from the configuration, else from the single
    /// `*.xcodeproj` directory in `root`, else from the root directory itself.
    pub fn resolve(root: &Path, config: &Config) -> Result<Self, ConfigError> {
        if !root.is_dir() {
            return Err(ConfigError::ProjectNotFound(root.to_path_buf()));
        }

        let project_name = match &config.project_name {
            Some(name) => name.clone(),
            None => {
                let mut candidates = bundles_in(root)?;
                match candidates.len() {
                    0 => root_name(root)?,
                    1 => {
                        let bundle = candidates.remove(0);
                        bundle
                            .file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .ok_or_else(|| ConfigError::ProjectNotFound(bundle.clone()))?
                    }
                    _ => {
                        return Err(ConfigError::AmbiguousProject {
                            root: root.to_path_buf(),
                            candidates,
                        })
                    }
                }
            }
        };

        let bundle = root.join(format!("{}.{}", project_name, BUNDLE_EXTENSION));
        let document = bundle.join(DOCUMENT_FILE_NAME);
        debug!("Project document: {}", document.display());
        Ok(ProjectPaths {
            root: root.to_path_buf(),
            backup: sibling(&document, "backup"),
            lock: sibling(&document, "lock"),
            staging: sibling(&document, "tmp"),
            project_name,
            bundle,
            document,
        })
    }

    /// Whether a document already exists on disk
    pub fn has_document(&self) -> bool {
        self.document.is_file()
    }
}

fn sibling(document: &Path, suffix: &str) -> PathBuf {
    let mut name = document.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn bundles_in(root: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut found = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() && path.extension().is_some_and(|ext| ext == BUNDLE_EXTENSION) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

fn root_name(root: &Path) -> Result<String, ConfigError> {
    let absolute = fs::canonicalize(root)?;
    absolute
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or(ConfigError::ProjectNotFound(absolute))
}
